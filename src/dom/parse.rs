//! Tolerant HTML fragment parser and serializer helpers.
//!
//! Handles the markup the site ships: elements, quoted and unquoted
//! attributes, void elements, comments, a doctype and raw-text `script` and
//! `style` bodies. Unknown end tags are ignored and unclosed elements are
//! closed at the end of the fragment.

use super::document::{Document, NodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

/// Parse `markup` and append the resulting nodes under `parent`.
///
/// Returns whether a doctype declaration was seen.
pub(crate) fn parse_into(doc: &mut Document, parent: NodeId, markup: &str) -> bool {
    let mut stack = vec![parent];
    let mut pos = 0;
    let mut saw_doctype = false;

    while pos < markup.len() {
        let rest = &markup[pos..];

        if let Some(body) = rest.strip_prefix("<!--") {
            let (text, consumed) = match body.find("-->") {
                Some(end) => (&body[..end], 4 + end + 3),
                None => (body, rest.len()),
            };
            let comment = doc.create_comment(text);
            doc.append_child(current(&stack), comment);
            pos += consumed;
            continue;
        }

        if rest.starts_with("<!") || rest.starts_with("<?") {
            if rest[2..].to_ascii_lowercase().starts_with("doctype") {
                saw_doctype = true;
            }
            pos += rest.find('>').map_or(rest.len(), |end| end + 1);
            continue;
        }

        if let Some(after) = rest.strip_prefix("</") {
            let end = after.find('>').unwrap_or(after.len());
            let name = after[..end].trim().to_ascii_lowercase();
            close_element(doc, &mut stack, &name);
            pos += 2 + (end + 1).min(after.len());
            continue;
        }

        if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let (tag, attributes, self_closing, consumed) = read_start_tag(rest);
            pos += consumed;

            let element = doc.create_element(&tag);
            for (name, value) in attributes {
                doc.set_attribute(element, &name, &value);
            }
            doc.append_child(current(&stack), element);

            if is_raw_text(&tag) {
                let body = &markup[pos..];
                let closing = format!("</{}", tag);
                let end = body.to_ascii_lowercase().find(&closing).unwrap_or(body.len());
                if end > 0 {
                    let text = doc.create_text(&body[..end]);
                    doc.append_child(element, text);
                }
                let tail = &body[end..];
                pos += end + tail.find('>').map_or(tail.len(), |close| close + 1);
            } else if !self_closing && !is_void(&tag) {
                stack.push(element);
            }
            continue;
        }

        // Text runs until the next tag-like '<'
        let skip = if rest.starts_with('<') { 1 } else { 0 };
        let end = rest[skip..].find('<').map_or(rest.len(), |i| i + skip);
        let text = doc.create_text(&decode_entities(&rest[..end]));
        doc.append_child(current(&stack), text);
        pos += end;
    }

    saw_doctype
}

fn current(stack: &[NodeId]) -> NodeId {
    stack[stack.len() - 1]
}

fn close_element(doc: &Document, stack: &mut Vec<NodeId>, name: &str) {
    // Index 0 is the fragment parent and is never closed
    if let Some(index) = stack
        .iter()
        .rposition(|&id| doc.tag_name(id) == Some(name))
        .filter(|&index| index > 0)
    {
        stack.truncate(index);
    }
}

/// Read a start tag from the beginning of `input` (which starts with `<`).
fn read_start_tag(input: &str) -> (String, Vec<(String, String)>, bool, usize) {
    let bytes = input.as_bytes();
    let mut pos = 1;

    while pos < bytes.len() && is_name_byte(bytes[pos]) {
        pos += 1;
    }
    let tag = input[1..pos].to_ascii_lowercase();

    let mut attributes = Vec::new();
    let mut self_closing = false;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        match bytes[pos] {
            b'>' => {
                pos += 1;
                break;
            }
            b'/' => {
                if bytes.get(pos + 1) == Some(&b'>') {
                    self_closing = true;
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            _ => {
                let start = pos;
                while pos < bytes.len()
                    && !bytes[pos].is_ascii_whitespace()
                    && !matches!(bytes[pos], b'=' | b'>' | b'/')
                {
                    pos += 1;
                }
                let name = input[start..pos].to_ascii_lowercase();

                while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }

                let mut value = String::new();
                if bytes.get(pos) == Some(&b'=') {
                    pos += 1;
                    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                        pos += 1;
                    }
                    match bytes.get(pos) {
                        Some(&quote) if quote == b'"' || quote == b'\'' => {
                            let body = &input[pos + 1..];
                            let end = body.find(quote as char).unwrap_or(body.len());
                            value = decode_entities(&body[..end]);
                            pos += 1 + end + 1;
                        }
                        _ => {
                            let start = pos;
                            while pos < bytes.len()
                                && !bytes[pos].is_ascii_whitespace()
                                && bytes[pos] != b'>'
                            {
                                pos += 1;
                            }
                            value = decode_entities(&input[start..pos]);
                        }
                    }
                }

                if !name.is_empty() {
                    attributes.push((name, value));
                }
            }
        }
    }

    (tag, attributes, self_closing, pos.min(input.len()))
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

/// Decode the character references that appear in the site's markup.
pub(crate) fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_reference(&candidate[1..end]).map(|c| (c, end + 1)));

        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &candidate[len..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

pub(crate) fn escape_text(input: &str, out: &mut String) {
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

pub(crate) fn escape_attribute(input: &str, out: &mut String) {
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("Fish &amp; Chips"), "Fish & Chips");
        assert_eq!(decode_entities("&lt;b&gt;"), "<b>");
        assert_eq!(decode_entities("&#169; &#x41;"), "© A");
        assert_eq!(decode_entities("AT&T"), "AT&T");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_read_start_tag_attributes() {
        let (tag, attrs, self_closing, consumed) =
            read_start_tag(r#"<img src="a.png" alt='Logo' loading=lazy hidden>rest"#);

        assert_eq!(tag, "img");
        assert!(!self_closing);
        assert_eq!(
            attrs,
            vec![
                ("src".to_string(), "a.png".to_string()),
                ("alt".to_string(), "Logo".to_string()),
                ("loading".to_string(), "lazy".to_string()),
                ("hidden".to_string(), String::new()),
            ]
        );
        assert_eq!(&r#"<img src="a.png" alt='Logo' loading=lazy hidden>rest"#[consumed..], "rest");
    }

    #[test]
    fn test_read_self_closing_tag() {
        let (tag, _, self_closing, _) = read_start_tag("<br/>");
        assert_eq!(tag, "br");
        assert!(self_closing);
    }

    #[test]
    fn test_escape_round_trip_for_text() {
        let mut out = String::new();
        escape_text("a < b & c", &mut out);
        assert_eq!(out, "a &lt; b &amp; c");
        assert_eq!(decode_entities(&out), "a < b & c");
    }
}
