//! A small CSS selector subset.
//!
//! Supported: type selectors, `*`, `#id`, `.class`, `[attr]`, `[attr="v"]`,
//! `[attr^="v"]`, `[attr*="v"]`, the descendant combinator and comma
//! separated selector lists. That covers every selector the site scripts use.

use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid selector {selector:?}: {reason}")]
    Invalid {
        selector: String,
        reason: &'static str,
    },
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

/// Compound selectors joined by descendant combinators; the last one is the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Complex {
    pub(crate) parts: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub(crate) tag: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attributes: Vec<AttrMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttrMatch {
    pub(crate) name: String,
    pub(crate) op: AttrOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrOp {
    Exists,
    Equals(String),
    Prefix(String),
    Contains(String),
}

impl AttrOp {
    pub(crate) fn matches(&self, value: &str) -> bool {
        match self {
            AttrOp::Exists => true,
            AttrOp::Equals(expected) => value == expected,
            AttrOp::Prefix(prefix) => value.starts_with(prefix.as_str()),
            AttrOp::Contains(needle) => value.contains(needle.as_str()),
        }
    }
}

impl Selector {
    pub fn parse(input: &str) -> Result<Selector, SelectorError> {
        let invalid = |reason| SelectorError::Invalid {
            selector: input.to_string(),
            reason,
        };

        let mut alternatives = Vec::new();
        let mut chars = input.chars().peekable();

        loop {
            let complex = parse_complex(&mut chars).map_err(invalid)?;
            if complex.parts.is_empty() {
                return Err(invalid("empty selector"));
            }
            alternatives.push(complex);

            match chars.next() {
                Some(',') => continue,
                None => break,
                Some(_) => return Err(invalid("unexpected character")),
            }
        }

        Ok(Selector { alternatives })
    }

    pub(crate) fn alternatives(&self) -> &[Complex] {
        &self.alternatives
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

fn parse_complex(chars: &mut Peekable<Chars<'_>>) -> Result<Complex, &'static str> {
    let mut parts = Vec::new();

    loop {
        skip_whitespace(chars);
        match chars.peek() {
            None | Some(',') => break,
            Some(_) => {
                let compound = parse_compound(chars)?;
                parts.push(compound);
            }
        }
    }

    Ok(Complex { parts })
}

fn parse_compound(chars: &mut Peekable<Chars<'_>>) -> Result<Compound, &'static str> {
    let mut compound = Compound::default();
    let mut consumed = false;

    while let Some(&c) = chars.peek() {
        match c {
            '*' => {
                chars.next();
            }
            '#' => {
                chars.next();
                let id = read_ident(chars);
                if id.is_empty() {
                    return Err("empty id selector");
                }
                compound.id = Some(id);
            }
            '.' => {
                chars.next();
                let class = read_ident(chars);
                if class.is_empty() {
                    return Err("empty class selector");
                }
                compound.classes.push(class);
            }
            '[' => {
                chars.next();
                compound.attributes.push(parse_attribute(chars)?);
            }
            c if is_ident_char(c) => {
                if consumed {
                    return Err("type selector must come first");
                }
                compound.tag = Some(read_ident(chars).to_ascii_lowercase());
            }
            c if c.is_whitespace() || c == ',' => break,
            _ => return Err("unsupported selector syntax"),
        }
        consumed = true;
    }

    Ok(compound)
}

fn parse_attribute(chars: &mut Peekable<Chars<'_>>) -> Result<AttrMatch, &'static str> {
    skip_whitespace(chars);
    let name = read_ident(chars).to_ascii_lowercase();
    if name.is_empty() {
        return Err("empty attribute name");
    }
    skip_whitespace(chars);

    let op = match chars.next() {
        Some(']') => return Ok(AttrMatch { name, op: AttrOp::Exists }),
        Some('=') => AttrOp::Equals(read_attr_value(chars)?),
        Some('^') if chars.next() == Some('=') => AttrOp::Prefix(read_attr_value(chars)?),
        Some('*') if chars.next() == Some('=') => AttrOp::Contains(read_attr_value(chars)?),
        _ => return Err("unsupported attribute operator"),
    };

    skip_whitespace(chars);
    if chars.next() != Some(']') {
        return Err("unterminated attribute selector");
    }

    Ok(AttrMatch { name, op })
}

fn read_attr_value(chars: &mut Peekable<Chars<'_>>) -> Result<String, &'static str> {
    skip_whitespace(chars);
    match chars.peek() {
        Some(&quote) if quote == '"' || quote == '\'' => {
            chars.next();
            let mut value = String::new();
            for c in chars.by_ref() {
                if c == quote {
                    return Ok(value);
                }
                value.push(c);
            }
            Err("unterminated attribute value")
        }
        _ => {
            let value = read_ident(chars);
            if value.is_empty() {
                Err("empty attribute value")
            } else {
                Ok(value)
            }
        }
    }
}

fn read_ident(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        ident.push(c);
        chars.next();
    }
    ident
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_class_descendant() {
        let selector = Selector::parse(".lang-switcher button").unwrap();
        let complex = &selector.alternatives()[0];

        assert_eq!(complex.parts.len(), 2);
        assert_eq!(complex.parts[0].classes, vec!["lang-switcher"]);
        assert_eq!(complex.parts[1].tag.as_deref(), Some("button"));
    }

    #[test]
    fn test_parse_selector_list() {
        let selector =
            Selector::parse(".lang-switcher button, .mobile-lang-switcher a").unwrap();
        assert_eq!(selector.alternatives().len(), 2);
    }

    #[test]
    fn test_parse_prefix_attribute() {
        let selector = Selector::parse(r#"a[href^="tel:"]"#).unwrap();
        let compound = &selector.alternatives()[0].parts[0];

        assert_eq!(compound.tag.as_deref(), Some("a"));
        assert_eq!(compound.attributes[0].name, "href");
        assert_eq!(compound.attributes[0].op, AttrOp::Prefix("tel:".to_string()));
    }

    #[test]
    fn test_parse_id_and_exists_attribute() {
        let selector = Selector::parse("#drinks-menu [data-i18n]").unwrap();
        let parts = &selector.alternatives()[0].parts;

        assert_eq!(parts[0].id.as_deref(), Some("drinks-menu"));
        assert_eq!(parts[1].attributes[0].op, AttrOp::Exists);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("a >> b").is_err());
        assert!(Selector::parse("[href").is_err());
        assert!(Selector::parse("a,").is_err());
    }

    #[test]
    fn test_attr_op_matching() {
        assert!(AttrOp::Prefix("mailto:".into()).matches("mailto:a@b.c"));
        assert!(!AttrOp::Prefix("mailto:".into()).matches("tel:1"));
        assert!(AttrOp::Contains("#".into()).matches("/bar#menu"));
        assert!(AttrOp::Equals("en".into()).matches("en"));
    }
}
