use super::parse::{self, escape_attribute, escape_text};
use super::selector::{Complex, Compound, Selector};
use reqwest::Url;
use std::collections::HashMap;
use tracing::warn;

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Root,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    /// Inline style declarations, serialized into the `style` attribute.
    style: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// In-memory page: the element tree plus the window state the scripts read
/// (location, scroll offset, viewport).
///
/// Detached nodes stay in the arena; they are simply unreachable from the root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    doctype: bool,
    location: Url,
    scroll_y: f64,
    viewport_height: f64,
    scroll_height: f64,
    offsets: HashMap<NodeId, f64>,
}

impl Document {
    /// Empty `<html><head></head><body></body></html>` page.
    pub fn new(location: Url) -> Self {
        let mut doc = Self::bare(location);
        let html = doc.create_element("html");
        doc.append_child(doc.root, html);
        doc.html = html;
        doc.ensure_head_and_body();
        doc
    }

    /// Parse a full page. Missing `html`, `head` or `body` elements are created.
    pub fn parse(markup: &str, location: Url) -> Self {
        let mut doc = Self::bare(location);
        let root = doc.root;
        doc.doctype = parse::parse_into(&mut doc, root, markup);

        match doc.children(root).into_iter().find(|&id| doc.tag_name(id) == Some("html")) {
            Some(html) => doc.html = html,
            None => {
                let html = doc.create_element("html");
                for child in doc.children(root) {
                    if doc.is_element(child) {
                        doc.append_child(html, child);
                    }
                }
                doc.append_child(root, html);
                doc.html = html;
            }
        }

        doc.ensure_head_and_body();
        doc
    }

    fn bare(location: Url) -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Root,
            }],
            root: NodeId(0),
            html: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            doctype: false,
            location,
            scroll_y: 0.0,
            viewport_height: 800.0,
            scroll_height: 800.0,
            offsets: HashMap::new(),
        }
    }

    fn ensure_head_and_body(&mut self) {
        let html = self.html;
        let head = self
            .children(html)
            .into_iter()
            .find(|&id| self.tag_name(id) == Some("head"));
        let body = self
            .children(html)
            .into_iter()
            .find(|&id| self.tag_name(id) == Some("body"));

        self.head = match head {
            Some(head) => head,
            None => {
                let head = self.create_element("head");
                self.insert_first(html, head);
                head
            }
        };

        self.body = match body {
            Some(body) => body,
            None => {
                let body = self.create_element("body");
                for child in self.children(html) {
                    if child != self.head {
                        self.append_child(body, child);
                    }
                }
                self.append_child(html, body);
                body
            }
        };
    }

    // ==================== Window state ====================

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Equivalent of `history.replaceState`: swaps the URL without navigation.
    pub fn replace_location(&mut self, location: Url) {
        self.location = location;
    }

    pub fn pathname(&self) -> &str {
        self.location.path()
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    pub fn scroll_to(&mut self, y: f64) {
        let max = (self.scroll_height - self.viewport_height).max(0.0);
        self.scroll_y = y.clamp(0.0, max);
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn scroll_height(&self) -> f64 {
        self.scroll_height
    }

    /// Record layout metrics reported by the host.
    pub fn set_viewport(&mut self, viewport_height: f64, scroll_height: f64) {
        self.viewport_height = viewport_height;
        self.scroll_height = scroll_height;
    }

    /// Distance from the top of the page to `id`; 0 until the host reports it.
    pub fn offset_top(&self, id: NodeId) -> f64 {
        self.offsets.get(&id).copied().unwrap_or(0.0)
    }

    pub fn set_offset_top(&mut self, id: NodeId, y: f64) {
        self.offsets.insert(id, y);
    }

    // ==================== Document metadata ====================

    pub fn document_element(&self) -> NodeId {
        self.html
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn lang(&self) -> Option<&str> {
        self.attribute(self.html, "lang")
    }

    pub fn set_lang(&mut self, lang: &str) {
        let html = self.html;
        self.set_attribute(html, "lang", lang);
    }

    pub fn title(&self) -> String {
        self.children(self.head)
            .into_iter()
            .find(|&id| self.tag_name(id) == Some("title"))
            .map(|id| self.text_content(id))
            .unwrap_or_default()
    }

    pub fn set_title(&mut self, title: &str) {
        let existing = self
            .children(self.head)
            .into_iter()
            .find(|&id| self.tag_name(id) == Some("title"));
        let element = match existing {
            Some(element) => element,
            None => {
                let element = self.create_element("title");
                let head = self.head;
                self.append_child(head, element);
                element
            }
        };
        self.set_text_content(element, title);
    }

    // ==================== Tree construction ====================

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            style: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Comment(text.to_string()))
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|&id| id != child);
        }
    }

    /// Append `child` to `parent`, moving it if it is already attached elsewhere.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn insert_first(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(0, child);
    }

    pub fn remove_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    // ==================== Navigation ====================

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0].children.clone()
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|&child| self.is_element(child))
            .collect()
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev().copied());
        }
        out
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Element(_))
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    // ==================== Attributes ====================

    /// Attribute value. `style` is not available here; use [`Document::style`].
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let Some(element) = self.element_mut(id) else {
            return;
        };

        if name == "style" {
            element.style = parse_style(value);
            return;
        }

        match element.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => element.attributes.push((name, value.to_string())),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.attributes.retain(|(key, _)| key != name);
        }
    }

    pub fn id_attribute(&self, id: NodeId) -> Option<&str> {
        self.attribute(id, "id")
    }

    // ==================== Classes ====================

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attribute(id, "class")
            .unwrap_or_default()
            .split_whitespace()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).any(|c| c == class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let mut classes: Vec<String> = self.classes(id).map(str::to_string).collect();
        classes.push(class.to_string());
        self.set_attribute(id, "class", &classes.join(" "));
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let classes: Vec<String> = self
            .classes(id)
            .filter(|c| *c != class)
            .map(str::to_string)
            .collect();
        self.set_attribute(id, "class", &classes.join(" "));
    }

    /// Toggle `class`, returning whether it is now present.
    pub fn toggle_class(&mut self, id: NodeId, class: &str) -> bool {
        if self.has_class(id, class) {
            self.remove_class(id, class);
            false
        } else {
            self.add_class(id, class);
            true
        }
    }

    pub fn set_class_name(&mut self, id: NodeId, class_name: &str) {
        self.set_attribute(id, "class", class_name);
    }

    // ==================== Inline style ====================

    pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
        self.element(id)?
            .style
            .iter()
            .find(|(key, _)| key == property)
            .map(|(_, value)| value.as_str())
    }

    /// Set an inline style property; an empty value removes it.
    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        let Some(element) = self.element_mut(id) else {
            return;
        };
        if value.is_empty() {
            element.style.retain(|(key, _)| key != property);
            return;
        }
        match element.style.iter_mut().find(|(key, _)| key == property) {
            Some((_, existing)) => *existing = value.to_string(),
            None => element.style.push((property.to_string(), value.to_string())),
        }
    }

    // ==================== Content ====================

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeData::Text(text) = &self.nodes[id.0].data {
            out.push_str(text);
        }
        for node in self.descendants(id) {
            if let NodeData::Text(text) = &self.nodes[node.0].data {
                out.push_str(text);
            }
        }
        out
    }

    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        self.remove_children(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    /// Replace the children of `id` with the parsed `markup`.
    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) {
        self.remove_children(id);
        parse::parse_into(self, id, markup);
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self.tag_name(id).is_some_and(parse::is_raw_text);
        for &child in &self.nodes[id.0].children {
            self.serialize(child, raw, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize(id, false, &mut out);
        out
    }

    /// Serialize the whole page.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if self.doctype {
            out.push_str("<!DOCTYPE html>\n");
        }
        for &child in &self.nodes[self.root.0].children {
            self.serialize(child, false, &mut out);
        }
        out
    }

    fn serialize(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Root => {
                for &child in &self.nodes[id.0].children {
                    self.serialize(child, false, out);
                }
            }
            NodeData::Text(text) if raw_text => out.push_str(text),
            NodeData::Text(text) => escape_text(text, out),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attribute(value, out);
                    out.push('"');
                }
                if !element.style.is_empty() {
                    out.push_str(" style=\"");
                    escape_attribute(&serialize_style(&element.style), out);
                    out.push('"');
                }
                out.push('>');

                if parse::is_void(&element.tag) {
                    return;
                }
                let raw = parse::is_raw_text(&element.tag);
                for &child in &self.nodes[id.0].children {
                    self.serialize(child, raw, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }

    // ==================== Selectors ====================

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        selector
            .alternatives()
            .iter()
            .any(|complex| self.matches_complex(id, complex))
    }

    fn matches_complex(&self, id: NodeId, complex: &Complex) -> bool {
        let Some((subject, ancestors)) = complex.parts.split_last() else {
            return false;
        };
        if !self.matches_compound(id, subject) {
            return false;
        }

        // Descendant combinators only, so greedy nearest-ancestor matching is exact
        let mut remaining = ancestors.iter().rev().peekable();
        let mut current = self.parent(id);
        while let Some(compound) = remaining.peek() {
            match current {
                Some(node) => {
                    if self.matches_compound(node, compound) {
                        remaining.next();
                    }
                    current = self.parent(node);
                }
                None => return false,
            }
        }
        true
    }

    fn matches_compound(&self, id: NodeId, compound: &Compound) -> bool {
        let Some(element) = self.element(id) else {
            return false;
        };
        if compound.tag.as_ref().is_some_and(|tag| *tag != element.tag) {
            return false;
        }
        if let Some(expected) = &compound.id {
            if self.attribute(id, "id") != Some(expected.as_str()) {
                return false;
            }
        }
        if !compound.classes.iter().all(|class| self.has_class(id, class)) {
            return false;
        }
        compound.attributes.iter().all(|attr| {
            let value = if attr.name == "style" {
                (!element.style.is_empty()).then(|| serialize_style(&element.style))
            } else {
                self.attribute(id, &attr.name).map(str::to_string)
            };
            value.is_some_and(|value| attr.op.matches(&value))
        })
    }

    /// All elements under `scope` matching `selector`, in document order.
    pub fn select_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| self.matches(id, selector))
            .collect()
    }

    /// `querySelectorAll` over the whole page. Invalid selectors match nothing.
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        self.query_selector_all_within(self.root, selector)
    }

    pub fn query_selector_all_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        match Selector::parse(selector) {
            Ok(selector) => self.select_within(scope, &selector),
            Err(e) => {
                warn!("Ignoring selector: {}", e);
                Vec::new()
            }
        }
    }

    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    pub fn query_selector_within(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        self.query_selector_all_within(scope, selector).into_iter().next()
    }

    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&id| self.attribute(id, "id") == Some(element_id))
    }

    /// Nearest inclusive ancestor of `id` matching `selector`.
    pub fn closest(&self, id: NodeId, selector: &str) -> Option<NodeId> {
        let selector = match Selector::parse(selector) {
            Ok(selector) => selector,
            Err(e) => {
                warn!("Ignoring selector: {}", e);
                return None;
            }
        };
        let mut current = Some(id);
        while let Some(node) = current {
            if self.matches(node, &selector) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }
}

fn parse_style(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim();
            let value = value.trim();
            (!property.is_empty() && !value.is_empty())
                .then(|| (property.to_string(), value.to_string()))
        })
        .collect()
}

fn serialize_style(style: &[(String, String)]) -> String {
    style
        .iter()
        .map(|(property, value)| format!("{}: {};", property, value))
        .collect::<Vec<_>>()
        .join(" ")
}
