//! Minimal HTML document view backed by tree-sitter
//!
//! Vendor support pages are scraped with a handful of queries (by id, class,
//! tag name, text content and ancestry). tree-sitter tolerates the malformed
//! markup those pages tend to contain, so the queries operate directly on the
//! concrete syntax tree instead of building a DOM.

use tracing::warn;
use tree_sitter::{Node, Tree};

use crate::parser::error::ParseError;

/// A parsed HTML document that owns its source text
pub struct HtmlDocument {
    source: String,
    tree: Tree,
}

impl HtmlDocument {
    pub fn parse(content: &str) -> Result<Self, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        let language = tree_sitter_html::LANGUAGE;
        parser.set_language(&language.into()).map_err(|e| {
            warn!("Failed to set HTML language for tree-sitter: {}", e);
            ParseError::TreeSitter(e.to_string())
        })?;

        let tree = parser.parse(content, None).ok_or_else(|| {
            warn!("Failed to parse HTML content");
            ParseError::ParseFailed("Failed to parse HTML".to_string())
        })?;

        Ok(Self {
            source: content.to_string(),
            tree,
        })
    }

    /// The document node; has no tag name but supports every query
    pub fn root(&self) -> Element<'_> {
        Element {
            node: self.tree.root_node(),
            source: &self.source,
        }
    }
}

/// An element (or the document root) inside an [`HtmlDocument`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element<'a> {
    node: Node<'a>,
    source: &'a str,
}

const ELEMENT_KINDS: [&str; 3] = ["element", "script_element", "style_element"];

fn is_element(node: &Node) -> bool {
    ELEMENT_KINDS.contains(&node.kind())
}

fn named_children<'a>(node: Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

impl<'a> Element<'a> {
    fn wrap(&self, node: Node<'a>) -> Element<'a> {
        Element {
            node,
            source: self.source,
        }
    }

    fn node_text(&self, node: Node) -> &'a str {
        &self.source[node.byte_range()]
    }

    fn start_tag(&self) -> Option<Node<'a>> {
        named_children(self.node)
            .into_iter()
            .find(|child| matches!(child.kind(), "start_tag" | "self_closing_tag"))
    }

    /// Lowercased tag name, `None` for the document root
    pub fn tag_name(&self) -> Option<String> {
        let start_tag = self.start_tag()?;
        named_children(start_tag)
            .into_iter()
            .find(|child| child.kind() == "tag_name")
            .map(|name| self.node_text(name).to_ascii_lowercase())
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag_name()
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    /// Attribute value with entities decoded; valueless attributes yield ""
    pub fn attr(&self, name: &str) -> Option<String> {
        let start_tag = self.start_tag()?;

        for attribute in named_children(start_tag) {
            if attribute.kind() != "attribute" {
                continue;
            }

            let parts = named_children(attribute);
            let Some(attr_name) = parts.iter().find(|n| n.kind() == "attribute_name") else {
                continue;
            };
            if !self.node_text(*attr_name).eq_ignore_ascii_case(name) {
                continue;
            }

            let value = parts.iter().find_map(|part| match part.kind() {
                "attribute_value" => Some(self.node_text(*part)),
                "quoted_attribute_value" => Some(
                    named_children(*part)
                        .into_iter()
                        .find(|n| n.kind() == "attribute_value")
                        .map(|n| self.node_text(n))
                        .unwrap_or(""),
                ),
                _ => None,
            });

            return Some(decode_entities(value.unwrap_or("")));
        }

        None
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Direct child elements
    pub fn children(&self) -> Vec<Element<'a>> {
        named_children(self.node)
            .into_iter()
            .filter(is_element)
            .map(|node| self.wrap(node))
            .collect()
    }

    /// All descendant nodes in document order, excluding `self`
    fn descendant_nodes(&self) -> Vec<Node<'a>> {
        let mut result = Vec::new();
        let mut stack = named_children(self.node);
        stack.reverse();

        while let Some(node) = stack.pop() {
            result.push(node);
            let mut children = named_children(node);
            children.reverse();
            stack.extend(children);
        }

        result
    }

    /// All descendant elements in document order
    pub fn descendants(&self) -> Vec<Element<'a>> {
        self.descendant_nodes()
            .into_iter()
            .filter(is_element)
            .map(|node| self.wrap(node))
            .collect()
    }

    pub fn find(&self, predicate: impl Fn(&Element<'a>) -> bool) -> Option<Element<'a>> {
        self.descendants().into_iter().find(|e| predicate(e))
    }

    pub fn find_all(&self, predicate: impl Fn(&Element<'a>) -> bool) -> Vec<Element<'a>> {
        self.descendants()
            .into_iter()
            .filter(|e| predicate(e))
            .collect()
    }

    pub fn find_by_id(&self, id: &str) -> Option<Element<'a>> {
        self.find(|e| e.attr("id").as_deref() == Some(id))
    }

    pub fn find_by_class(&self, class: &str) -> Option<Element<'a>> {
        self.find(|e| e.has_class(class))
    }

    /// The innermost element holding a text run accepted by `predicate`
    pub fn find_text(&self, predicate: impl Fn(&str) -> bool) -> Option<Element<'a>> {
        self.descendant_nodes()
            .into_iter()
            .filter(|node| node.kind() == "text")
            .find(|node| predicate(&decode_entities(self.node_text(*node).trim())))
            .and_then(|node| node.parent())
            .filter(is_element)
            .map(|node| self.wrap(node))
    }

    /// Nearest enclosing element (not `self`)
    pub fn parent(&self) -> Option<Element<'a>> {
        let mut current = self.node.parent();
        while let Some(node) = current {
            if is_element(&node) {
                return Some(self.wrap(node));
            }
            current = node.parent();
        }
        None
    }

    /// `self` or the nearest ancestor with the given tag
    pub fn closest(&self, tag: &str) -> Option<Element<'a>> {
        if self.is(tag) {
            return Some(*self);
        }
        let mut current = self.parent();
        while let Some(element) = current {
            if element.is(tag) {
                return Some(element);
            }
            current = element.parent();
        }
        None
    }

    pub fn next_sibling_element(&self) -> Option<Element<'a>> {
        let mut current = self.node.next_named_sibling();
        while let Some(node) = current {
            if is_element(&node) {
                return Some(self.wrap(node));
            }
            current = node.next_named_sibling();
        }
        None
    }

    /// Rendered text of the element and all its descendants
    pub fn text(&self) -> String {
        let runs: Vec<Node<'a>> = self
            .descendant_nodes()
            .into_iter()
            .filter(|n| matches!(n.kind(), "text" | "entity"))
            .filter(|n| !self.inside_raw_element(*n))
            .collect();
        self.join_runs(&runs)
    }

    fn inside_raw_element(&self, node: Node<'a>) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            if parent == self.node {
                return false;
            }
            if matches!(parent.kind(), "script_element" | "style_element") {
                return true;
            }
            current = parent.parent();
        }
        false
    }

    /// Joins text runs, inserting a space where the source separates them
    /// with whitespace
    fn join_runs(&self, runs: &[Node<'a>]) -> String {
        let mut text = String::new();
        let mut previous_end: Option<usize> = None;

        for run in runs {
            if let Some(end) = previous_end {
                let gap = &self.source[end..run.start_byte()];
                if gap.chars().any(char::is_whitespace) {
                    text.push(' ');
                }
            }
            text.push_str(&decode_entities(self.node_text(*run)));
            previous_end = Some(run.end_byte());
        }

        text.trim().to_string()
    }
}

/// Decodes the character references commonly found in vendor pages
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        output.push_str(&rest[..amp]);
        let candidate = &rest[amp..];

        let decoded = candidate.find(';').and_then(|semi| {
            let name = &candidate[1..semi];
            let ch = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi + 1))
        });

        match decoded {
            Some((ch, consumed)) => {
                output.push(ch);
                rest = &candidate[consumed..];
            }
            None => {
                output.push('&');
                rest = &candidate[1..];
            }
        }
    }

    output.push_str(rest);
    output
}
