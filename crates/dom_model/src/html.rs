//! Mounting chapter XHTML into the tree and writing it back out

use crate::{DomError, DomTree, NodeId, NodeKind, Result};
use quick_xml::escape::{escape, resolve_xml_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Elements whose content is never mounted
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style"];

/// Wrapper elements replaced by their children
const TRANSPARENT_ELEMENTS: &[&str] = &["html", "body"];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "hr", "img", "input", "link", "meta", "source", "wbr",
];

/// XML builtins plus named HTML entities common in book XHTML
fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "mdash" => Some("\u{2014}"),
        "ndash" => Some("\u{2013}"),
        "hellip" => Some("\u{2026}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "copy" => Some("\u{a9}"),
        _ => resolve_xml_entity(name),
    }
}

fn local_name(bytes: &[u8]) -> String {
    let name = String::from_utf8_lossy(bytes);
    match name.rfind(':') {
        Some(pos) => name[pos + 1..].to_ascii_lowercase(),
        None => name.to_ascii_lowercase(),
    }
}

/// Parse an XHTML fragment and append the resulting nodes to `parent`.
///
/// `<html>` and `<body>` are unwrapped; `<head>`, `<script>` and `<style>`
/// are dropped with their content. Whitespace text is kept as-is.
pub fn parse_fragment_into(tree: &mut DomTree, parent: NodeId, xhtml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xhtml);
    reader.config_mut().trim_text(false);

    // None marks a transparent element that has no node of its own
    let mut stack: Vec<Option<NodeId>> = Vec::new();
    let mut skip_depth = 0usize;

    let current = |stack: &[Option<NodeId>]| {
        stack.iter().rev().flatten().next().copied().unwrap_or(parent)
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                    continue;
                }
                let name = local_name(e.name().as_ref());
                if SKIPPED_ELEMENTS.contains(&name.as_str()) {
                    skip_depth = 1;
                } else if TRANSPARENT_ELEMENTS.contains(&name.as_str()) {
                    stack.push(None);
                } else {
                    let node = create_element(tree, &name, &e)?;
                    tree.append_child(current(&stack), node)?;
                    stack.push(Some(node));
                }
            }
            Event::End(_) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else {
                    stack.pop();
                }
            }
            Event::Empty(e) => {
                if skip_depth > 0 {
                    continue;
                }
                let name = local_name(e.name().as_ref());
                if SKIPPED_ELEMENTS.contains(&name.as_str())
                    || TRANSPARENT_ELEMENTS.contains(&name.as_str())
                {
                    continue;
                }
                let node = create_element(tree, &name, &e)?;
                tree.append_child(current(&stack), node)?;
            }
            Event::Text(e) => {
                if skip_depth > 0 {
                    continue;
                }
                let text = e
                    .unescape_with(html_entity)
                    .map_err(|e| DomError::Parse(format!("Failed to unescape text: {}", e)))?;
                append_text(tree, current(&stack), &text)?;
            }
            Event::CData(e) => {
                if skip_depth > 0 {
                    continue;
                }
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                append_text(tree, current(&stack), &text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if skip_depth > 0 || !stack.is_empty() {
        return Err(DomError::Parse(format!(
            "unexpected end of input at byte {}",
            reader.buffer_position()
        )));
    }
    Ok(())
}

fn create_element(tree: &mut DomTree, name: &str, start: &BytesStart<'_>) -> Result<NodeId> {
    let node = tree.create_element(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DomError::Parse(format!("Bad attribute on <{}>: {}", name, e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value_with(html_entity)
            .map_err(|e| DomError::Parse(format!("Failed to unescape attribute {}: {}", key, e)))?;
        tree.set_attribute(node, key, value.into_owned())?;
    }
    Ok(node)
}

/// Append text, merging into a trailing text node
fn append_text(tree: &mut DomTree, parent: NodeId, text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    if let Some(&last) = tree.children(parent).last() {
        if let Some(existing) = tree.text(last) {
            let merged = format!("{existing}{text}");
            return tree.set_text(last, merged);
        }
    }
    let node = tree.create_text(text);
    tree.append_child(parent, node)
}

/// Serialize a node and its subtree as XHTML
pub fn to_html(tree: &DomTree, node: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, node, &mut out);
    out
}

/// Serialize only the children of a node
pub fn inner_html(tree: &DomTree, node: NodeId) -> String {
    let mut out = String::new();
    for child in tree.children(node) {
        write_node(tree, *child, &mut out);
    }
    out
}

fn write_node(tree: &DomTree, node: NodeId, out: &mut String) {
    let Some(dom_node) = tree.get(node) else {
        return;
    };
    match dom_node.kind() {
        NodeKind::Text(text) => out.push_str(&escape(text.as_str())),
        NodeKind::Element(data) => {
            out.push('<');
            out.push_str(data.tag());
            for (key, value) in data.attributes() {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&escape(value.as_str()));
                out.push('"');
            }
            if dom_node.children().is_empty() && VOID_ELEMENTS.contains(&data.tag()) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in dom_node.children() {
                write_node(tree, *child, out);
            }
            out.push_str("</");
            out.push_str(data.tag());
            out.push('>');
        }
    }
}

impl DomTree {
    /// Build a reading container holding a single XHTML fragment
    pub fn from_fragment(xhtml: &str) -> Result<Self> {
        let mut tree = DomTree::new("div");
        let root = tree.root();
        tree.set_attribute(root, "id", crate::READING_CONTAINER_ID)?;
        parse_fragment_into(&mut tree, root, xhtml)?;
        Ok(tree)
    }
}
