//! Mirror of a host document
//!
//! The page-side bridge assigns every node a key and streams structural
//! changes; the mirror keeps them in an arena indexed by that key. Nodes that
//! leave the tree are dropped together with their subtree, so the arena never
//! grows beyond what the host currently renders.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use super::selector::SelectorList;

/// Bridge-assigned node key, unique within one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The document node itself; every document starts with it
pub const DOCUMENT_ROOT: NodeId = NodeId(0);

/// Elements whose serialization has no closing tag
const VOID_ELEMENTS: &[&str] = &["area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }
}

/// Serialized subtree as sent by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSpec {
    Element {
        key: NodeId,
        tag: String,
        #[serde(default)]
        attrs: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<NodeSpec>,
    },
    Text {
        key: NodeId,
        text: String,
    },
}

impl NodeSpec {
    pub fn key(&self) -> NodeId {
        match self {
            NodeSpec::Element { key, .. } | NodeSpec::Text { key, .. } => *key,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: HashMap<NodeId, Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            DOCUMENT_ROOT,
            Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            },
        );
        Self { nodes }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(&id)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map_or(&[], |n| n.children.as_slice())
    }

    /// True when `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// True when the node is still attached to this document
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_inclusive_ancestor(DOCUMENT_ROOT, id)
    }

    /// Pre-order traversal of the subtree below `id` (excluding `id`)
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    pub fn matches(&self, id: NodeId, selector: &SelectorList) -> bool {
        self.element(id).is_some_and(|e| selector.matches(e))
    }

    /// First element below `scope` (document order) matching the selector
    pub fn query_selector(&self, scope: NodeId, selector: &SelectorList) -> Option<NodeId> {
        self.descendants(scope).find(|id| self.matches(*id, selector))
    }

    /// Concatenated text of every text node below `id`
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        if let Some(NodeData::Text(t)) = self.nodes.get(&id).map(|n| &n.data) {
            text.push_str(t);
        }
        for child in self.descendants(id) {
            if let Some(NodeData::Text(t)) = self.nodes.get(&child).map(|n| &n.data) {
                text.push_str(t);
            }
        }
        text
    }

    /// Serialized markup of the children of `id`
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.serialize(*child, &mut out);
        }
        out
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        match &node.data {
            NodeData::Document => {}
            NodeData::Text(text) => escape_into(text, false, out),
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    return;
                }
                for child in &node.children {
                    self.serialize(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }

    /// Insert a serialized subtree under `parent`, before `before` when given.
    /// Keys that already exist are treated as a move of fresh content: their
    /// old subtrees are dropped first. Returns `None` when `parent` is unknown
    /// or the subtree reuses a key (twice within itself, or one of `parent`'s
    /// own ancestors), since either would link the tree into a cycle.
    pub(crate) fn insert(&mut self, parent: NodeId, before: Option<NodeId>, spec: &NodeSpec) -> Option<NodeId> {
        if !self.contains(parent) || matches!(self.nodes.get(&parent).map(|n| &n.data), Some(NodeData::Text(_))) {
            return None;
        }

        let mut keys = Vec::new();
        collect_keys(spec, &mut keys);
        let mut seen = HashSet::with_capacity(keys.len());
        if let Some(key) = keys.iter().find(|k| !seen.insert(**k)) {
            debug!(node = %key, "Rejecting subtree with a duplicated key");
            return None;
        }
        if let Some(key) = keys.iter().find(|k| self.is_inclusive_ancestor(**k, parent)) {
            debug!(node = %key, parent = %parent, "Rejecting subtree that reuses an ancestor key");
            return None;
        }

        for key in keys {
            if self.contains(key) {
                debug!(node = %key, "Replacing existing node with re-inserted content");
                self.remove(key);
            }
        }

        let key = self.build(parent, spec);
        let Some(parent_node) = self.nodes.get_mut(&parent) else {
            self.remove(key);
            return None;
        };
        let siblings = &mut parent_node.children;
        let index = before
            .and_then(|b| siblings.iter().position(|c| *c == b))
            .unwrap_or(siblings.len());
        siblings.insert(index, key);
        Some(key)
    }

    fn build(&mut self, parent: NodeId, spec: &NodeSpec) -> NodeId {
        match spec {
            NodeSpec::Text { key, text } => {
                self.nodes.insert(
                    *key,
                    Node {
                        data: NodeData::Text(text.clone()),
                        parent: Some(parent),
                        children: Vec::new(),
                    },
                );
                *key
            }
            NodeSpec::Element { key, tag, attrs, children } => {
                let mut element = Element::new(tag.as_str());
                element.attrs = attrs.clone();
                self.nodes.insert(
                    *key,
                    Node {
                        data: NodeData::Element(element),
                        parent: Some(parent),
                        children: Vec::new(),
                    },
                );
                let built: Vec<NodeId> = children.iter().map(|c| self.build(*key, c)).collect();
                if let Some(node) = self.nodes.get_mut(key) {
                    node.children = built;
                }
                *key
            }
        }
    }

    /// Detach a node and drop its subtree. Returns the former parent.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<NodeId> {
        if id == DOCUMENT_ROOT {
            return None;
        }
        let node = self.nodes.get(&id)?;
        let parent = node.parent;
        let mut doomed: Vec<NodeId> = self.descendants(id).collect();
        doomed.push(id);

        if let Some(parent_id) = parent
            && let Some(parent_node) = self.nodes.get_mut(&parent_id)
        {
            parent_node.children.retain(|c| *c != id);
        }
        for doomed_id in doomed {
            self.nodes.remove(&doomed_id);
        }
        parent
    }

    /// Set or clear an attribute. Returns false for unknown or non-element nodes.
    pub(crate) fn set_attribute(&mut self, id: NodeId, name: &str, value: Option<&str>) -> bool {
        match self.nodes.get_mut(&id).map(|n| &mut n.data) {
            Some(NodeData::Element(element)) => {
                match value {
                    Some(v) => element.attrs.insert(name.to_string(), v.to_string()),
                    None => element.attrs.remove(name),
                };
                true
            }
            _ => false,
        }
    }

    /// Replace the data of a text node. Returns false for unknown or non-text nodes.
    pub(crate) fn set_text(&mut self, id: NodeId, text: &str) -> bool {
        match self.nodes.get_mut(&id).map(|n| &mut n.data) {
            Some(NodeData::Text(current)) => {
                *current = text.to_string();
                true
            }
            _ => false,
        }
    }
}

pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}

fn collect_keys(spec: &NodeSpec, out: &mut Vec<NodeId>) {
    out.push(spec.key());
    if let NodeSpec::Element { children, .. } = spec {
        for child in children {
            collect_keys(child, out);
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn el(key: u64, tag: &str, attrs: &[(&str, &str)], children: Vec<NodeSpec>) -> NodeSpec {
        NodeSpec::Element {
            key: NodeId(key),
            tag: tag.to_string(),
            attrs: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            children,
        }
    }

    pub(crate) fn text(key: u64, text: &str) -> NodeSpec {
        NodeSpec::Text {
            key: NodeId(key),
            text: text.to_string(),
        }
    }

    fn sample() -> Document {
        let mut doc = Document::new();
        doc.insert(
            DOCUMENT_ROOT,
            None,
            &el(1, "div", &[("id", "chat")], vec![
                el(2, "span", &[("id", "author-name")], vec![text(3, " Alice ")]),
                el(4, "span", &[("id", "message")], vec![
                    text(5, "hi "),
                    el(6, "img", &[("class", "emoji"), ("alt", ":wave:")], vec![]),
                ]),
            ]),
        );
        doc
    }

    #[test]
    fn test_query_and_text() {
        let doc = sample();
        let sel = SelectorList::parse("#author-name").unwrap();
        let author = doc.query_selector(DOCUMENT_ROOT, &sel).unwrap();
        assert_eq!(author, NodeId(2));
        assert_eq!(doc.text_content(author), " Alice ");
        assert_eq!(doc.text_content(NodeId(4)), "hi ");
    }

    #[test]
    fn test_inner_html_keeps_images() {
        let doc = sample();
        assert_eq!(doc.inner_html(NodeId(4)), "hi <img alt=\":wave:\" class=\"emoji\">");
    }

    #[test]
    fn test_inner_html_escapes() {
        let mut doc = Document::new();
        doc.insert(
            DOCUMENT_ROOT,
            None,
            &el(1, "p", &[("title", "a\"b")], vec![text(2, "<b>&")]),
        );
        assert_eq!(doc.inner_html(DOCUMENT_ROOT), "<p title=\"a&quot;b\">&lt;b&gt;&amp;</p>");
    }

    #[test]
    fn test_descendants_in_document_order() {
        let doc = sample();
        let order: Vec<u64> = doc.descendants(DOCUMENT_ROOT).map(|n| n.0).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut doc = sample();
        assert_eq!(doc.remove(NodeId(4)), Some(NodeId(1)));
        assert!(!doc.contains(NodeId(5)));
        assert!(!doc.contains(NodeId(6)));
        assert_eq!(doc.children(NodeId(1)), &[NodeId(2)]);
        assert_eq!(doc.remove(DOCUMENT_ROOT), None);
    }

    #[test]
    fn test_insert_before_and_unknown_parent() {
        let mut doc = sample();
        assert!(doc.insert(NodeId(1), Some(NodeId(2)), &el(7, "hr", &[], vec![])).is_some());
        assert_eq!(doc.children(NodeId(1))[0], NodeId(7));
        assert!(doc.insert(NodeId(99), None, &el(8, "hr", &[], vec![])).is_none());
        assert!(doc.insert(NodeId(3), None, &el(9, "hr", &[], vec![])).is_none());
    }

    #[test]
    fn test_reinsert_replaces_old_subtree() {
        let mut doc = sample();
        doc.insert(DOCUMENT_ROOT, None, &el(4, "span", &[("id", "message")], vec![text(10, "new")]));
        assert!(!doc.contains(NodeId(5)));
        assert_eq!(doc.parent(NodeId(4)), Some(DOCUMENT_ROOT));
        assert_eq!(doc.children(NodeId(1)), &[NodeId(2)]);
        assert_eq!(doc.text_content(NodeId(4)), "new");
    }

    #[test]
    fn test_reused_keys_are_rejected() {
        let mut doc = sample();
        // a child carrying its own parent's key
        assert!(doc.insert(DOCUMENT_ROOT, None, &el(7, "div", &[], vec![text(7, "x")])).is_none());
        // a child carrying the key of the insertion point
        assert!(doc.insert(NodeId(2), None, &el(8, "div", &[], vec![el(2, "span", &[], vec![])])).is_none());
        // the root of the subtree is an ancestor of the insertion point
        assert!(doc.insert(NodeId(4), None, &el(1, "div", &[], vec![])).is_none());

        assert!(!doc.contains(NodeId(7)));
        assert!(!doc.contains(NodeId(8)));
        assert_eq!(doc.len(), 7);
        let order: Vec<u64> = doc.descendants(DOCUMENT_ROOT).map(|n| n.0).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5, 6]);
        assert!(doc.is_connected(NodeId(2)));
    }

    #[test]
    fn test_reinsert_moves_nodes_from_elsewhere() {
        let mut doc = sample();
        // key 6 lives under #message; re-inserting it under #author-name moves it
        let key = doc.insert(NodeId(2), None, &el(9, "b", &[], vec![el(6, "img", &[], vec![])]));
        assert_eq!(key, Some(NodeId(9)));
        assert_eq!(doc.parent(NodeId(6)), Some(NodeId(9)));
        assert_eq!(doc.children(NodeId(4)), &[NodeId(5)]);
        assert!(doc.is_connected(NodeId(6)));
    }

    #[test]
    fn test_connected_and_ancestry() {
        let doc = sample();
        assert!(doc.is_connected(NodeId(6)));
        assert!(doc.is_inclusive_ancestor(NodeId(1), NodeId(6)));
        assert!(!doc.is_inclusive_ancestor(NodeId(2), NodeId(6)));
        assert!(!doc.is_connected(NodeId(42)));
    }

    #[test]
    fn test_attribute_and_text_updates() {
        let mut doc = sample();
        assert!(doc.set_attribute(NodeId(1), "class", Some("live")));
        assert!(doc.element(NodeId(1)).unwrap().has_class("live"));
        assert!(doc.set_attribute(NodeId(1), "class", None));
        assert!(!doc.element(NodeId(1)).unwrap().has_class("live"));
        assert!(!doc.set_attribute(NodeId(3), "class", Some("x")));
        assert!(doc.set_text(NodeId(3), "Bob"));
        assert!(!doc.set_text(NodeId(2), "Bob"));
        assert_eq!(doc.text_content(NodeId(2)), "Bob");
    }
}
