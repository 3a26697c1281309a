pub mod css;
pub mod layout;
pub mod parser;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Handle to a node inside a [`Document`] arena.
///
/// Ids stay valid for the lifetime of the document: removing a node detaches
/// it but never frees its slot, so a stale id still resolves (to a node that is
/// no longer connected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Element,
    Text,
    Comment,
}

/// A single node. Elements carry a lowercase tag and attributes, text and
/// comment nodes carry character data.
#[derive(Debug, Clone)]
pub struct DomNode {
    pub node_type: NodeType,
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl DomNode {
    fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            tag: String::new(),
            attributes: HashMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("node {0:?} does not belong to this document")]
    UnknownNode(NodeId),
    #[error("node {0:?} is not a text node")]
    NotText(NodeId),
    #[error("the new child would create a cycle or has an invalid parent")]
    HierarchyRequest,
    #[error("offset {offset} is outside the node's data (length {len})")]
    IndexSize { offset: usize, len: usize },
}

/// Document shared between the page (which mutates it) and the find UI.
pub type SharedDocument = Arc<RwLock<Document>>;

/// Arena-backed document tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<DomNode>,
    root: NodeId,
    generation: u64,
    pub url: String,
    pub title: String,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut root = DomNode::new(NodeType::Document);
        root.tag = "#document".into();
        Self {
            nodes: vec![root],
            root: NodeId(0),
            generation: 0,
            url: String::new(),
            title: String::new(),
        }
    }

    pub fn into_shared(self) -> SharedDocument {
        Arc::new(RwLock::new(self))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Incremented by every mutation; observers compare it to detect changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id.0)
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut DomNode, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.get(id).filter(|n| n.is_element()).map(|n| n.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id).and_then(|n| n.attr(name))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(DomNode::is_element)
    }

    /// Character data of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id).filter(|n| n.is_text()).map(|n| n.text.as_str())
    }

    // ─── Construction & mutation ────────────────────────────────────────────

    fn push(&mut self, node: DomNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let mut node = DomNode::new(NodeType::Element);
        node.tag = tag.to_ascii_lowercase();
        self.push(node)
    }

    pub fn create_text(&mut self, data: impl Into<String>) -> NodeId {
        let mut node = DomNode::new(NodeType::Text);
        node.text = data.into();
        self.push(node)
    }

    pub fn create_comment(&mut self, data: impl Into<String>) -> NodeId {
        let mut node = DomNode::new(NodeType::Comment);
        node.text = data.into();
        self.push(node)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference` (or at the end).
    /// A child that already has a parent is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.get(child).ok_or(DomError::UnknownNode(child))?;
        let parent_node = self.get(parent).ok_or(DomError::UnknownNode(parent))?;
        if matches!(parent_node.node_type, NodeType::Text | NodeType::Comment)
            || child == self.root
            || self.is_inclusive_ancestor(child, parent)
        {
            return Err(DomError::HierarchyRequest);
        }
        if let Some(r) = reference {
            if self.parent(r) != Some(parent) {
                return Err(DomError::HierarchyRequest);
            }
        }

        self.detach(child);
        let pos = match reference {
            Some(r) => self.children(parent).iter().position(|&c| c == r),
            None => None,
        };
        let parent_node = self.get_mut(parent)?;
        match pos {
            Some(i) => parent_node.children.insert(i, child),
            None => parent_node.children.push(child),
        }
        self.get_mut(child)?.parent = Some(parent);
        self.touch();
        Ok(())
    }

    /// Detach `id` from its parent. The node keeps its own subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        self.get(id).ok_or(DomError::UnknownNode(id))?;
        if self.detach(id) {
            self.touch();
        }
        Ok(())
    }

    fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        self.nodes[parent.0].children.retain(|&c| c != id);
        self.nodes[id.0].parent = None;
        true
    }

    /// Replace the character data of a text (or comment) node.
    pub fn set_text(&mut self, id: NodeId, data: impl Into<String>) -> Result<(), DomError> {
        let node = self.get_mut(id)?;
        if !matches!(node.node_type, NodeType::Text | NodeType::Comment) {
            return Err(DomError::NotText(id));
        }
        node.text = data.into();
        self.touch();
        Ok(())
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> Result<(), DomError> {
        let node = self.get_mut(id)?;
        node.attributes.insert(name.to_ascii_lowercase(), value.into());
        self.touch();
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        let node = self.get_mut(id)?;
        if node.attributes.remove(&name.to_ascii_lowercase()).is_some() {
            self.touch();
        }
        Ok(())
    }

    /// Split a text node at `offset`; the tail becomes a new next sibling.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, DomError> {
        let data = self.text(id).ok_or(DomError::NotText(id))?;
        if offset > data.len() || !data.is_char_boundary(offset) {
            return Err(DomError::IndexSize { offset, len: data.len() });
        }
        let tail = data[offset..].to_string();
        self.nodes[id.0].text.truncate(offset);
        let new_node = self.create_text(tail);
        if let Some(parent) = self.parent(id) {
            let next = self.next_sibling(id);
            self.insert_before(parent, new_node, next)?;
        } else {
            self.touch();
        }
        Ok(new_node)
    }

    // ─── Traversal ──────────────────────────────────────────────────────────

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let i = siblings.iter().position(|&c| c == id)?;
        siblings.get(i + 1).copied()
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    /// Whether `id` is attached to the document tree.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.get(id).is_some() && self.is_inclusive_ancestor(self.root, id)
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.is_element(p))
    }

    /// The `<html>` element, if any.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root).iter().copied().find(|&c| self.is_element(c))
    }

    /// `<body>` if present, otherwise the document element.
    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.children(html)
            .iter()
            .copied()
            .find(|&c| matches!(self.tag(c), Some("body" | "frameset")))
            .or(Some(html))
    }

    /// The node itself if it is an element, else its parent element, else the
    /// document element.
    pub fn element_ancestor(&self, id: NodeId) -> Option<NodeId> {
        if self.is_element(id) {
            return Some(id);
        }
        self.parent_element(id).or_else(|| self.document_element())
    }

    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut cur = Some(a);
        while let Some(id) = cur {
            if self.is_inclusive_ancestor(id, b) {
                return Some(id);
            }
            cur = self.parent(id);
        }
        None
    }

    /// Pre-order (document order) traversal of `id`'s subtree, `id` included.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: if self.get(id).is_some() { vec![id] } else { Vec::new() },
        }
    }

    /// First element in document order whose `id` attribute equals `value`.
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .find(|&n| self.is_element(n) && self.attr(n, "id") == Some(value))
    }

    /// Concatenated data of all text nodes in the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .filter_map(|n| self.text(n))
            .collect()
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
