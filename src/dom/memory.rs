//! Arena-backed document tree.

use std::collections::BTreeMap;

use crate::dom::{DomTree, NodeKind, Piece};
use crate::error::AmpersoundError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        classes: Vec<String>,
        attrs: BTreeMap<String, String>,
        /// `contenteditable` as set on this element; `None` inherits.
        editable: Option<bool>,
    },
    Text(String),
    Comment,
}

#[derive(Debug, Clone)]
struct Entry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A small DOM: one `body` root, elements, text and comments.
/// Replaced nodes stay in the arena, detached.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: Vec<Entry>,
    root: NodeId,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        let body = Entry {
            data: NodeData::Element {
                tag: "body".into(),
                classes: Vec::new(),
                attrs: BTreeMap::new(),
                editable: None,
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![body],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn push(&mut self, data: NodeData, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Entry {
            data,
            parent,
            children: Vec::new(),
        });
        id
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(
            NodeData::Element {
                tag: tag.to_ascii_lowercase(),
                classes: Vec::new(),
                attrs: BTreeMap::new(),
                editable: None,
            },
            None,
        )
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create_element(tag);
        self.attach(parent, id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push(NodeData::Text(text.to_string()), None);
        self.attach(parent, id);
        id
    }

    pub fn append_comment(&mut self, parent: NodeId) -> NodeId {
        let id = self.push(NodeData::Comment, None);
        self.attach(parent, id);
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if let NodeData::Element { classes, .. } = &mut self.nodes[node.0].data {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, editable, .. } = &mut self.nodes[node.0].data {
            if name == "contenteditable" {
                *editable = Some(value != "false");
            }
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn set_content_editable(&mut self, node: NodeId, on: bool) {
        self.set_attribute(node, "contenteditable", if on { "true" } else { "false" });
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            _ => None,
        }
    }

    pub fn child_nodes(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut cur = node;
        while let Some(parent) = self.nodes[cur.0].parent {
            cur = parent;
        }
        cur == self.root
    }

    /// Concatenated text of the subtree, like `Node.textContent`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].data {
            NodeData::Text(t) => out.push_str(t),
            NodeData::Comment => {}
            NodeData::Element { .. } => {
                for child in &self.nodes[node.0].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Attached elements carrying `class`, in document order.
    pub fn find_by_class(&self, class: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk_class(self.root, class, &mut out);
        out
    }

    fn walk_class(&self, node: NodeId, class: &str, out: &mut Vec<NodeId>) {
        if self.has_class(&node, class) {
            out.push(node);
        }
        for child in &self.nodes[node.0].children {
            self.walk_class(*child, class, out);
        }
    }
}

impl DomTree for MemoryDom {
    type Node = NodeId;

    fn kind(&self, node: &NodeId) -> NodeKind {
        match self.nodes[node.0].data {
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn is_content_editable(&self, node: &NodeId) -> bool {
        let mut cur = Some(*node);
        while let Some(id) = cur {
            if let NodeData::Element {
                editable: Some(on), ..
            } = self.nodes[id.0].data
            {
                return on;
            }
            cur = self.nodes[id.0].parent;
        }
        false
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        match &self.nodes[node.0].data {
            NodeData::Element { classes, .. } => classes.iter().any(|c| c == class),
            _ => false,
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes[node.0].children.clone()
    }

    fn text(&self, node: &NodeId) -> Option<String> {
        match &self.nodes[node.0].data {
            NodeData::Text(t) => Some(t.clone()),
            _ => None,
        }
    }

    fn replace_text(
        &mut self,
        node: &NodeId,
        pieces: &[Piece<'_>],
    ) -> Result<Vec<NodeId>, AmpersoundError> {
        let parent = self.nodes[node.0]
            .parent
            .ok_or_else(|| AmpersoundError::Dom("text node has no parent".into()))?;
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| c == node)
            .ok_or_else(|| AmpersoundError::Dom("text node not under its parent".into()))?;

        let mut replacement = Vec::with_capacity(pieces.len());
        let mut created = Vec::new();
        for piece in pieces {
            match piece {
                Piece::Text(text) => {
                    let id = self.push(NodeData::Text((*text).to_string()), Some(parent));
                    replacement.push(id);
                }
                Piece::Tag { id: tag_id, tag } => {
                    let el = self.create_element("span");
                    self.nodes[el.0].parent = Some(parent);
                    for class in tag.classes() {
                        self.add_class(el, class);
                    }
                    for (name, value) in tag.attributes(*tag_id) {
                        self.set_attribute(el, name, &value);
                    }
                    let text = self.push(NodeData::Text(tag.original_text.clone()), Some(el));
                    self.nodes[el.0].children.push(text);
                    replacement.push(el);
                    created.push(el);
                }
            }
        }

        self.nodes[parent.0]
            .children
            .splice(index..=index, replacement)
            .for_each(drop);
        self.nodes[node.0].parent = None;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_editable_inherits() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let editor = dom.append_element(root, "div");
        dom.set_content_editable(editor, true);
        let inner = dom.append_element(editor, "p");
        let locked = dom.append_element(editor, "span");
        dom.set_content_editable(locked, false);
        let text = dom.append_text(inner, "hi");

        assert!(dom.is_content_editable(&inner));
        assert!(dom.is_content_editable(&text));
        assert!(!dom.is_content_editable(&locked));
        assert!(!dom.is_content_editable(&root));
    }

    #[test]
    fn test_text_content_skips_comments() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let p = dom.append_element(root, "P");
        dom.append_text(p, "a");
        dom.append_comment(p);
        dom.append_text(p, "b");
        assert_eq!(dom.text_content(root), "ab");
        assert_eq!(dom.tag_name(&p).as_deref(), Some("p"));
    }

    #[test]
    fn test_replace_text_detaches_original() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let text = dom.append_text(root, "x");
        let created = dom.replace_text(&text, &[Piece::Text("y"), Piece::Text("z")]).unwrap();
        assert!(created.is_empty());
        assert!(!dom.is_attached(text));
        assert_eq!(dom.child_nodes(root).len(), 2);
        assert_eq!(dom.text_content(root), "yz");
    }

    #[test]
    fn test_replace_detached_text_fails() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let text = dom.append_text(root, "x");
        dom.replace_text(&text, &[Piece::Text("y")]).unwrap();
        assert!(matches!(
            dom.replace_text(&text, &[Piece::Text("z")]),
            Err(AmpersoundError::Dom(_))
        ));
    }
}
