//! Document tree abstraction
//!
//! The scanner walks and rewrites documents only through [`DomTree`]. The
//! browser bindings implement it over `web_sys` nodes; [`MemoryDom`] is the
//! arena-backed tree used by native tests.

pub mod memory;

pub use memory::{MemoryDom, NodeId};

use crate::error::AmpersoundError;
use crate::scanner::tag::{RenderedTag, TagId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    /// Comments, documents, fragments and anything else.
    Other,
}

/// One replacement piece for a text node.
#[derive(Debug, Clone, Copy)]
pub enum Piece<'a> {
    Text(&'a str),
    Tag { id: TagId, tag: &'a RenderedTag },
}

pub trait DomTree {
    type Node: Clone;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    /// Lowercase tag name; `None` for non-elements.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    /// Editable itself or through an ancestor. Text nodes answer for their parent.
    fn is_content_editable(&self, node: &Self::Node) -> bool;

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Character data of a text node.
    fn text(&self, node: &Self::Node) -> Option<String>;

    /// Replace a text node with `pieces`, in order. Returns the created tag
    /// elements in the same order as the `Piece::Tag` entries.
    fn replace_text(
        &mut self,
        node: &Self::Node,
        pieces: &[Piece<'_>],
    ) -> Result<Vec<Self::Node>, AmpersoundError>;
}
