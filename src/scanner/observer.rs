//! Mutation filtering for the debounced rescan.
//!
//! The bindings flatten each `MutationRecord` into a [`MutationEvent`]; only
//! changes that could introduce a new tag schedule a rescan.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddedNode {
    /// `inside_tag`: the element is one of ours or sits inside one.
    Element { inside_tag: bool, text: String },
    Text { inside_tag: bool, text: String },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEvent {
    ChildList { added: Vec<AddedNode> },
    CharacterData { inside_tag: bool, text: Option<String> },
}

impl AddedNode {
    fn may_hold_tag(&self) -> bool {
        match self {
            AddedNode::Element { inside_tag, text } | AddedNode::Text { inside_tag, text } => {
                !inside_tag && text.contains('&')
            }
            AddedNode::Other => false,
        }
    }
}

impl MutationEvent {
    pub fn may_hold_tag(&self) -> bool {
        match self {
            MutationEvent::ChildList { added } => added.iter().any(AddedNode::may_hold_tag),
            MutationEvent::CharacterData { inside_tag, text } => {
                !inside_tag && text.as_deref().map_or(false, |t| t.contains('&'))
            }
        }
    }
}

/// True when any mutation in the batch warrants a rescan.
pub fn needs_rescan(events: &[MutationEvent]) -> bool {
    events.iter().any(MutationEvent::may_hold_tag)
}
