//! Caret surfaces
//!
//! The autocomplete engine only ever sees a [`CaretSurface`]: "what text sits
//! before the caret" and "replace this span and put the caret after it". Two
//! shapes exist, each with an in-memory model here and a DOM-backed twin in
//! `web::caret`:
//! - flat fields (`input`, `textarea`): one string, one caret offset
//! - content-editable: the caret sits inside a text node, or on an element
//!   boundary where only an insert-at-caret primitive is available
//!
//! All offsets are UTF-8 byte offsets into the caret's text unit.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::CommitError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaretContext {
    /// Text of the caret's unit (field value or text node) up to the caret.
    pub text_before: String,
    /// False when the caret is on an element boundary.
    pub in_text_node: bool,
}

impl CaretContext {
    pub fn in_text(text_before: impl Into<String>) -> Self {
        Self {
            text_before: text_before.into(),
            in_text_node: true,
        }
    }

    pub fn caret(&self) -> usize {
        self.text_before.len()
    }
}

/// How a replacement was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpliceMode {
    /// The text unit was edited in place.
    Direct,
    /// The span was selected and replaced through the insert-at-caret primitive.
    InsertAtCaret,
}

pub trait CaretSurface {
    fn caret_context(&self) -> Option<CaretContext>;

    /// Replace `range` of the caret's text unit with `replacement` and leave
    /// the caret immediately after the inserted text.
    fn replace_span(&mut self, range: Range<usize>, replacement: &str) -> Result<SpliceMode, CommitError>;
}

pub(crate) fn check_range(text: &str, range: &Range<usize>) -> Result<(), CommitError> {
    if range.start > range.end
        || range.end > text.len()
        || !text.is_char_boundary(range.start)
        || !text.is_char_boundary(range.end)
    {
        return Err(CommitError::Surface(format!(
            "span {}..{} outside text of length {}",
            range.start,
            range.end,
            text.len()
        )));
    }
    Ok(())
}

// =============================================================================
// UTF-16 <-> UTF-8 offsets (DOM selections count UTF-16 code units)
// =============================================================================

/// Byte offset of the `units`-th UTF-16 code unit, clamped to the string end.
pub fn utf16_to_byte(text: &str, units: usize) -> usize {
    let mut seen = 0;
    for (byte, ch) in text.char_indices() {
        if seen >= units {
            return byte;
        }
        seen += ch.len_utf16();
    }
    text.len()
}

pub fn byte_to_utf16(text: &str, byte: usize) -> usize {
    let byte = byte.min(text.len());
    text.char_indices()
        .take_while(|(i, _)| *i < byte)
        .map(|(_, ch)| ch.len_utf16())
        .sum()
}

// =============================================================================
// PlainField
// =============================================================================

/// A flat editable value with a collapsed caret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainField {
    value: String,
    caret: usize,
}

impl PlainField {
    /// Caret is clamped to the value and snapped back to a char boundary.
    pub fn new(value: impl Into<String>, caret: usize) -> Self {
        let value = value.into();
        let mut caret = caret.min(value.len());
        while !value.is_char_boundary(caret) {
            caret -= 1;
        }
        Self { value, caret }
    }

    /// Caret at the end, as after typing.
    pub fn typed(value: impl Into<String>) -> Self {
        let value = value.into();
        let caret = value.len();
        Self { value, caret }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn set_caret(&mut self, caret: usize) {
        *self = Self::new(std::mem::take(&mut self.value), caret);
    }
}

impl CaretSurface for PlainField {
    fn caret_context(&self) -> Option<CaretContext> {
        self.value.get(..self.caret).map(CaretContext::in_text)
    }

    fn replace_span(&mut self, range: Range<usize>, replacement: &str) -> Result<SpliceMode, CommitError> {
        check_range(&self.value, &range)?;
        self.value.replace_range(range.clone(), replacement);
        self.caret = range.start + replacement.len();
        Ok(SpliceMode::Direct)
    }
}

// =============================================================================
// RichTextField
// =============================================================================

/// A child of a content-editable host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    /// Inline element (`<b>`, `<br>`, a mention chip); opaque to the caret.
    Element(String),
}

impl Segment {
    fn text(&self) -> &str {
        match self {
            Segment::Text(t) | Segment::Element(t) => t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RichCaret {
    /// Inside the text segment at `segment`, `offset` bytes in.
    InText { segment: usize, offset: usize },
    /// Between children: right before child `index`.
    Boundary { index: usize },
}

/// In-memory content-editable host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichTextField {
    segments: Vec<Segment>,
    caret: RichCaret,
}

impl RichTextField {
    pub fn new(segments: Vec<Segment>, caret: RichCaret) -> Self {
        Self { segments, caret }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn caret(&self) -> RichCaret {
        self.caret
    }

    /// Flattened text content, as `textContent` would report it.
    pub fn text(&self) -> String {
        self.segments.iter().map(Segment::text).collect()
    }

    /// The text segment right before a boundary caret, if there is one.
    fn text_before_boundary(&self, index: usize) -> Option<(usize, &str)> {
        let prev = index.checked_sub(1)?;
        match self.segments.get(prev)? {
            Segment::Text(t) => Some((prev, t)),
            Segment::Element(_) => None,
        }
    }

    /// Insert a new text node at a boundary caret and land inside it.
    fn insert_at_caret(&mut self, index: usize, text: &str) {
        let index = index.min(self.segments.len());
        self.segments.insert(index, Segment::Text(text.to_string()));
        self.caret = RichCaret::InText {
            segment: index,
            offset: text.len(),
        };
    }
}

impl CaretSurface for RichTextField {
    fn caret_context(&self) -> Option<CaretContext> {
        match self.caret {
            RichCaret::InText { segment, offset } => match self.segments.get(segment)? {
                Segment::Text(t) => t.get(..offset).map(CaretContext::in_text),
                Segment::Element(_) => None,
            },
            RichCaret::Boundary { index } => Some(CaretContext {
                text_before: self
                    .text_before_boundary(index)
                    .map(|(_, t)| t.to_string())
                    .unwrap_or_default(),
                in_text_node: false,
            }),
        }
    }

    fn replace_span(&mut self, range: Range<usize>, replacement: &str) -> Result<SpliceMode, CommitError> {
        match self.caret {
            RichCaret::InText { segment, .. } => {
                let Some(Segment::Text(text)) = self.segments.get_mut(segment) else {
                    return Err(CommitError::NoCaret);
                };
                check_range(text, &range)?;
                text.replace_range(range.clone(), replacement);
                self.caret = RichCaret::InText {
                    segment,
                    offset: range.start + replacement.len(),
                };
                Ok(SpliceMode::Direct)
            }
            RichCaret::Boundary { index } => {
                let prev = match self.text_before_boundary(index) {
                    Some((prev, text)) => {
                        check_range(text, &range)?;
                        Some(prev)
                    }
                    None if range.is_empty() => None,
                    None => return Err(CommitError::NoCaret),
                };
                // select the span, then type over it
                if let Some(Segment::Text(text)) = prev.and_then(|p| self.segments.get_mut(p)) {
                    text.replace_range(range, "");
                }
                self.insert_at_caret(index, replacement);
                Ok(SpliceMode::InsertAtCaret)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_field_context_and_splice() {
        let mut field = PlainField::new("hey &al there", 7);
        assert_eq!(field.caret_context().unwrap().text_before, "hey &al");

        assert_eq!(field.replace_span(4..7, "&alice.boop ").unwrap(), SpliceMode::Direct);
        assert_eq!(field.value(), "hey &alice.boop  there");
        assert_eq!(field.caret(), 16);
    }

    #[test]
    fn test_plain_field_rejects_bad_span() {
        let mut field = PlainField::typed("&é");
        assert!(field.replace_span(0..2, "x").is_err());
        assert!(field.replace_span(2..9, "x").is_err());
        assert_eq!(field.value(), "&é");
    }

    #[test]
    fn test_plain_field_caret_snaps_to_char_boundary() {
        let field = PlainField::new("é", 1);
        assert_eq!(field.caret(), 0);
    }

    #[test]
    fn test_rich_text_in_text_node_edits_node() {
        let mut field = RichTextField::new(
            vec![Segment::Element("Hi".into()), Segment::Text("say &bo".into())],
            RichCaret::InText { segment: 1, offset: 7 },
        );
        assert_eq!(field.caret_context().unwrap(), CaretContext::in_text("say &bo"));

        assert_eq!(field.replace_span(4..7, "&bob.boop ").unwrap(), SpliceMode::Direct);
        assert_eq!(field.text(), "Hisay &bob.boop ");
        assert_eq!(field.caret(), RichCaret::InText { segment: 1, offset: 14 });
    }

    #[test]
    fn test_rich_text_boundary_falls_back_to_insert() {
        let mut field = RichTextField::new(
            vec![Segment::Text("hey &al".into()), Segment::Element("\n".into())],
            RichCaret::Boundary { index: 1 },
        );
        let ctx = field.caret_context().unwrap();
        assert_eq!(ctx.text_before, "hey &al");
        assert!(!ctx.in_text_node);

        assert_eq!(field.replace_span(4..7, "&alice.boop ").unwrap(), SpliceMode::InsertAtCaret);
        assert_eq!(field.text(), "hey &alice.boop \n");
        assert_eq!(field.caret(), RichCaret::InText { segment: 1, offset: 12 });
    }

    #[test]
    fn test_rich_text_boundary_after_element_has_no_text() {
        let field = RichTextField::new(vec![Segment::Element("x".into())], RichCaret::Boundary { index: 1 });
        assert_eq!(field.caret_context().unwrap().text_before, "");
    }

    #[test]
    fn test_utf16_conversions() {
        let text = "a😀&b";
        // 😀 is 4 bytes, 2 UTF-16 units
        assert_eq!(utf16_to_byte(text, 0), 0);
        assert_eq!(utf16_to_byte(text, 1), 1);
        assert_eq!(utf16_to_byte(text, 3), 5);
        assert_eq!(utf16_to_byte(text, 99), text.len());
        assert_eq!(byte_to_utf16(text, 5), 3);
        assert_eq!(byte_to_utf16(text, text.len()), 5);
    }
}
