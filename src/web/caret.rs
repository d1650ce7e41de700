//! DOM-backed caret surfaces.
//!
//! DOM selections count UTF-16 code units; everything handed to the engine
//! is converted to UTF-8 byte offsets first.

use std::ops::Range;

use wasm_bindgen::JsCast;
use web_sys::{Element, Event, EventInit, HtmlDocument, HtmlElement, HtmlInputElement, HtmlTextAreaElement, Node, Text};

use crate::autocomplete::caret::check_range;
use crate::autocomplete::{byte_to_utf16, utf16_to_byte, CaretContext, CaretSurface, SpliceMode};
use crate::error::CommitError;
use crate::web::timers::{js_error, window};

/// Input types that take free text.
const TEXT_INPUT_TYPES: &[&str] = &["text", "search", "email", "url", "tel"];

fn surface_error(e: wasm_bindgen::JsValue) -> CommitError {
    CommitError::Surface(js_error(e))
}

/// Let page scripts and frameworks see the programmatic edit.
fn notify_input(target: &Element) {
    let init = EventInit::new();
    init.set_bubbles(true);
    if let Ok(event) = Event::new_with_event_init_dict("input", &init) {
        let _ = target.dispatch_event(&event);
    }
}

// ============================================================================
// Flat fields
// ============================================================================

#[derive(Clone)]
enum FieldElement {
    Input(HtmlInputElement),
    TextArea(HtmlTextAreaElement),
}

#[derive(Clone)]
pub struct WebPlainField {
    field: FieldElement,
}

impl WebPlainField {
    pub fn from_element(element: &Element) -> Option<Self> {
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            let kind = input.type_().to_ascii_lowercase();
            if TEXT_INPUT_TYPES.contains(&kind.as_str()) {
                return Some(Self {
                    field: FieldElement::Input(input.clone()),
                });
            }
            return None;
        }
        element.dyn_ref::<HtmlTextAreaElement>().map(|area| Self {
            field: FieldElement::TextArea(area.clone()),
        })
    }

    fn element(&self) -> &Element {
        match &self.field {
            FieldElement::Input(el) => el.unchecked_ref(),
            FieldElement::TextArea(el) => el.unchecked_ref(),
        }
    }

    fn value(&self) -> String {
        match &self.field {
            FieldElement::Input(el) => el.value(),
            FieldElement::TextArea(el) => el.value(),
        }
    }

    fn set_value(&self, value: &str) {
        match &self.field {
            FieldElement::Input(el) => el.set_value(value),
            FieldElement::TextArea(el) => el.set_value(value),
        }
    }

    fn selection_start(&self) -> Option<u32> {
        match &self.field {
            FieldElement::Input(el) => el.selection_start().ok().flatten(),
            FieldElement::TextArea(el) => el.selection_start().ok().flatten(),
        }
    }

    fn set_caret(&self, units: u32) -> Result<(), CommitError> {
        match &self.field {
            FieldElement::Input(el) => el.set_selection_range(units, units),
            FieldElement::TextArea(el) => el.set_selection_range(units, units),
        }
        .map_err(surface_error)
    }
}

impl CaretSurface for WebPlainField {
    fn caret_context(&self) -> Option<CaretContext> {
        let value = self.value();
        let caret = utf16_to_byte(&value, self.selection_start()? as usize);
        Some(CaretContext::in_text(&value[..caret]))
    }

    fn replace_span(&mut self, range: Range<usize>, replacement: &str) -> Result<SpliceMode, CommitError> {
        let value = self.value();
        check_range(&value, &range)?;
        let mut next = String::with_capacity(value.len() + replacement.len());
        next.push_str(&value[..range.start]);
        next.push_str(replacement);
        next.push_str(&value[range.end..]);

        self.set_value(&next);
        self.set_caret(byte_to_utf16(&next, range.start + replacement.len()) as u32)?;
        notify_input(self.element());
        Ok(SpliceMode::Direct)
    }
}

// ============================================================================
// Content-editable
// ============================================================================

enum CaretNode {
    /// Caret inside a text node, at a UTF-16 offset.
    InText(Text, u32),
    /// Caret on an element boundary; the text node just before it, if any.
    Boundary(Option<Text>),
}

#[derive(Clone)]
pub struct WebRichText {
    root: HtmlElement,
}

impl WebRichText {
    pub fn from_element(element: &Element) -> Option<Self> {
        let html = element.dyn_ref::<HtmlElement>()?;
        html.is_content_editable().then(|| Self { root: html.clone() })
    }

    fn locate(&self) -> Option<CaretNode> {
        let selection = window().ok()?.get_selection().ok()??;
        if selection.range_count() == 0 {
            return None;
        }
        let range = selection.get_range_at(0).ok()?;
        let container = range.start_container().ok()?;
        let offset = range.start_offset().ok()?;
        if !self.root.contains(Some(&container)) {
            return None;
        }

        if let Some(text) = container.dyn_ref::<Text>() {
            return Some(CaretNode::InText(text.clone(), offset));
        }
        let previous = offset
            .checked_sub(1)
            .and_then(|i| container.child_nodes().item(i))
            .and_then(|n| n.dyn_into::<Text>().ok());
        Some(CaretNode::Boundary(previous))
    }

    fn place_caret(node: &Node, units: u32) -> Result<(), CommitError> {
        let window = window().map_err(|e| CommitError::Surface(e.to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| CommitError::Surface("no document".into()))?;
        let range = document.create_range().map_err(surface_error)?;
        range.set_start(node, units).map_err(surface_error)?;
        range.collapse_with_to_start(true);
        let selection = window
            .get_selection()
            .map_err(surface_error)?
            .ok_or(CommitError::NoCaret)?;
        selection.remove_all_ranges().map_err(surface_error)?;
        selection.add_range(&range).map_err(surface_error)
    }

    /// Select `range` of `text` and type over it through the editor's own
    /// insert command, falling back to a manual range edit.
    fn insert_over(&self, text: &Text, range: Range<usize>, replacement: &str) -> Result<(), CommitError> {
        let data = text.data();
        let start = byte_to_utf16(&data, range.start) as u32;
        let end = byte_to_utf16(&data, range.end) as u32;

        let window = window().map_err(|e| CommitError::Surface(e.to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| CommitError::Surface("no document".into()))?;
        let dom_range = document.create_range().map_err(surface_error)?;
        dom_range.set_start(text, start).map_err(surface_error)?;
        dom_range.set_end(text, end).map_err(surface_error)?;
        let selection = window
            .get_selection()
            .map_err(surface_error)?
            .ok_or(CommitError::NoCaret)?;
        selection.remove_all_ranges().map_err(surface_error)?;
        selection.add_range(&dom_range).map_err(surface_error)?;

        let inserted = document
            .dyn_ref::<HtmlDocument>()
            .and_then(|doc| doc.exec_command_with_show_ui_and_value("insertText", false, replacement).ok())
            .unwrap_or(false);
        if inserted {
            return Ok(());
        }

        dom_range.delete_contents().map_err(surface_error)?;
        let node = document.create_text_node(replacement);
        dom_range.insert_node(&node).map_err(surface_error)?;
        Self::place_caret(&node, replacement.encode_utf16().count() as u32)?;
        notify_input(&self.root);
        Ok(())
    }
}

impl CaretSurface for WebRichText {
    fn caret_context(&self) -> Option<CaretContext> {
        match self.locate()? {
            CaretNode::InText(text, units) => {
                let data = text.data();
                let caret = utf16_to_byte(&data, units as usize);
                Some(CaretContext::in_text(&data[..caret]))
            }
            CaretNode::Boundary(previous) => Some(CaretContext {
                text_before: previous.map(|t| t.data()).unwrap_or_default(),
                in_text_node: false,
            }),
        }
    }

    fn replace_span(&mut self, range: Range<usize>, replacement: &str) -> Result<SpliceMode, CommitError> {
        match self.locate().ok_or(CommitError::NoCaret)? {
            CaretNode::InText(text, _) => {
                let data = text.data();
                check_range(&data, &range)?;
                let mut next = String::with_capacity(data.len() + replacement.len());
                next.push_str(&data[..range.start]);
                next.push_str(replacement);
                next.push_str(&data[range.end..]);
                text.set_data(&next);
                Self::place_caret(&text, byte_to_utf16(&next, range.start + replacement.len()) as u32)?;
                notify_input(&self.root);
                Ok(SpliceMode::Direct)
            }
            CaretNode::Boundary(previous) => {
                let text = previous.ok_or(CommitError::NoCaret)?;
                check_range(&text.data(), &range)?;
                self.insert_over(&text, range, replacement)?;
                Ok(SpliceMode::InsertAtCaret)
            }
        }
    }
}

// ============================================================================
// Either
// ============================================================================

/// The caret surface of a recognized editable element.
#[derive(Clone)]
pub enum WebSurface {
    Plain(WebPlainField),
    Rich(WebRichText),
}

impl WebSurface {
    pub fn from_element(element: &Element) -> Option<Self> {
        WebPlainField::from_element(element)
            .map(WebSurface::Plain)
            .or_else(|| WebRichText::from_element(element).map(WebSurface::Rich))
    }
}

impl CaretSurface for WebSurface {
    fn caret_context(&self) -> Option<CaretContext> {
        match self {
            WebSurface::Plain(s) => s.caret_context(),
            WebSurface::Rich(s) => s.caret_context(),
        }
    }

    fn replace_span(&mut self, range: Range<usize>, replacement: &str) -> Result<SpliceMode, CommitError> {
        match self {
            WebSurface::Plain(s) => s.replace_span(range, replacement),
            WebSurface::Rich(s) => s.replace_span(range, replacement),
        }
    }
}
