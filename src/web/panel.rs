//! Floating suggestion panel.

use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, Node};

use crate::autocomplete::SuggestionList;
use crate::error::AmpersoundError;
use crate::scanner::IGNORE_CLASS;
use crate::web::timers::js_error;

pub const PANEL_CLASS: &str = "ampersound-suggestions";
pub const ROW_CLASS: &str = "ampersound-suggestion";
pub const ACTIVE_ROW_CLASS: &str = "ampersound-suggestion-active";
const ROW_INDEX_ATTR: &str = "data-index";

fn dom_error(e: wasm_bindgen::JsValue) -> AmpersoundError {
    AmpersoundError::Dom(js_error(e))
}

pub struct SuggestionPanel {
    document: Document,
    root: HtmlElement,
}

impl SuggestionPanel {
    /// Create the (hidden) panel and attach it to `body`.
    pub fn new(document: &Document) -> Result<Self, AmpersoundError> {
        let root: HtmlElement = document
            .create_element("div")
            .map_err(dom_error)?
            .dyn_into()
            .map_err(|_| AmpersoundError::Dom("div is not an HtmlElement".into()))?;
        root.set_class_name(&format!("{} {}", PANEL_CLASS, IGNORE_CLASS));
        let style = root.style();
        for (name, value) in [
            ("position", "absolute"),
            ("z-index", "2147483647"),
            ("display", "none"),
            ("background", "#fff"),
            ("border", "1px solid #ccc"),
            ("border-radius", "4px"),
            ("box-shadow", "0 2px 6px rgba(0,0,0,.2)"),
            ("font", "13px sans-serif"),
            ("max-height", "240px"),
            ("overflow-y", "auto"),
        ] {
            style.set_property(name, value).map_err(dom_error)?;
        }
        document
            .body()
            .ok_or_else(|| AmpersoundError::Dom("no body".into()))?
            .append_child(&root)
            .map_err(dom_error)?;
        Ok(Self {
            document: document.clone(),
            root,
        })
    }

    pub fn element(&self) -> &HtmlElement {
        &self.root
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.root.contains(Some(node))
    }

    /// Row index under `node`, if it is inside a row.
    pub fn row_index(&self, node: &Node) -> Option<usize> {
        if !self.contains(node) {
            return None;
        }
        let element = match node.dyn_ref::<Element>() {
            Some(el) => el.clone(),
            None => node.parent_element()?,
        };
        element
            .closest(&format!(".{}", ROW_CLASS))
            .ok()??
            .get_attribute(ROW_INDEX_ATTR)?
            .parse()
            .ok()
    }

    /// Show `list` under `anchor`, or hide when closed.
    pub fn render(&self, list: &SuggestionList, anchor: Option<&Element>) -> Result<(), AmpersoundError> {
        let (true, Some(anchor)) = (list.is_open(), anchor) else {
            return self.hide();
        };

        self.root.set_inner_html("");
        for (index, item) in list.items().iter().enumerate() {
            let row = self.document.create_element("div").map_err(dom_error)?;
            row.set_class_name(ROW_CLASS);
            if list.highlighted() == Some(index) {
                row.class_list().add_1(ACTIVE_ROW_CLASS).map_err(dom_error)?;
                row.set_attribute("style", "padding:4px 8px;cursor:pointer;background:#e8f0fe")
                    .map_err(dom_error)?;
            } else {
                row.set_attribute("style", "padding:4px 8px;cursor:pointer")
                    .map_err(dom_error)?;
            }
            row.set_attribute(ROW_INDEX_ATTR, &index.to_string())
                .map_err(dom_error)?;
            row.set_attribute("title", &item.tag).map_err(dom_error)?;
            row.set_text_content(Some(&item.display_text));
            self.root.append_child(&row).map_err(dom_error)?;
        }

        let rect = anchor.get_bounding_client_rect();
        let window = self
            .document
            .default_view()
            .ok_or_else(|| AmpersoundError::Dom("no window".into()))?;
        let scroll_x = window.scroll_x().unwrap_or(0.0);
        let scroll_y = window.scroll_y().unwrap_or(0.0);
        let style = self.root.style();
        style
            .set_property("left", &format!("{}px", rect.left() + scroll_x))
            .map_err(dom_error)?;
        style
            .set_property("top", &format!("{}px", rect.bottom() + scroll_y))
            .map_err(dom_error)?;
        style
            .set_property("min-width", &format!("{}px", rect.width().min(320.0)))
            .map_err(dom_error)?;
        style.set_property("display", "block").map_err(dom_error)
    }

    pub fn hide(&self) -> Result<(), AmpersoundError> {
        self.root.set_inner_html("");
        self.root.style().set_property("display", "none").map_err(dom_error)
    }
}

/// The row under the pointer, valid only for the rows it was hovered on.
#[derive(Debug, Default)]
pub struct RowHover {
    row: Option<usize>,
    tags: Vec<String>,
}

impl RowHover {
    /// Record the rows now on screen. A different set forgets the hovered row,
    /// so the pointer resting on it counts as a fresh hover.
    pub fn rows_rendered(&mut self, list: &SuggestionList) {
        let tags: Vec<String> = list.items().iter().map(|i| i.tag.clone()).collect();
        if tags != self.tags {
            self.row = None;
            self.tags = tags;
        }
    }

    /// Pointer over row `index`; false when it already was.
    pub fn enter(&mut self, index: usize) -> bool {
        if self.row == Some(index) {
            return false;
        }
        self.row = Some(index);
        true
    }

    pub fn leave(&mut self) {
        self.row = None;
    }
}
