//! [`DomTree`] over live `web_sys` nodes.

use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, Node};

use crate::dom::{DomTree, NodeKind, Piece};
use crate::error::AmpersoundError;
use crate::scanner::tag::{RenderedTag, TagId, IGNORE_CLASS, TAG_CLASS, TAG_ID_ATTR};
use crate::web::timers::js_error;

pub struct WebDom {
    document: Document,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn create_tag(&self, id: TagId, tag: &RenderedTag) -> Result<Element, AmpersoundError> {
        let span = self.document.create_element("span").map_err(dom_error)?;
        for class in tag.classes() {
            span.class_list().add_1(class).map_err(dom_error)?;
        }
        for (name, value) in tag.attributes(id) {
            span.set_attribute(name, &value).map_err(dom_error)?;
        }
        span.set_text_content(Some(&tag.original_text));
        Ok(span)
    }
}

fn dom_error(e: wasm_bindgen::JsValue) -> AmpersoundError {
    AmpersoundError::Dom(js_error(e))
}

fn closest(node: &Node, selector: &str) -> Option<Element> {
    let element = match node.dyn_ref::<Element>() {
        Some(el) => el.clone(),
        None => node.parent_element()?,
    };
    element.closest(selector).ok().flatten()
}

/// The tag element containing `node`, if any.
pub fn enclosing_tag(node: &Node) -> Option<Element> {
    closest(node, &format!(".{}", TAG_CLASS))
}

/// True inside a rendered tag or the extension's own UI.
pub fn inside_own_markup(node: &Node) -> bool {
    closest(node, &format!(".{}, .{}", TAG_CLASS, IGNORE_CLASS)).is_some()
}

pub fn tag_id_of(element: &Element) -> Option<TagId> {
    element.get_attribute(TAG_ID_ATTR)?.parse().ok()
}

/// Mirror `tag` onto its element.
pub fn render_tag(element: &Element, tag: &RenderedTag) {
    element.set_attribute("title", tag.tooltip()).ok();
}

impl DomTree for WebDom {
    type Node = Node;

    fn kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::TEXT_NODE => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: &Node) -> Option<String> {
        node.dyn_ref::<Element>()
            .map(|el| el.tag_name().to_ascii_lowercase())
    }

    fn is_content_editable(&self, node: &Node) -> bool {
        let element = match node.dyn_ref::<HtmlElement>() {
            Some(el) => Some(el.clone()),
            None => node
                .parent_element()
                .and_then(|p| p.dyn_into::<HtmlElement>().ok()),
        };
        element.map(|el| el.is_content_editable()).unwrap_or(false)
    }

    fn has_class(&self, node: &Node, class: &str) -> bool {
        node.dyn_ref::<Element>()
            .map(|el| el.class_list().contains(class))
            .unwrap_or(false)
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        let list = node.child_nodes();
        (0..list.length()).filter_map(|i| list.item(i)).collect()
    }

    fn text(&self, node: &Node) -> Option<String> {
        if node.node_type() == Node::TEXT_NODE {
            node.text_content()
        } else {
            None
        }
    }

    fn replace_text(&mut self, node: &Node, pieces: &[Piece<'_>]) -> Result<Vec<Node>, AmpersoundError> {
        let parent = node
            .parent_node()
            .ok_or_else(|| AmpersoundError::Dom("text node has no parent".into()))?;
        let fragment = self.document.create_document_fragment();
        let mut created = Vec::new();
        for piece in pieces {
            match piece {
                Piece::Text(text) => {
                    let text = self.document.create_text_node(text);
                    fragment.append_child(&text).map_err(dom_error)?;
                }
                Piece::Tag { id, tag } => {
                    let span = self.create_tag(*id, tag)?;
                    fragment.append_child(&span).map_err(dom_error)?;
                    created.push(Node::from(span));
                }
            }
        }
        parent.replace_child(&fragment, node).map_err(dom_error)?;
        Ok(created)
    }
}
