//! Tree walk and text-node rewrite
//!
//! Collects eligible text nodes first, then rewrites them, so the walk never
//! observes its own output.

use instant::Instant;
use serde::Serialize;

use crate::dom::{DomTree, NodeKind, Piece};
use crate::error::AmpersoundError;
use crate::scanner::grammar::Grammar;
use crate::scanner::tag::{RenderedTag, TagId, TagRegistry, IGNORE_CLASS, TAG_CLASS};

/// Elements whose text is never scanned.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "textarea", "input"];

/// Result of one scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport<N> {
    pub text_nodes_visited: usize,
    #[serde(skip)]
    pub tags: Vec<(TagId, N)>,
    pub tags_created: usize,
    pub elapsed_us: u64,
}

pub(crate) fn is_skipped_element<D: DomTree>(dom: &D, node: &D::Node) -> bool {
    if dom.has_class(node, TAG_CLASS) || dom.has_class(node, IGNORE_CLASS) || dom.is_content_editable(node) {
        return true;
    }
    dom.tag_name(node)
        .map(|name| SKIPPED_ELEMENTS.contains(&name.as_str()))
        .unwrap_or(false)
}

fn collect_text_nodes<D: DomTree>(dom: &D, node: &D::Node, out: &mut Vec<D::Node>) {
    match dom.kind(node) {
        NodeKind::Text => {
            // A bare text root still needs an eligible parent.
            if let Some(parent) = dom.parent(node) {
                if !is_skipped_element(dom, &parent) {
                    out.push(node.clone());
                }
            }
        }
        NodeKind::Element => {
            if is_skipped_element(dom, node) {
                return;
            }
            for child in dom.children(node) {
                collect_text_nodes(dom, &child, out);
            }
        }
        NodeKind::Other => {
            for child in dom.children(node) {
                collect_text_nodes(dom, &child, out);
            }
        }
    }
}

/// Find and render every tag under `root`.
pub fn scan_tree<D: DomTree>(
    dom: &mut D,
    root: &D::Node,
    grammar: &Grammar,
    session_username: Option<&str>,
    registry: &mut TagRegistry,
) -> Result<ScanReport<D::Node>, AmpersoundError> {
    let start = Instant::now();

    let mut text_nodes = Vec::new();
    collect_text_nodes(dom, root, &mut text_nodes);

    let mut created = Vec::new();
    for node in &text_nodes {
        let Some(text) = dom.text(node) else { continue };
        let spans = grammar.tokenize(&text);
        if spans.is_empty() {
            continue;
        }

        let rendered: Vec<(TagId, RenderedTag)> = spans
            .iter()
            .map(|span| {
                (
                    registry.reserve_id(),
                    RenderedTag::from_token(&span.token, session_username),
                )
            })
            .collect();

        let mut pieces = Vec::with_capacity(spans.len() * 2 + 1);
        let mut cursor = 0;
        for (span, (id, tag)) in spans.iter().zip(&rendered) {
            if span.start > cursor {
                pieces.push(Piece::Text(&text[cursor..span.start]));
            }
            pieces.push(Piece::Tag { id: *id, tag });
            cursor = span.end;
        }
        if cursor < text.len() {
            pieces.push(Piece::Text(&text[cursor..]));
        }

        let elements = dom.replace_text(node, &pieces)?;
        for ((id, tag), element) in rendered.into_iter().zip(elements) {
            registry.insert(id, tag);
            created.push((id, element));
        }
    }

    Ok(ScanReport {
        text_nodes_visited: text_nodes.len(),
        tags_created: created.len(),
        tags: created,
        elapsed_us: start.elapsed().as_micros() as u64,
    })
}
