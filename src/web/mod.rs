//! Browser bindings
//!
//! `ContentScript` owns one scanner engine and one autocomplete engine and
//! wires them to the page: DOM listeners, a `MutationObserver`, `setTimeout`
//! for every deadline the engines hand back, `fetch` for the API and
//! `chrome.storage.local` for the session.
//!
//! Engines live behind `RefCell`s. No borrow is held across an `.await`, and
//! DOM calls that can re-enter (synthetic `input` events) happen while only
//! the caret surface is borrowed.

pub mod audio;
pub mod caret;
pub mod dom;
pub mod fetch;
pub mod panel;
pub mod timers;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, Event, EventTarget, HtmlElement, KeyboardEvent, MouseEvent, MutationObserver, MutationObserverInit, MutationRecord, Node};

use crate::api::ApiClient;
use crate::audio::SlotToken;
use crate::autocomplete::{
    run_preview, run_suggestion_request, AutocompleteEngine, CaretSurface, ElementId, KeyOutcome, NavKey,
    PreviewPlayer, SitePolicy, SuggestionItem,
};
use crate::config::AmpersoundConfig;
use crate::error::AmpersoundError;
use crate::logging;
use crate::scanner::{refresh_and_scan, run_hover, tokenize, AddedNode, HoverOutcome, MutationEvent, ScanReport, ScannerEngine, TagId};

use self::audio::{WebAudio, WebAudioHandle};
use self::caret::WebSurface;
use self::dom::{enclosing_tag, inside_own_markup, render_tag, tag_id_of, WebDom};
use self::fetch::{ChromeSession, FetchTransport};
use self::panel::{RowHover, SuggestionPanel};
use self::timers::{arm, js_error, now};

fn dom_error(e: JsValue) -> AmpersoundError {
    AmpersoundError::Dom(js_error(e))
}

fn to_js(e: AmpersoundError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn event_node(event: &Event) -> Option<Node> {
    event.target()?.dyn_into::<Node>().ok()
}

fn event_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn listen<F>(target: &EventTarget, kind: &str, capture: bool, handler: F) -> Result<(), AmpersoundError>
where
    F: FnMut(Event) + 'static,
{
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
    target
        .add_event_listener_with_callback_and_bool(kind, closure.as_ref().unchecked_ref(), capture)
        .map_err(dom_error)?;
    // Page lifetime.
    closure.forget();
    Ok(())
}

// ============================================================================
// Editable element ids
// ============================================================================

/// Stable ids for the editable elements the autocomplete engine has seen.
#[derive(Default)]
struct FieldTable {
    next_id: ElementId,
    fields: Vec<(ElementId, Element)>,
}

impl FieldTable {
    fn find(&self, element: &Element) -> Option<ElementId> {
        self.fields.iter().find(|(_, e)| e == element).map(|(id, _)| *id)
    }

    fn id_for(&mut self, element: &Element) -> ElementId {
        if let Some(id) = self.find(element) {
            return id;
        }
        self.fields.retain(|(_, e)| e.is_connected());
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.fields.push((id, element.clone()));
        id
    }

    fn element(&self, id: ElementId) -> Option<&Element> {
        self.fields.iter().find(|(i, _)| *i == id).map(|(_, e)| e)
    }
}

// ============================================================================
// Shared state
// ============================================================================

struct Shared {
    config: AmpersoundConfig,
    document: Document,
    scanner: RefCell<ScannerEngine<WebAudioHandle>>,
    autocomplete: RefCell<AutocompleteEngine>,
    preview: RefCell<PreviewPlayer<WebAudioHandle>>,
    resolver: ApiClient<FetchTransport>,
    session: ChromeSession,
    audio: WebAudio,
    tag_elements: RefCell<HashMap<TagId, Element>>,
    fields: RefCell<FieldTable>,
    panel: RefCell<Option<SuggestionPanel>>,
    /// Re-rendering under a resting pointer must not restart the preview.
    row_hover: RefCell<RowHover>,
    observer: RefCell<Option<MutationObserver>>,
}

impl Shared {
    fn active_field(&self) -> Option<Element> {
        let id = self.autocomplete.borrow().active_element()?;
        self.fields.borrow().element(id).cloned()
    }

    fn render_tag(&self, id: TagId) {
        let scanner = self.scanner.borrow();
        if let (Some(tag), Some(element)) = (scanner.tag(id), self.tag_elements.borrow().get(&id)) {
            render_tag(element, tag);
        }
    }

    fn render_panel(&self) {
        let anchor = self.active_field();
        let engine = self.autocomplete.borrow();
        if !engine.list().is_open() {
            self.leave_row();
        }
        self.row_hover.borrow_mut().rows_rendered(engine.list());
        if let Some(panel) = self.panel.borrow().as_ref() {
            if let Err(e) = panel.render(engine.list(), anchor.as_ref()) {
                log::warn!("suggestion panel: {}", e);
            }
        }
    }

    fn leave_row(&self) {
        self.row_hover.borrow_mut().leave();
        self.preview.borrow_mut().stop();
    }

    fn commit(&self, item: &SuggestionItem) {
        self.preview.borrow_mut().stop();
        let field = self.active_field();
        if let Some(html) = field.as_ref().and_then(|el| el.dyn_ref::<HtmlElement>()) {
            if self.document.active_element().as_ref() != field.as_ref() {
                html.focus().ok();
            }
        }
        let surface = field.and_then(|el| WebSurface::from_element(&el));
        match surface {
            Some(mut surface) => {
                // The edit fires `input` synchronously; that listener backs off
                // while this borrow is held.
                let result = self.autocomplete.borrow_mut().commit(&mut surface, item);
                match result {
                    Ok(report) => log::debug!("inserted {:?} ({:?})", report.inserted, report.mode),
                    Err(e) => log::warn!("commit failed: {}", e),
                }
            }
            None => self.autocomplete.borrow_mut().dismiss(),
        }
        self.render_panel();
    }

    fn hover_finished(&self, token: SlotToken, error: Option<String>) {
        let id = {
            let mut scanner = self.scanner.borrow_mut();
            let id = scanner.playing_tag();
            match &error {
                None => scanner.playback_ended(token),
                Some(message) => scanner.playback_failed(token, message),
            }
            id
        };
        if let Some(id) = id {
            self.render_tag(id);
        }
    }
}

// ============================================================================
// Scanning
// ============================================================================

async fn scan_document(shared: &Rc<Shared>) -> Result<ScanReport<Node>, AmpersoundError> {
    let body: Node = shared
        .document
        .body()
        .ok_or_else(|| AmpersoundError::Dom("no body".into()))?
        .into();
    let mut dom = WebDom::new(shared.document.clone());
    let report = refresh_and_scan(&shared.scanner, &shared.session, &mut dom, &body).await?;

    // Our own rewrite is not a page change.
    if let Some(observer) = shared.observer.borrow().as_ref() {
        observer.take_records();
    }

    let live: HashSet<TagId> = {
        let mut elements = shared.tag_elements.borrow_mut();
        for (id, node) in &report.tags {
            if let Ok(element) = node.clone().dyn_into::<Element>() {
                elements.insert(*id, element);
            }
        }
        elements.retain(|_, el| el.is_connected());
        elements.keys().copied().collect()
    };
    let pruned = shared.scanner.borrow_mut().prune_tags(|id| live.contains(&id));
    if pruned > 0 {
        log::debug!("forgot {} detached tags", pruned);
    }
    Ok(report)
}

fn arm_rescan(shared: &Rc<Shared>, deadline: u64) {
    let weak = Rc::downgrade(shared);
    arm(deadline, move |at| {
        let Some(shared) = weak.upgrade() else { return };
        if !shared.scanner.borrow_mut().rescan_due(at) {
            return;
        }
        spawn_local(async move {
            if let Err(e) = scan_document(&shared).await {
                log::error!("rescan failed: {}", e);
            }
        });
    });
}

fn added_node(node: &Node) -> AddedNode {
    let inside_tag = inside_own_markup(node);
    let text = node.text_content().unwrap_or_default();
    match node.node_type() {
        Node::ELEMENT_NODE => AddedNode::Element { inside_tag, text },
        Node::TEXT_NODE => AddedNode::Text { inside_tag, text },
        _ => AddedNode::Other,
    }
}

fn mutation_event(record: &MutationRecord) -> MutationEvent {
    if record.type_() == "characterData" {
        let target = record.target();
        return MutationEvent::CharacterData {
            inside_tag: target.as_ref().map_or(false, inside_own_markup),
            text: target.and_then(|t| t.text_content()),
        };
    }
    let nodes = record.added_nodes();
    MutationEvent::ChildList {
        added: (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .map(|n| added_node(&n))
            .collect(),
    }
}

fn install_observer(shared: &Rc<Shared>) -> Result<(), AmpersoundError> {
    let weak = Rc::downgrade(shared);
    let callback = Closure::wrap(Box::new(move |records: js_sys::Array, _observer: MutationObserver| {
        let Some(shared) = weak.upgrade() else { return };
        let events: Vec<MutationEvent> = records
            .iter()
            .filter_map(|r| r.dyn_into::<MutationRecord>().ok())
            .map(|r| mutation_event(&r))
            .collect();
        let deadline = shared.scanner.borrow_mut().observe(&events, now());
        if let Some(deadline) = deadline {
            arm_rescan(&shared, deadline);
        }
    }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(dom_error)?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    init.set_character_data(true);
    let body = shared
        .document
        .body()
        .ok_or_else(|| AmpersoundError::Dom("no body".into()))?;
    observer.observe_with_options(&body, &init).map_err(dom_error)?;
    callback.forget();
    *shared.observer.borrow_mut() = Some(observer);
    Ok(())
}

// ============================================================================
// Tag hover
// ============================================================================

/// Tag element an over/out event is about, ignoring moves inside the tag.
fn crossed_tag(event: &Event) -> Option<(Element, TagId)> {
    let tag = enclosing_tag(&event_node(event)?)?;
    let related = event
        .dyn_ref::<MouseEvent>()
        .and_then(|e| e.related_target())
        .and_then(|t| t.dyn_into::<Node>().ok());
    if related.map_or(false, |r| tag.contains(Some(&r))) {
        return None;
    }
    let id = tag_id_of(&tag)?;
    Some((tag, id))
}

fn watch_hover_audio(shared: &Rc<Shared>, token: SlotToken) {
    let on_end = Rc::downgrade(shared);
    let on_error = on_end.clone();
    let mut scanner = shared.scanner.borrow_mut();
    let Some(handle) = scanner.playing_handle_mut() else { return };
    // Deferred: releasing the slot drops these very listeners.
    handle.watch(
        move || {
            let weak = on_end.clone();
            spawn_local(async move {
                if let Some(shared) = weak.upgrade() {
                    shared.hover_finished(token, None);
                }
            });
        },
        move |message| {
            let weak = on_error.clone();
            spawn_local(async move {
                if let Some(shared) = weak.upgrade() {
                    shared.hover_finished(token, Some(message));
                }
            });
        },
    );
}

fn install_hover(shared: &Rc<Shared>) -> Result<(), AmpersoundError> {
    let target: &EventTarget = shared.document.as_ref();

    let over = Rc::clone(shared);
    listen(target, "mouseover", false, move |event| {
        let Some((element, id)) = crossed_tag(&event) else { return };
        let shared = Rc::clone(&over);
        spawn_local(async move {
            let outcome = run_hover(
                &shared.scanner,
                &shared.session,
                &shared.resolver,
                &shared.audio,
                id,
                |tag| render_tag(&element, tag),
            )
            .await;
            if let Some(HoverOutcome::Playing(token)) = outcome {
                watch_hover_audio(&shared, token);
            }
        });
    })?;

    let out = Rc::clone(shared);
    listen(target, "mouseout", false, move |event| {
        let Some((_, id)) = crossed_tag(&event) else { return };
        out.scanner.borrow_mut().pointer_leave(id);
        out.render_tag(id);
    })
}

// ============================================================================
// Autocomplete
// ============================================================================

fn arm_autocomplete(shared: &Rc<Shared>, deadline: u64) {
    let weak = Rc::downgrade(shared);
    arm(deadline, move |at| {
        let Some(shared) = weak.upgrade() else { return };
        let tick = shared.autocomplete.borrow_mut().tick(at);
        if tick.closed {
            shared.render_panel();
        }
        for request in tick.requests {
            let shared = Rc::clone(&shared);
            spawn_local(async move {
                run_suggestion_request(&shared.autocomplete, &shared.resolver, request).await;
                shared.render_panel();
            });
        }
    });
}

fn preview_row(shared: &Rc<Shared>, index: usize) {
    if !shared.row_hover.borrow_mut().enter(index) {
        return;
    }
    let Some(item) = shared.autocomplete.borrow_mut().hover_item(index) else { return };
    shared.render_panel();

    let request = shared.preview.borrow_mut().start(&item);
    let shared = Rc::clone(shared);
    spawn_local(async move {
        let token = run_preview(&shared.preview, &shared.resolver, &shared.audio, request).await;
        let Some(token) = token else { return };
        let weak = Rc::downgrade(&shared);
        let mut preview = shared.preview.borrow_mut();
        if let Some(handle) = preview.handle_mut() {
            let on_error = weak.clone();
            handle.watch(
                move || {
                    let weak = weak.clone();
                    spawn_local(async move {
                        if let Some(shared) = weak.upgrade() {
                            shared.preview.borrow_mut().ended(token);
                        }
                    });
                },
                move |message| {
                    log::warn!("preview playback failed: {}", message);
                    let weak = on_error.clone();
                    spawn_local(async move {
                        if let Some(shared) = weak.upgrade() {
                            shared.preview.borrow_mut().ended(token);
                        }
                    });
                },
            );
        }
    });
}

fn install_autocomplete(shared: &Rc<Shared>) -> Result<(), AmpersoundError> {
    let document: &EventTarget = shared.document.as_ref();

    let focus = Rc::clone(shared);
    listen(document, "focusin", false, move |event| {
        let Some(element) = event_element(&event) else { return };
        if WebSurface::from_element(&element).is_none() {
            return;
        }
        let id = focus.fields.borrow_mut().id_for(&element);
        focus.autocomplete.borrow_mut().focus(id);
        focus.render_panel();
    })?;

    let input = Rc::clone(shared);
    listen(document, "input", false, move |event| {
        let Some(element) = event_element(&event) else { return };
        let Some(surface) = WebSurface::from_element(&element) else { return };
        let Some(ctx) = surface.caret_context() else { return };
        let id = input.fields.borrow_mut().id_for(&element);
        // Busy means this is the echo of our own commit.
        let Ok(mut engine) = input.autocomplete.try_borrow_mut() else { return };
        let deadline = engine.input(id, &ctx, now());
        drop(engine);
        input.render_panel();
        if let Some(deadline) = deadline {
            arm_autocomplete(&input, deadline);
        }
    })?;

    let keys = Rc::clone(shared);
    listen(document, "keydown", true, move |event| {
        let Some(key_event) = event.dyn_ref::<KeyboardEvent>() else { return };
        let Some(active) = keys.active_field() else { return };
        if event_element(&event).as_ref() != Some(&active) {
            return;
        }
        let outcome = keys.autocomplete.borrow_mut().key(NavKey::from_key(&key_event.key()));
        match outcome {
            KeyOutcome::Ignored => return,
            KeyOutcome::Consumed => {}
            KeyOutcome::Select(item) => {
                event.prevent_default();
                event.stop_propagation();
                keys.commit(&item);
                return;
            }
            KeyOutcome::Dismissed { consume } => {
                if !consume {
                    keys.render_panel();
                    return;
                }
            }
        }
        event.prevent_default();
        event.stop_propagation();
        keys.render_panel();
    })?;

    let blur = Rc::clone(shared);
    listen(document, "focusout", false, move |event| {
        let Some(element) = event_element(&event) else { return };
        let Some(id) = blur.fields.borrow().find(&element) else { return };
        let deadline = blur.autocomplete.borrow_mut().blur(id, now());
        if let Some(deadline) = deadline {
            arm_autocomplete(&blur, deadline);
        }
    })?;

    let click = Rc::clone(shared);
    listen(document, "mousedown", true, move |event| {
        let Some(node) = event_node(&event) else { return };
        let row = {
            let panel = click.panel.borrow();
            match panel.as_ref() {
                Some(panel) if panel.contains(&node) => Some(panel.row_index(&node)),
                _ => None,
            }
        };
        if let Some(row) = row {
            // Keep focus in the field.
            event.prevent_default();
            let item = row.and_then(|index| click.autocomplete.borrow_mut().select_index(index));
            if let Some(item) = item {
                click.commit(&item);
            }
            return;
        }
        let on_active = click
            .active_field()
            .map_or(false, |el| el.contains(Some(&node)));
        if click.autocomplete.borrow_mut().outside_click(false, on_active) {
            click.render_panel();
        }
    })?;

    let panel_target: Option<EventTarget> = shared
        .panel
        .borrow()
        .as_ref()
        .map(|p| p.element().clone().into());
    if let Some(panel_target) = panel_target {
        let over = Rc::clone(shared);
        listen(&panel_target, "mouseover", false, move |event| {
            let Some(node) = event_node(&event) else { return };
            let index = over.panel.borrow().as_ref().and_then(|p| p.row_index(&node));
            match index {
                Some(index) => preview_row(&over, index),
                // panel padding between rows
                None => over.leave_row(),
            }
        })?;

        let leave = Rc::clone(shared);
        listen(&panel_target, "mouseleave", false, move |_| leave.leave_row())?;
    }
    Ok(())
}

// ============================================================================
// WASM Bindings
// ============================================================================

/// Content-script entry point.
///
/// ```javascript,ignore
/// import init, { ContentScript } from './ampersound.js';
/// await init();
/// new ContentScript({ api_base_url: 'https://socialnetwork.social' }).start();
/// ```
#[wasm_bindgen]
pub struct ContentScript {
    shared: Rc<Shared>,
    started: bool,
}

#[wasm_bindgen]
impl ContentScript {
    /// Config is optional; missing fields take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn js_new(config: JsValue) -> Result<ContentScript, JsValue> {
        let config: AmpersoundConfig = if config.is_undefined() || config.is_null() {
            AmpersoundConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Failed to parse config: {}", e)))?
        };
        logging::init(config.log_level_filter());

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let resolver = ApiClient::new(FetchTransport, &config.api_base_url, config.max_suggestions).map_err(to_js)?;

        let shared = Shared {
            scanner: RefCell::new(ScannerEngine::new(&config)),
            autocomplete: RefCell::new(AutocompleteEngine::new(&config)),
            preview: RefCell::new(PreviewPlayer::new()),
            resolver,
            session: ChromeSession,
            audio: WebAudio,
            tag_elements: RefCell::new(HashMap::new()),
            fields: RefCell::new(FieldTable::default()),
            panel: RefCell::new(None),
            row_hover: RefCell::new(RowHover::default()),
            observer: RefCell::new(None),
            document,
            config,
        };
        Ok(ContentScript {
            shared: Rc::new(shared),
            started: false,
        })
    }

    /// Initial scan, mutation observer, hover listeners and (unless the site
    /// is excluded) autocomplete. Idempotent.
    #[wasm_bindgen(js_name = "start")]
    pub fn js_start(&mut self) -> Result<(), JsValue> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        let shared = &self.shared;

        install_hover(shared).map_err(to_js)?;

        let host = shared.document.location().and_then(|l| l.hostname().ok()).unwrap_or_default();
        let policy = SitePolicy::from_config(&shared.config);
        if shared.config.enable_autocomplete && policy.allows(&host) {
            let panel = SuggestionPanel::new(&shared.document).map_err(to_js)?;
            *shared.panel.borrow_mut() = Some(panel);
            install_autocomplete(shared).map_err(to_js)?;
        } else {
            log::info!("autocomplete disabled on {}", host);
        }

        let shared = Rc::clone(shared);
        spawn_local(async move {
            match scan_document(&shared).await {
                Ok(report) => log::info!(
                    "initial scan: {} tags in {}us",
                    report.tags_created,
                    report.elapsed_us
                ),
                Err(e) => log::error!("initial scan failed: {}", e),
            }
            if let Err(e) = install_observer(&shared) {
                log::error!("mutation observer not installed: {}", e);
            }
        });
        Ok(())
    }

    /// Refresh the session and rescan now. Resolves to the scan report.
    #[wasm_bindgen(js_name = "scanNow")]
    pub fn js_scan_now(&self) -> js_sys::Promise {
        let shared = Rc::clone(&self.shared);
        wasm_bindgen_futures::future_to_promise(async move {
            let report = scan_document(&shared).await.map_err(to_js)?;
            serde_wasm_bindgen::to_value(&report).map_err(|e| JsValue::from_str(&e.to_string()))
        })
    }

    #[wasm_bindgen(js_name = "autocompleteState")]
    pub fn js_autocomplete_state(&self) -> String {
        self.shared.autocomplete.borrow().state().as_str().to_string()
    }

    #[wasm_bindgen(js_name = "tagCount")]
    pub fn js_tag_count(&self) -> usize {
        self.shared.scanner.borrow().tag_count()
    }
}

/// Token spans of `text` (byte offsets into its UTF-8 encoding).
#[wasm_bindgen(js_name = "tokenize")]
pub fn js_tokenize(text: &str) -> JsValue {
    serde_wasm_bindgen::to_value(&tokenize(text)).unwrap_or(JsValue::NULL)
}
