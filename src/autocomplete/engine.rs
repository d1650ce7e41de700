//! AutocompleteEngine: the per-focus token state machine
//!
//! # States
//! `Inactive -> QueryPending -> SuggestionsShown -> (selected | dismissed) -> Inactive`
//!
//! The engine never touches the DOM and never arms timers. Hosts feed it
//! events (`focus`, `input`, `key`, `blur`, ...) with the current clock, arm a
//! timer for each deadline it hands back, call [`AutocompleteEngine::tick`]
//! when that timer fires, run the [`SuggestionRequest`]s it emits, and hand the
//! replies back through [`AutocompleteEngine::suggestions_arrived`]. Replies
//! are matched against the single in-flight request id and the active
//! element; anything else is stale and dropped.

use std::cell::RefCell;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::api::SoundResolver;
use crate::autocomplete::caret::{CaretContext, CaretSurface, SpliceMode};
use crate::autocomplete::list::{SuggestionItem, SuggestionList};
use crate::autocomplete::query::{PartialToken, PartialTokenMatcher};
use crate::config::AmpersoundConfig;
use crate::debounce::{Debouncer, Millis};
use crate::error::{AmpersoundError, CommitError};

/// Host-assigned identity of an editable element.
pub type ElementId = u32;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutocompleteState {
    Inactive,
    QueryPending,
    SuggestionsShown,
}

impl AutocompleteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutocompleteState::Inactive => "inactive",
            AutocompleteState::QueryPending => "query_pending",
            AutocompleteState::SuggestionsShown => "suggestions_shown",
        }
    }
}

/// A debounced query that is now due and must be sent to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub request_id: u64,
    pub element: ElementId,
    /// Raw partial token, leading `&` included.
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Timer {
    Suggest,
    BlurGrace,
}

#[derive(Debug, Clone)]
enum TimerTask {
    Fetch { element: ElementId, query: String },
    Close { element: ElementId },
}

/// Keys the open list reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Down,
    Up,
    Enter,
    Escape,
    Tab,
    Other,
}

impl NavKey {
    /// From `KeyboardEvent.key`.
    pub fn from_key(key: &str) -> Self {
        match key {
            "ArrowDown" | "Down" => NavKey::Down,
            "ArrowUp" | "Up" => NavKey::Up,
            "Enter" => NavKey::Enter,
            "Escape" | "Esc" => NavKey::Escape,
            "Tab" => NavKey::Tab,
            _ => NavKey::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not for us; the page gets the key.
    Ignored,
    /// Handled; swallow the key.
    Consumed,
    /// Enter on a highlighted entry; commit it and swallow the key.
    Select(SuggestionItem),
    /// The list closed. `consume` is false for Tab so focus still moves.
    Dismissed { consume: bool },
}

/// What a timer firing produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tick {
    pub requests: Vec<SuggestionRequest>,
    /// The blur grace period ran out and the list was closed.
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub mode: SpliceMode,
    /// Tag text plus the trailing space.
    pub inserted: String,
}

// =============================================================================
// AutocompleteEngine
// =============================================================================

pub struct AutocompleteEngine {
    matcher: PartialTokenMatcher,
    suggest_debounce_ms: Millis,
    blur_grace_ms: Millis,
    max_suggestions: usize,

    state: AutocompleteState,
    active: Option<ElementId>,
    anchor: Option<PartialToken>,
    timers: Debouncer<Timer, TimerTask>,
    list: SuggestionList,
    next_request_id: u64,
    in_flight: Option<SuggestionRequest>,
}

impl Default for AutocompleteEngine {
    fn default() -> Self {
        Self::new(&AmpersoundConfig::default())
    }
}

impl AutocompleteEngine {
    pub fn new(config: &AmpersoundConfig) -> Self {
        Self {
            matcher: PartialTokenMatcher::new(config.min_query_len, config.max_query_len),
            suggest_debounce_ms: config.suggest_debounce_ms,
            blur_grace_ms: config.blur_grace_ms,
            max_suggestions: config.max_suggestions,
            state: AutocompleteState::Inactive,
            active: None,
            anchor: None,
            timers: Debouncer::new(),
            list: SuggestionList::new(),
            next_request_id: 1,
            in_flight: None,
        }
    }

    pub fn state(&self) -> AutocompleteState {
        self.state
    }

    pub fn active_element(&self) -> Option<ElementId> {
        self.active
    }

    pub fn list(&self) -> &SuggestionList {
        &self.list
    }

    pub fn anchor(&self) -> Option<&PartialToken> {
        self.anchor.as_ref()
    }

    pub fn in_flight(&self) -> Option<&SuggestionRequest> {
        self.in_flight.as_ref()
    }

    fn is_showing(&self) -> bool {
        self.state == AutocompleteState::SuggestionsShown && self.list.is_open()
    }

    // -------------------------------------------------------------------------
    // Focus
    // -------------------------------------------------------------------------

    /// A recognized editable element gained focus.
    pub fn focus(&mut self, element: ElementId) {
        if self.active == Some(element) {
            self.timers.cancel(&Timer::BlurGrace);
            return;
        }
        self.reset();
        self.active = Some(element);
    }

    /// The active element lost focus; close after the grace period so a
    /// click on a suggestion lands first.
    pub fn blur(&mut self, element: ElementId, now: Millis) -> Option<Millis> {
        if self.active != Some(element) {
            return None;
        }
        Some(self.timers.schedule(Timer::BlurGrace, TimerTask::Close { element }, self.blur_grace_ms, now))
    }

    /// Pointer-down somewhere on the page. Closes the list unless the click hit
    /// the panel or the originating element.
    pub fn outside_click(&mut self, on_panel: bool, on_active_element: bool) -> bool {
        if !self.list.is_open() || on_panel || on_active_element {
            return false;
        }
        self.dismiss();
        true
    }

    // -------------------------------------------------------------------------
    // Typing
    // -------------------------------------------------------------------------

    /// Content of `element` changed. Returns the suggestion deadline when a
    /// query was (re)scheduled.
    pub fn input(&mut self, element: ElementId, ctx: &CaretContext, now: Millis) -> Option<Millis> {
        if self.active != Some(element) {
            self.reset();
            self.active = Some(element);
        }
        self.timers.cancel(&Timer::BlurGrace);
        // anything already sent is superseded by this keystroke
        self.in_flight = None;

        let Some(token) = self.matcher.find(&ctx.text_before) else {
            self.dismiss();
            return None;
        };

        let task = TimerTask::Fetch {
            element,
            query: token.raw.clone(),
        };
        self.anchor = Some(token);
        // items from the previous query no longer match the token
        self.list.close();
        self.state = AutocompleteState::QueryPending;
        Some(self.timers.schedule(Timer::Suggest, task, self.suggest_debounce_ms, now))
    }

    /// Fire everything due at `now`.
    pub fn tick(&mut self, now: Millis) -> Tick {
        let mut tick = Tick::default();
        for (_, task) in self.timers.take_due(now) {
            match task {
                TimerTask::Fetch { element, query } if self.active == Some(element) => {
                    let request = SuggestionRequest {
                        request_id: self.next_request_id,
                        element,
                        query,
                    };
                    self.next_request_id += 1;
                    log::debug!("suggestion request #{} for {:?}", request.request_id, request.query);
                    self.in_flight = Some(request.clone());
                    tick.requests.push(request);
                }
                TimerTask::Close { element } if self.active == Some(element) => {
                    self.reset();
                    tick.closed = true;
                }
                _ => {}
            }
        }
        tick
    }

    /// Resolver reply for `request_id`. Returns true when the list opened.
    pub fn suggestions_arrived(
        &mut self,
        request_id: u64,
        element: ElementId,
        result: Result<Vec<SuggestionItem>, AmpersoundError>,
    ) -> bool {
        let current = matches!(
            &self.in_flight,
            Some(r) if r.request_id == request_id && r.element == element
        ) && self.active == Some(element);
        if !current {
            log::debug!("dropping stale suggestions for request #{}", request_id);
            return false;
        }
        self.in_flight = None;

        match result {
            Ok(items) => {
                if self.list.show(items, self.max_suggestions) {
                    self.state = AutocompleteState::SuggestionsShown;
                    true
                } else {
                    self.dismiss();
                    false
                }
            }
            Err(e) => {
                log::warn!("suggestion search failed: {}", e);
                self.dismiss();
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // List interaction
    // -------------------------------------------------------------------------

    /// Pointer entered row `index`: highlight it and hand back the item to preview.
    pub fn hover_item(&mut self, index: usize) -> Option<SuggestionItem> {
        if !self.is_showing() {
            return None;
        }
        self.list.get(index)?;
        self.list.highlight(index).cloned()
    }

    /// Row `index` was clicked.
    pub fn select_index(&mut self, index: usize) -> Option<SuggestionItem> {
        if !self.is_showing() {
            return None;
        }
        self.list.get(index).cloned()
    }

    pub fn key(&mut self, key: NavKey) -> KeyOutcome {
        if !self.is_showing() {
            return KeyOutcome::Ignored;
        }
        match key {
            NavKey::Down => {
                self.list.highlight_next();
                KeyOutcome::Consumed
            }
            NavKey::Up => {
                self.list.highlight_prev();
                KeyOutcome::Consumed
            }
            NavKey::Enter => match self.list.highlighted_item() {
                Some(item) => KeyOutcome::Select(item.clone()),
                None => KeyOutcome::Consumed,
            },
            NavKey::Escape => {
                self.dismiss();
                KeyOutcome::Dismissed { consume: true }
            }
            NavKey::Tab => {
                self.dismiss();
                KeyOutcome::Dismissed { consume: false }
            }
            NavKey::Other => KeyOutcome::Ignored,
        }
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    /// Replace the anchored partial token with `item.tag` plus a space.
    ///
    /// The span is the one recorded at the last input event: `anchor.start`
    /// within the caret's text unit, `anchor.raw.len()` long. It is used only
    /// if the text before the caret still holds the raw token there; the text
    /// is never searched for it. The list closes whether or not the edit lands.
    pub fn commit<S: CaretSurface>(
        &mut self,
        surface: &mut S,
        item: &SuggestionItem,
    ) -> Result<CommitReport, CommitError> {
        let result = self.apply_commit(surface, item);
        self.dismiss();
        if let Err(e) = &result {
            log::warn!("commit of {} refused: {}", item.tag, e);
        }
        result
    }

    fn apply_commit<S: CaretSurface>(
        &self,
        surface: &mut S,
        item: &SuggestionItem,
    ) -> Result<CommitReport, CommitError> {
        let anchor = self.anchor.as_ref().ok_or(CommitError::NoActiveToken)?;
        let ctx = surface.caret_context().ok_or(CommitError::NoCaret)?;
        let range = anchored_span(&ctx, anchor)?;
        let inserted = format!("{} ", item.tag);
        let mode = surface.replace_span(range, &inserted)?;
        Ok(CommitReport { mode, inserted })
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Close the list and forget the token; the element stays active.
    pub fn dismiss(&mut self) {
        self.list.close();
        self.timers.cancel(&Timer::Suggest);
        self.anchor = None;
        self.in_flight = None;
        self.state = AutocompleteState::Inactive;
    }

    /// Back to a blank slate with no active element.
    pub fn reset(&mut self) {
        self.dismiss();
        self.timers.clear();
        self.active = None;
    }
}

fn anchored_span(ctx: &CaretContext, anchor: &PartialToken) -> Result<Range<usize>, CommitError> {
    let span = anchor.start..anchor.end();
    if ctx.text_before.get(span.clone()) == Some(anchor.raw.as_str()) {
        Ok(span)
    } else {
        Err(CommitError::TokenMoved {
            raw: anchor.raw.clone(),
            start: anchor.start,
        })
    }
}

// =============================================================================
// Async drivers
// =============================================================================

/// Run one due request against `resolver` and feed the reply back. No borrow
/// of the engine is held across the await.
pub async fn run_suggestion_request<R: SoundResolver>(
    engine: &RefCell<AutocompleteEngine>,
    resolver: &R,
    request: SuggestionRequest,
) -> bool {
    let result = resolver.search_sounds(&request.query).await;
    engine
        .borrow_mut()
        .suggestions_arrived(request.request_id, request.element, result)
}
