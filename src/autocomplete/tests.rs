//! Autocomplete scenarios: typing, debouncing, stale replies, keyboard and commit.

use std::cell::RefCell;
use std::collections::HashMap;

use futures::executor::block_on;

use crate::api::SoundResolver;
use crate::autocomplete::*;
use crate::error::{AmpersoundError, CommitError};

fn item(tag: &str) -> SuggestionItem {
    let (user, sound) = tag.trim_start_matches('&').split_once('.').unwrap();
    SuggestionItem {
        tag: tag.to_string(),
        username: user.to_string(),
        soundname: sound.to_string(),
        display_text: format!("{} by {}", sound, user),
    }
}

fn items(tags: &[&str]) -> Vec<SuggestionItem> {
    tags.iter().map(|t| item(t)).collect()
}

/// Type `text` into `element` with the caret at the end.
fn type_text(engine: &mut AutocompleteEngine, element: ElementId, text: &str, now: u64) -> Option<u64> {
    engine.input(element, &PlainField::typed(text).caret_context().unwrap(), now)
}

/// Drive a field to SuggestionsShown with `suggestions`.
fn open_with(engine: &mut AutocompleteEngine, text: &str, suggestions: &[&str]) {
    engine.focus(1);
    let deadline = type_text(engine, 1, text, 0).unwrap();
    let request = engine.tick(deadline).requests.pop().unwrap();
    assert!(engine.suggestions_arrived(request.request_id, 1, Ok(items(suggestions))));
}

// ============================================================================
// Debounce
// ============================================================================

#[test]
fn test_burst_of_keystrokes_yields_one_query_for_final_value() {
    let mut engine = AutocompleteEngine::default();
    engine.focus(1);

    let mut deadlines = vec![];
    for (t, text) in [(0, "&al"), (60, "&ali"), (120, "&alic"), (180, "&alice")] {
        deadlines.push(type_text(&mut engine, 1, text, t).unwrap());
    }

    // timers armed for the earlier keystrokes find nothing due
    for stale in &deadlines[..3] {
        assert!(engine.tick(*stale).requests.is_empty());
    }
    let tick = engine.tick(deadlines[3]);
    assert_eq!(tick.requests.len(), 1);
    assert_eq!(tick.requests[0].query, "&alice");
    assert_eq!(deadlines[3], 480);

    assert!(engine.tick(10_000).requests.is_empty());
}

#[test]
fn test_token_removed_before_debounce_cancels_query() {
    let mut engine = AutocompleteEngine::default();
    engine.focus(1);
    let deadline = type_text(&mut engine, 1, "&al", 0).unwrap();
    assert_eq!(type_text(&mut engine, 1, "&al ", 100), None);

    assert_eq!(engine.state(), AutocompleteState::Inactive);
    assert!(engine.tick(deadline).requests.is_empty());
}

#[test]
fn test_request_ids_increase() {
    let mut engine = AutocompleteEngine::default();
    engine.focus(1);
    let d1 = type_text(&mut engine, 1, "&al", 0).unwrap();
    let r1 = engine.tick(d1).requests.pop().unwrap();
    let d2 = type_text(&mut engine, 1, "&ali", 500).unwrap();
    let r2 = engine.tick(d2).requests.pop().unwrap();
    assert!(r2.request_id > r1.request_id);
}

// ============================================================================
// Stale replies
// ============================================================================

#[test]
fn test_reply_for_previous_element_does_not_open_list() {
    let mut engine = AutocompleteEngine::default();

    engine.focus(1);
    let d = type_text(&mut engine, 1, "&al", 0).unwrap();
    let request_a = engine.tick(d).requests.pop().unwrap();

    engine.focus(2);
    let d = type_text(&mut engine, 2, "&bo", 400).unwrap();
    let request_b = engine.tick(d).requests.pop().unwrap();

    assert!(!engine.suggestions_arrived(request_a.request_id, 1, Ok(items(&["&alice.boop"]))));
    assert!(!engine.list().is_open());
    assert_eq!(engine.state(), AutocompleteState::QueryPending);

    assert!(engine.suggestions_arrived(request_b.request_id, 2, Ok(items(&["&bob.honk"]))));
    assert_eq!(engine.list().items()[0].tag, "&bob.honk");
}

#[test]
fn test_reply_superseded_by_newer_keystroke_is_dropped() {
    let mut engine = AutocompleteEngine::default();
    engine.focus(1);
    let d = type_text(&mut engine, 1, "&al", 0).unwrap();
    let request = engine.tick(d).requests.pop().unwrap();

    // more typing while the first request is in flight
    type_text(&mut engine, 1, "&ali", 350);
    assert!(engine.in_flight().is_none());
    assert!(!engine.suggestions_arrived(request.request_id, 1, Ok(items(&["&alice.boop"]))));
    assert!(!engine.list().is_open());
}

#[test]
fn test_new_keystroke_discards_shown_items() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "hey &al", &["&alice.boop"]);
    assert_eq!(engine.state(), AutocompleteState::SuggestionsShown);

    let deadline = type_text(&mut engine, 1, "hey &zz", 1_000).unwrap();
    assert_eq!(engine.state(), AutocompleteState::QueryPending);
    assert!(!engine.list().is_open());
    assert!(engine.list().is_empty());

    // nothing from the `&al` results can be picked while `&zz` is in flight
    let request = engine.tick(deadline).requests.pop().unwrap();
    assert_eq!(request.query, "&zz");
    assert_eq!(engine.key(NavKey::Enter), KeyOutcome::Ignored);
    assert_eq!(engine.key(NavKey::Down), KeyOutcome::Ignored);
    assert_eq!(engine.select_index(0), None);
    assert_eq!(engine.hover_item(0), None);

    let mut field = PlainField::typed("hey &zz");
    assert!(engine.suggestions_arrived(request.request_id, 1, Ok(items(&["&zz.top"]))));
    match engine.key(NavKey::Enter) {
        KeyOutcome::Select(item) => {
            engine.commit(&mut field, &item).unwrap();
        }
        other => panic!("expected selection, got {:?}", other),
    }
    assert_eq!(field.value(), "hey &zz.top ");
}

#[test]
fn test_empty_or_failed_reply_closes() {
    let mut engine = AutocompleteEngine::default();
    engine.focus(1);
    let d = type_text(&mut engine, 1, "&zz", 0).unwrap();
    let request = engine.tick(d).requests.pop().unwrap();
    assert!(!engine.suggestions_arrived(request.request_id, 1, Ok(vec![])));
    assert_eq!(engine.state(), AutocompleteState::Inactive);

    let d = type_text(&mut engine, 1, "&zzz", 1_000).unwrap();
    let request = engine.tick(d).requests.pop().unwrap();
    let failed = Err(AmpersoundError::collaborator(500, "boom"));
    assert!(!engine.suggestions_arrived(request.request_id, 1, failed));
    assert_eq!(engine.state(), AutocompleteState::Inactive);
}

// ============================================================================
// List interaction
// ============================================================================

#[test]
fn test_shown_list_highlights_first_entry() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "&al", &["&alice.boop", "&alice.honk"]);
    assert_eq!(engine.state(), AutocompleteState::SuggestionsShown);
    assert_eq!(engine.list().highlighted(), Some(0));
}

#[test]
fn test_keyboard_cycles_and_selects() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "&al", &["&alice.boop", "&alice.honk", "&alan.beep"]);

    assert_eq!(engine.key(NavKey::Up), KeyOutcome::Consumed);
    assert_eq!(engine.list().highlighted(), Some(2));
    assert_eq!(engine.key(NavKey::Down), KeyOutcome::Consumed);
    assert_eq!(engine.list().highlighted(), Some(0));
    engine.key(NavKey::Down);

    assert_eq!(engine.key(NavKey::Enter), KeyOutcome::Select(item("&alice.honk")));
    assert_eq!(engine.key(NavKey::Other), KeyOutcome::Ignored);
}

#[test]
fn test_escape_and_tab_dismiss() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "&al", &["&alice.boop"]);
    assert_eq!(engine.key(NavKey::Escape), KeyOutcome::Dismissed { consume: true });
    assert!(!engine.list().is_open());
    assert_eq!(engine.key(NavKey::Enter), KeyOutcome::Ignored);

    open_with(&mut engine, "&al", &["&alice.boop"]);
    assert_eq!(engine.key(NavKey::Tab), KeyOutcome::Dismissed { consume: false });
    assert_eq!(engine.state(), AutocompleteState::Inactive);
}

#[test]
fn test_hover_item_moves_highlight() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "&al", &["&alice.boop", "&alice.honk"]);
    assert_eq!(engine.hover_item(1), Some(item("&alice.honk")));
    assert_eq!(engine.list().highlighted(), Some(1));
    assert_eq!(engine.hover_item(5), None);
    assert_eq!(engine.list().highlighted(), Some(1));
}

// ============================================================================
// Dismissal
// ============================================================================

#[test]
fn test_outside_click_closes_immediately() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "&al", &["&alice.boop"]);

    assert!(!engine.outside_click(true, false));
    assert!(!engine.outside_click(false, true));
    assert!(engine.list().is_open());

    assert!(engine.outside_click(false, false));
    assert!(!engine.list().is_open());
}

#[test]
fn test_blur_closes_after_grace_period() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "&al", &["&alice.boop"]);

    let deadline = engine.blur(1, 1_000).unwrap();
    assert_eq!(deadline, 1_150);
    assert!(!engine.tick(1_149).closed);
    assert!(engine.list().is_open());

    assert!(engine.tick(deadline).closed);
    assert!(!engine.list().is_open());
    assert_eq!(engine.active_element(), None);
}

#[test]
fn test_refocus_within_grace_keeps_list() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "&al", &["&alice.boop"]);

    let deadline = engine.blur(1, 1_000).unwrap();
    engine.focus(1);
    assert!(!engine.tick(deadline).closed);
    assert!(engine.list().is_open());
}

#[test]
fn test_click_on_row_during_grace_still_commits() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "hey &al", &["&alice.boop"]);
    engine.blur(1, 1_000);

    let chosen = engine.select_index(0).unwrap();
    let mut field = PlainField::typed("hey &al");
    engine.commit(&mut field, &chosen).unwrap();
    assert_eq!(field.value(), "hey &alice.boop ");
}

// ============================================================================
// Commit
// ============================================================================

#[test]
fn test_commit_into_plain_field() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "hey &al", &["&alice.boop"]);

    let chosen = match engine.key(NavKey::Enter) {
        KeyOutcome::Select(item) => item,
        other => panic!("expected selection, got {:?}", other),
    };
    let mut field = PlainField::typed("hey &al");
    let report = engine.commit(&mut field, &chosen).unwrap();

    assert_eq!(field.value(), "hey &alice.boop ");
    assert_eq!(field.caret(), "hey &alice.boop ".len());
    assert_eq!(report.mode, SpliceMode::Direct);
    assert_eq!(report.inserted, "&alice.boop ");
    assert_eq!(engine.state(), AutocompleteState::Inactive);
    assert!(!engine.list().is_open());
}

#[test]
fn test_commit_keeps_text_after_caret() {
    let mut engine = AutocompleteEngine::default();
    engine.focus(1);
    let field = PlainField::new("hey &al and more", 7);
    let d = engine.input(1, &field.caret_context().unwrap(), 0).unwrap();
    let request = engine.tick(d).requests.pop().unwrap();
    engine.suggestions_arrived(request.request_id, 1, Ok(items(&["&alice.boop"])));

    let mut field = field;
    engine.commit(&mut field, &item("&alice.boop")).unwrap();
    assert_eq!(field.value(), "hey &alice.boop  and more");
    assert_eq!(field.caret(), 16);
}

#[test]
fn test_commit_replaces_only_the_anchored_occurrence() {
    let mut engine = AutocompleteEngine::default();
    // an identical `&al` earlier in the buffer must stay untouched
    open_with(&mut engine, "&al says &al", &["&alice.boop"]);
    let mut field = PlainField::typed("&al says &al");
    engine.commit(&mut field, &item("&alice.boop")).unwrap();
    assert_eq!(field.value(), "&al says &alice.boop ");
}

#[test]
fn test_commit_refused_when_caret_moved_into_token() {
    let mut engine = AutocompleteEngine::default();
    open_with(&mut engine, "hey &al", &["&alice.boop"]);

    let mut field = PlainField::new("hey &al", 5);
    let result = engine.commit(&mut field, &item("&alice.boop"));
    assert_eq!(result, Err(CommitError::TokenMoved { raw: "&al".into(), start: 4 }));
    assert_eq!(field.value(), "hey &al");
    assert!(!engine.list().is_open());
}

#[test]
fn test_commit_into_rich_text_node() {
    let mut engine = AutocompleteEngine::default();
    let mut field = RichTextField::new(
        vec![Segment::Element("Re:".into()), Segment::Text("ok &bo".into())],
        RichCaret::InText { segment: 1, offset: 6 },
    );
    engine.focus(7);
    let d = engine.input(7, &field.caret_context().unwrap(), 0).unwrap();
    let request = engine.tick(d).requests.pop().unwrap();
    assert_eq!(request.query, "&bo");
    engine.suggestions_arrived(request.request_id, 7, Ok(items(&["&bob.boop"])));

    let report = engine.commit(&mut field, &item("&bob.boop")).unwrap();
    assert_eq!(report.mode, SpliceMode::Direct);
    assert_eq!(field.text(), "Re:ok &bob.boop ");
    assert_eq!(field.caret(), RichCaret::InText { segment: 1, offset: 13 });
}

#[test]
fn test_commit_on_element_boundary_uses_insert_fallback() {
    let mut engine = AutocompleteEngine::default();
    let mut field = RichTextField::new(
        vec![Segment::Text("&bo".into()), Segment::Element("<br>".into())],
        RichCaret::Boundary { index: 1 },
    );
    engine.focus(7);
    let d = engine.input(7, &field.caret_context().unwrap(), 0).unwrap();
    let request = engine.tick(d).requests.pop().unwrap();
    engine.suggestions_arrived(request.request_id, 7, Ok(items(&["&bob.boop"])));

    let report = engine.commit(&mut field, &item("&bob.boop")).unwrap();
    assert_eq!(report.mode, SpliceMode::InsertAtCaret);
    assert_eq!(field.text(), "&bob.boop <br>");
}

// ============================================================================
// Async driver
// ============================================================================

struct MapResolver {
    results: HashMap<String, Vec<SuggestionItem>>,
}

impl SoundResolver for MapResolver {
    async fn resolve_playback_url(&self, username: &str, soundname: &str) -> Result<String, AmpersoundError> {
        Ok(format!("https://cdn.test/{}/{}.mp3", username, soundname))
    }

    async fn search_sounds(&self, raw_query: &str) -> Result<Vec<SuggestionItem>, AmpersoundError> {
        self.results
            .get(raw_query)
            .cloned()
            .ok_or_else(|| AmpersoundError::collaborator(404, "no match"))
    }
}

#[test]
fn test_run_suggestion_request_opens_list() {
    let resolver = MapResolver {
        results: HashMap::from([("&al".to_string(), items(&["&alice.boop", "&alan.beep"]))]),
    };
    let engine = RefCell::new(AutocompleteEngine::default());
    engine.borrow_mut().focus(1);
    let deadline = type_text(&mut engine.borrow_mut(), 1, "&al", 0).unwrap();
    let request = engine.borrow_mut().tick(deadline).requests.pop().unwrap();

    assert!(block_on(run_suggestion_request(&engine, &resolver, request)));
    assert_eq!(engine.borrow().list().len(), 2);
}
