use digest_core::{
    update, Cursor, DeliveryOutcome, Effect, Engagement, IdOrdering, Msg, Record, RunPhase,
    RunState,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    digest_logging::initialize_for_tests();
}

fn record(source: &str, id: &str, created_at: Option<&str>) -> Record {
    Record {
        id: id.to_string(),
        source: source.to_string(),
        text: format!("{source} says {id}"),
        created_at: created_at.map(str::to_string),
        captured_at: "2024-05-01T12:00:00+00:00".to_string(),
        engagement: Engagement::new(),
    }
}

fn extracted(source: &str, cursor: Option<&str>, ids: &[&str]) -> Msg {
    Msg::SourceExtracted {
        source: source.to_string(),
        cursor: cursor.map(|id| Cursor::new(source, id)),
        records: ids.iter().map(|id| record(source, id, None)).collect(),
    }
}

fn delivered_ids(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Deliver { records } => Some(records.iter().map(|r| r.id.clone()).collect()),
            _ => None,
        })
        .expect("deliver effect")
}

fn advances(effects: &[Effect]) -> Vec<(String, String)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::AdvanceCursor {
                source,
                last_seen_id,
            } => Some((source.clone(), last_seen_id.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn cursor_scenario_delivers_only_newer_and_advances() {
    init_logging();
    let state = RunState::new(IdOrdering::Lexicographic);
    let (state, effects) = update(state, extracted("veatch", Some("100"), &["105", "100", "098"]));
    assert!(effects.is_empty());
    assert_eq!(state.fetched("veatch"), Some(3));

    let (state, effects) = update(state, Msg::CollectionFinished);
    assert_eq!(state.phase(), RunPhase::Delivering);
    assert_eq!(delivered_ids(&effects), vec!["105"]);

    let (state, effects) = update(state, Msg::DeliveryFinished(Ok(())));
    assert_eq!(
        advances(&effects),
        vec![("veatch".to_string(), "105".to_string())]
    );
    let outcome = state.outcome().expect("finished");
    assert_eq!(outcome.delivery, DeliveryOutcome::Delivered(1));
    assert!(outcome.is_clean());
}

#[test]
fn delivery_failure_keeps_cursor_and_rerun_filters_identically() {
    init_logging();
    let batch = ["105", "100", "098"];

    let (state, _) = update(RunState::default(), extracted("veatch", Some("100"), &batch));
    let (state, first) = update(state, Msg::CollectionFinished);
    let (state, effects) = update(state, Msg::DeliveryFinished(Err("smtp down".into())));
    assert!(effects.is_empty(), "no cursor advance on failure");
    assert_eq!(
        state.outcome().unwrap().delivery,
        DeliveryOutcome::DeliveryFailed("smtp down".into())
    );

    // Same cursor, same batch on the next run.
    let (state, _) = update(RunState::default(), extracted("veatch", Some("100"), &batch));
    let (_, second) = update(state, Msg::CollectionFinished);
    assert_eq!(delivered_ids(&first), delivered_ids(&second));
}

#[test]
fn nothing_to_deliver_skips_the_gateway() {
    init_logging();
    let (state, _) = update(RunState::default(), extracted("veatch", Some("105"), &["105", "100"]));
    let (state, effects) = update(state, Msg::CollectionFinished);
    assert!(effects.is_empty());
    assert_eq!(state.phase(), RunPhase::Finished);
    assert_eq!(
        state.outcome().unwrap().delivery,
        DeliveryOutcome::NothingToDeliver
    );

    // A stray delivery result after the fact changes nothing.
    let (state, effects) = update(state, Msg::DeliveryFinished(Ok(())));
    assert!(effects.is_empty());
    assert_eq!(
        state.outcome().unwrap().delivery,
        DeliveryOutcome::NothingToDeliver
    );
}

#[test]
fn advanced_cursor_filters_the_same_batch_to_empty() {
    init_logging();
    let (state, _) = update(RunState::default(), extracted("veatch", None, &["105", "100"]));
    let (state, _) = update(state, Msg::CollectionFinished);
    let (_, effects) = update(state, Msg::DeliveryFinished(Ok(())));
    let (_, new_cursor) = advances(&effects).remove(0);
    assert_eq!(new_cursor, "105");

    let (state, _) = update(
        RunState::default(),
        extracted("veatch", Some(new_cursor.as_str()), &["105", "100", "097"]),
    );
    assert_eq!(state.survivors("veatch").map(|s| s.len()), Some(0));
}

#[test]
fn partial_failure_still_delivers_the_other_sources() {
    init_logging();
    let state = RunState::default();
    let (state, _) = update(state, extracted("alice", None, &["20", "19"]));
    let (state, _) = update(
        state,
        Msg::SourceFailed {
            source: "bob".into(),
            reason: "verification timed out".into(),
        },
    );
    let (state, effects) = update(state, Msg::CollectionFinished);
    assert_eq!(delivered_ids(&effects), vec!["20", "19"]);

    let (state, effects) = update(state, Msg::DeliveryFinished(Ok(())));
    assert_eq!(advances(&effects), vec![("alice".to_string(), "20".to_string())]);

    let outcome = state.outcome().unwrap();
    assert!(outcome.is_partial());
    assert_eq!(outcome.failed_sources[0].source, "bob");
    assert_eq!(outcome.delivery, DeliveryOutcome::Delivered(2));
}

#[test]
fn sources_without_survivors_do_not_get_cursor_writes() {
    init_logging();
    let state = RunState::default();
    let (state, _) = update(state, extracted("alice", Some("30"), &["30", "29"]));
    let (state, _) = update(state, extracted("bob", None, &["7"]));
    let (state, _) = update(state, Msg::CollectionFinished);
    let (_, effects) = update(state, Msg::DeliveryFinished(Ok(())));
    assert_eq!(advances(&effects), vec![("bob".to_string(), "7".to_string())]);
}

#[test]
fn newest_first_sorts_aggregate_by_timestamp() {
    init_logging();
    let state = RunState::new(IdOrdering::Lexicographic).with_newest_first(true);
    let msg_a = Msg::SourceExtracted {
        source: "alice".into(),
        cursor: None,
        records: vec![
            record("alice", "2", Some("2024-05-01T09:00:00.000Z")),
            record("alice", "1", Some("2024-04-30T09:00:00.000Z")),
        ],
    };
    let msg_b = Msg::SourceExtracted {
        source: "bob".into(),
        cursor: None,
        records: vec![record("bob", "9", Some("2024-05-01T11:00:00.000Z"))],
    };
    let (state, _) = update(state, msg_a);
    let (state, _) = update(state, msg_b);
    let (_, effects) = update(state, Msg::CollectionFinished);
    assert_eq!(delivered_ids(&effects), vec!["9", "2", "1"]);
}

#[test]
fn without_sort_aggregate_keeps_source_then_document_order() {
    init_logging();
    let state = RunState::default();
    let (state, _) = update(state, extracted("alice", None, &["2", "1"]));
    let (state, _) = update(state, extracted("bob", None, &["9"]));
    let (_, effects) = update(state, Msg::CollectionFinished);
    assert_eq!(delivered_ids(&effects), vec!["2", "1", "9"]);
}

#[test]
fn a_source_reports_once_per_run() {
    init_logging();
    let state = RunState::default();
    let (state, _) = update(state, extracted("alice", None, &["2"]));
    let (state, _) = update(state, extracted("alice", None, &["5"]));
    let (state, _) = update(
        state,
        Msg::SourceFailed {
            source: "alice".into(),
            reason: "late".into(),
        },
    );
    assert!(state.failures().is_empty());
    assert_eq!(
        state
            .survivors("alice")
            .unwrap()
            .iter()
            .map(|r| r.id.as_str())
            .collect::<Vec<_>>(),
        vec!["2"]
    );
}

#[test]
fn a_failed_source_keeps_its_failure_over_a_later_batch() {
    init_logging();
    let failed = Msg::SourceFailed {
        source: "alice".into(),
        reason: "login wall".into(),
    };
    let (state, _) = update(RunState::default(), failed.clone());
    let (state, _) = update(state, failed);
    let (state, _) = update(state, extracted("alice", None, &["7"]));

    assert_eq!(state.failures().len(), 1);
    assert_eq!(state.failures()[0].reason, "login wall");
    assert_eq!(state.survivors("alice"), None);
}

#[test]
fn late_extraction_is_ignored_once_delivering() {
    init_logging();
    let (state, _) = update(RunState::default(), extracted("alice", None, &["2"]));
    let (state, _) = update(state, Msg::CollectionFinished);
    let (state, effects) = update(state, extracted("bob", None, &["3"]));
    assert!(effects.is_empty());
    assert!(state.survivors("bob").is_none());
    let (state, _) = update(state, Msg::DeliveryFinished(Ok(())));
    assert_eq!(state.outcome().unwrap().delivery, DeliveryOutcome::Delivered(1));
}
