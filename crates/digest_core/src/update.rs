use digest_logging::digest_warn;

use crate::{filter_unseen, DeliveryOutcome, Effect, Msg, RunPhase, RunState};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages that do not fit the current phase are ignored, so a late
/// `SourceExtracted` can never sneak records into a batch that is already
/// being delivered.
pub fn update(mut state: RunState, msg: Msg) -> (RunState, Vec<Effect>) {
    let effects = match msg {
        Msg::SourceExtracted {
            source,
            cursor,
            records,
        } => {
            if state.phase() != RunPhase::Collecting {
                return (state, Vec::new());
            }
            let fetched = records.len();
            let last_seen = cursor.as_ref().map(|c| c.last_seen_id.as_str());
            let survivors = filter_unseen(records, last_seen, state.ordering());
            if !state.record_batch(source.clone(), fetched, survivors) {
                digest_warn!("@{}: already reported this run; extra batch dropped", source);
            }
            Vec::new()
        }
        Msg::SourceFailed { source, reason } => {
            if state.phase() == RunPhase::Collecting
                && !state.record_failure(source.clone(), reason.clone())
            {
                digest_warn!("@{}: already reported this run; dropped failure: {}", source, reason);
            }
            Vec::new()
        }
        Msg::CollectionFinished => {
            if state.phase() != RunPhase::Collecting {
                return (state, Vec::new());
            }
            let records = state.aggregate();
            if records.is_empty() {
                state.finish(DeliveryOutcome::NothingToDeliver);
                Vec::new()
            } else {
                state.begin_delivery();
                vec![Effect::Deliver { records }]
            }
        }
        Msg::DeliveryFinished(result) => {
            if state.phase() != RunPhase::Delivering {
                return (state, Vec::new());
            }
            match result {
                Ok(()) => {
                    let advances = state.cursor_advances();
                    let count = state.surviving_count();
                    state.finish(DeliveryOutcome::Delivered(count));
                    advances
                }
                Err(reason) => {
                    // Cursors stay put so the next run sees the same records as unseen.
                    state.finish(DeliveryOutcome::DeliveryFailed(reason));
                    Vec::new()
                }
            }
        }
    };

    (state, effects)
}
