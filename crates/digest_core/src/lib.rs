//! Digest core: pure data model, id ordering and the run state machine.
mod cursor;
mod effect;
mod msg;
mod outcome;
mod record;
mod registry;
mod state;
mod update;

pub use cursor::{filter_unseen, Cursor, IdOrdering};
pub use effect::Effect;
pub use msg::Msg;
pub use outcome::{DeliveryOutcome, RunOutcome, SourceFailure};
pub use record::{Engagement, Record, SourceConfig};
pub use registry::{normalize_source_name, SourceRegistry};
pub use state::{RunPhase, RunState};
pub use update::update;
