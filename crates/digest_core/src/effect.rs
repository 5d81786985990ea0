use crate::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Hand the aggregate to the delivery gateway. Never emitted with an empty batch.
    Deliver { records: Vec<Record> },
    /// Persist a new cursor. Only emitted after a successful delivery.
    AdvanceCursor { source: String, last_seen_id: String },
}
