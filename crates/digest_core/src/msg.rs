use crate::{Cursor, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Extraction for a source finished; `records` are in document order
    /// (newest first) and `cursor` is what the store held at the start of the run.
    SourceExtracted {
        source: String,
        cursor: Option<Cursor>,
        records: Vec<Record>,
    },
    /// Authentication or extraction for a source failed as a whole.
    SourceFailed { source: String, reason: String },
    /// Every requested source has reported.
    CollectionFinished,
    /// Result of the single gateway send.
    DeliveryFinished(Result<(), String>),
}
