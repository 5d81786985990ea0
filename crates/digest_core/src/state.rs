use crate::{DeliveryOutcome, Effect, IdOrdering, Record, RunOutcome, SourceFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Collecting,
    Delivering,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceBatch {
    source: String,
    fetched: usize,
    survivors: Vec<Record>,
}

/// State of one pipeline run. Only [`crate::update`] moves it forward.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunState {
    ordering: IdOrdering,
    newest_first: bool,
    phase: RunPhase,
    batches: Vec<SourceBatch>,
    failures: Vec<SourceFailure>,
    delivery: Option<DeliveryOutcome>,
}

impl RunState {
    pub fn new(ordering: IdOrdering) -> Self {
        Self {
            ordering,
            ..Self::default()
        }
    }

    /// Sort the aggregate by timestamp, newest first, before delivery.
    /// The sort is stable, so per-source document order breaks ties.
    pub fn with_newest_first(mut self, newest_first: bool) -> Self {
        self.newest_first = newest_first;
        self
    }

    pub fn ordering(&self) -> IdOrdering {
        self.ordering
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Surviving records for `source`, or `None` if it has not reported a batch.
    pub fn survivors(&self, source: &str) -> Option<&[Record]> {
        self.batch(source).map(|batch| batch.survivors.as_slice())
    }

    /// Number of records the extractor returned for `source` before filtering.
    pub fn fetched(&self, source: &str) -> Option<usize> {
        self.batch(source).map(|batch| batch.fetched)
    }

    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    pub fn surviving_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.survivors.len()).sum()
    }

    /// Available once the run reached [`RunPhase::Finished`].
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.delivery.clone().map(|delivery| RunOutcome {
            delivery,
            failed_sources: self.failures.clone(),
        })
    }

    fn batch(&self, source: &str) -> Option<&SourceBatch> {
        self.batches.iter().find(|batch| batch.source == source)
    }

    fn has_reported(&self, source: &str) -> bool {
        self.batch(source).is_some() || self.failures.iter().any(|f| f.source == source)
    }

    /// Returns false when the source already reported during this run.
    pub(crate) fn record_batch(
        &mut self,
        source: String,
        fetched: usize,
        survivors: Vec<Record>,
    ) -> bool {
        if self.has_reported(&source) {
            return false;
        }
        self.batches.push(SourceBatch {
            source,
            fetched,
            survivors,
        });
        true
    }

    pub(crate) fn record_failure(&mut self, source: String, reason: String) -> bool {
        if self.has_reported(&source) {
            return false;
        }
        self.failures.push(SourceFailure { source, reason });
        true
    }

    pub(crate) fn aggregate(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .batches
            .iter()
            .flat_map(|batch| batch.survivors.iter().cloned())
            .collect();
        if self.newest_first {
            records.sort_by(|a, b| b.timestamp().cmp(a.timestamp()));
        }
        records
    }

    /// One cursor advance per source with survivors: the first survivor in
    /// document order is the newest record that went out.
    pub(crate) fn cursor_advances(&self) -> Vec<Effect> {
        self.batches
            .iter()
            .filter_map(|batch| {
                batch.survivors.first().map(|newest| Effect::AdvanceCursor {
                    source: batch.source.clone(),
                    last_seen_id: newest.id.clone(),
                })
            })
            .collect()
    }

    pub(crate) fn begin_delivery(&mut self) {
        self.phase = RunPhase::Delivering;
    }

    pub(crate) fn finish(&mut self, delivery: DeliveryOutcome) {
        self.phase = RunPhase::Finished;
        self.delivery = Some(delivery);
    }
}
