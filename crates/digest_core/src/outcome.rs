use std::fmt;

/// Result of the single delivery step of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(usize),
    /// No surviving records; the gateway was not called.
    NothingToDeliver,
    DeliveryFailed(String),
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Delivered(count) => write!(f, "delivered {count} record(s)"),
            DeliveryOutcome::NothingToDeliver => write!(f, "nothing to deliver"),
            DeliveryOutcome::DeliveryFailed(reason) => write!(f, "delivery failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

/// Terminal outcome of a pipeline run. A non-empty `failed_sources` means the
/// run was a partial extraction failure; `delivery` still describes what
/// happened to the sources that did succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub delivery: DeliveryOutcome,
    pub failed_sources: Vec<SourceFailure>,
}

impl RunOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failed_sources.is_empty()
    }

    /// Nothing failed: every source was handled and delivery (if any) went through.
    pub fn is_clean(&self) -> bool {
        !self.is_partial() && !matches!(self.delivery, DeliveryOutcome::DeliveryFailed(_))
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.delivery)?;
        if self.is_partial() {
            let names: Vec<&str> = self
                .failed_sources
                .iter()
                .map(|failure| failure.source.as_str())
                .collect();
            write!(f, "; failed sources: {}", names.join(", "))?;
        }
        Ok(())
    }
}
