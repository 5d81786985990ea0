use std::collections::BTreeMap;

use serde::Deserialize;

/// Named engagement counters exactly as displayed on the page ("1.2K" stays "1.2K").
pub type Engagement = BTreeMap<String, String>;

/// One scraped post. Never mutated after the extractor builds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub source: String,
    pub text: String,
    /// `datetime` of the post as rendered, when the page exposed one.
    pub created_at: Option<String>,
    /// RFC 3339 time the record was parsed.
    pub captured_at: String,
    pub engagement: Engagement,
}

impl Record {
    /// Timestamp used for display and ordering: `created_at`, else the capture time.
    pub fn timestamp(&self) -> &str {
        self.created_at.as_deref().unwrap_or(&self.captured_at)
    }

    pub fn counter(&self, name: &str) -> &str {
        self.engagement.get(name).map(String::as_str).unwrap_or("0")
    }
}

/// A tracked profile, optionally overriding the run-wide batch size.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batch_size: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn batch_size_or(&self, default: usize) -> usize {
        self.batch_size.unwrap_or(default)
    }
}
