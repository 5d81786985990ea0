use crate::SourceConfig;

/// Canonical form of a profile name: trimmed, without a leading `@`.
pub fn normalize_source_name(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_string()
}

/// The set of tracked sources, in insertion order.
///
/// Names are compared after [`normalize_source_name`] and ASCII case folding,
/// since profile handles are case-insensitive on the target site.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source. Returns false for an empty name or one already tracked.
    pub fn add(&mut self, source: SourceConfig) -> bool {
        let name = normalize_source_name(&source.name);
        if name.is_empty() || self.exists(&name) {
            return false;
        }
        self.sources.push(SourceConfig { name, ..source });
        true
    }

    pub fn list(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.sources.len();
        let name = normalize_source_name(name);
        self.sources
            .retain(|source| !source.name.eq_ignore_ascii_case(&name));
        self.sources.len() != before
    }

    pub fn exists(&self, name: &str) -> bool {
        let name = normalize_source_name(name);
        self.sources
            .iter()
            .any(|source| source.name.eq_ignore_ascii_case(&name))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FromIterator<SourceConfig> for SourceRegistry {
    fn from_iter<T: IntoIterator<Item = SourceConfig>>(iter: T) -> Self {
        let mut registry = SourceRegistry::new();
        for source in iter {
            registry.add(source);
        }
        registry
    }
}
