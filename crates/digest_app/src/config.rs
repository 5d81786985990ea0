use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use digest_core::{IdOrdering, SourceConfig, SourceRegistry};
use digest_engine::{JitterDelay, SessionPolicy, SiteProfile};
use serde::Deserialize;

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_PATH: &str = "digest.ron";

pub const USERNAME_VAR: &str = "SITE_USERNAME";
pub const PASSWORD_VAR: &str = "SITE_PASSWORD";
pub const MAILGUN_KEY_VAR: &str = "MAILGUN_API_KEY";

/// Everything the binary reads from `digest.ron`. Secrets are not part of it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub sources: Vec<SourceConfig>,
    pub batch_size: usize,
    pub subject: String,
    pub recipient: String,
    pub sender: String,
    pub mailgun_domain: String,
    pub mailgun_base_url: String,
    /// Chrome binary to launch; looked up on the system when `None`.
    pub chrome_executable: Option<PathBuf>,
    /// Run the browser visibly, for debugging selectors and login.
    pub show_browser: bool,
    /// `(min, max)` milliseconds between typed credential characters.
    pub keystroke_delay_ms: Option<(u64, u64)>,
    /// Skip posts older than this many hours.
    pub max_age_hours: Option<u64>,
    /// Holds `cursors.json` and `session.json`.
    pub state_dir: PathBuf,
    /// `None` disables failure screenshots.
    pub diagnostics_dir: Option<PathBuf>,
    pub session_policy: SessionPolicy,
    pub id_ordering: IdOrdering,
    pub newest_first: bool,
    pub log_destination: LogDestination,
    pub site: Option<SiteProfile>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            batch_size: 5,
            subject: "Latest posts digest".to_string(),
            recipient: String::new(),
            sender: String::new(),
            mailgun_domain: String::new(),
            mailgun_base_url: "https://api.mailgun.net".to_string(),
            chrome_executable: None,
            show_browser: false,
            keystroke_delay_ms: None,
            max_age_hours: None,
            state_dir: PathBuf::from("state"),
            diagnostics_dir: Some(PathBuf::from("diagnostics")),
            session_policy: SessionPolicy::default(),
            id_ordering: IdOrdering::default(),
            newest_first: false,
            log_destination: LogDestination::default(),
            site: None,
        }
    }
}

impl DigestConfig {
    pub fn cursor_path(&self) -> PathBuf {
        self.state_dir.join("cursors.json")
    }

    pub fn session_path(&self) -> PathBuf {
        self.state_dir.join("session.json")
    }

    pub fn keystroke_delay(&self) -> Option<JitterDelay> {
        self.keystroke_delay_ms
            .map(|(min, max)| JitterDelay::new(Duration::from_millis(min), Duration::from_millis(max)))
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_hours.map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
    }

    /// Configured sources, normalized and deduplicated.
    pub fn registry(&self) -> SourceRegistry {
        self.sources.iter().cloned().collect()
    }

    fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        for (field, value) in [
            ("recipient", &self.recipient),
            ("sender", &self.sender),
            ("mailgun_domain", &self.mailgun_domain),
        ] {
            if value.trim().is_empty() {
                missing.push(field);
            }
        }
        if !missing.is_empty() {
            bail!("missing configuration fields: {}", missing.join(", "));
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        Ok(())
    }
}

pub fn load(path: &Path) -> Result<DigestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading configuration {}", path.display()))?;
    parse(&content).with_context(|| format!("in configuration {}", path.display()))
}

pub fn parse(content: &str) -> Result<DigestConfig> {
    let config: DigestConfig = ron::from_str(content).context("parsing RON")?;
    config.validate()?;
    Ok(config)
}

/// Credentials that only ever come from the environment.
pub struct Secrets {
    pub site_username: String,
    pub site_password: String,
    pub mailgun_api_key: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reports every missing (or blank) variable at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing = Vec::new();
        let mut fetch = |name: &'static str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(name);
                String::new()
            }
        };
        let site_username = fetch(USERNAME_VAR);
        let site_password = fetch(PASSWORD_VAR);
        let mailgun_api_key = fetch(MAILGUN_KEY_VAR);

        if !missing.is_empty() {
            bail!("missing environment variables: {}", missing.join(", "));
        }
        Ok(Self {
            site_username,
            site_password,
            mailgun_api_key,
        })
    }
}
