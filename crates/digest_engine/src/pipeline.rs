use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use digest_core::{
    update, Cursor, DeliveryOutcome, Effect, IdOrdering, Msg, Record, RunOutcome, RunState,
    SourceConfig,
};
use digest_logging::{digest_debug, digest_error, digest_info, digest_warn};
use serde::Deserialize;

use crate::cursor_store::CursorStore;
use crate::delivery::DeliveryGateway;
use crate::extract::PostExtractor;
use crate::session::SessionProvider;
use crate::{BrowserLauncher, PageDriver};

/// How browser sessions are shared between the sources of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// One session, authenticated once, used for every source.
    #[default]
    Shared,
    /// A fresh session per source, each authenticated on its own.
    PerSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub subject: String,
    /// Used for sources without their own `batch_size`.
    pub batch_size: usize,
    pub ordering: IdOrdering,
    pub newest_first: bool,
    pub session_policy: SessionPolicy,
    /// Posts older than this are skipped. Posts without a readable timestamp are kept.
    pub max_age: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            subject: "Latest posts digest".to_string(),
            batch_size: 5,
            ordering: IdOrdering::default(),
            newest_first: false,
            session_policy: SessionPolicy::default(),
            max_age: None,
        }
    }
}

enum SharedSession {
    NotOpened,
    Open(Box<dyn PageDriver>),
    /// Authentication already failed once this run; not retried.
    Failed(String),
}

/// Runs authenticate, extract, filter, deliver and advance over a list of sources.
pub struct DigestPipeline {
    launcher: Arc<dyn BrowserLauncher>,
    sessions: SessionProvider,
    extractor: PostExtractor,
    cursors: Arc<dyn CursorStore>,
    gateway: Arc<dyn DeliveryGateway>,
    settings: PipelineSettings,
}

impl DigestPipeline {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        sessions: SessionProvider,
        extractor: PostExtractor,
        cursors: Arc<dyn CursorStore>,
        gateway: Arc<dyn DeliveryGateway>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            launcher,
            sessions,
            extractor,
            cursors,
            gateway,
            settings,
        }
    }

    /// One full run. Never fails as a whole: per-source problems end up in
    /// `failed_sources`, delivery problems in the delivery outcome.
    pub async fn run(&self, sources: &[SourceConfig]) -> RunOutcome {
        digest_info!(
            "Digest run over {} source(s), {:?} sessions",
            sources.len(),
            self.settings.session_policy
        );
        let mut state = RunState::new(self.settings.ordering)
            .with_newest_first(self.settings.newest_first);
        let mut shared = SharedSession::NotOpened;

        for source in sources {
            let cursor = self.cursors.get(&source.name);
            match &cursor {
                Some(cursor) => {
                    digest_info!("@{}: cursor at {}", source.name, cursor.last_seen_id)
                }
                None => digest_info!("@{}: no cursor, first run", source.name),
            }

            let msg = match self.settings.session_policy {
                SessionPolicy::Shared => self.collect_shared(source, cursor, &mut shared).await,
                SessionPolicy::PerSource => self.collect_fresh(source, cursor).await,
            };
            state = self.dispatch(state, msg).await;

            if let (Some(fetched), Some(survivors)) =
                (state.fetched(&source.name), state.survivors(&source.name))
            {
                digest_info!(
                    "@{}: {} extracted, {} new after filtering",
                    source.name,
                    fetched,
                    survivors.len()
                );
            }
        }

        if let SharedSession::Open(driver) = shared {
            release(driver.as_ref()).await;
        }

        state = self.dispatch(state, Msg::CollectionFinished).await;
        let outcome = state.outcome().unwrap_or_else(|| RunOutcome {
            delivery: DeliveryOutcome::DeliveryFailed("run did not reach a final state".into()),
            failed_sources: state.failures().to_vec(),
        });
        digest_info!("Digest run finished: {}", outcome);
        outcome
    }

    async fn collect_shared(
        &self,
        source: &SourceConfig,
        cursor: Option<Cursor>,
        shared: &mut SharedSession,
    ) -> Msg {
        if let SharedSession::NotOpened = shared {
            *shared = match self.open_session().await {
                Ok(driver) => SharedSession::Open(driver),
                Err(reason) => SharedSession::Failed(reason),
            };
        }
        match shared {
            SharedSession::Open(driver) => self.collect_from(driver.as_ref(), source, cursor).await,
            SharedSession::Failed(reason) => Msg::SourceFailed {
                source: source.name.clone(),
                reason: reason.clone(),
            },
            SharedSession::NotOpened => Msg::SourceFailed {
                source: source.name.clone(),
                reason: "no browser session".to_string(),
            },
        }
    }

    async fn collect_fresh(&self, source: &SourceConfig, cursor: Option<Cursor>) -> Msg {
        match self.open_session().await {
            Ok(driver) => {
                let msg = self.collect_from(driver.as_ref(), source, cursor).await;
                release(driver.as_ref()).await;
                msg
            }
            Err(reason) => Msg::SourceFailed {
                source: source.name.clone(),
                reason,
            },
        }
    }

    /// Launches and authenticates. The artifact is reloaded every time so a
    /// login earlier in the run is reused by later sessions.
    async fn open_session(&self) -> Result<Box<dyn PageDriver>, String> {
        let driver = self.launcher.launch().await.map_err(|err| {
            digest_error!("Could not launch browser: {}", err);
            format!("browser launch failed: {err}")
        })?;

        let artifact = self.sessions.load_artifact();
        match self
            .sessions
            .authenticate(driver.as_ref(), artifact.as_deref())
            .await
        {
            Ok(method) => {
                digest_info!("Authenticated ({:?})", method);
                Ok(driver)
            }
            Err(err) => {
                release(driver.as_ref()).await;
                Err(err.to_string())
            }
        }
    }

    async fn collect_from(
        &self,
        driver: &dyn PageDriver,
        source: &SourceConfig,
        cursor: Option<Cursor>,
    ) -> Msg {
        let limit = source.batch_size_or(self.settings.batch_size);
        match self.extractor.extract(driver, &source.name, limit).await {
            Ok(records) => {
                let records = match self.settings.max_age {
                    Some(max_age) => {
                        let extracted = records.len();
                        let recent = within_window(records, max_age, Utc::now());
                        if recent.len() < extracted {
                            digest_debug!(
                                "@{}: {} post(s) older than {:?} skipped",
                                source.name,
                                extracted - recent.len(),
                                max_age
                            );
                        }
                        recent
                    }
                    None => records,
                };
                Msg::SourceExtracted {
                    source: source.name.clone(),
                    cursor,
                    records,
                }
            }
            Err(err) => Msg::SourceFailed {
                source: source.name.clone(),
                reason: err.to_string(),
            },
        }
    }

    /// Feeds `msg` through `update`, executing effects until no follow-up messages remain.
    async fn dispatch(&self, mut state: RunState, msg: Msg) -> RunState {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;
            for effect in effects {
                if let Some(follow_up) = self.execute(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
        state
    }

    async fn execute(&self, effect: Effect) -> Option<Msg> {
        match effect {
            Effect::Deliver { records } => {
                digest_info!("Delivering {} record(s)", records.len());
                let result = self
                    .gateway
                    .send(&self.settings.subject, &records)
                    .await
                    .map_err(|err| {
                        digest_error!("Delivery failed: {}", err);
                        err.to_string()
                    });
                Some(Msg::DeliveryFinished(result))
            }
            Effect::AdvanceCursor {
                source,
                last_seen_id,
            } => {
                if let Err(err) = self.cursors.set(&source, &last_seen_id) {
                    digest_error!(
                        "Delivered, but could not advance cursor of @{} to {}: {}",
                        source,
                        last_seen_id,
                        err
                    );
                }
                None
            }
        }
    }
}

async fn release(driver: &dyn PageDriver) {
    if let Err(err) = driver.close().await {
        digest_warn!("Could not close browser session: {}", err);
    }
}

/// Keeps records created within `max_age` of `now`.
fn within_window(records: Vec<Record>, max_age: Duration, now: DateTime<Utc>) -> Vec<Record> {
    let Some(cutoff) = chrono::TimeDelta::from_std(max_age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
    else {
        return records;
    };
    records
        .into_iter()
        .filter(|record| {
            match record
                .created_at
                .as_deref()
                .and_then(|created| DateTime::parse_from_rfc3339(created).ok())
            {
                Some(created) => created.with_timezone(&Utc) >= cutoff,
                None => true,
            }
        })
        .collect()
}
