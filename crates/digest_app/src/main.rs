mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use digest_core::{DeliveryOutcome, RunOutcome};
use digest_engine::{
    ensure_output_dir, ChromiumLauncher, ChromiumSettings, Credentials, DiagnosticCapture,
    DigestPipeline, JsonCursorStore, MailgunGateway, MailgunSettings, PipelineSettings,
    PostExtractor, SessionArtifactStore, SessionProvider,
};
use digest_logging::{digest_error, digest_info, digest_warn};

use crate::config::{DigestConfig, Secrets, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> ExitCode {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = match config::load(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::from(2);
        }
    };
    logging::initialize(config.log_destination);
    digest_info!("Loaded configuration from {}", path.display());

    match run(config).await {
        Ok(outcome) => exit_code(&outcome),
        Err(err) => {
            digest_error!("Digest run could not start: {:#}", err);
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(config: DigestConfig) -> Result<RunOutcome> {
    let secrets = Secrets::from_env()?;

    let registry = config.registry();
    if registry.is_empty() {
        digest_warn!("No sources configured; nothing will be collected");
    }

    ensure_output_dir(&config.state_dir)
        .with_context(|| format!("preparing state dir {}", config.state_dir.display()))?;
    let diagnostics = match &config.diagnostics_dir {
        Some(dir) => DiagnosticCapture::new(dir.clone()),
        None => DiagnosticCapture::disabled(),
    };

    let site = config.site.clone().unwrap_or_default();
    let launcher = ChromiumLauncher::new(ChromiumSettings {
        executable: config.chrome_executable.clone(),
        show_browser: config.show_browser,
        ..ChromiumSettings::default()
    });

    let mut sessions = SessionProvider::new(
        site.login,
        Credentials::new(secrets.site_username, secrets.site_password),
    )
    .with_artifact_store(SessionArtifactStore::new(config.session_path()))
    .with_diagnostics(diagnostics.clone());
    if let Some(keystrokes) = config.keystroke_delay() {
        sessions = sessions.with_keystroke_delay(Arc::new(keystrokes));
    }

    let extractor = PostExtractor::new(site.posts)
        .context("configured post selectors")?
        .with_diagnostics(diagnostics);

    let gateway = MailgunGateway::new(
        MailgunSettings::new(
            config.mailgun_domain.clone(),
            secrets.mailgun_api_key,
            config.sender.clone(),
            config.recipient.clone(),
        )
        .with_base_url(config.mailgun_base_url.clone()),
    )
    .context("configuring Mailgun")?;

    let pipeline = DigestPipeline::new(
        Arc::new(launcher),
        sessions,
        extractor,
        Arc::new(JsonCursorStore::new(config.cursor_path())),
        Arc::new(gateway),
        PipelineSettings {
            subject: config.subject.clone(),
            batch_size: config.batch_size,
            ordering: config.id_ordering,
            newest_first: config.newest_first,
            session_policy: config.session_policy,
            max_age: config.max_age(),
        },
    );

    Ok(pipeline.run(registry.list()).await)
}

/// 0 when everything went through, 1 for a failed delivery, 3 for a partial run.
fn exit_code(outcome: &RunOutcome) -> ExitCode {
    if matches!(outcome.delivery, DeliveryOutcome::DeliveryFailed(_)) {
        return ExitCode::from(1);
    }
    if outcome.is_partial() {
        for failure in &outcome.failed_sources {
            digest_warn!("@{} failed: {}", failure.source, failure.reason);
        }
        return ExitCode::from(3);
    }
    ExitCode::SUCCESS
}
