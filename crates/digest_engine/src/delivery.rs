use std::fmt::Write as _;
use std::time::Duration;

use digest_core::Record;
use digest_logging::{digest_info, digest_warn};
use reqwest::header::CONTENT_TYPE;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery transport error: {0}")]
    Transport(String),
    #[error("delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Turns a batch of records into one transmitted message.
#[async_trait::async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn send(&self, subject: &str, records: &[Record]) -> Result<(), DeliveryError>;
}

const RULE_WIDTH: usize = 50;

/// Plain-text digest body. Sources appear in the order they first occur in
/// `records`; each source's posts keep their relative order.
pub fn render_text_digest(records: &[Record]) -> String {
    let mut sources: Vec<&str> = Vec::new();
    for record in records {
        if !sources.contains(&record.source.as_str()) {
            sources.push(&record.source);
        }
    }

    let mut body = String::from("Here are the latest posts:\n\n");
    for source in sources {
        let _ = writeln!(body, "=== Posts from @{source} ===\n");
        for record in records.iter().filter(|record| record.source == source) {
            let _ = writeln!(body, "Post from {}:", record.timestamp());
            let _ = writeln!(body, "{}", record.text);
            let _ = writeln!(
                body,
                "Likes: {} | Retweets: {}",
                record.counter("likes"),
                record.counter("retweets")
            );
            let _ = writeln!(body, "{}\n", "-".repeat(RULE_WIDTH));
        }
    }
    body
}

#[derive(Debug, Clone)]
pub struct MailgunSettings {
    /// `https://api.mailgun.net`, or the EU endpoint.
    pub base_url: String,
    pub domain: String,
    pub api_key: String,
    pub sender: String,
    pub recipient: String,
    pub request_timeout: Duration,
}

impl MailgunSettings {
    pub fn new(
        domain: impl Into<String>,
        api_key: impl Into<String>,
        sender: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            base_url: "https://api.mailgun.net".to_string(),
            domain: domain.into(),
            api_key: api_key.into(),
            sender: sender.into(),
            recipient: recipient.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/v3/{}/messages",
            self.base_url.trim_end_matches('/'),
            self.domain
        )
    }
}

/// Sends the digest through the Mailgun messages API.
#[derive(Debug, Clone)]
pub struct MailgunGateway {
    client: reqwest::Client,
    settings: MailgunSettings,
}

impl MailgunGateway {
    pub fn new(settings: MailgunSettings) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;
        Ok(Self { client, settings })
    }
}

#[async_trait::async_trait]
impl DeliveryGateway for MailgunGateway {
    async fn send(&self, subject: &str, records: &[Record]) -> Result<(), DeliveryError> {
        let text = render_text_digest(records);
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("from", &self.settings.sender)
            .append_pair("to", &self.settings.recipient)
            .append_pair("subject", subject)
            .append_pair("text", &text)
            .finish();

        let response = self
            .client
            .post(self.settings.messages_url())
            .basic_auth("api", Some(&self.settings.api_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            digest_warn!("Mailgun rejected the digest with {}: {}", status, body);
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        digest_info!(
            "Digest with {} record(s) sent to {}",
            records.len(),
            self.settings.recipient
        );
        Ok(())
    }
}
