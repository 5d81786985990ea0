use std::sync::Arc;
use std::time::Duration;

use digest_core::{Engagement, Record};
use digest_logging::{digest_debug, digest_info, digest_warn};
use scraper::{ElementRef, Html, Selector};

use crate::delay::{pause, DelayPolicy, JitterDelay};
use crate::diagnostics::DiagnosticCapture;
use crate::site::PostSelectors;
use crate::wait::{wait_for, WaitBounds, WaitOutcome};
use crate::{ExtractionError, Locator, PageDriver};

/// A configured selector that `scraper` refuses to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector `{selector}`: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSettings {
    /// How long to wait for the first post after navigation.
    pub content_wait: Duration,
    /// Consecutive scrolls without new posts before giving up on reaching the limit.
    pub max_stale_scrolls: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            content_wait: Duration::from_secs(10),
            max_stale_scrolls: 3,
        }
    }
}

pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

struct ParsedSelectors {
    post: Selector,
    text: Selector,
    timestamp: Selector,
    status_link: Selector,
    counters: Vec<(String, Selector)>,
}

fn parse_selector(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|err| SelectorError {
        selector: selector.to_string(),
        message: format!("{err:?}"),
    })
}

impl ParsedSelectors {
    fn parse(config: &PostSelectors) -> Result<Self, SelectorError> {
        let counters = config
            .counters
            .iter()
            .map(|counter| Ok((counter.name.clone(), parse_selector(&counter.selector)?)))
            .collect::<Result<Vec<_>, SelectorError>>()?;
        Ok(Self {
            post: parse_selector(&config.post)?,
            text: parse_selector(&config.text)?,
            timestamp: parse_selector(&config.timestamp)?,
            status_link: parse_selector(&config.status_link)?,
            counters,
        })
    }
}

/// Reads up to `limit` posts from a profile timeline.
pub struct PostExtractor {
    config: PostSelectors,
    selectors: ParsedSelectors,
    settings: ExtractSettings,
    scroll_delay: Arc<dyn DelayPolicy>,
    diagnostics: DiagnosticCapture,
    clock: Clock,
}

impl PostExtractor {
    pub fn new(config: PostSelectors) -> Result<Self, SelectorError> {
        let selectors = ParsedSelectors::parse(&config)?;
        Ok(Self {
            config,
            selectors,
            settings: ExtractSettings::default(),
            scroll_delay: Arc::new(JitterDelay::new(
                Duration::from_millis(1000),
                Duration::from_millis(2000),
            )),
            diagnostics: DiagnosticCapture::disabled(),
            clock: Arc::new(|| chrono::Utc::now().to_rfc3339()),
        })
    }

    pub fn with_settings(mut self, settings: ExtractSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_scroll_delay(mut self, delay: Arc<dyn DelayPolicy>) -> Self {
        self.scroll_delay = delay;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticCapture) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Source of `captured_at` values.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn extract(
        &self,
        driver: &dyn PageDriver,
        source: &str,
        limit: usize,
    ) -> Result<Vec<Record>, ExtractionError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        match self.load_page(driver, source, limit).await {
            Ok(html) => {
                let records = self.parse_page(&html, source, limit);
                digest_info!("Extracted {} record(s) from @{}", records.len(), source);
                Ok(records)
            }
            Err(err) => {
                digest_warn!("Extraction from @{} failed: {}", source, err);
                self.diagnostics
                    .capture(driver, &format!("extract_failure_{source}"))
                    .await;
                Err(err)
            }
        }
    }

    async fn load_page(
        &self,
        driver: &dyn PageDriver,
        source: &str,
        limit: usize,
    ) -> Result<String, ExtractionError> {
        let url = self.config.profile_url(source);
        digest_info!("Loading timeline of @{} from {}", source, url);
        driver
            .goto(&url)
            .await
            .map_err(|source| ExtractionError::Navigation {
                url: url.clone(),
                source,
            })?;

        let post = Locator::css(self.config.post.clone());
        let bounds = WaitBounds::new(self.settings.content_wait);
        let found = match wait_for(driver, &post, bounds).await {
            Ok(WaitOutcome::Found(count)) => count,
            Ok(WaitOutcome::TimedOut) => {
                return Err(ExtractionError::NoContent {
                    url,
                    waited: self.settings.content_wait,
                })
            }
            Err(source) => return Err(ExtractionError::Navigation { url, source }),
        };

        self.scroll_for_more(driver, &post, found, limit).await;

        driver
            .page_source()
            .await
            .map_err(|source| ExtractionError::PageSource { url, source })
    }

    /// Best effort: a scroll failure ends loading, it never fails the extraction.
    async fn scroll_for_more(
        &self,
        driver: &dyn PageDriver,
        post: &Locator,
        mut seen: usize,
        limit: usize,
    ) {
        let mut stale = 0;
        while seen < limit && stale < self.settings.max_stale_scrolls {
            if let Err(err) = driver.scroll_to_bottom().await {
                digest_warn!("Scrolling stopped: {}", err);
                return;
            }
            pause(self.scroll_delay.as_ref(), "counting posts").await;
            match driver.count(post).await {
                Ok(count) if count > seen => {
                    digest_debug!("{} post(s) loaded", count);
                    seen = count;
                    stale = 0;
                }
                Ok(_) => stale += 1,
                Err(err) => {
                    digest_warn!("Scrolling stopped: {}", err);
                    return;
                }
            }
        }
    }

    /// Parses up to `limit` post elements of `html` in document order.
    /// Elements without an id are skipped after being counted against the limit.
    pub fn parse_page(&self, html: &str, source: &str, limit: usize) -> Vec<Record> {
        let document = Html::parse_document(html);
        let captured_at = (self.clock)();

        document
            .select(&self.selectors.post)
            .take(limit)
            .enumerate()
            .filter_map(|(index, element)| {
                let record = self.parse_post(element, source, &captured_at);
                if record.is_none() {
                    digest_warn!("Post #{} on @{} has no id; skipped", index + 1, source);
                }
                record
            })
            .collect()
    }

    fn parse_post(&self, element: ElementRef<'_>, source: &str, captured_at: &str) -> Option<Record> {
        let id = self.post_id(element)?;

        let text = element
            .select(&self.selectors.text)
            .next()
            .map(|node| node.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let created_at = element
            .select(&self.selectors.timestamp)
            .next()
            .and_then(|node| node.value().attr("datetime"))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let engagement: Engagement = self
            .selectors
            .counters
            .iter()
            .map(|(name, selector)| (name.clone(), counter_text(element, selector)))
            .collect();

        Some(Record {
            id,
            source: source.to_string(),
            text,
            created_at,
            captured_at: captured_at.to_string(),
            engagement,
        })
    }

    fn post_id(&self, element: ElementRef<'_>) -> Option<String> {
        if let Some(id) = element
            .value()
            .attr(&self.config.id_attribute)
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            return Some(id.to_string());
        }
        element
            .select(&self.selectors.status_link)
            .next()
            .and_then(|link| link.value().attr("href"))
            .and_then(status_id_from_href)
    }
}

fn counter_text(element: ElementRef<'_>, selector: &Selector) -> String {
    element
        .select(selector)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "0".to_string())
}

/// `/alice/status/123?s=20` and `https://x.com/alice/status/123/photo/1` both give `123`.
pub fn status_id_from_href(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("/status/")?;
    let id = rest.split(&['?', '/', '#'][..]).next()?.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
