#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use digest_core::{Cursor, Record};
use digest_engine::{
    AuthWaits, BrowserError, BrowserLauncher, Clock, CursorStore, DeliveryError, DeliveryGateway,
    ExtractSettings, Locator, LoginFlow, PageDriver, PersistError, PostSelectors, SessionCookie,
    WaitBounds,
};
use scraper::{Html, Selector};

pub const LANDING: &str = "https://x.test/home";
pub const LOGIN: &str = "https://x.test/login";
pub const PROFILE_PREFIX: &str = "https://x.test/";
pub const USERNAME: &str = "digest_bot";
pub const PASSWORD: &str = "hunter2";
pub const VALID_TOKEN: &str = "token-valid";
pub const CAPTURED_AT: &str = "2024-05-09T12:00:00+00:00";

pub fn init_logging() {
    digest_logging::initialize_for_tests();
}

pub fn test_flow() -> LoginFlow {
    LoginFlow {
        landing_url: LANDING.to_string(),
        login_url: LOGIN.to_string(),
        logged_in_marker: Locator::css("#home"),
        username_field: Locator::css("input[name=user]"),
        next_button: Some(Locator::css("#next")),
        password_field: Locator::css("input[name=pass]"),
        submit_button: Some(Locator::css("#login")),
    }
}

pub fn test_selectors() -> PostSelectors {
    PostSelectors {
        profile_url_template: format!("{PROFILE_PREFIX}{{source}}"),
        ..PostSelectors::default()
    }
}

pub fn quick_waits() -> AuthWaits {
    let bounds = WaitBounds::new(Duration::from_millis(60)).with_poll_interval(Duration::from_millis(10));
    AuthWaits {
        verify: bounds,
        field: bounds,
        optional_step: bounds,
    }
}

pub fn quick_extract() -> ExtractSettings {
    ExtractSettings {
        content_wait: Duration::from_millis(60),
        max_stale_scrolls: 2,
    }
}

pub fn fixed_clock() -> Clock {
    Arc::new(|| CAPTURED_AT.to_string())
}

/// Timeline markup shaped like the live site.
pub fn post_html(id: &str, text: &str, datetime: &str, likes: &str) -> String {
    format!(
        r#"<article data-testid="tweet">
  <a href="/alice/status/{id}?s=20"><time datetime="{datetime}">May 1</time></a>
  <div data-testid="tweetText"><span>{text}</span></div>
  <div data-testid="reply"><span>2</span></div>
  <div data-testid="retweet"><span>3</span></div>
  <div data-testid="like"><span>{likes}</span></div>
</article>"#
    )
}

pub fn simple_post(id: &str) -> String {
    post_html(id, &format!("post {id}"), "2024-05-01T10:00:00.000Z", "1")
}

pub fn page(posts: &[String]) -> String {
    format!("<html><body><main>{}</main></body></html>", posts.join("\n"))
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub posts: Vec<String>,
    pub initially_visible: usize,
    pub per_scroll: usize,
}

impl Timeline {
    pub fn of_ids(ids: &[&str]) -> Self {
        let posts: Vec<String> = ids.iter().map(|id| simple_post(id)).collect();
        Self {
            initially_visible: posts.len(),
            posts,
            per_scroll: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct SiteState {
    pub password_field_missing: bool,
    pub next_step_hidden: bool,
    pub accepted_password: Option<String>,
    pub timelines: HashMap<String, Timeline>,
    pub broken_profiles: HashSet<String>,
    pub screenshot_fails: bool,
    pub launch_fails: bool,

    pub launches: usize,
    pub closes: usize,
    pub logins: usize,
    pub visited: Vec<String>,
    pub clicked: Vec<String>,
}

/// Shared backing state for every driver a [`FakeLauncher`] hands out.
#[derive(Debug, Clone, Default)]
pub struct FakeSite(pub Arc<Mutex<SiteState>>);

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(self, source: &str, timeline: Timeline) -> Self {
        self.state().timelines.insert(source.to_string(), timeline);
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, SiteState> {
        self.0.lock().unwrap()
    }

    pub fn driver(&self) -> FakeDriver {
        FakeDriver {
            site: self.clone(),
            page: Mutex::new(PageState::default()),
        }
    }

    /// A driver whose browsing context is already authenticated.
    pub fn logged_in_driver(&self) -> FakeDriver {
        let driver = self.driver();
        driver.page.lock().unwrap().logged_in = true;
        driver
    }

    pub fn launches(&self) -> usize {
        self.state().launches
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }

    pub fn logins(&self) -> usize {
        self.state().logins
    }
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    logged_in: bool,
    typed: HashMap<String, String>,
    revealed: usize,
    cookies: Vec<SessionCookie>,
    closed: bool,
}

pub struct FakeDriver {
    site: FakeSite,
    page: Mutex<PageState>,
}

impl FakeDriver {
    pub fn is_logged_in(&self) -> bool {
        self.page.lock().unwrap().logged_in
    }

    fn render(&self) -> String {
        let site = self.site.state();
        let page = self.page.lock().unwrap();
        if page.url == LOGIN {
            let mut html = String::from(r#"<html><body><input name="user">"#);
            if !site.next_step_hidden {
                html.push_str(r#"<div id="next">Next</div>"#);
            }
            if !site.password_field_missing {
                html.push_str(r#"<input name="pass" type="password"><div id="login">Log in</div>"#);
            }
            html.push_str("</body></html>");
            return html;
        }
        if page.url == LANDING {
            return if page.logged_in {
                r#"<html><body><a id="home">Home</a></body></html>"#.to_string()
            } else {
                "<html><body>Sign in to continue</body></html>".to_string()
            };
        }
        let source = page.url.trim_start_matches(PROFILE_PREFIX);
        match site.timelines.get(source) {
            Some(timeline) if page.logged_in => {
                let shown = page.revealed.min(timeline.posts.len());
                page_html(&timeline.posts[..shown])
            }
            _ => "<html><body></body></html>".to_string(),
        }
    }

    fn count_css(&self, selector: &str) -> Result<usize, BrowserError> {
        let selector = Selector::parse(selector)
            .map_err(|err| BrowserError::Protocol(format!("invalid selector: {err:?}")))?;
        let document = Html::parse_document(&self.render());
        Ok(document.select(&selector).count())
    }

    fn count_locator(&self, locator: &Locator) -> Result<usize, BrowserError> {
        match locator {
            Locator::Css(selector) => self.count_css(selector),
            Locator::XPath(_) => Ok(0),
        }
    }

    fn require(&self, locator: &Locator) -> Result<(), BrowserError> {
        if self.count_locator(locator)? == 0 {
            return Err(BrowserError::NoSuchElement(locator.to_string()));
        }
        Ok(())
    }
}

fn page_html(posts: &[String]) -> String {
    page(posts)
}

#[async_trait::async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let mut site = self.site.state();
        site.visited.push(url.to_string());
        let source = url.trim_start_matches(PROFILE_PREFIX);
        if site.broken_profiles.contains(source) {
            return Err(BrowserError::Transport(format!("connection reset loading {url}")));
        }
        let revealed = site
            .timelines
            .get(source)
            .map(|timeline| timeline.initially_visible)
            .unwrap_or(0);
        drop(site);

        let mut page = self.page.lock().unwrap();
        page.url = url.to_string();
        page.revealed = revealed;
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> Result<usize, BrowserError> {
        self.count_locator(locator)
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<(), BrowserError> {
        self.require(locator)?;
        self.page
            .lock()
            .unwrap()
            .typed
            .entry(locator.to_string())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> Result<(), BrowserError> {
        self.require(locator)?;
        self.site.state().clicked.push(locator.to_string());
        if *locator != Locator::css("#login") {
            return Ok(());
        }
        let flow = test_flow();
        let mut site = self.site.state();
        let mut page = self.page.lock().unwrap();
        let expected_password = site
            .accepted_password
            .clone()
            .unwrap_or_else(|| PASSWORD.to_string());
        let user_ok = page.typed.get(&flow.username_field.to_string()).map(String::as_str) == Some(USERNAME);
        let pass_ok =
            page.typed.get(&flow.password_field.to_string()) == Some(&expected_password);
        if user_ok && pass_ok {
            site.logins += 1;
            page.logged_in = true;
            page.url = LANDING.to_string();
            let mut cookie = SessionCookie::new("auth_token", VALID_TOKEN);
            cookie.domain = Some(".x.test".to_string());
            cookie.expiry = Some(1_900_000_000.0);
            page.cookies = vec![cookie];
        }
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        let site = self.site.state();
        let mut page = self.page.lock().unwrap();
        let per_scroll = site
            .timelines
            .get(page.url.trim_start_matches(PROFILE_PREFIX))
            .map(|timeline| timeline.per_scroll)
            .unwrap_or(0);
        page.revealed += per_scroll;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        Ok(self.render())
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>, BrowserError> {
        Ok(self.page.lock().unwrap().cookies.clone())
    }

    async fn add_cookies(&self, cookies: &[SessionCookie]) -> Result<(), BrowserError> {
        let mut page = self.page.lock().unwrap();
        page.cookies.extend_from_slice(cookies);
        if cookies
            .iter()
            .any(|cookie| cookie.name == "auth_token" && cookie.value == VALID_TOKEN)
        {
            page.logged_in = true;
        }
        Ok(())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError> {
        if self.site.state().screenshot_fails {
            return Err(BrowserError::Protocol("unable to capture screen: window is gone".into()));
        }
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut site = self.site.state();
        let mut page = self.page.lock().unwrap();
        if !page.closed {
            page.closed = true;
            site.closes += 1;
        }
        Ok(())
    }
}

pub struct FakeLauncher {
    pub site: FakeSite,
}

#[async_trait::async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        let mut site = self.site.state();
        if site.launch_fails {
            return Err(BrowserError::Launch("no chrome executable found".into()));
        }
        site.launches += 1;
        drop(site);
        Ok(Box::new(self.site.driver()))
    }
}

#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<(String, Vec<Record>)>>,
    pub failure: Mutex<Option<DeliveryError>>,
}

impl RecordingGateway {
    pub fn failing(error: DeliveryError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Mutex::new(Some(error)),
        }
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_ids(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|(_, records)| records.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn heal(&self) {
        *self.failure.lock().unwrap() = None;
    }
}

#[async_trait::async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn send(&self, subject: &str, records: &[Record]) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), records.to_vec()));
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryCursorStore {
    pub cursors: Mutex<BTreeMap<String, String>>,
    pub read_only: bool,
}

impl MemoryCursorStore {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            cursors: Mutex::new(
                entries
                    .iter()
                    .map(|(source, id)| (source.to_string(), id.to_string()))
                    .collect(),
            ),
            read_only: false,
        }
    }

    pub fn value(&self, source: &str) -> Option<String> {
        self.cursors.lock().unwrap().get(source).cloned()
    }
}

impl CursorStore for MemoryCursorStore {
    fn get(&self, source: &str) -> Option<Cursor> {
        self.value(source).map(|id| Cursor::new(source, id))
    }

    fn set(&self, source: &str, last_seen_id: &str) -> Result<(), PersistError> {
        if self.read_only {
            return Err(PersistError::OutputDir("cursor storage is read-only".into()));
        }
        self.cursors
            .lock()
            .unwrap()
            .insert(source.to_string(), last_seen_id.to_string());
        Ok(())
    }
}
