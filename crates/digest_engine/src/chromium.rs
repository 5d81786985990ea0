use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Element, Page};
use digest_logging::{digest_debug, digest_info, digest_warn};
use futures::StreamExt;
use rand::seq::IndexedRandom;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::{BrowserError, BrowserLauncher, Locator, PageDriver, SessionCookie};

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

#[derive(Debug, Clone)]
pub struct ChromiumSettings {
    /// Chrome binary; `None` lets chromiumoxide look one up.
    pub executable: Option<PathBuf>,
    pub show_browser: bool,
    pub request_timeout: Duration,
    pub window_size: (u32, u32),
    /// One is picked at random per launched browser.
    pub user_agents: Vec<String>,
}

impl Default for ChromiumSettings {
    fn default() -> Self {
        Self {
            executable: None,
            show_browser: false,
            request_timeout: Duration::from_secs(60),
            window_size: (1920, 1080),
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string(),
            ],
        }
    }
}

/// Starts one Chrome process per [`BrowserLauncher::launch`] call.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    settings: ChromiumSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: ChromiumSettings) -> Self {
        Self { settings }
    }

    fn config(&self) -> Result<BrowserConfig, BrowserError> {
        let (width, height) = self.settings.window_size;
        let agent = self.settings.user_agents.choose(&mut rand::rng());
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .request_timeout(self.settings.request_timeout);
        if self.settings.show_browser {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.settings.executable {
            builder = builder.chrome_executable(executable);
        }
        for arg in launch_args(agent.map(String::as_str)) {
            builder = builder.arg(arg);
        }
        builder.build().map_err(BrowserError::Launch)
    }
}

/// Flags added on top of chromiumoxide's defaults.
fn launch_args(user_agent: Option<&str>) -> Vec<String> {
    let mut args = vec![
        // Containers have neither a usable sandbox nor a large /dev/shm.
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
    ];
    if let Some(agent) = user_agent {
        args.push(format!("--user-agent={agent}"));
    }
    args
}

#[async_trait::async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        let config = self.config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                events.abort();
                return Err(map_cdp_error(err));
            }
        };
        digest_info!("Started browser (headless: {})", !self.settings.show_browser);

        Ok(Box::new(ChromiumSession {
            page,
            browser: Mutex::new(Some(browser)),
            events,
        }))
    }
}

/// One Chrome process with a single tab. Closed on `close`; on drop the
/// process is killed by chromiumoxide.
pub struct ChromiumSession {
    page: Page,
    browser: Mutex<Option<Browser>>,
    events: JoinHandle<()>,
}

impl ChromiumSession {
    async fn elements(&self, locator: &Locator) -> Result<Vec<Element>, BrowserError> {
        let found = match locator {
            Locator::Css(selector) => self.page.find_elements(selector.as_str()).await,
            Locator::XPath(expression) => self.page.find_xpaths(expression.as_str()).await,
        };
        match found {
            Ok(elements) => Ok(elements),
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(err) => Err(map_cdp_error(err)),
        }
    }

    async fn first(&self, locator: &Locator) -> Result<Element, BrowserError> {
        self.elements(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::NoSuchElement(locator.to_string()))
    }
}

#[async_trait::async_trait]
impl PageDriver for ChromiumSession {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        url::Url::parse(url).map_err(|err| BrowserError::InvalidUrl(format!("{url}: {err}")))?;
        digest_debug!("Navigating to {}", url);
        self.page.goto(url).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> Result<usize, BrowserError> {
        Ok(self.elements(locator).await?.len())
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<(), BrowserError> {
        let element = self.first(locator).await?;
        element.focus().await.map_err(map_cdp_error)?;
        element.type_str(text).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> Result<(), BrowserError> {
        let element = self.first(locator).await?;
        element.click().await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        self.page
            .evaluate(SCROLL_SCRIPT)
            .await
            .map_err(map_cdp_error)?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(map_cdp_error)
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>, BrowserError> {
        let cookies = self.page.get_cookies().await.map_err(map_cdp_error)?;
        Ok(cookies.iter().map(from_cdp_cookie).collect())
    }

    async fn add_cookies(&self, cookies: &[SessionCookie]) -> Result<(), BrowserError> {
        let params = cookies
            .iter()
            .map(to_cookie_param)
            .collect::<Result<Vec<_>, _>>()?;
        self.page.set_cookies(params).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, BrowserError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page.screenshot(params).await.map_err(map_cdp_error)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let closed = browser.close().await.map_err(map_cdp_error);
        if let Err(err) = browser.wait().await {
            digest_warn!("Browser process did not exit cleanly: {}", err);
        }
        self.events.abort();
        closed?;
        digest_info!("Closed browser");
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.events.abort();
        if self.browser.get_mut().is_some() {
            digest_warn!("Browser dropped without close; the process is killed in the background");
        }
    }
}

fn map_cdp_error(err: CdpError) -> BrowserError {
    match err {
        CdpError::Timeout => BrowserError::Timeout(err.to_string()),
        CdpError::NotFound => BrowserError::NoSuchElement(err.to_string()),
        CdpError::Ws(_) | CdpError::Io(_) => BrowserError::Transport(err.to_string()),
        other => BrowserError::Protocol(other.to_string()),
    }
}

fn from_cdp_cookie(cookie: &Cookie) -> SessionCookie {
    SessionCookie {
        name: cookie.name.clone(),
        value: cookie.value.clone(),
        domain: Some(cookie.domain.clone()),
        path: Some(cookie.path.clone()),
        secure: Some(cookie.secure),
        http_only: Some(cookie.http_only),
        // Session cookies come back with -1.
        expiry: (!cookie.session && cookie.expires > 0.0).then_some(cookie.expires),
        same_site: cookie.same_site.as_ref().map(|same_site| {
            match same_site {
                CookieSameSite::Strict => "Strict",
                CookieSameSite::Lax => "Lax",
                CookieSameSite::None => "None",
            }
            .to_string()
        }),
    }
}

fn to_cookie_param(cookie: &SessionCookie) -> Result<CookieParam, BrowserError> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone());
    if let Some(domain) = &cookie.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(path) = &cookie.path {
        builder = builder.path(path.clone());
    }
    if let Some(secure) = cookie.secure {
        builder = builder.secure(secure);
    }
    if let Some(http_only) = cookie.http_only {
        builder = builder.http_only(http_only);
    }
    if let Some(expiry) = cookie.expiry.filter(|expiry| *expiry > 0.0) {
        builder = builder.expires(TimeSinceEpoch::new(expiry));
    }
    match cookie.same_site.as_deref() {
        Some("Strict") => builder = builder.same_site(CookieSameSite::Strict),
        Some("Lax") => builder = builder.same_site(CookieSameSite::Lax),
        Some("None") => builder = builder.same_site(CookieSameSite::None),
        _ => {}
    }
    builder
        .build()
        .map_err(|err| BrowserError::Malformed(format!("cookie {}: {err}", cookie.name)))
}
