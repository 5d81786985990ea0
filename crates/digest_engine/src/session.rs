use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use digest_logging::{digest_debug, digest_error, digest_info, digest_warn};

use crate::artifact::SessionArtifactStore;
use crate::delay::{pause, DelayPolicy, JitterDelay};
use crate::diagnostics::DiagnosticCapture;
use crate::site::LoginFlow;
use crate::wait::{wait_for, WaitBounds, WaitOutcome};
use crate::{AuthFailure, BrowserError, Locator, PageDriver, SessionCookie, SessionError};

const AUTH_SNAPSHOT: &str = "auth_failure";

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthWaits {
    /// Wait for the logged-in marker.
    pub verify: WaitBounds,
    /// Wait for a required login field.
    pub field: WaitBounds,
    /// Wait for optional affordances such as the "next" step.
    pub optional_step: WaitBounds,
}

impl Default for AuthWaits {
    fn default() -> Self {
        Self {
            verify: WaitBounds::new(Duration::from_secs(15)),
            field: WaitBounds::new(Duration::from_secs(10)),
            optional_step: WaitBounds::new(Duration::from_secs(3)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ReusedArtifact,
    Interactive,
}

/// Turns a fresh browsing context into a logged-in one.
pub struct SessionProvider {
    flow: LoginFlow,
    credentials: Credentials,
    waits: AuthWaits,
    delay: Arc<dyn DelayPolicy>,
    keystroke_delay: Option<Arc<dyn DelayPolicy>>,
    artifacts: Option<SessionArtifactStore>,
    diagnostics: DiagnosticCapture,
}

impl SessionProvider {
    pub fn new(flow: LoginFlow, credentials: Credentials) -> Self {
        Self {
            flow,
            credentials,
            waits: AuthWaits::default(),
            delay: Arc::new(JitterDelay::human()),
            keystroke_delay: None,
            artifacts: None,
            diagnostics: DiagnosticCapture::disabled(),
        }
    }

    pub fn with_waits(mut self, waits: AuthWaits) -> Self {
        self.waits = waits;
        self
    }

    pub fn with_delay(mut self, delay: Arc<dyn DelayPolicy>) -> Self {
        self.delay = delay;
        self
    }

    /// Types credentials one character at a time, pausing between keystrokes.
    pub fn with_keystroke_delay(mut self, delay: Arc<dyn DelayPolicy>) -> Self {
        self.keystroke_delay = Some(delay);
        self
    }

    pub fn with_artifact_store(mut self, store: SessionArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticCapture) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// The saved session, if a store is configured and holds a readable one.
    pub fn load_artifact(&self) -> Option<Vec<SessionCookie>> {
        self.artifacts.as_ref().and_then(SessionArtifactStore::load)
    }

    /// Reuses `reuse` when it verifies, otherwise logs in with the credentials.
    ///
    /// A rejected artifact is only ignored; the file stays until the next
    /// successful interactive login overwrites it.
    pub async fn authenticate(
        &self,
        driver: &dyn PageDriver,
        reuse: Option<&[SessionCookie]>,
    ) -> Result<AuthMethod, SessionError> {
        if let Some(cookies) = reuse.filter(|cookies| !cookies.is_empty()) {
            digest_info!("Trying saved session ({} cookie(s))", cookies.len());
            match self.try_reuse(driver, cookies).await {
                Ok(WaitOutcome::Found(_)) => {
                    digest_info!("Saved session is still valid");
                    return Ok(AuthMethod::ReusedArtifact);
                }
                Ok(WaitOutcome::TimedOut) => {
                    digest_info!("Saved session did not verify; logging in with credentials");
                }
                Err(err) => {
                    digest_warn!("Saved session could not be applied: {}; logging in with credentials", err);
                }
            }
        }

        match self.interactive_login(driver).await {
            Ok(()) => {
                digest_info!("Logged in as {}", self.credentials.username);
                self.persist_artifact(driver).await;
                Ok(AuthMethod::Interactive)
            }
            Err(failure) => {
                digest_error!("Login failed: {}", failure);
                let snapshot = self.diagnostics.capture(driver, AUTH_SNAPSHOT).await;
                Err(SessionError { failure, snapshot })
            }
        }
    }

    async fn try_reuse(
        &self,
        driver: &dyn PageDriver,
        cookies: &[SessionCookie],
    ) -> Result<WaitOutcome, BrowserError> {
        // Cookies can only be set for the domain currently loaded.
        driver.goto(&self.flow.landing_url).await?;
        driver.add_cookies(cookies).await?;
        driver.goto(&self.flow.landing_url).await?;
        wait_for(driver, &self.flow.logged_in_marker, self.waits.verify).await
    }

    async fn interactive_login(&self, driver: &dyn PageDriver) -> Result<(), AuthFailure> {
        digest_info!("Opening login page {}", self.flow.login_url);
        driver.goto(&self.flow.login_url).await?;
        pause(self.delay.as_ref(), "username entry").await;

        self.require(driver, &self.flow.username_field).await?;
        self.enter_text(driver, &self.flow.username_field, &self.credentials.username)
            .await?;
        pause(self.delay.as_ref(), "next step").await;

        if let Some(next) = &self.flow.next_button {
            if self.click_if_present(driver, next).await? {
                pause(self.delay.as_ref(), "password entry").await;
            }
        }

        self.require(driver, &self.flow.password_field).await?;
        self.enter_text(driver, &self.flow.password_field, &self.credentials.password)
            .await?;
        pause(self.delay.as_ref(), "submitting credentials").await;

        if let Some(submit) = &self.flow.submit_button {
            self.click_if_present(driver, submit).await?;
        }

        self.verify(driver).await
    }

    async fn enter_text(
        &self,
        driver: &dyn PageDriver,
        locator: &Locator,
        text: &str,
    ) -> Result<(), BrowserError> {
        let Some(delay) = &self.keystroke_delay else {
            return driver.type_text(locator, text).await;
        };
        let mut buf = [0u8; 4];
        for (index, ch) in text.chars().enumerate() {
            if index > 0 {
                let pause = delay.next_delay();
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
            driver.type_text(locator, ch.encode_utf8(&mut buf)).await?;
        }
        Ok(())
    }

    async fn require(&self, driver: &dyn PageDriver, locator: &Locator) -> Result<(), AuthFailure> {
        match wait_for(driver, locator, self.waits.field).await? {
            WaitOutcome::Found(_) => Ok(()),
            WaitOutcome::TimedOut => Err(AuthFailure::ElementNotFound {
                selector: locator.to_string(),
            }),
        }
    }

    async fn click_if_present(
        &self,
        driver: &dyn PageDriver,
        locator: &Locator,
    ) -> Result<bool, AuthFailure> {
        match wait_for(driver, locator, self.waits.optional_step).await? {
            WaitOutcome::Found(_) => {
                digest_debug!("Clicking {}", locator);
                driver.click(locator).await?;
                Ok(true)
            }
            WaitOutcome::TimedOut => {
                digest_debug!("{} not shown; skipping", locator);
                Ok(false)
            }
        }
    }

    async fn verify(&self, driver: &dyn PageDriver) -> Result<(), AuthFailure> {
        match wait_for(driver, &self.flow.logged_in_marker, self.waits.verify).await? {
            WaitOutcome::Found(_) => Ok(()),
            WaitOutcome::TimedOut => Err(AuthFailure::VerificationTimeout {
                selector: self.flow.logged_in_marker.to_string(),
                waited: self.waits.verify.timeout,
            }),
        }
    }

    async fn persist_artifact(&self, driver: &dyn PageDriver) {
        let Some(store) = &self.artifacts else {
            return;
        };
        match driver.cookies().await {
            Ok(cookies) if cookies.is_empty() => {
                digest_warn!("Browser reported no cookies after login; nothing to save");
            }
            Ok(cookies) => {
                if let Err(err) = store.save(&cookies) {
                    digest_warn!("Could not save session to {:?}: {}", store.path(), err);
                }
            }
            Err(err) => digest_warn!("Could not read session cookies: {}", err),
        }
    }
}
