use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Failure talking to the page-automation backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrowserError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("timeout talking to the browser: {0}")]
    Timeout(String),
    #[error("browser transport error: {0}")]
    Transport(String),
    #[error("could not launch the browser: {0}")]
    Launch(String),
    #[error("browser protocol error: {0}")]
    Protocol(String),
    #[error("malformed browser response: {0}")]
    Malformed(String),
    #[error("no element matches {0}")]
    NoSuchElement(String),
}

/// Why an authentication attempt did not end on a logged-in page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("login marker {selector} did not appear within {waited:?}")]
    VerificationTimeout { selector: String, waited: Duration },
    #[error("login field {selector} not found")]
    ElementNotFound { selector: String },
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Authentication stage failure, with the diagnostic screenshot when one was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub failure: AuthFailure,
    pub snapshot: Option<PathBuf>,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authentication failed: {}", self.failure)?;
        if let Some(path) = &self.snapshot {
            write!(f, " (snapshot: {})", path.display())?;
        }
        Ok(())
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}

/// Total extraction failure for one source. Per-post problems never surface here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("navigation to {url} failed: {source}")]
    Navigation { url: String, source: BrowserError },
    #[error("no posts appeared on {url} within {waited:?}")]
    NoContent { url: String, waited: Duration },
    #[error("could not read page source of {url}: {source}")]
    PageSource { url: String, source: BrowserError },
}
