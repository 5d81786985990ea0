//! Digest engine: browser automation, stores, delivery and the run pipeline.
mod artifact;
mod browser;
mod chromium;
mod cursor_store;
mod delay;
mod delivery;
mod diagnostics;
mod extract;
mod persist;
mod pipeline;
mod session;
mod site;
mod types;
mod wait;

pub use artifact::SessionArtifactStore;
pub use browser::{BrowserLauncher, Locator, PageDriver, SessionCookie};
pub use chromium::{ChromiumLauncher, ChromiumSettings};
pub use cursor_store::{CursorStore, JsonCursorStore};
pub use delay::{pause, DelayPolicy, JitterDelay, NoDelay};
pub use delivery::{
    render_text_digest, DeliveryError, DeliveryGateway, MailgunGateway, MailgunSettings,
};
pub use diagnostics::DiagnosticCapture;
pub use extract::{status_id_from_href, Clock, ExtractSettings, PostExtractor, SelectorError};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{DigestPipeline, PipelineSettings, SessionPolicy};
pub use session::{AuthMethod, AuthWaits, Credentials, SessionProvider};
pub use site::{CounterSelector, LoginFlow, PostSelectors, SiteProfile};
pub use types::{AuthFailure, BrowserError, ExtractionError, SessionError};
pub use wait::{wait_for, WaitBounds, WaitOutcome};
