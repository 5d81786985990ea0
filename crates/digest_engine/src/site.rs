//! Per-site URLs and selectors. The defaults describe the current X/Twitter markup;
//! every field can be overridden from configuration when the markup drifts.
use serde::Deserialize;

use crate::Locator;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub login: LoginFlow,
    pub posts: PostSelectors,
}

/// Pages and elements of the login flow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoginFlow {
    /// Authenticated landing view, also used to scope cookies before reuse.
    pub landing_url: String,
    pub login_url: String,
    /// Only rendered for a logged-in user.
    pub logged_in_marker: Locator,
    pub username_field: Locator,
    /// Optional intermediate step between username and password.
    pub next_button: Option<Locator>,
    pub password_field: Locator,
    pub submit_button: Option<Locator>,
}

impl Default for LoginFlow {
    fn default() -> Self {
        Self {
            landing_url: "https://x.com/home".to_string(),
            login_url: "https://x.com/login".to_string(),
            logged_in_marker: Locator::css(r#"[data-testid="AppTabBar_Home_Link"]"#),
            username_field: Locator::css(r#"input[autocomplete="username"]"#),
            next_button: Some(Locator::xpath(
                "//*[@role='button'][.//span[normalize-space()='Next']]",
            )),
            password_field: Locator::css(r#"input[type="password"]"#),
            submit_button: Some(Locator::xpath(
                "//*[@role='button'][.//span[normalize-space()='Log in']]",
            )),
        }
    }
}

/// CSS selectors for the profile timeline. These are used both to count
/// elements in the live page and to parse the page source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PostSelectors {
    /// `{source}` is replaced with the profile name.
    pub profile_url_template: String,
    pub post: String,
    pub text: String,
    /// Element carrying the `datetime` attribute.
    pub timestamp: String,
    /// Attribute on the post element holding its id, when the markup has one.
    pub id_attribute: String,
    /// Fallback id source: the first link whose path contains `/status/<id>`.
    pub status_link: String,
    pub counters: Vec<CounterSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CounterSelector {
    pub name: String,
    pub selector: String,
}

impl CounterSelector {
    pub fn new(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
        }
    }
}

impl PostSelectors {
    pub fn profile_url(&self, source: &str) -> String {
        self.profile_url_template.replace("{source}", source)
    }
}

impl Default for PostSelectors {
    fn default() -> Self {
        Self {
            profile_url_template: "https://x.com/{source}".to_string(),
            post: r#"article[data-testid="tweet"]"#.to_string(),
            text: r#"div[data-testid="tweetText"]"#.to_string(),
            timestamp: "time".to_string(),
            id_attribute: "data-tweet-id".to_string(),
            status_link: r#"a[href*="/status/"]"#.to_string(),
            counters: vec![
                CounterSelector::new("replies", r#"[data-testid="reply"]"#),
                CounterSelector::new("retweets", r#"[data-testid="retweet"]"#),
                CounterSelector::new("likes", r#"[data-testid="like"]"#),
            ],
        }
    }
}
