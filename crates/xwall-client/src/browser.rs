use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use xwall_core::auth::{CredentialOrigin, CredentialSource, SourceOutcome};
use xwall_core::credentials::CredentialSet;
use xwall_core::error::AppError;

/// Cookie domains that belong to the X web client.
const X_DOMAINS: [&str; 2] = ["x.com", "twitter.com"];

/// Browsers whose cookie stores can be read, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Firefox,
    Edge,
}

impl Browser {
    pub const ALL: [Browser; 3] = [Browser::Chrome, Browser::Firefox, Browser::Edge];

    pub fn name(&self) -> &'static str {
        match self {
            Browser::Chrome => "Chrome",
            Browser::Firefox => "Firefox",
            Browser::Edge => "Edge",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One cookie as read from a browser store, value already decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookie {
    pub domain: String,
    pub name: String,
    pub value: String,
}

/// Blocking access to a browser's cookie store.
pub trait CookieReader: Send + Sync + 'static {
    fn read(&self, browser: Browser) -> Result<Vec<BrowserCookie>, AppError>;
}

/// Reads the stores of the browsers installed on this machine.
///
/// Chromium-family browsers encrypt cookie values with a key held by the OS
/// (DPAPI, Keychain, Secret Service). `rookie` fetches that key and decrypts
/// the values, so Chrome and Edge yield plain values like Firefox does.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstalledBrowsers;

impl CookieReader for InstalledBrowsers {
    fn read(&self, browser: Browser) -> Result<Vec<BrowserCookie>, AppError> {
        let domains = Some(X_DOMAINS.iter().map(|d| d.to_string()).collect());
        let cookies = match browser {
            Browser::Chrome => rookie::chrome(domains),
            Browser::Firefox => rookie::firefox(domains),
            Browser::Edge => rookie::edge(domains),
        }
        .map_err(|e| AppError::CredentialError(format!("cannot read {browser} cookies: {e}")))?;

        Ok(cookies
            .into_iter()
            .map(|c| BrowserCookie {
                domain: c.domain,
                name: c.name,
                value: c.value,
            })
            .collect())
    }
}

/// True for `x.com`, `.x.com`, `mobile.twitter.com` and the like.
fn is_x_domain(host: &str) -> bool {
    let host = host.trim_start_matches('.');
    X_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

/// Non-empty X cookies out of a browser's cookie list.
fn x_cookies(cookies: Vec<BrowserCookie>) -> CredentialSet {
    cookies
        .into_iter()
        .filter(|c| is_x_domain(&c.domain) && !c.value.is_empty())
        .map(|c| (c.name, c.value))
        .collect()
}

/// Takes the X session cookies straight out of local browser profiles,
/// trying each browser in turn until one holds both session tokens.
pub struct BrowserCookieSource<R = InstalledBrowsers> {
    browsers: Vec<Browser>,
    reader: Arc<R>,
}

impl BrowserCookieSource {
    /// Every supported browser, read from this machine.
    pub fn detect() -> Self {
        Self::with_reader(Browser::ALL.to_vec(), InstalledBrowsers)
    }
}

impl<R: CookieReader> BrowserCookieSource<R> {
    pub fn with_reader(browsers: Vec<Browser>, reader: R) -> Self {
        Self {
            browsers,
            reader: Arc::new(reader),
        }
    }

    pub fn browsers(&self) -> &[Browser] {
        &self.browsers
    }

    async fn read(&self, browser: Browser) -> Result<CredentialSet, AppError> {
        let reader = Arc::clone(&self.reader);
        // Cookie stores are SQLite files and the keyring lookup can block.
        let cookies = tokio::task::spawn_blocking(move || reader.read(browser))
            .await
            .map_err(|e| {
                AppError::CredentialError(format!("{browser} cookie task failed: {e}"))
            })??;
        Ok(x_cookies(cookies))
    }
}

#[async_trait]
impl<R: CookieReader> CredentialSource for BrowserCookieSource<R> {
    fn origin(&self) -> CredentialOrigin {
        CredentialOrigin::Browser
    }

    async fn load(&self) -> SourceOutcome {
        if self.browsers.is_empty() {
            return SourceOutcome::Unavailable("no browser to read".into());
        }

        for &browser in &self.browsers {
            match self.read(browser).await {
                Ok(set) if set.is_usable() => {
                    tracing::info!(%browser, cookies = set.len(), "Extracted cookies from browser");
                    return SourceOutcome::Found(set);
                }
                Ok(set) => {
                    tracing::debug!(
                        %browser,
                        missing = ?set.missing(),
                        "Browser has no usable X session"
                    );
                }
                Err(e) => {
                    tracing::debug!(%browser, error = %e, "Could not read browser cookies");
                }
            }
        }

        SourceOutcome::Unavailable("no browser holds a logged-in X session".into())
    }
}
