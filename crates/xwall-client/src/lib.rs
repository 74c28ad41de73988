pub mod browser;
pub mod postgrest;
pub mod x_search;

pub use browser::{Browser, BrowserCookie, BrowserCookieSource, CookieReader, InstalledBrowsers};
pub use postgrest::PostgrestStore;
pub use x_search::{XSearchClient, XSearchClientFactory, parse_timeline};
