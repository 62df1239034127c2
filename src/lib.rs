//! Deterministic runtime for self-updating `<sco-pe>` page fragments.
//!
//! A [`Page`] owns an HTML document, a virtual clock and an injectable
//! [`Transport`]. `<sco-pe>` elements inside the document intercept link
//! clicks, form submissions and other configured events, fetch the target URL
//! and merge the response back into the page: either their own content, or
//! every id-matched scope of a full document or multi-scope fragment.
//!
//! ```
//! use fragment_scope::{Page, Result};
//!
//! fn main() -> Result<()> {
//!     let mut page = Page::from_html_with_url(
//!         "https://app.test/",
//!         r#"<sco-pe id="list"><a id="next" href="/page/2">next</a></sco-pe>"#,
//!     )?;
//!     page.set_fetch_mock("/page/2", "<p id='body'>page two</p>");
//!     page.flush()?;
//!     page.click("#next")?;
//!     page.flush()?;
//!     page.assert_text("#body", "page two")?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dom;
pub mod history;
pub mod html;
pub mod page;
pub mod runtime_state;
pub mod scope;
pub mod selector;
pub mod transport;
pub mod url;

pub use config::{Confirmation, ScopeConfig, ScopeSettings};
pub use dom::{Dom, NodeId};
pub use history::{HistoryEntry, HistoryStack, NavigationState};
pub use page::{Page, PageBuilder, ScopeView};
pub use runtime_state::{FetchCall, LocationNavigation, LocationNavigationKind, PendingTimer};
pub use scope::action::{ResolvedAction, TriggerKind};
pub use scope::assets::{AssetKey, content_hash};
pub use scope::merge::{MergeClassification, classify};
pub use scope::registry::ScopeStatus;
pub use transport::{
    AbortController, AbortSignal, Headers, Method, MockResponse, MockTransport, Request,
    Response, Transport, TransportError,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("html parse error: {0}")]
    HtmlParse(String),
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
    #[error("selector not found: {0}")]
    SelectorNotFound(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("element has no action url")]
    MissingAction,
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("config error: {0}")]
    Config(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error(
        "assertion failed for `{selector}`\n  expected: {expected}\n  actual:   {actual}\n  dom:      {dom_snippet}"
    )]
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
