//! HTTP boundary: request/response values, abort signals and the
//! [`Transport`] seam with an in-memory [`MockTransport`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Other(String),
}

impl Method {
    /// Case-insensitive; empty input means GET.
    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "" | "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            _ => Method::Other(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Other(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read side of an [`AbortController`].
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    aborted: Rc<Cell<bool>>,
}

impl AbortSignal {
    pub fn aborted(&self) -> bool {
        self.aborted.get()
    }
}

#[derive(Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    pub fn abort(&self) {
        self.signal.aborted.set(true);
    }
}

/// Case-insensitive header map preserving the first-seen spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub method: Method,
    pub body: Option<String>,
    pub signal: AbortSignal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request aborted")]
    Aborted,
    #[error("network error: {0}")]
    Network(String),
}

pub trait Transport: fmt::Debug {
    /// Virtual milliseconds between issuing `request` and its completion.
    fn latency_ms(&self, _request: &Request) -> i64 {
        0
    }

    fn fetch(&mut self, request: &Request) -> Result<Response, TransportError>;
}

/// Builder for a mocked reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
    pub delay_ms: i64,
}

impl MockResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Headers::new(),
            body: body.into(),
            delay_ms: 0,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn delay(mut self, delay_ms: i64) -> Self {
        self.delay_ms = delay_ms.max(0);
        self
    }
}

#[derive(Debug, Clone)]
enum MockRoute {
    Reply(MockResponse),
    Fail(String),
}

#[derive(Debug, Default)]
struct MockRoutes {
    routes: HashMap<String, MockRoute>,
    requests: Vec<(Method, String, Option<String>)>,
}

/// Shared handle to URL-keyed canned responses.
///
/// Clones share routes, so a test can keep a handle after giving one to a
/// page. Lookups ignore the fragment; an unrouted URL is a network error.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Rc<RefCell<MockRoutes>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: impl Into<String>, response: MockResponse) {
        self.inner
            .borrow_mut()
            .routes
            .insert(route_key(&url.into()), MockRoute::Reply(response));
    }

    pub fn fail(&self, url: impl Into<String>, message: impl Into<String>) {
        self.inner
            .borrow_mut()
            .routes
            .insert(route_key(&url.into()), MockRoute::Fail(message.into()));
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().routes.clear();
    }

    /// `(method, url, body)` of every completed fetch, oldest first.
    pub fn take_requests(&self) -> Vec<(Method, String, Option<String>)> {
        std::mem::take(&mut self.inner.borrow_mut().requests)
    }

    fn lookup(&self, url: &str) -> Option<MockRoute> {
        self.inner.borrow().routes.get(&route_key(url)).cloned()
    }
}

fn route_key(url: &str) -> String {
    url.split_once('#')
        .map_or(url, |(before, _)| before)
        .to_string()
}

impl Transport for MockTransport {
    fn latency_ms(&self, request: &Request) -> i64 {
        match self.lookup(&request.url) {
            Some(MockRoute::Reply(response)) => response.delay_ms,
            _ => 0,
        }
    }

    fn fetch(&mut self, request: &Request) -> Result<Response, TransportError> {
        if request.signal.aborted() {
            return Err(TransportError::Aborted);
        }
        self.inner.borrow_mut().requests.push((
            request.method.clone(),
            request.url.clone(),
            request.body.clone(),
        ));
        match self.lookup(&request.url) {
            Some(MockRoute::Reply(response)) => Ok(Response {
                status: response.status,
                headers: response.headers,
                body: response.body,
            }),
            Some(MockRoute::Fail(message)) => Err(TransportError::Network(message)),
            None => Err(TransportError::Network(format!(
                "no mock response for {}",
                request.url
            ))),
        }
    }
}
