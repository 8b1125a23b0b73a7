//! Hierarchical resource addressing.
//!
//! A [`Locator`] is an immutable URL plus the credentials used to reach it. Descending
//! into a child path percent-encodes the segment and returns a new locator that
//! inherits the credentials and transport of its parent, so a database locator is
//! simply `server.descend("db")` and a document locator `database.descend("id")`.
//!
//! Every verb accepts an optional relative path. Passing one is the same as descending
//! first, which makes the following two calls produce identical requests:
//!
//! ```ignore
//! locator.descend("db").get(None, RequestOptions::new()).await?;
//! locator.get(Some("db"), RequestOptions::new()).await?;
//! ```

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;
use std::{fmt, sync::Arc};
use tracing::debug;

use crate::{
    error::{LoveseatError, LoveseatResult},
    transport::{ByteStream, DynTransport, HttpRequest, HttpResponse, Method, Transport},
};

/// Everything but the RFC 3986 unreserved characters is encoded, `/` included.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a single path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Per-request extras: query parameters, headers and a JSON body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Appends every parameter from an iterator of pairs.
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: ToString,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    /// Adds a request header. `Accept`, `Content-Type` and `Authorization` are always
    /// set by the locator and override values given here.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Sets the request body to the compact JSON rendering of `value`.
    pub fn json(mut self, value: &Value) -> Self {
        self.body = Some(Bytes::from(value.to_string()));
        self
    }

    /// Sets a pre-encoded request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// An addressable resource on the server.
///
/// Locators are cheap to clone and never change once built; all state lives in the
/// shared transport.
#[derive(Clone)]
pub struct Locator {
    base: String,
    username: Option<String>,
    password: Option<String>,
    transport: DynTransport,
}

impl Locator {
    /// Creates a root locator for the given absolute base URL.
    pub fn new(base: impl Into<String>, transport: impl Transport + 'static) -> Self {
        Self::from_dyn(base, Arc::new(transport))
    }

    /// Creates a root locator sharing an existing transport.
    pub fn from_dyn(base: impl Into<String>, transport: DynTransport) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            username: None,
            password: None,
            transport,
        }
    }

    /// Attaches credentials that every descendant inherits.
    pub fn with_credentials(
        mut self,
        username: Option<impl Into<String>>,
        password: Option<impl Into<String>>,
    ) -> Self {
        self.username = username.map(Into::into);
        self.password = password.map(Into::into);
        self
    }

    /// Returns the absolute URL of this resource.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the transport shared by this locator and all of its descendants.
    pub fn transport(&self) -> &DynTransport {
        &self.transport
    }

    /// Returns the child resource addressed by a single, percent-encoded segment.
    pub fn descend(&self, segment: &str) -> Locator {
        Locator {
            base: format!("{}/{}", self.base, encode_segment(segment)),
            username: self.username.clone(),
            password: self.password.clone(),
            transport: Arc::clone(&self.transport),
        }
    }

    pub async fn get(
        &self,
        path: Option<&str>,
        options: RequestOptions,
    ) -> LoveseatResult<HttpResponse> {
        self.request(Method::Get, path, options).await
    }

    pub async fn put(
        &self,
        path: Option<&str>,
        options: RequestOptions,
    ) -> LoveseatResult<HttpResponse> {
        self.request(Method::Put, path, options).await
    }

    pub async fn post(
        &self,
        path: Option<&str>,
        options: RequestOptions,
    ) -> LoveseatResult<HttpResponse> {
        self.request(Method::Post, path, options).await
    }

    pub async fn delete(
        &self,
        path: Option<&str>,
        options: RequestOptions,
    ) -> LoveseatResult<HttpResponse> {
        self.request(Method::Delete, path, options).await
    }

    pub async fn head(
        &self,
        path: Option<&str>,
        options: RequestOptions,
    ) -> LoveseatResult<HttpResponse> {
        self.request(Method::Head, path, options).await
    }

    /// Issues a `GET` and returns the body as a stream once the status is known.
    ///
    /// # Errors
    ///
    /// A failure status is reported as [`LoveseatError::Http`] after buffering the
    /// (short) error body.
    pub async fn stream(
        &self,
        path: Option<&str>,
        options: RequestOptions,
    ) -> LoveseatResult<ByteStream> {
        use futures::TryStreamExt;

        let request = self.request_for(Method::Get, path, options);
        debug!(method = %request.method, url = %request.url, "streaming request");

        let response = self.transport.stream(request).await?;
        if crate::transport::is_success(response.status) {
            return Ok(response.body);
        }

        let chunks: Vec<Bytes> = response.body.try_collect().await?;
        Err(LoveseatError::Http {
            status: response.status,
            body: String::from_utf8_lossy(&chunks.concat()).into_owned(),
        })
    }

    /// Issues a request and fails on any status outside of 2xx/3xx.
    pub async fn request(
        &self,
        method: Method,
        path: Option<&str>,
        options: RequestOptions,
    ) -> LoveseatResult<HttpResponse> {
        let request = self.request_for(method, path, options);
        debug!(method = %request.method, url = %request.url, "request");

        self.transport.send(request).await?.error_for_status()
    }

    /// Builds the request a verb would send, without sending it.
    pub fn request_for(
        &self,
        method: Method,
        path: Option<&str>,
        options: RequestOptions,
    ) -> HttpRequest {
        if let Some(path) = path {
            return self.descend(path).request_for(method, None, options);
        }

        let mut headers: Vec<(String, String)> = options
            .headers
            .into_iter()
            .filter(|(key, _)| {
                let key = key.to_ascii_lowercase();
                !["accept", "content-type", "authorization"].contains(&key.as_str())
            })
            .collect();

        headers.push(("Accept".into(), "application/json".into()));
        if method.has_body() {
            headers.push(("Content-Type".into(), "application/json".into()));
        }
        if let Some(authorization) = self.authorization() {
            headers.push(("Authorization".into(), authorization));
        }

        HttpRequest {
            method,
            url: self.base.clone(),
            query: options.query,
            headers,
            body: options.body,
        }
    }

    fn authorization(&self) -> Option<String> {
        let username = self.username.as_deref().unwrap_or_default();
        let password = self.password.as_deref().unwrap_or_default();

        if username.is_empty() && password.is_empty() {
            return None;
        }

        Some(format!("Basic {}", STANDARD.encode(format!("{username}:{password}"))))
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("base", &self.base)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Resource {}>", self.base)
    }
}
