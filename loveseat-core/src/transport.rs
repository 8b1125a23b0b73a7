//! HTTP transport abstraction.
//!
//! The client never talks to the network directly. Every request built by a
//! [`Locator`](crate::locator::Locator) is handed to a [`Transport`], which performs the
//! verb and reports the raw status, headers and body. Deciding which statuses are
//! failures is left to the locator so that every transport behaves the same way.
//!
//! # Traits
//!
//! - [`Transport`]: performs plain and streaming requests
//! - [`TransportBuilder`]: factory trait for creating transport instances
//!
//! # Example
//!
//! ```ignore
//! use loveseat::transport::{HttpRequest, Method, Transport};
//!
//! let transport = MyTransport::new();
//! let response = transport
//!     .send(HttpRequest::new(Method::Get, "http://localhost:5984/_uuids"))
//!     .await?;
//! assert!(response.is_success());
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use std::{fmt, fmt::Debug, sync::Arc};

use crate::error::{LoveseatError, LoveseatResult};

/// The HTTP verbs used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Head,
}

impl Method {
    /// Returns the upper-case verb as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }

    /// Returns `true` for verbs that carry a JSON request body.
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Put | Method::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully prepared request, ready to be performed by a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL without the query string.
    pub url: String,
    /// Query parameters, appended by the transport in order.
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Returns the first header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the first query parameter with the given name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Returns `true` for 2xx and 3xx statuses.
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }

    /// Returns the body decoded lossily as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LoveseatError::Serialization`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> LoveseatResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Converts a failure status into [`LoveseatError::Http`].
    pub fn error_for_status(self) -> LoveseatResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(LoveseatError::Http {
                status: self.status,
                body: self.text(),
            })
        }
    }
}

/// A body delivered incrementally, chunk by chunk.
pub type ByteStream = BoxStream<'static, LoveseatResult<Bytes>>;

/// A response whose body is still being received.
pub struct StreamingResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

pub(crate) fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

/// Performs HTTP requests on behalf of the client.
///
/// Implementations report every status they receive, including 4xx and 5xx, as a
/// successful [`HttpResponse`]; only failures that leave no response at all (refused
/// connection, broken stream) are returned as [`LoveseatError::Transport`].
///
/// # Thread Safety
///
/// Transports are shared between every locator derived from the same server, so they
/// must be `Send + Sync`.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Performs the request and buffers the whole response body.
    async fn send(&self, request: HttpRequest) -> LoveseatResult<HttpResponse>;

    /// Performs the request and returns as soon as the status is known, leaving the
    /// body to be consumed as a stream.
    ///
    /// Dropping the returned body must release the underlying connection.
    async fn stream(&self, request: HttpRequest) -> LoveseatResult<StreamingResponse>;
}

/// A shared, type-erased transport.
pub type DynTransport = Arc<dyn Transport>;

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: HttpRequest) -> LoveseatResult<HttpResponse> {
        (**self).send(request).await
    }

    async fn stream(&self, request: HttpRequest) -> LoveseatResult<StreamingResponse> {
        (**self).stream(request).await
    }
}

/// Factory trait for constructing transport instances.
#[async_trait]
pub trait TransportBuilder {
    type Transport: Transport;

    async fn build(self) -> LoveseatResult<Self::Transport>;
}
