//! The in-memory [`Transport`] implementation.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use futures::{StreamExt, channel::mpsc, stream};
use mea::rwlock::RwLock;
use percent_encoding::percent_decode_str;
use std::sync::Arc;

use loveseat_core::{
    error::{LoveseatError, LoveseatResult},
    transport::{HttpRequest, HttpResponse, Method, StreamingResponse, Transport, TransportBuilder},
};

use crate::store::{ServerState, error_response, parse_since};

/// Thread-safe, in-memory stand-in for a CouchDB server.
///
/// Requests never leave the process: they are routed on their URL path and answered
/// from shared state. Clones share the same state, so a test can keep one clone to
/// inspect the request log while the client owns another.
///
/// # Example
///
/// ```ignore
/// use loveseat_memory::InMemoryTransport;
///
/// let transport = InMemoryTransport::new();
/// let server = Server::new(transport.clone(), &ServerConfig::default())?;
/// server.create_database("notes").await?;
/// assert_eq!(transport.requests().await.len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryTransport {
    state: Arc<RwLock<ServerState>>,
    credentials: Option<(String, String)>,
}

impl InMemoryTransport {
    /// Creates an empty server that accepts unauthenticated requests.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryTransportBuilder {
        InMemoryTransportBuilder::default()
    }

    /// Returns every request received so far, oldest first.
    pub async fn requests(&self) -> Vec<HttpRequest> {
        self.state.read().await.requests.clone()
    }

    /// Returns how many received requests match `method` and `path` (undecoded, without
    /// scheme and host).
    pub async fn count(&self, method: Method, path: &str) -> usize {
        self.state
            .read()
            .await
            .requests
            .iter()
            .filter(|request| request.method == method && path_of(&request.url) == path)
            .count()
    }

    /// Returns the names of the databases that currently exist.
    pub async fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().await.databases.keys().cloned().collect();
        names.sort();
        names
    }

    fn authorized(&self, request: &HttpRequest) -> bool {
        let Some((username, password)) = &self.credentials else {
            return true;
        };
        let expected = format!("Basic {}", STANDARD.encode(format!("{username}:{password}")));

        request.header("Authorization") == Some(expected.as_str())
    }

    async fn respond(&self, request: HttpRequest) -> HttpResponse {
        let mut state = self.state.write().await;
        state.requests.push(request.clone());

        if !self.authorized(&request) {
            return error_response(401, "unauthorized", "Name or password is incorrect.");
        }

        let mut response = state.handle(&request, &segments(&request.url));
        if request.method == Method::Head {
            response.body = Bytes::new();
        }

        response
    }
}

fn path_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);

    without_scheme
        .find('/')
        .map_or("", |start| &without_scheme[start..])
}

fn segments(url: &str) -> Vec<String> {
    path_of(url)
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .collect()
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, request: HttpRequest) -> LoveseatResult<HttpResponse> {
        Ok(self.respond(request).await)
    }

    async fn stream(&self, request: HttpRequest) -> LoveseatResult<StreamingResponse> {
        let path = segments(&request.url);
        let continuous = request.method == Method::Get
            && request.query_param("feed") == Some("continuous")
            && matches!(path.as_slice(), [_, changes] if changes == "_changes");

        if !continuous || !self.authorized(&request) {
            let response = self.respond(request).await;
            let body: Vec<LoveseatResult<Bytes>> = vec![Ok(response.body)];

            return Ok(StreamingResponse {
                status: response.status,
                body: stream::iter(body).boxed(),
            });
        }

        let mut state = self.state.write().await;
        state.requests.push(request.clone());

        let Some(database) = state.databases.get_mut(&path[0]) else {
            let response = error_response(404, "not_found", "Database does not exist.");
            let body: Vec<LoveseatResult<Bytes>> = vec![Ok(response.body)];

            return Ok(StreamingResponse {
                status: response.status,
                body: stream::iter(body).boxed(),
            });
        };

        let since = parse_since(&request, database);
        let include_docs = request.query_param("include_docs") == Some("true");

        // A heartbeat first, then the backlog, then live changes as they happen.
        let mut backlog = vec![Bytes::from_static(b"\n")];
        backlog.extend(
            database
                .changes_since(since, include_docs)
                .into_iter()
                .map(|event| Bytes::from(format!("{event}\n"))),
        );

        let (sender, receiver) = mpsc::unbounded();
        database.subscribe(sender);

        Ok(StreamingResponse {
            status: 200,
            body: stream::iter(backlog).chain(receiver).map(Ok::<Bytes, LoveseatError>).boxed(),
        })
    }
}

/// Builder for [`InMemoryTransport`] instances.
///
/// # Example
///
/// ```ignore
/// let transport = InMemoryTransport::builder()
///     .credentials("admin", "secret")
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct InMemoryTransportBuilder {
    credentials: Option<(String, String)>,
}

impl InMemoryTransportBuilder {
    /// Requires basic authentication with these credentials on every request.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

#[async_trait]
impl TransportBuilder for InMemoryTransportBuilder {
    type Transport = InMemoryTransport;

    async fn build(self) -> LoveseatResult<Self::Transport> {
        Ok(InMemoryTransport {
            state: Arc::default(),
            credentials: self.credentials,
        })
    }
}
