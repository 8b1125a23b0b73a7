use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::time::Duration;
use tracing::{debug, trace};

use loveseat_core::{
    error::{LoveseatError, LoveseatResult},
    transport::{HttpRequest, HttpResponse, Method, StreamingResponse, Transport, TransportBuilder},
};

/// A [`Transport`] performing requests over the network with a pooled `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn prepare(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        };

        trace!(%method, url = %request.url, "sending request");

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        builder
    }

    async fn execute(&self, request: HttpRequest) -> LoveseatResult<reqwest::Response> {
        self.prepare(request)
            .send()
            .await
            .map_err(|e| LoveseatError::Transport(e.to_string()))
    }
}

fn response_headers(response: &reqwest::Response) -> Vec<(String, String)> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> LoveseatResult<HttpResponse> {
        let response = self.execute(request).await?;
        let status = response.status().as_u16();
        let headers = response_headers(&response);
        let body = response
            .bytes()
            .await
            .map_err(|e| LoveseatError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }

    async fn stream(&self, request: HttpRequest) -> LoveseatResult<StreamingResponse> {
        let response = self.execute(request).await?;
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map_err(|e| LoveseatError::Transport(e.to_string()))
            .boxed();

        Ok(StreamingResponse { status, body })
    }
}

/// Builder for [`ReqwestTransport`] instances.
///
/// No overall request timeout is set unless asked for: it would also cut off
/// continuous changes feeds, which stay open indefinitely.
#[derive(Debug, Default)]
pub struct ReqwestTransportBuilder {
    connect_timeout: Option<Duration>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ReqwestTransportBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Limits the total duration of every request, streamed ones included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

#[async_trait]
impl TransportBuilder for ReqwestTransportBuilder {
    type Transport = ReqwestTransport;

    async fn build(self) -> LoveseatResult<Self::Transport> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }

        let client = builder
            .build()
            .map_err(|e| LoveseatError::Configuration(e.to_string()))?;
        debug!("built reqwest transport");

        Ok(ReqwestTransport::new(client))
    }
}
