use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use crate::{
    error::LoveseatResult,
    transport::{HttpRequest, HttpResponse, StreamingResponse, Transport},
};

/// Answers requests from a queue of canned responses and records what was sent.
#[derive(Clone, Debug, Default)]
pub(crate) struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<HttpResponse>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(HttpResponse::new(status, body.to_string()));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: HttpRequest) -> HttpResponse {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| HttpResponse::new(200, "{}"))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> LoveseatResult<HttpResponse> {
        Ok(self.next(request))
    }

    async fn stream(&self, request: HttpRequest) -> LoveseatResult<StreamingResponse> {
        let response = self.next(request);
        let chunks: Vec<LoveseatResult<Bytes>> = vec![Ok(response.body)];

        Ok(StreamingResponse {
            status: response.status,
            body: stream::iter(chunks).boxed(),
        })
    }
}
