// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP client capability.
//
// Downloads and the OTA pipeline only need "GET this URL and hand me the body
// chunk by chunk", so that is all the trait exposes. The reqwest implementation
// is the production one; tests substitute in-memory fakes.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mxnative_core::error::{MxNativeError, Result};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

/// A streamed response body.
#[async_trait]
pub trait BodyStream: Send {
    /// Next chunk of the body, or `None` once it is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Status line and headers of a GET, plus its body if the server sent one.
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: Option<Box<dyn BodyStream>>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Build a complete response from in-memory chunks.
    pub fn from_chunks(
        status: u16,
        content_type: Option<&str>,
        chunks: impl IntoIterator<Item = Bytes>,
    ) -> Self {
        let chunks: VecDeque<Bytes> = chunks.into_iter().collect();
        let content_length = chunks.iter().map(|c| c.len() as u64).sum();
        Self {
            status,
            content_type: content_type.map(str::to_owned),
            content_length: Some(content_length),
            body: Some(Box::new(MemoryBody { chunks })),
        }
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Body backed by a queue of already-received chunks.
pub struct MemoryBody {
    chunks: VecDeque<Bytes>,
}

#[async_trait]
impl BodyStream for MemoryBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.chunks.pop_front())
    }
}

/// The HTTP capability.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a GET. `connect_timeout` bounds connection establishment only;
    /// a stalled body surfaces as an error from [`BodyStream::next_chunk`].
    async fn get(&self, url: &str, connect_timeout: Duration) -> Result<HttpResponse>;
}

/// [`HttpClient`] backed by reqwest with rustls.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    user_agent: Option<String>,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
        }
    }

    fn build(&self, connect_timeout: Duration) -> Result<reqwest::Client> {
        // The same bound applies between body reads so a stalled transfer fails.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(connect_timeout);
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder
            .build()
            .map_err(|e| MxNativeError::ConnectFailed(e.to_string()))
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    #[instrument(skip(self), fields(timeout_ms = connect_timeout.as_millis() as u64))]
    async fn get(&self, url: &str, connect_timeout: Duration) -> Result<HttpResponse> {
        // Connect timeouts are a client-level setting in reqwest, so each call
        // builds a client for its own timeout.
        let client = self.build(connect_timeout)?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| MxNativeError::ConnectFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let content_length = response.content_length();
        debug!(status, ?content_type, ?content_length, "response received");

        // 204 and 304 never carry a body.
        let body: Option<Box<dyn BodyStream>> = match status {
            204 | 304 => None,
            _ => Some(Box::new(ReqwestBody { response })),
        };

        Ok(HttpResponse {
            status,
            content_type,
            content_length,
            body,
        })
    }
}

struct ReqwestBody {
    response: reqwest::Response,
}

#[async_trait]
impl BodyStream for ReqwestBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.response
            .chunk()
            .await
            .map_err(|e| MxNativeError::ConnectFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_body_yields_chunks_in_order() {
        let mut response = HttpResponse::from_chunks(
            200,
            Some("application/zip"),
            [Bytes::from_static(b"ab"), Bytes::from_static(b"cde")],
        );
        assert!(response.is_success());
        assert_eq!(response.content_length, Some(5));

        let body = response.body.as_mut().expect("body");
        assert_eq!(body.next_chunk().await.expect("chunk").as_deref(), Some(&b"ab"[..]));
        assert_eq!(body.next_chunk().await.expect("chunk").as_deref(), Some(&b"cde"[..]));
        assert!(body.next_chunk().await.expect("end").is_none());
    }

    #[test]
    fn success_range() {
        let ok = HttpResponse::from_chunks(204, None, []);
        let redirect = HttpResponse::from_chunks(302, None, []);
        let missing = HttpResponse::from_chunks(404, None, []);
        assert!(ok.is_success());
        assert!(!redirect.is_success());
        assert!(!missing.is_success());
    }
}
