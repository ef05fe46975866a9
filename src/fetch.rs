//! Byte sources for resolving image references.
//!
//! A [`ByteSource`] turns a URL reference into raw encoded bytes. The
//! default implementation wraps an HTTP client; tests and embedders can
//! supply their own source to serve bytes from memory.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while resolving a reference to raw bytes.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (connection, timeout, TLS, client setup).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream refused access to the bytes (HTTP 401/403).
    #[error("access denied (HTTP {status})")]
    Denied { status: u16 },

    /// Any other non-success HTTP status.
    #[error("unexpected response (HTTP {status})")]
    Status { status: u16 },

    /// The response body exceeds the configured size limit.
    #[error("response of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

impl SourceError {
    /// True when the upstream explicitly refused access.
    pub fn is_denied(&self) -> bool {
        matches!(self, SourceError::Denied { .. })
    }
}

/// Async resolver from a URL reference to encoded image bytes.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, SourceError>;
}

/// HTTP byte source backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpSource {
    /// Create a new HTTP source with the given request timeout and
    /// response size limit.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Transport` if the client cannot be built
    /// (e.g., TLS configuration issues).
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, SourceError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SourceError::Denied {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        // Reject on the declared length first; the streaming loop below
        // still enforces the cap when the header is absent or wrong, so an
        // oversized body is never fully buffered.
        if let Some(declared) = response.content_length() {
            if declared as usize > self.max_bytes {
                return Err(SourceError::TooLarge {
                    size: declared as usize,
                    limit: self.max_bytes,
                });
            }
        }

        let mut buffer = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if buffer.len() + chunk.len() > self.max_bytes {
                return Err(SourceError::TooLarge {
                    size: buffer.len() + chunk.len(),
                    limit: self.max_bytes,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(Bytes::from(buffer))
    }
}
