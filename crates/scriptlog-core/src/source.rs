//! Resolution of the code buffer to run from one incoming message
//!
//! A message can carry code in several competing shapes. They are checked in
//! a fixed order and the first match wins:
//!
//! 1. the first attachment (fetched; a failed fetch ends the request)
//! 2. a fenced block in the payload
//! 3. a payload that is an `http(s)://` link (fetched)
//! 4. the trimmed payload itself
//!
//! The only side effects here are those two fetches.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{FetchError, ResolveError};
use crate::transport::Attachment;

const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceShape {
    Attachment,
    FencedBlock,
    Url,
    PlainText,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    pub shape: SourceShape,
    pub code: String,
}

impl SourceCandidate {
    fn new(shape: SourceShape, code: String) -> Self {
        // Whatever the shape, an empty buffer means there is nothing to run.
        if code.trim().is_empty() {
            Self {
                shape: SourceShape::None,
                code: String::new(),
            }
        } else {
            Self { shape, code }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shape == SourceShape::None
    }
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetches attachments and links over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        log::debug!("Fetching script source from {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(too_large());
        }

        // Content-Length is advisory (and absent when chunked), so the cap is
        // enforced on the bytes actually received.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                log::warn!("Aborting fetch of {} past {} bytes", url, self.max_bytes);
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

pub struct SourceResolver {
    fetcher: Arc<dyn SourceFetcher>,
}

impl SourceResolver {
    pub fn new(fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self { fetcher }
    }

    /// `payload` is the message text with the command word already removed.
    pub async fn resolve(
        &self,
        payload: &str,
        attachments: &[Attachment],
    ) -> Result<SourceCandidate, ResolveError> {
        let content = payload.trim();

        if let Some(attachment) = attachments.first() {
            if attachments.len() > 1 {
                log::debug!(
                    "{} attachments present, only the first is used",
                    attachments.len()
                );
            }
            let code = self
                .fetcher
                .fetch_text(&attachment.url)
                .await
                .map_err(|e| ResolveError::AttachmentFetch(e.to_string()))?;
            return Ok(SourceCandidate::new(SourceShape::Attachment, code));
        }

        if content.contains(FENCE) {
            return Ok(match extract_fenced(content) {
                Some(code) => SourceCandidate::new(SourceShape::FencedBlock, code.to_string()),
                None => SourceCandidate::new(SourceShape::PlainText, content.to_string()),
            });
        }

        if is_url(content) {
            let code = self
                .fetcher
                .fetch_text(content)
                .await
                .map_err(|e| ResolveError::UrlFetch(e.to_string()))?;
            return Ok(SourceCandidate::new(SourceShape::Url, code));
        }

        Ok(SourceCandidate::new(
            SourceShape::PlainText,
            content.to_string(),
        ))
    }
}

fn is_url(content: &str) -> bool {
    content.starts_with("http://") || content.starts_with("https://")
}

/// Text between the first opening fence and the last closing fence, minus a
/// leading language tag line. `None` when the fences do not enclose anything
/// (a lone fence, or two fences back to back).
///
/// A first line that is a single token is always taken for a language tag,
/// so a one-word statement on that line is dropped too.
pub fn extract_fenced(content: &str) -> Option<&str> {
    let mut start = content.find(FENCE)? + FENCE.len();
    let end = content.rfind(FENCE)?;
    if start >= end {
        return None;
    }

    if let Some(offset) = content[start..end].find('\n') {
        let first_line_end = start + offset;
        let tag = content[start..first_line_end].trim();
        if !tag.is_empty() && !tag.chars().any(char::is_whitespace) {
            start = first_line_end + 1;
        }
    }

    Some(content[start..end].trim())
}
