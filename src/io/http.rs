use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::ACCEPT_ENCODING;
use tracing::debug;

use super::{Transfer, TransferError, Transport};

type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// HTTP transport for remote archives.
///
/// Each worker builds its own transport, so connections are pooled per
/// worker and never shared across in-flight requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the given connect timeout.
    ///
    /// There is no overall request timeout: a slow archive keeps streaming
    /// for as long as the server keeps sending.
    pub fn new(connect_timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(&self, url: &str) -> Result<Box<dyn Transfer>, TransferError> {
        // Byte offsets must match the archive as stored, so no content coding.
        let resp = self
            .client
            .get(url)
            .header(ACCEPT_ENCODING, "identity")
            .send()
            .await
            .map_err(|e| TransferError::Start {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(
            url,
            status = status.as_u16(),
            content_length = resp.content_length(),
            "transfer started"
        );

        Ok(Box::new(HttpTransfer {
            url: url.to_string(),
            body: Box::pin(resp.bytes_stream()),
        }))
    }
}

struct HttpTransfer {
    url: String,
    body: BodyStream,
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransferError> {
        match self.body.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(TransferError::Body {
                url: self.url.clone(),
                message: e.to_string(),
            }),
            None => Ok(None),
        }
    }
}
