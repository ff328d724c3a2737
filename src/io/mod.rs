mod bridge;
mod buffer;
mod http;

pub use bridge::StreamingBridge;
pub use buffer::{BufferError, DownloadBuffer};
pub use http::HttpTransport;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors raised while fetching the remote archive.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The request could not be sent or the connection failed.
    #[error("failed to start transfer of {url}: {message}")]
    Start { url: String, message: String },

    /// The server answered with an error status.
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// The body stream failed after the transfer started.
    #[error("transfer of {url} failed: {message}")]
    Body { url: String, message: String },

    /// The transfer finished before producing a single byte.
    #[error("transfer of {url} completed without any data")]
    Empty { url: String },

    /// The download buffer could not grow.
    #[error("download buffer for {url} could not grow: {source}")]
    Allocation {
        url: String,
        #[source]
        source: BufferError,
    },

    /// Shutdown was requested while waiting on a stalled transfer.
    #[error("transfer of {url} abandoned during shutdown")]
    Cancelled { url: String },

    /// `read()` was called before a successful `open()`.
    #[error("transfer is not open")]
    NotOpen,
}

/// Starts transfers of remote archives.
///
/// A worker owns exactly one transport for its whole lifetime and never
/// starts a second transfer while one is in flight.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin fetching `url` with content re-encoding disabled.
    ///
    /// Resolves once the response head has arrived. Error statuses fail here.
    async fn start(&self, url: &str) -> Result<Box<dyn Transfer>, TransferError>;
}

/// One in-flight download, producing body chunks in arrival order.
#[async_trait]
pub trait Transfer: Send {
    /// Next chunk of the body, or `None` once the transfer has ended.
    ///
    /// Must be cancel safe: dropping the returned future before it resolves
    /// loses no data.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransferError>;
}

/// Pull-based byte source consumed by the archive decoder.
///
/// Each call hands out the next run of bytes in stream order. An empty
/// slice means end of stream and is only returned once nothing is left.
#[async_trait]
pub trait BlockSource: Send {
    async fn read_block(&mut self) -> Result<&[u8], TransferError>;
}

#[async_trait]
impl<S: BlockSource + ?Sized> BlockSource for &mut S {
    async fn read_block(&mut self) -> Result<&[u8], TransferError> {
        (**self).read_block().await
    }
}
