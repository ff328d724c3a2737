//! Push-to-pull adapter between a remote download and the archive decoder.
//!
//! The transport pushes body chunks as the network delivers them, while the
//! decoder pulls bytes whenever it needs more input. [`StreamingBridge`]
//! sits in between: it only drives the transfer when the decoder asks, parks
//! every chunk in a [`DownloadBuffer`], and hands the decoder everything that
//! has accumulated since its previous read.
//!
//! ## Lifecycle
//!
//! 1. [`open()`](StreamingBridge::open) starts the transfer and makes one
//!    non-blocking progress step.
//! 2. [`read()`](StreamingBridge::read) waits in bounded cycles until bytes
//!    are pending or the transfer has ended.
//! 3. [`close()`](StreamingBridge::close) detaches the transfer. Dropping the
//!    bridge closes it too.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{BlockSource, DownloadBuffer, Transfer, TransferError, Transport};

/// Streaming bridge for a single archive download.
pub struct StreamingBridge<'a> {
    transport: &'a dyn Transport,
    url: &'a str,
    transfer: Option<Box<dyn Transfer>>,
    buffer: DownloadBuffer,
    /// True until the transfer reports its end.
    active: bool,
    /// Upper bound on one wait cycle inside `read()`.
    wait: Duration,
    shutdown: CancellationToken,
}

impl<'a> StreamingBridge<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        url: &'a str,
        wait: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            url,
            transfer: None,
            buffer: DownloadBuffer::new(),
            active: true,
            wait,
            shutdown,
        }
    }

    /// Start the transfer and perform one non-blocking progress step.
    ///
    /// # Errors
    ///
    /// Fails if the transport cannot start the transfer, or if the transfer
    /// ended without producing any data during the first step.
    pub async fn open(&mut self) -> Result<(), TransferError> {
        debug!(url = %self.url, "downloading");
        let mut transfer = self.transport.start(self.url).await?;

        if let Some(step) = transfer.next_chunk().now_or_never() {
            self.absorb(step?)?;
        }
        if !self.active && self.buffer.total() == 0 {
            return Err(TransferError::Empty {
                url: self.url.to_string(),
            });
        }

        self.transfer = Some(transfer);
        Ok(())
    }

    /// Hand out every byte downloaded since the previous read.
    ///
    /// Drives the transfer in cycles bounded by the wait interval until data
    /// is pending or the transfer has ended. The returned slice is empty only
    /// when the transfer is over and everything has been delivered.
    ///
    /// # Errors
    ///
    /// Propagates transfer failures, and gives up on a stalled transfer once
    /// shutdown has been requested.
    pub async fn read(&mut self) -> Result<&[u8], TransferError> {
        while self.buffer.pending() == 0 && self.active {
            let step = {
                let transfer = self.transfer.as_mut().ok_or(TransferError::NotOpen)?;
                tokio::time::timeout(self.wait, transfer.next_chunk()).await
            };

            match step {
                Ok(chunk) => self.absorb(chunk?)?,
                Err(_) if self.shutdown.is_cancelled() => {
                    return Err(TransferError::Cancelled {
                        url: self.url.to_string(),
                    });
                }
                Err(_) => {
                    debug!(
                        url = %self.url,
                        wait_ms = self.wait.as_millis() as u64,
                        "still waiting for data"
                    );
                }
            }
        }

        trace!(
            total = self.buffer.total(),
            consumed = self.buffer.consumed(),
            pending = self.buffer.pending(),
            "delivering block"
        );
        Ok(self.buffer.consume_all())
    }

    /// Detach the transfer. Safe to call repeatedly or without `open()`.
    pub fn close(&mut self) {
        if self.transfer.take().is_some() {
            debug!(
                url = %self.url,
                downloaded = self.buffer.total(),
                delivered = self.buffer.consumed(),
                "transfer closed"
            );
        }
    }

    /// Whether the transfer is still producing data.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Bytes downloaded so far.
    pub fn downloaded(&self) -> usize {
        self.buffer.total()
    }

    fn absorb(&mut self, chunk: Option<Bytes>) -> Result<(), TransferError> {
        match chunk {
            Some(bytes) => {
                trace!(len = bytes.len(), "chunk received");
                self.buffer
                    .append(&bytes)
                    .map_err(|source| TransferError::Allocation {
                        url: self.url.to_string(),
                        source,
                    })?;
            }
            None => {
                debug!(url = %self.url, downloaded = self.buffer.total(), "transfer finished");
                self.active = false;
            }
        }
        Ok(())
    }
}

impl Drop for StreamingBridge<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl BlockSource for StreamingBridge<'_> {
    async fn read_block(&mut self) -> Result<&[u8], TransferError> {
        self.read().await
    }
}
