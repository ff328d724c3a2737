//! Long-lived request workers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, error, info, instrument, warn};

use crate::extractor::{EntryExtractor, ExtractError, Extraction};
use crate::gateway::{Exchange, Gateway, write_failure};
use crate::io::Transport;
use crate::sniff::ContentSniffer;

use super::dispatch;

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Init,
    Accepting,
    Processing,
    ShuttingDown,
    Done,
}

/// How a single request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The entry was written to the client.
    Served { content_type: String, length: usize },
    /// A failure status was written.
    Failed { status: u16 },
    /// The response could not be written; nothing more was sent.
    Aborted,
}

/// A worker owns one transport and one sniffer and serves one request at a
/// time until shutdown.
pub struct Worker<T, S> {
    id: usize,
    transport: T,
    sniffer: S,
    read_wait: Duration,
    state: WorkerState,
}

impl<T: Transport, S: ContentSniffer> Worker<T, S> {
    pub fn new(id: usize, transport: T, sniffer: S, read_wait: Duration) -> Self {
        Self {
            id,
            transport,
            sniffer,
            read_wait,
            state: WorkerState::Init,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(worker = self.id, from = ?self.state, to = ?next, "worker state");
        self.state = next;
    }

    /// Accept and serve requests until `shutdown` is cancelled or the gateway
    /// fails.
    ///
    /// The mutex admits one worker into `accept` at a time. Cancellation
    /// interrupts a pending accept; a request already claimed is finished
    /// first.
    ///
    /// Returns the number of requests handled.
    pub async fn run<G: Gateway>(
        mut self,
        gateway: Arc<Mutex<G>>,
        shutdown: CancellationToken,
    ) -> usize {
        let mut handled = 0;
        self.transition(WorkerState::Accepting);

        loop {
            let accepted = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                result = async {
                    let gateway = gateway.lock().await;
                    gateway.accept().await
                } => Some(result),
            };

            let mut exchange = match accepted {
                Some(Ok(exchange)) => exchange,
                Some(Err(e)) => {
                    error!(worker = self.id, error = %e, "accept failed");
                    break;
                }
                None => {
                    info!(worker = self.id, "termination requested");
                    break;
                }
            };

            self.transition(WorkerState::Processing);
            self.handle(&mut exchange, &shutdown).await;
            if let Err(e) = exchange.finish().await {
                warn!(worker = self.id, error = %e, "failed to finish response");
            }
            drop(exchange);
            handled += 1;
            self.transition(WorkerState::Accepting);
        }

        self.transition(WorkerState::ShuttingDown);
        info!(worker = self.id, handled, "worker stopped");
        self.transition(WorkerState::Done);
        handled
    }

    /// Serve one claimed request. Does not finish the exchange.
    #[instrument(skip_all, fields(worker = self.id, uri = tracing::field::Empty))]
    pub async fn handle<X: Exchange>(
        &self,
        exchange: &mut X,
        shutdown: &CancellationToken,
    ) -> Outcome {
        if let Some(uri) = exchange.request().request_uri() {
            Span::current().record("uri", uri);
        }

        let route = match dispatch::route(exchange.request()) {
            Ok(route) => route,
            Err(e) => {
                info!(error = %e, "request rejected");
                return fail(exchange, e.status()).await;
            }
        };
        debug!(url = %route.url, entry = %route.entry_path, "resolved");

        let extractor = EntryExtractor::new(
            &self.transport,
            &self.sniffer,
            self.read_wait,
            shutdown.clone(),
        );
        match extractor
            .extract(&route.url, &route.entry_path, exchange)
            .await
        {
            Ok(Extraction::Found {
                content_type,
                length,
            }) => {
                info!(url = %route.url, entry = %route.entry_path, %content_type, length, "served");
                Outcome::Served {
                    content_type,
                    length,
                }
            }
            Ok(Extraction::NotFound) => {
                info!(url = %route.url, entry = %route.entry_path, "entry not found");
                fail(exchange, 404).await
            }
            Err(ExtractError::Response(e)) => {
                warn!(error = %e, "client went away");
                Outcome::Aborted
            }
            Err(e) => {
                warn!(url = %route.url, entry = %route.entry_path, error = %e, "extraction failed");
                fail(exchange, 404).await
            }
        }
    }
}

async fn fail<X: Exchange>(exchange: &mut X, status: u16) -> Outcome {
    match write_failure(exchange, status).await {
        Ok(()) => Outcome::Failed { status },
        Err(e) => {
            warn!(status, error = %e, "failed to write failure status");
            Outcome::Aborted
        }
    }
}
