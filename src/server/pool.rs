//! Fixed-size worker pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::gateway::Gateway;
use crate::io::Transport;
use crate::sniff::ContentSniffer;

use super::worker::Worker;

/// A set of workers sharing one gateway.
pub struct WorkerPool<T, S> {
    workers: Vec<Worker<T, S>>,
}

impl<T, S> WorkerPool<T, S>
where
    T: Transport + 'static,
    S: ContentSniffer + 'static,
{
    /// Build `size` workers, each with its own transport and sniffer.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by `make_transport`.
    pub fn build<E>(
        size: usize,
        read_wait: Duration,
        mut make_transport: impl FnMut() -> Result<T, E>,
        mut make_sniffer: impl FnMut() -> S,
    ) -> Result<Self, E> {
        let workers = (0..size)
            .map(|id| Ok(Worker::new(id, make_transport()?, make_sniffer(), read_wait)))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self { workers })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Run every worker against `gateway` and wait until all have stopped.
    ///
    /// Returns the total number of requests handled.
    pub async fn run<G: Gateway + 'static>(self, gateway: G, shutdown: CancellationToken) -> usize {
        let gateway = Arc::new(Mutex::new(gateway));
        let mut tasks = JoinSet::new();

        info!(workers = self.workers.len(), "starting workers");
        for worker in self.workers {
            tasks.spawn(worker.run(Arc::clone(&gateway), shutdown.clone()));
        }

        let mut handled = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(count) => handled += count,
                Err(e) => error!(error = %e, "worker task failed"),
            }
        }
        info!(handled, "all workers stopped");
        handled
    }
}
