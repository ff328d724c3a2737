//! Process-wide termination.

use std::io;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Owner of the termination flag shared by every worker.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle on the flag; cancelled once shutdown starts.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for SIGTERM or Ctrl-C, then raise the flag.
    ///
    /// Returns early, without raising anything, if shutdown was triggered by
    /// other means.
    pub async fn listen_for_signals(self) -> io::Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut term_signal = signal(SignalKind::terminate())?;
            tokio::select! {
                _ = term_signal.recv() => info!("SIGTERM received, stopping workers"),
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("SIGINT received, stopping workers");
                }
                _ = self.token.cancelled() => return Ok(()),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("interrupt received, stopping workers");
                }
                _ = self.token.cancelled() => return Ok(()),
            }
        }

        self.trigger();
        Ok(())
    }
}
