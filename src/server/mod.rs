//! Request serving: routing, workers and their lifecycle.
//!
//! A [`WorkerPool`] runs a fixed number of [`Worker`]s. Each worker takes
//! turns at the shared gateway, routes the claimed request with
//! [`dispatch::route`] and answers it through the
//! [`EntryExtractor`](crate::extractor::EntryExtractor). [`Shutdown`] owns
//! the termination flag that ends the accept loops.

pub mod dispatch;
mod pool;
mod shutdown;
mod worker;

pub use dispatch::{RequestError, RequestTarget, Route};
pub use pool::WorkerPool;
pub use shutdown::Shutdown;
pub use worker::{Outcome, Worker, WorkerState};
