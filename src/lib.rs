//! # zip-streamer
//!
//! A FastCGI responder that answers `/<archive-id>/<entry-path>` requests
//! with a single file taken out of a remote archive.
//!
//! The archive is downloaded over HTTP and decoded while it streams in; the
//! download stops as soon as the requested entry has been read. Nothing is
//! written to disk and no archive is held in memory beyond what the decoder
//! has not consumed yet.
//!
//! ## Features
//!
//! - ZIP (stored, deflate, data descriptors, ZIP64), TAR and TAR+gzip
//! - Content type detection from the entry's magic bytes
//! - A fixed pool of workers sharing one FastCGI listener
//! - Graceful shutdown on SIGTERM or Ctrl-C
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use zip_streamer::{FcgiGateway, HttpTransport, MagicSniffer, Shutdown, WorkerPool};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = FcgiGateway::bind("127.0.0.1:9000", Duration::from_secs(30)).await?;
//!     let shutdown = Shutdown::new();
//!
//!     let pool = WorkerPool::build(
//!         4,
//!         Duration::from_secs(10),
//!         || HttpTransport::new(Duration::from_secs(30)),
//!         MagicSniffer::new,
//!     )?;
//!
//!     tokio::spawn(shutdown.clone().listen_for_signals());
//!     pool.run(gateway, shutdown.token()).await;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod extractor;
pub mod gateway;
pub mod io;
pub mod server;
pub mod sniff;
pub mod zip;

pub use archive::{ArchiveReader, DecodeError, EntryHeader, EntryKind};
pub use cli::Cli;
pub use config::{Config, ConfigError};
pub use extractor::{EntryExtractor, ExtractError, Extraction};
pub use gateway::{Exchange, FcgiGateway, Gateway, GatewayRequest, ResponseSink};
pub use io::{DownloadBuffer, HttpTransport, StreamingBridge, TransferError, Transport};
pub use server::{Shutdown, Worker, WorkerPool};
pub use sniff::{ContentSniffer, MagicSniffer};
