//! Single-entry extraction from a streamed archive.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::archive::{ArchiveReader, DecodeError, EntryHeader, EntryKind};
use crate::gateway::ResponseSink;
use crate::io::{BlockSource, StreamingBridge, TransferError, Transport};
use crate::sniff::ContentSniffer;

/// Bytes requested from the decoder per read.
const READ_CHUNK: usize = 64 * 1024;

/// Most that is reserved ahead of data actually decoded. Declared sizes
/// come from the remote archive and only bound the read.
const INITIAL_CAPACITY: usize = 1024 * 1024;

/// Outcome of a lookup that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The entry was found and the response has been written.
    Found { content_type: String, length: usize },
    /// The archive ended without an entry of that path.
    NotFound,
}

/// Failures that abort an extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("cannot allocate {size} bytes for entry {path}")]
    Allocation { path: String, size: u64 },

    #[error("failed to write response: {0}")]
    Response(#[source] io::Error),
}

/// Extracts one entry out of a remote archive.
///
/// Borrowed from the worker that owns the transport and the sniffer; one
/// extraction runs at a time per worker.
pub struct EntryExtractor<'a> {
    transport: &'a dyn Transport,
    sniffer: &'a dyn ContentSniffer,
    read_wait: Duration,
    shutdown: CancellationToken,
}

impl<'a> EntryExtractor<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        sniffer: &'a dyn ContentSniffer,
        read_wait: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            sniffer,
            read_wait,
            shutdown,
        }
    }

    /// Stream the archive at `url` and answer with the entry at `entry_path`.
    ///
    /// The download buffer and the transfer live only for this call and are
    /// released whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be fetched or decoded, or if
    /// the response cannot be written. Nothing has been written to `sink`
    /// unless the error is [`ExtractError::Response`].
    pub async fn extract(
        &self,
        url: &str,
        entry_path: &str,
        sink: &mut dyn ResponseSink,
    ) -> Result<Extraction, ExtractError> {
        let mut bridge =
            StreamingBridge::new(self.transport, url, self.read_wait, self.shutdown.clone());

        let outcome = match bridge.open().await {
            Ok(()) => extract_from(&mut bridge, entry_path, self.sniffer, sink).await,
            Err(e) => Err(e.into()),
        };
        bridge.close();
        outcome
    }
}

/// Walk the archive in `source` and answer with the first entry whose path
/// equals `entry_path`.
pub async fn extract_from<S: BlockSource>(
    source: S,
    entry_path: &str,
    sniffer: &dyn ContentSniffer,
    sink: &mut dyn ResponseSink,
) -> Result<Extraction, ExtractError> {
    let mut reader = ArchiveReader::open(source).await?;
    debug!(format = reader.format_name(), "archive opened");

    while let Some(entry) = reader.next_entry().await? {
        debug!(entry = %entry.path, size = ?entry.size, "entry");
        if entry.path != entry_path {
            continue;
        }
        if entry.kind != EntryKind::File {
            debug!(entry = %entry.path, kind = ?entry.kind, "skipping non-file match");
            continue;
        }

        let body = read_entry(&mut reader, &entry).await?;
        let content_type = sniffer.sniff(&body);
        debug!(entry = %entry.path, %content_type, length = body.len(), "extracted");

        let head = format!(
            "Content-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        sink.write_all(head.as_bytes())
            .await
            .map_err(ExtractError::Response)?;
        if !body.is_empty() {
            sink.write_all(&body).await.map_err(ExtractError::Response)?;
        }

        return Ok(Extraction::Found {
            content_type,
            length: body.len(),
        });
    }

    Ok(Extraction::NotFound)
}

async fn read_entry<S: BlockSource>(
    reader: &mut ArchiveReader<S>,
    entry: &EntryHeader,
) -> Result<Vec<u8>, ExtractError> {
    let allocation = |size: u64| ExtractError::Allocation {
        path: entry.path.clone(),
        size,
    };

    let limit = match entry.size {
        Some(0) => return Ok(Vec::new()),
        Some(declared) => Some(usize::try_from(declared).map_err(|_| allocation(declared))?),
        None => None,
    };

    let mut body = Vec::new();
    let initial = limit.map_or(READ_CHUNK, |size| size.min(INITIAL_CAPACITY));
    body.try_reserve_exact(initial)
        .map_err(|_| allocation(initial as u64))?;

    loop {
        let want = match limit {
            Some(size) => (size - body.len()).min(READ_CHUNK),
            None => READ_CHUNK,
        };
        if want == 0 {
            break;
        }

        let start = body.len();
        body.try_reserve(want)
            .map_err(|_| allocation((start + want) as u64))?;
        body.resize(start + want, 0);
        let n = reader.read_data(&mut body[start..]).await?;
        body.truncate(start + n);
        if n == 0 {
            break;
        }
    }

    if let Some(size) = limit
        && body.len() < size
    {
        debug!(
            entry = %entry.path,
            expected = size,
            extracted = body.len(),
            "entry shorter than declared"
        );
    }
    Ok(body)
}
