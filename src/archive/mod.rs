//! Streaming archive decoding.
//!
//! [`ArchiveReader`] walks an archive front to back while its bytes are
//! still arriving. It never seeks: entries are discovered from their local
//! headers in container order, and the data of entries nobody asked for is
//! skipped as it streams past.
//!
//! ## Supported containers
//!
//! - ZIP: stored and deflate entries, data descriptors, ZIP64 sizes
//! - TAR: ustar, GNU long names, pax path overrides
//! - gzip filter in front of TAR
//!
//! The reader pulls its input from any [`BlockSource`], which in production
//! is the [`StreamingBridge`](crate::io::StreamingBridge).

mod gzip;
pub(crate) mod input;
mod tar;
#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

use crate::io::{BlockSource, TransferError};
use crate::zip::{EOCD_SIGNATURE, LFH_SIGNATURE, ZipParser};

use gzip::GZIP_MAGIC;
use input::Input;
use tar::{TAR_BLOCK_SIZE, TarParser};

/// Errors raised while decoding an archive stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized archive format")]
    UnrecognizedFormat,

    #[error("archive truncated while reading {0}")]
    Truncated(&'static str),

    #[error("corrupt archive: {0}")]
    Corrupt(String),

    #[error("unsupported archive feature: {0}")]
    Unsupported(String),

    #[error("checksum mismatch for {name}: expected {expected:08x}, computed {actual:08x}")]
    Checksum {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("decompression failed: {0}")]
    Inflate(#[from] flate2::DecompressError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What kind of item an entry header describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

/// Header of one archive entry, as yielded by [`ArchiveReader::next_entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub path: String,
    /// Uncompressed size, or `None` when the container only records it
    /// after the entry data.
    pub size: Option<u64>,
    pub kind: EntryKind,
}

enum Format {
    Zip(ZipParser),
    Tar(TarParser),
}

/// Pull-based reader over a streamed archive.
pub struct ArchiveReader<S> {
    input: Input<S>,
    format: Format,
    filtered: bool,
}

impl<S: BlockSource> ArchiveReader<S> {
    /// Negotiate the container format from the first bytes of `source`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnrecognizedFormat`] when the stream is none of
    /// the supported containers, or any error raised by the source.
    pub async fn open(source: S) -> Result<Self, DecodeError> {
        let mut input = Input::new(source);

        input.fill(4).await?;
        let head = input.available();
        if head.starts_with(LFH_SIGNATURE) || head.starts_with(EOCD_SIGNATURE) {
            return Ok(Self {
                input,
                format: Format::Zip(ZipParser::new()),
                filtered: false,
            });
        }

        let filtered = head.starts_with(&GZIP_MAGIC);
        if filtered {
            input.enable_gzip();
        }

        input.fill(TAR_BLOCK_SIZE).await?;
        if tar::looks_like_tar(input.available()) {
            return Ok(Self {
                input,
                format: Format::Tar(TarParser::new()),
                filtered,
            });
        }

        Err(DecodeError::UnrecognizedFormat)
    }

    /// Short name of the negotiated format, for diagnostics.
    pub fn format_name(&self) -> &'static str {
        match (&self.format, self.filtered) {
            (Format::Zip(_), _) => "zip",
            (Format::Tar(_), false) => "tar",
            (Format::Tar(_), true) => "tar.gz",
        }
    }

    /// Advance to the next entry, skipping whatever is left of the current one.
    ///
    /// Returns `None` at the end of the archive.
    pub async fn next_entry(&mut self) -> Result<Option<EntryHeader>, DecodeError> {
        match &mut self.format {
            Format::Zip(parser) => parser.next_entry(&mut self.input).await,
            Format::Tar(parser) => parser.next_entry(&mut self.input).await,
        }
    }

    /// Read decoded bytes of the current entry. Returns 0 at the end of it.
    pub async fn read_data(&mut self, out: &mut [u8]) -> Result<usize, DecodeError> {
        match &mut self.format {
            Format::Zip(parser) => parser.read_data(&mut self.input, out).await,
            Format::Tar(parser) => parser.read_data(&mut self.input, out).await,
        }
    }
}
