//! Streaming ZIP archive parser.
//!
//! Walks the local file headers of a ZIP archive front to back, as the
//! bytes arrive, without ever looking at the central directory.
//!
//! ## Parsing Strategy
//!
//! Every entry is laid out as:
//! 1. Local File Header (30 bytes) + file name + extra field
//! 2. Entry data, stored or deflate-compressed
//! 3. An optional data descriptor, when flag bit 3 is set
//!
//! The first central directory header (or the EOCD, for an empty archive)
//! ends the walk. When an entry defers its sizes to the data descriptor,
//! a deflate stream still finds its own end; stored entries of that kind
//! cannot be delimited without the central directory and are rejected.

use byteorder::{ByteOrder, LittleEndian};
use flate2::{Decompress, FlushDecompress, Status};
use tracing::trace;

use crate::archive::input::Input;
use crate::archive::{DecodeError, EntryHeader, EntryKind};
use crate::io::BlockSource;

use super::structures::*;

const SKIP_CHUNK: usize = 16 * 1024;

/// Decoding state of the entry most recently returned by `next_entry`.
struct EntryState {
    name: String,
    method: CompressionMethod,
    encrypted: bool,
    descriptor: bool,
    zip64: bool,
    expected_crc: u32,
    /// Compressed bytes left, when the local header recorded them.
    remaining: Option<u64>,
    inflater: Option<Decompress>,
    hasher: crc32fast::Hasher,
    /// Set once the data (and any descriptor) has been consumed.
    done: bool,
}

/// Streaming parser over the local entries of a ZIP archive.
pub struct ZipParser {
    current: Option<EntryState>,
    finished: bool,
}

impl Default for ZipParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipParser {
    pub fn new() -> Self {
        Self {
            current: None,
            finished: false,
        }
    }

    /// Skip the rest of the current entry and parse the next local header.
    ///
    /// # Returns
    ///
    /// The next entry header, or `None` once the central directory (or the
    /// end of the stream) is reached.
    ///
    /// # Errors
    ///
    /// Returns an error on truncated or malformed headers, or when the
    /// current entry cannot be skipped.
    pub(crate) async fn next_entry<S: BlockSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<Option<EntryHeader>, DecodeError> {
        self.skip_current(input).await?;
        self.current = None;
        if self.finished {
            return Ok(None);
        }

        if !input.fill(4).await? {
            if input.available().is_empty() {
                self.finished = true;
                return Ok(None);
            }
            return Err(DecodeError::Truncated("zip signature"));
        }

        let signature = &input.available()[..4];
        if signature != LFH_SIGNATURE {
            if [CDFH_SIGNATURE, EOCD_SIGNATURE, ZIP64_EOCD_SIGNATURE, DIGITAL_SIGNATURE]
                .contains(&signature)
            {
                self.finished = true;
                return Ok(None);
            }
            return Err(DecodeError::Corrupt(format!(
                "unexpected zip record signature {signature:02x?}"
            )));
        }

        let header_bytes = input.take(LFH_SIZE, "local file header").await?;
        let mut lfh = LocalFileHeader::from_bytes(&header_bytes)?;
        let name_bytes = input
            .take(lfh.file_name_length as usize, "file name")
            .await?;
        let extra = input
            .take(lfh.extra_field_length as usize, "extra field")
            .await?;

        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let name = String::from_utf8_lossy(&name_bytes).into_owned();
        let zip64 = lfh.apply_zip64_extra(&extra)?;
        let descriptor = lfh.has_data_descriptor();

        trace!(
            name = %name,
            method = lfh.compression_method.as_u16(),
            flags = lfh.flags,
            compressed = lfh.compressed_size,
            uncompressed = lfh.uncompressed_size,
            "local file header"
        );

        // With a data descriptor the local sizes are usually left at zero.
        let deferred = descriptor && lfh.compressed_size == 0 && lfh.uncompressed_size == 0;
        let remaining = (!deferred).then_some(lfh.compressed_size);
        let size = (!deferred).then_some(lfh.uncompressed_size);

        let kind = if name.ends_with('/') {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        self.current = Some(EntryState {
            name: name.clone(),
            method: lfh.compression_method,
            encrypted: lfh.is_encrypted(),
            descriptor,
            zip64,
            expected_crc: lfh.crc32,
            remaining,
            inflater: None,
            hasher: crc32fast::Hasher::new(),
            done: false,
        });

        Ok(Some(EntryHeader {
            path: name,
            size,
            kind,
        }))
    }

    /// Read decompressed data of the current entry into `out`.
    ///
    /// Returns 0 once the entry is exhausted. The CRC-32 is checked as soon
    /// as the last byte has been produced.
    pub(crate) async fn read_data<S: BlockSource>(
        &mut self,
        input: &mut Input<S>,
        out: &mut [u8],
    ) -> Result<usize, DecodeError> {
        let Some(state) = self.current.as_mut() else {
            return Ok(0);
        };
        if state.done || out.is_empty() {
            return Ok(0);
        }
        if state.encrypted {
            return Err(DecodeError::Unsupported(format!(
                "encrypted entry {}",
                state.name
            )));
        }

        let (n, exhausted) = match state.method {
            CompressionMethod::Stored => read_stored(state, input, out).await?,
            CompressionMethod::Deflate => read_deflate(state, input, out).await?,
            CompressionMethod::Unknown(method) => {
                return Err(DecodeError::Unsupported(format!(
                    "compression method {method} for {}",
                    state.name
                )));
            }
        };

        state.hasher.update(&out[..n]);
        if exhausted {
            finish_entry(state, input, true).await?;
        }
        Ok(n)
    }

    async fn skip_current<S: BlockSource>(&mut self, input: &mut Input<S>) -> Result<(), DecodeError> {
        let Some(state) = self.current.as_mut() else {
            return Ok(());
        };
        if state.done {
            return Ok(());
        }

        // Known compressed size: discard the raw bytes without inflating.
        if let Some(remaining) = state.remaining {
            input.skip(remaining, "entry data").await?;
            state.remaining = Some(0);
            return finish_entry(state, input, false).await;
        }

        let mut scratch = vec![0u8; SKIP_CHUNK];
        while self.read_data(input, &mut scratch).await? > 0 {}
        Ok(())
    }
}

async fn read_stored<S: BlockSource>(
    state: &mut EntryState,
    input: &mut Input<S>,
    out: &mut [u8],
) -> Result<(usize, bool), DecodeError> {
    let Some(remaining) = state.remaining else {
        return Err(DecodeError::Unsupported(format!(
            "stored entry {} without recorded size",
            state.name
        )));
    };
    if remaining == 0 {
        return Ok((0, true));
    }

    if input.available().is_empty() && !input.fill(1).await? {
        return Err(DecodeError::Truncated("entry data"));
    }
    let n = (remaining.min(out.len() as u64) as usize).min(input.available().len());
    out[..n].copy_from_slice(&input.available()[..n]);
    input.consume(n);

    let left = remaining - n as u64;
    state.remaining = Some(left);
    Ok((n, left == 0))
}

async fn read_deflate<S: BlockSource>(
    state: &mut EntryState,
    input: &mut Input<S>,
    out: &mut [u8],
) -> Result<(usize, bool), DecodeError> {
    let inflater = state
        .inflater
        .get_or_insert_with(|| Decompress::new(false));

    loop {
        if input.available().is_empty() && !input.fill(1).await? {
            return Err(DecodeError::Truncated("deflate stream"));
        }

        let available = input.available();
        let limit = match state.remaining {
            Some(remaining) => remaining.min(available.len() as u64) as usize,
            None => available.len(),
        };
        if limit == 0 {
            return Err(DecodeError::Corrupt(format!(
                "deflate stream of {} overruns its compressed size",
                state.name
            )));
        }

        let before_in = inflater.total_in();
        let before_out = inflater.total_out();
        let status = inflater.decompress(&available[..limit], out, FlushDecompress::None)?;
        let consumed = (inflater.total_in() - before_in) as usize;
        let produced = (inflater.total_out() - before_out) as usize;

        input.consume(consumed);
        if let Some(remaining) = state.remaining.as_mut() {
            *remaining -= consumed as u64;
        }

        if status == Status::StreamEnd {
            return Ok((produced, true));
        }
        if produced > 0 {
            return Ok((produced, false));
        }
        if consumed == 0 {
            return Err(DecodeError::Corrupt(format!(
                "deflate stream of {} made no progress",
                state.name
            )));
        }
    }
}

/// Consume whatever follows the entry data and check the CRC-32.
async fn finish_entry<S: BlockSource>(
    state: &mut EntryState,
    input: &mut Input<S>,
    verify: bool,
) -> Result<(), DecodeError> {
    if let Some(remaining) = state.remaining.filter(|&r| r > 0) {
        input.skip(remaining, "entry data").await?;
        state.remaining = Some(0);
    }

    let mut expected = state.expected_crc;
    if state.descriptor {
        if input.fill(4).await? && input.available().starts_with(DATA_DESCRIPTOR_SIGNATURE) {
            input.consume(4);
        }
        let sizes = if state.zip64 { 16 } else { 8 };
        let descriptor = input.take(4 + sizes, "data descriptor").await?;
        expected = LittleEndian::read_u32(&descriptor[0..4]);
    }
    state.done = true;

    if verify {
        let actual = state.hasher.clone().finalize();
        if actual != expected {
            return Err(DecodeError::Checksum {
                name: state.name.clone(),
                expected,
                actual,
            });
        }
    }
    Ok(())
}
