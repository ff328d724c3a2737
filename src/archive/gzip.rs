//! gzip filter (RFC 1952) applied in front of a container format.
//!
//! Concatenated members decode as one stream, the way `gunzip` treats them.

use std::io::{self, Write};

use flate2::write::MultiGzDecoder;

use crate::io::BlockSource;

use super::DecodeError;

pub(crate) const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compressed bytes handed to the decoder per step, so one network block
/// cannot inflate into an unbounded burst of output.
const FEED_CHUNK: usize = 8 * 1024;

/// Incremental gunzip between a [`BlockSource`] and the decoder input.
pub(crate) struct GzipFilter {
    decoder: MultiGzDecoder<Vec<u8>>,
    raw: Vec<u8>,
    raw_pos: usize,
    raw_eof: bool,
    finished: bool,
}

impl GzipFilter {
    /// `raw` holds compressed bytes already read from the source.
    pub fn new(raw: Vec<u8>, raw_eof: bool) -> Self {
        Self {
            decoder: MultiGzDecoder::new(Vec::new()),
            raw,
            raw_pos: 0,
            raw_eof,
            finished: false,
        }
    }

    /// Append decompressed bytes to `out`. Returns false once the last
    /// member has ended and its trailer checked out.
    pub async fn decode_into<S: BlockSource>(
        &mut self,
        source: &mut S,
        out: &mut Vec<u8>,
    ) -> Result<bool, DecodeError> {
        loop {
            if self.raw_pos < self.raw.len() {
                let end = (self.raw_pos + FEED_CHUNK).min(self.raw.len());
                self.decoder
                    .write_all(&self.raw[self.raw_pos..end])
                    .map_err(corrupt)?;
                self.decoder.flush().map_err(corrupt)?;
                self.raw_pos = end;
                if self.drain(out) {
                    return Ok(true);
                }
                continue;
            }

            if self.finished {
                return Ok(false);
            }

            if !self.raw_eof {
                let block = source.read_block().await?;
                if !block.is_empty() {
                    self.raw.clear();
                    self.raw_pos = 0;
                    self.raw.extend_from_slice(block);
                    continue;
                }
                self.raw_eof = true;
            }

            self.decoder.try_finish().map_err(corrupt)?;
            self.finished = true;
            return Ok(self.drain(out));
        }
    }

    fn drain(&mut self, out: &mut Vec<u8>) -> bool {
        let decoded = self.decoder.get_mut();
        if decoded.is_empty() {
            return false;
        }
        out.append(decoded);
        true
    }
}

fn corrupt(e: io::Error) -> DecodeError {
    DecodeError::Corrupt(format!("gzip stream: {e}"))
}
