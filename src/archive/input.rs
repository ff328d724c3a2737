use crate::io::BlockSource;

use super::DecodeError;
use super::gzip::GzipFilter;

/// Consumed bytes are only compacted away past this many.
const COMPACT_THRESHOLD: usize = 64 * 1024;

/// Decoder-side read buffer over a [`BlockSource`].
///
/// Blocks pulled from the source are copied here so format parsers can ask
/// for exact byte counts regardless of how the network chunked them. An
/// optional gzip filter sits between the source and this buffer.
pub(crate) struct Input<S> {
    source: S,
    gzip: Option<GzipFilter>,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<S: BlockSource> Input<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            gzip: None,
            buf: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Decode everything from here on through gzip.
    ///
    /// Bytes already buffered become the start of the compressed stream.
    pub fn enable_gzip(&mut self) {
        let raw = self.buf.split_off(self.pos);
        self.buf.clear();
        self.pos = 0;
        self.gzip = Some(GzipFilter::new(raw, self.eof));
        self.eof = false;
    }

    pub fn available(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.buf.len() - self.pos);
        self.pos += n;
    }

    /// Make at least `need` bytes available. Returns false if the stream
    /// ends first, leaving whatever was left buffered.
    pub async fn fill(&mut self, need: usize) -> Result<bool, DecodeError> {
        while self.available().len() < need {
            if !self.fill_more().await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Take exactly `n` bytes.
    pub async fn take(&mut self, n: usize, what: &'static str) -> Result<Vec<u8>, DecodeError> {
        if !self.fill(n).await? {
            return Err(DecodeError::Truncated(what));
        }
        let bytes = self.available()[..n].to_vec();
        self.consume(n);
        Ok(bytes)
    }

    /// Discard exactly `n` bytes.
    pub async fn skip(&mut self, mut n: u64, what: &'static str) -> Result<(), DecodeError> {
        while n > 0 {
            if self.available().is_empty() && !self.fill_more().await? {
                return Err(DecodeError::Truncated(what));
            }
            let step = (self.available().len() as u64).min(n) as usize;
            self.consume(step);
            n -= step as u64;
        }
        Ok(())
    }

    async fn fill_more(&mut self) -> Result<bool, DecodeError> {
        if self.eof {
            return Ok(false);
        }
        self.compact();

        let grew = match self.gzip.as_mut() {
            Some(filter) => filter.decode_into(&mut self.source, &mut self.buf).await?,
            None => {
                let block = self.source.read_block().await?;
                self.buf.extend_from_slice(block);
                !block.is_empty()
            }
        };

        if !grew {
            self.eof = true;
        }
        Ok(grew)
    }

    fn compact(&mut self) {
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        } else if self.pos >= COMPACT_THRESHOLD {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }
}
