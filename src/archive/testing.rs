//! Test fixtures for the archive decoders.

mod builders;

pub use builders::*;

use async_trait::async_trait;

use crate::io::{BlockSource, TransferError};

/// Serves a byte string in fixed-size blocks.
pub struct ChunkedSource {
    data: Vec<u8>,
    chunk: usize,
    pos: usize,
}

impl ChunkedSource {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self { data, chunk, pos: 0 }
    }
}

#[async_trait]
impl BlockSource for ChunkedSource {
    async fn read_block(&mut self) -> Result<&[u8], TransferError> {
        let start = self.pos;
        let end = (start + self.chunk).min(self.data.len());
        self.pos = end;
        Ok(&self.data[start..end])
    }
}
