//! ZIP archive parsing for streamed input.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures and signatures of ZIP records
//! - [`parser`]: Streaming walk over local file headers and entry data
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Since the archive arrives as a stream, this implementation only reads
//! the local file headers and stops at the Central Directory. Entries are
//! therefore seen in the order they were written.
//!
//! ## Supported Features
//!
//! - STORED (no compression) and DEFLATE compression methods
//! - Data descriptors (general purpose flag bit 3)
//! - ZIP64 sizes in local headers
//! - CRC-32 verification of every fully read entry
//!
//! ## Limitations
//!
//! - No encryption support
//! - No BZIP2, LZMA, or other compression methods
//! - Stored entries whose sizes only appear in a data descriptor

mod parser;
mod structures;

pub use parser::ZipParser;
pub use structures::*;
