//! Shared fixtures for integration tests: archive builders, in-memory
//! transports and exchanges, and a minimal FastCGI client.

#![allow(dead_code)]

#[path = "../../src/archive/testing/builders.rs"]
mod builders;

pub use builders::{ZipBuilder, gzip, tar};

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use zip_streamer::gateway::fcgi::{
    FCGI_BEGIN_REQUEST, FCGI_END_REQUEST, FCGI_PARAMS, FCGI_RESPONDER, FCGI_STDIN, FCGI_STDOUT,
    encode_params, encode_record, read_record,
};
use zip_streamer::gateway::{HOST_URI, REQUEST_URI};
use zip_streamer::io::Transfer;
use zip_streamer::{Exchange, GatewayRequest, ResponseSink, TransferError, Transport};

/// Serves one fixed archive in small chunks and keeps count of transfers.
#[derive(Clone)]
pub struct MemoryTransport {
    archive: Bytes,
    chunk: usize,
    pub starts: Arc<AtomicUsize>,
    pub live: Arc<AtomicUsize>,
}

impl MemoryTransport {
    pub fn new(archive: Vec<u8>, chunk: usize) -> Self {
        Self {
            archive: Bytes::from(archive),
            chunk,
            starts: Arc::default(),
            live: Arc::default(),
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn start(&self, _url: &str) -> Result<Box<dyn Transfer>, TransferError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTransfer {
            data: self.archive.clone(),
            chunk: self.chunk,
            live: Arc::clone(&self.live),
        }))
    }
}

struct MemoryTransfer {
    data: Bytes,
    chunk: usize,
    live: Arc<AtomicUsize>,
}

#[async_trait]
impl Transfer for MemoryTransfer {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransferError> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let n = self.chunk.min(self.data.len());
        Ok(Some(self.data.split_to(n)))
    }
}

impl Drop for MemoryTransfer {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Exchange that records everything written to it.
pub struct RecordingExchange {
    request: GatewayRequest,
    pub output: Vec<u8>,
    pub finished: bool,
}

impl RecordingExchange {
    pub fn new(request_uri: &str, host_uri: &str) -> Self {
        Self {
            request: [(REQUEST_URI, request_uri), (HOST_URI, host_uri)]
                .into_iter()
                .collect(),
            output: Vec::new(),
            finished: false,
        }
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

#[async_trait]
impl ResponseSink for RecordingExchange {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }
}

#[async_trait]
impl Exchange for RecordingExchange {
    fn request(&self) -> &GatewayRequest {
        &self.request
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// What a web server sees after one FastCGI round trip.
pub struct FcgiResponse {
    pub stdout: Vec<u8>,
    pub end_request: Option<Vec<u8>>,
}

/// Send one responder request and read the reply until the server closes.
pub async fn fcgi_request(addr: SocketAddr, params: &[(&str, &str)]) -> FcgiResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut begin = FCGI_RESPONDER.to_be_bytes().to_vec();
    begin.extend_from_slice(&[0; 6]);
    let mut out = encode_record(FCGI_BEGIN_REQUEST, 1, &begin);
    out.extend(encode_record(FCGI_PARAMS, 1, &encode_params(params.iter().copied())));
    out.extend(encode_record(FCGI_PARAMS, 1, &[]));
    out.extend(encode_record(FCGI_STDIN, 1, &[]));
    stream.write_all(&out).await.unwrap();

    let mut response = FcgiResponse {
        stdout: Vec::new(),
        end_request: None,
    };
    while let Some(record) = read_record(&mut stream).await.unwrap() {
        match record.header.record_type {
            FCGI_STDOUT => response.stdout.extend(record.content),
            FCGI_END_REQUEST => response.end_request = Some(record.content),
            other => panic!("unexpected record type {other}"),
        }
    }
    response
}
