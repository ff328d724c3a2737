//! FastCGI responder.
//!
//! Implements the subset of the FastCGI 1.0 protocol a web server needs to
//! hand requests to a responder: one request per connection, parameters
//! decoded from the `PARAMS` stream, request body discarded, response
//! written as `STDOUT` records and closed with `END_REQUEST`.
//!
//! ## Record layout
//!
//! ```text
//! version:u8  type:u8  request_id:u16  content_length:u16  padding:u8  reserved:u8
//! content[content_length]  padding[padding]
//! ```

mod codec;

pub use codec::*;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, trace, warn};

use super::{Exchange, Gateway, GatewayRequest, ResponseSink};

/// Read one record. Returns `None` on a clean end of stream between records.
pub async fn read_record<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Record>> {
    let mut raw = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut raw).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let header = RecordHeader::from_bytes(&raw)?;
    if header.version != FCGI_VERSION_1 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported FastCGI version {}", header.version),
        ));
    }

    let mut content = vec![0u8; header.content_length as usize];
    reader.read_exact(&mut content).await?;
    let mut padding = vec![0u8; header.padding_length as usize];
    reader.read_exact(&mut padding).await?;

    Ok(Some(Record { header, content }))
}

async fn write_record<W: AsyncWrite + Unpin>(
    writer: &mut W,
    record_type: u8,
    request_id: u16,
    content: &[u8],
) -> io::Result<()> {
    writer
        .write_all(&encode_record(record_type, request_id, content))
        .await
}

/// Read records until one responder request is complete.
///
/// Returns `None` if the peer closes or aborts before that.
async fn read_request(stream: &mut TcpStream) -> io::Result<Option<(u16, GatewayRequest)>> {
    let mut request_id: Option<u16> = None;
    let mut params = Vec::new();
    let mut params_done = false;

    loop {
        let Some(record) = read_record(stream).await? else {
            return Ok(None);
        };
        let header = record.header;
        trace!(
            record_type = header.record_type,
            request_id = header.request_id,
            len = header.content_length,
            "record"
        );

        if header.request_id == FCGI_NULL_REQUEST_ID {
            if header.record_type == FCGI_GET_VALUES {
                let result = get_values_result(&record.content)?;
                write_record(stream, FCGI_GET_VALUES_RESULT, FCGI_NULL_REQUEST_ID, &result).await?;
            } else {
                let mut body = [0u8; 8];
                body[0] = header.record_type;
                write_record(stream, FCGI_UNKNOWN_TYPE, FCGI_NULL_REQUEST_ID, &body).await?;
            }
            continue;
        }

        let current = request_id == Some(header.request_id);
        match header.record_type {
            FCGI_BEGIN_REQUEST => {
                let role = begin_request_role(&record.content)?;
                if role != FCGI_RESPONDER {
                    debug!(role, "rejecting non-responder role");
                    write_record(
                        stream,
                        FCGI_END_REQUEST,
                        header.request_id,
                        &end_request_body(FCGI_UNKNOWN_ROLE),
                    )
                    .await?;
                    continue;
                }
                request_id = Some(header.request_id);
                params.clear();
                params_done = false;
            }
            FCGI_ABORT_REQUEST if current => return Ok(None),
            FCGI_PARAMS if current => {
                if record.content.is_empty() {
                    params_done = true;
                } else {
                    params.extend_from_slice(&record.content);
                }
            }
            FCGI_STDIN if current => {
                if !record.content.is_empty() {
                    continue;
                }
                if !params_done {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "request body ended before parameters",
                    ));
                }
                let pairs = decode_params(&params)?;
                return Ok(Some((header.request_id, pairs.into_iter().collect())));
            }
            other => trace!(record_type = other, "ignoring record"),
        }
    }
}

/// FastCGI responder listening on a TCP socket.
pub struct FcgiGateway {
    listener: TcpListener,
    read_timeout: Duration,
}

impl FcgiGateway {
    pub async fn bind<A: ToSocketAddrs>(addr: A, read_timeout: Duration) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(listener, read_timeout))
    }

    pub fn from_listener(listener: TcpListener, read_timeout: Duration) -> Self {
        Self {
            listener,
            read_timeout,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[async_trait]
impl Gateway for FcgiGateway {
    type Exchange = FcgiExchange;

    async fn accept(&self) -> io::Result<FcgiExchange> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;

            match tokio::time::timeout(self.read_timeout, read_request(&mut stream)).await {
                Ok(Ok(Some((request_id, request)))) => {
                    return Ok(FcgiExchange {
                        stream: BufWriter::new(stream),
                        request_id,
                        request,
                        finished: false,
                    });
                }
                Ok(Ok(None)) => debug!(%peer, "connection ended before a complete request"),
                Ok(Err(e)) => warn!(%peer, error = %e, "malformed FastCGI request"),
                Err(_) => warn!(%peer, "timed out reading FastCGI request"),
            }
        }
    }
}

/// A claimed FastCGI request and its connection.
pub struct FcgiExchange {
    stream: BufWriter<TcpStream>,
    request_id: u16,
    request: GatewayRequest,
    finished: bool,
}

#[async_trait]
impl ResponseSink for FcgiExchange {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        // An empty STDOUT record would end the stream early.
        for chunk in bytes.chunks(MAX_CONTENT_LENGTH) {
            write_record(&mut self.stream, FCGI_STDOUT, self.request_id, chunk).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Exchange for FcgiExchange {
    fn request(&self) -> &GatewayRequest {
        &self.request
    }

    async fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        write_record(&mut self.stream, FCGI_STDOUT, self.request_id, &[]).await?;
        write_record(
            &mut self.stream,
            FCGI_END_REQUEST,
            self.request_id,
            &end_request_body(FCGI_REQUEST_COMPLETE),
        )
        .await?;
        self.stream.shutdown().await
    }
}
