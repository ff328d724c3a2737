//! Gateway protocol seam.
//!
//! Workers claim requests from a [`Gateway`] and answer through the
//! [`Exchange`] it hands back. Responses are CGI-style: header lines, a
//! blank line, then the body, all written through [`ResponseSink`].

pub mod fcgi;

use std::collections::HashMap;
use std::io;

use async_trait::async_trait;

pub use fcgi::FcgiGateway;

/// Path portion of the client's request.
pub const REQUEST_URI: &str = "REQUEST_URI";
/// Base URI that archive identifiers are resolved against.
pub const HOST_URI: &str = "HOST_URI";

/// Parameters of one gateway request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayRequest {
    params: HashMap<String, String>,
}

impl GatewayRequest {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self { params }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn request_uri(&self) -> Option<&str> {
        self.param(REQUEST_URI)
    }

    pub fn host_uri(&self) -> Option<&str> {
        self.param(HOST_URI)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for GatewayRequest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Output side of a gateway response.
#[async_trait]
pub trait ResponseSink: Send {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}

#[async_trait]
impl ResponseSink for Vec<u8> {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Write `Status` and `Content-type` lines for a failed request.
pub async fn write_failure(sink: &mut dyn ResponseSink, status: u16) -> io::Result<()> {
    sink.write_all(format!("Status: {status}\r\nContent-type: text/html\r\n\r\n").as_bytes())
        .await
}

/// One claimed request together with the means to answer it.
#[async_trait]
pub trait Exchange: ResponseSink {
    fn request(&self) -> &GatewayRequest;

    /// Complete the response. No more output may follow.
    async fn finish(&mut self) -> io::Result<()>;
}

/// Source of incoming requests, shared by every worker.
#[async_trait]
pub trait Gateway: Send + Sync {
    type Exchange: Exchange + 'static;

    /// Wait for the next complete request.
    ///
    /// Errors only when the gateway itself can no longer accept work; a
    /// misbehaving client is dealt with internally.
    async fn accept(&self) -> io::Result<Self::Exchange>;
}
