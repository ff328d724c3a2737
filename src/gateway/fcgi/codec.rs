//! FastCGI record and name-value pair encoding.

use std::io::{self, Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

pub const FCGI_VERSION_1: u8 = 1;

pub const FCGI_BEGIN_REQUEST: u8 = 1;
pub const FCGI_ABORT_REQUEST: u8 = 2;
pub const FCGI_END_REQUEST: u8 = 3;
pub const FCGI_PARAMS: u8 = 4;
pub const FCGI_STDIN: u8 = 5;
pub const FCGI_STDOUT: u8 = 6;
pub const FCGI_GET_VALUES: u8 = 9;
pub const FCGI_GET_VALUES_RESULT: u8 = 10;
pub const FCGI_UNKNOWN_TYPE: u8 = 11;

pub const FCGI_NULL_REQUEST_ID: u16 = 0;
pub const FCGI_RESPONDER: u16 = 1;

pub const FCGI_REQUEST_COMPLETE: u8 = 0;
pub const FCGI_UNKNOWN_ROLE: u8 = 3;

pub const FCGI_MAX_CONNS: &str = "FCGI_MAX_CONNS";
pub const FCGI_MAX_REQS: &str = "FCGI_MAX_REQS";
pub const FCGI_MPXS_CONNS: &str = "FCGI_MPXS_CONNS";

/// Largest content a single record can carry.
pub const MAX_CONTENT_LENGTH: usize = u16::MAX as usize;

pub(crate) const HEADER_SIZE: usize = 8;

/// Fixed 8-byte header in front of every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub version: u8,
    pub record_type: u8,
    pub request_id: u16,
    pub content_length: u16,
    pub padding_length: u8,
}

impl RecordHeader {
    pub fn from_bytes(data: &[u8; HEADER_SIZE]) -> io::Result<Self> {
        let mut cursor = Cursor::new(&data[..]);
        let header = Self {
            version: cursor.read_u8()?,
            record_type: cursor.read_u8()?,
            request_id: cursor.read_u16::<BigEndian>()?,
            content_length: cursor.read_u16::<BigEndian>()?,
            padding_length: cursor.read_u8()?,
        };
        Ok(header)
    }
}

/// One decoded record.
#[derive(Debug, Clone)]
pub struct Record {
    pub header: RecordHeader,
    pub content: Vec<u8>,
}

/// Frame `content` as a record, padded to a multiple of eight bytes.
pub fn encode_record(record_type: u8, request_id: u16, content: &[u8]) -> Vec<u8> {
    debug_assert!(content.len() <= MAX_CONTENT_LENGTH);
    let padding = (8 - content.len() % 8) % 8;

    let mut record = Vec::with_capacity(HEADER_SIZE + content.len() + padding);
    record.push(FCGI_VERSION_1);
    record.push(record_type);
    record.extend_from_slice(&request_id.to_be_bytes());
    record.extend_from_slice(&(content.len() as u16).to_be_bytes());
    record.push(padding as u8);
    record.push(0);
    record.extend_from_slice(content);
    record.resize(record.len() + padding, 0);
    record
}

/// Role requested by a `BEGIN_REQUEST` body.
pub fn begin_request_role(content: &[u8]) -> io::Result<u16> {
    Cursor::new(content).read_u16::<BigEndian>()
}

pub fn end_request_body(protocol_status: u8) -> Vec<u8> {
    let mut body = Vec::with_capacity(8);
    // Infallible on a Vec
    let _ = body.write_u32::<BigEndian>(0);
    body.push(protocol_status);
    body.extend_from_slice(&[0; 3]);
    body
}

/// Answer a `GET_VALUES` query: one request per connection, no multiplexing.
///
/// Unknown names are left out of the result.
pub fn get_values_result(query: &[u8]) -> io::Result<Vec<u8>> {
    let names = decode_params(query)?;
    let answers = names.iter().filter_map(|(name, _)| {
        let value = match name.as_str() {
            FCGI_MAX_CONNS | FCGI_MAX_REQS => "1",
            FCGI_MPXS_CONNS => "0",
            _ => return None,
        };
        Some((name.as_str(), value))
    });
    Ok(encode_params(answers))
}

fn read_length(cursor: &mut Cursor<&[u8]>) -> io::Result<usize> {
    let first = cursor.read_u8()?;
    if first & 0x80 == 0 {
        return Ok(first as usize);
    }
    let rest = cursor.read_u24::<BigEndian>()?;
    Ok((((first & 0x7f) as usize) << 24) | rest as usize)
}

/// Decode a `PARAMS` stream into name-value pairs.
pub fn decode_params(data: &[u8]) -> io::Result<Vec<(String, String)>> {
    let mut cursor = Cursor::new(data);
    let mut pairs = Vec::new();

    while (cursor.position() as usize) < data.len() {
        let name_len = read_length(&mut cursor)?;
        let value_len = read_length(&mut cursor)?;
        let left = data.len() - cursor.position() as usize;
        if name_len.saturating_add(value_len) > left {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "name-value pair overruns the PARAMS stream",
            ));
        }

        let mut name = vec![0u8; name_len];
        cursor.read_exact(&mut name)?;
        let mut value = vec![0u8; value_len];
        cursor.read_exact(&mut value)?;

        pairs.push((
            String::from_utf8_lossy(&name).into_owned(),
            String::from_utf8_lossy(&value).into_owned(),
        ));
    }

    Ok(pairs)
}

/// Encode name-value pairs the way a web server sends them.
pub fn encode_params<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<u8> {
    fn push_length(out: &mut Vec<u8>, len: usize) {
        if len < 0x80 {
            out.push(len as u8);
        } else {
            out.extend_from_slice(&(len as u32 | 0x8000_0000).to_be_bytes());
        }
    }

    let mut out = Vec::new();
    for (name, value) in pairs {
        push_length(&mut out, name.len());
        push_length(&mut out, value.len());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(value.as_bytes());
    }
    out
}
