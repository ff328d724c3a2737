//! Streaming TAR walker.

use crate::io::BlockSource;

use super::input::Input;
use super::{DecodeError, EntryHeader, EntryKind};

pub(crate) const TAR_BLOCK_SIZE: usize = 512;

const NAME: std::ops::Range<usize> = 0..100;
const SIZE: std::ops::Range<usize> = 124..136;
const CHECKSUM: std::ops::Range<usize> = 148..156;
const TYPEFLAG: usize = 156;
const MAGIC: std::ops::Range<usize> = 257..262;
const PREFIX: std::ops::Range<usize> = 345..500;

/// Upper bound on GNU long-name and pax header bodies, which are buffered.
const MAX_METADATA_LEN: u64 = 1024 * 1024;

/// Whether `block` starts with a plausible tar header.
pub(crate) fn looks_like_tar(block: &[u8]) -> bool {
    if block.len() < TAR_BLOCK_SIZE {
        return false;
    }
    let header = &block[..TAR_BLOCK_SIZE];
    if header.iter().all(|&b| b == 0) {
        return false;
    }
    &header[MAGIC] == b"ustar" || checksum_matches(header)
}

fn checksum_matches(header: &[u8]) -> bool {
    let Ok(recorded) = parse_octal(&header[CHECKSUM]) else {
        return false;
    };
    let mut unsigned: u64 = 0;
    let mut signed: i64 = 0;
    for (i, &b) in header.iter().enumerate() {
        let b = if CHECKSUM.contains(&i) { b' ' } else { b };
        unsigned += b as u64;
        signed += b as i8 as i64;
    }
    recorded == unsigned || recorded as i64 == signed
}

fn parse_octal(field: &[u8]) -> Result<u64, DecodeError> {
    let digits = field
        .iter()
        .skip_while(|&&b| b == b' ' || b == 0)
        .take_while(|&&b| b != b' ' && b != 0);
    let mut value: u64 = 0;
    for &d in digits {
        if !(b'0'..=b'7').contains(&d) {
            return Err(DecodeError::Corrupt(format!(
                "invalid octal digit {:?} in tar header",
                d as char
            )));
        }
        value = value
            .checked_mul(8)
            .and_then(|v| v.checked_add((d - b'0') as u64))
            .ok_or_else(|| DecodeError::Corrupt("tar numeric field overflows".into()))?;
    }
    Ok(value)
}

/// Numeric field in either octal or GNU base-256 notation.
fn parse_numeric(field: &[u8]) -> Result<u64, DecodeError> {
    if field[0] & 0x80 == 0 {
        return parse_octal(field);
    }
    let mut value: u64 = (field[0] & 0x7f) as u64;
    for &b in &field[1..] {
        value = value
            .checked_mul(256)
            .and_then(|v| v.checked_add(b as u64))
            .ok_or_else(|| DecodeError::Corrupt("tar numeric field overflows".into()))?;
    }
    Ok(value)
}

fn c_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn padding_for(size: u64) -> u64 {
    let block = TAR_BLOCK_SIZE as u64;
    (block - size % block) % block
}

/// Bytes from the current position to the next header.
fn span(remaining: u64, padding: u64) -> Result<u64, DecodeError> {
    remaining
        .checked_add(padding)
        .ok_or_else(|| DecodeError::Corrupt(format!("tar entry of {remaining} bytes overflows")))
}

/// Length of a metadata body that is read into memory.
fn metadata_len(size: u64, what: &str) -> Result<usize, DecodeError> {
    if size > MAX_METADATA_LEN {
        return Err(DecodeError::Corrupt(format!("{what} of {size} bytes")));
    }
    Ok(size as usize)
}

/// Pull `path` out of a pax extended header body.
///
/// Records look like `"<len> <key>=<value>\n"` where `<len>` counts the
/// whole record.
fn pax_path(data: &[u8]) -> Option<String> {
    let mut rest = data;
    let mut path = None;
    while !rest.is_empty() {
        let space = rest.iter().position(|&b| b == b' ')?;
        let len: usize = std::str::from_utf8(&rest[..space]).ok()?.parse().ok()?;
        if len <= space || len > rest.len() {
            return path;
        }
        let record = &rest[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        if let Some(value) = record.strip_prefix(b"path=") {
            path = Some(String::from_utf8_lossy(value).into_owned());
        }
        rest = &rest[len..];
    }
    path
}

struct TarEntryState {
    remaining: u64,
    padding: u64,
}

/// Walks tar headers in stream order.
pub(crate) struct TarParser {
    current: Option<TarEntryState>,
    finished: bool,
}

impl TarParser {
    pub fn new() -> Self {
        Self {
            current: None,
            finished: false,
        }
    }

    pub async fn next_entry<S: BlockSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<Option<EntryHeader>, DecodeError> {
        if let Some(state) = self.current.take() {
            input
                .skip(span(state.remaining, state.padding)?, "tar entry data")
                .await?;
        }
        if self.finished {
            return Ok(None);
        }

        let mut long_name: Option<String> = None;
        let mut pax_name: Option<String> = None;

        loop {
            if !input.fill(TAR_BLOCK_SIZE).await? {
                if input.available().is_empty() {
                    self.finished = true;
                    return Ok(None);
                }
                return Err(DecodeError::Truncated("tar header"));
            }
            let header = input.take(TAR_BLOCK_SIZE, "tar header").await?;

            if header.iter().all(|&b| b == 0) {
                self.finished = true;
                return Ok(None);
            }
            if !checksum_matches(&header) {
                return Err(DecodeError::Corrupt("tar header checksum mismatch".into()));
            }

            let size = parse_numeric(&header[SIZE])?;
            let padding = padding_for(size);

            match header[TYPEFLAG] {
                b'L' => {
                    let len = metadata_len(size, "GNU long name")?;
                    let data = input.take(len, "GNU long name").await?;
                    input.skip(padding, "tar padding").await?;
                    long_name = Some(c_string(&data));
                    continue;
                }
                b'x' => {
                    let len = metadata_len(size, "pax header")?;
                    let data = input.take(len, "pax header").await?;
                    input.skip(padding, "tar padding").await?;
                    if let Some(path) = pax_path(&data) {
                        pax_name = Some(path);
                    }
                    continue;
                }
                b'g' => {
                    input.skip(span(size, padding)?, "pax global header").await?;
                    continue;
                }
                _ => {}
            }

            let path = match pax_name.take().or(long_name.take()) {
                Some(path) => path,
                None => {
                    let name = c_string(&header[NAME]);
                    let prefix = c_string(&header[PREFIX]);
                    if &header[MAGIC] == b"ustar" && !prefix.is_empty() {
                        format!("{prefix}/{name}")
                    } else {
                        name
                    }
                }
            };
            let kind = match header[TYPEFLAG] {
                b'0' | b'\0' | b'7' => EntryKind::File,
                b'5' => EntryKind::Directory,
                _ => EntryKind::Other,
            };

            self.current = Some(TarEntryState {
                remaining: size,
                padding,
            });
            return Ok(Some(EntryHeader {
                path,
                size: Some(size),
                kind,
            }));
        }
    }

    pub async fn read_data<S: BlockSource>(
        &mut self,
        input: &mut Input<S>,
        out: &mut [u8],
    ) -> Result<usize, DecodeError> {
        let Some(state) = self.current.as_mut() else {
            return Ok(0);
        };
        if state.remaining == 0 || out.is_empty() {
            return Ok(0);
        }

        if input.available().is_empty() && !input.fill(1).await? {
            return Err(DecodeError::Truncated("tar entry data"));
        }
        let n = (state.remaining.min(out.len() as u64) as usize).min(input.available().len());
        out[..n].copy_from_slice(&input.available()[..n]);
        input.consume(n);
        state.remaining -= n as u64;

        if state.remaining == 0 {
            input.skip(state.padding, "tar padding").await?;
            state.padding = 0;
        }
        Ok(n)
    }
}
