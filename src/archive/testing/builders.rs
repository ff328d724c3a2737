//! In-memory archive builders.
//!
//! Depends on nothing but external crates so the integration tests can
//! share it with the unit tests.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::{DeflateEncoder, GzEncoder};

const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
const EOCD_SIGNATURE: &[u8] = b"PK\x05\x06";
const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// Assembles small ZIP archives in memory.
#[derive(Default)]
pub struct ZipBuilder {
    local: Vec<u8>,
    central: Vec<u8>,
    count: u16,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, 0, false, None)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, 8, false, None)
    }

    /// Deflated entry whose sizes and CRC follow the data in a descriptor.
    pub fn streamed(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, 8, true, None)
    }

    /// Entry whose headers record `declared` as the uncompressed size,
    /// whatever `data` actually holds.
    pub fn declaring(self, name: &str, data: &[u8], method: u16, declared: u32) -> Self {
        self.entry(name, data, method, false, Some(declared))
    }

    fn entry(
        mut self,
        name: &str,
        data: &[u8],
        method: u16,
        descriptor: bool,
        declared: Option<u32>,
    ) -> Self {
        let crc = crc32fast::hash(data);
        let body = if method == 8 { deflate(data) } else { data.to_vec() };
        let flags = if descriptor { FLAG_DATA_DESCRIPTOR } else { 0 };
        let offset = self.local.len() as u32;
        let csize = body.len() as u32;
        let size = declared.unwrap_or(data.len() as u32);

        let out = &mut self.local;
        out.extend_from_slice(LFH_SIGNATURE);
        out.write_u16::<LittleEndian>(20).unwrap();
        out.write_u16::<LittleEndian>(flags).unwrap();
        out.write_u16::<LittleEndian>(method).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        if descriptor {
            out.extend_from_slice(&[0u8; 12]);
        } else {
            out.write_u32::<LittleEndian>(crc).unwrap();
            out.write_u32::<LittleEndian>(csize).unwrap();
            out.write_u32::<LittleEndian>(size).unwrap();
        }
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&body);
        if descriptor {
            out.extend_from_slice(DATA_DESCRIPTOR_SIGNATURE);
            out.write_u32::<LittleEndian>(crc).unwrap();
            out.write_u32::<LittleEndian>(csize).unwrap();
            out.write_u32::<LittleEndian>(size).unwrap();
        }

        let cd = &mut self.central;
        cd.extend_from_slice(CDFH_SIGNATURE);
        cd.write_u16::<LittleEndian>(20).unwrap();
        cd.write_u16::<LittleEndian>(20).unwrap();
        cd.write_u16::<LittleEndian>(flags).unwrap();
        cd.write_u16::<LittleEndian>(method).unwrap();
        cd.write_u32::<LittleEndian>(0).unwrap();
        cd.write_u32::<LittleEndian>(crc).unwrap();
        cd.write_u32::<LittleEndian>(csize).unwrap();
        cd.write_u32::<LittleEndian>(size).unwrap();
        cd.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        cd.extend_from_slice(&[0u8; 12]);
        cd.write_u32::<LittleEndian>(offset).unwrap();
        cd.extend_from_slice(name.as_bytes());

        self.count += 1;
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = self.local;
        let cd_offset = out.len() as u32;
        out.extend_from_slice(&self.central);
        out.extend_from_slice(EOCD_SIGNATURE);
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(self.count).unwrap();
        out.write_u16::<LittleEndian>(self.count).unwrap();
        out.write_u32::<LittleEndian>(self.central.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// One ustar header block followed by the padded data.
pub fn tar_entry(name: &str, typeflag: u8, data: &[u8]) -> Vec<u8> {
    let mut header = [0u8; 512];
    header[..name.len()].copy_from_slice(name.as_bytes());
    header[100..108].copy_from_slice(b"0000644\0");
    header[108..116].copy_from_slice(b"0000000\0");
    header[116..124].copy_from_slice(b"0000000\0");
    header[124..136].copy_from_slice(format!("{:011o}\0", data.len()).as_bytes());
    header[136..148].copy_from_slice(b"00000000000\0");
    header[156] = typeflag;
    header[257..263].copy_from_slice(b"ustar\0");
    header[263..265].copy_from_slice(b"00");
    seal_tar_header(&mut header);

    let mut out = header.to_vec();
    out.extend_from_slice(data);
    out.resize(out.len().div_ceil(512) * 512, 0);
    out
}

/// Recompute the checksum of a 512-byte tar header after editing it.
pub fn seal_tar_header(header: &mut [u8]) {
    header[148..156].copy_from_slice(b"        ");
    let sum: u32 = header.iter().map(|&b| b as u32).sum();
    header[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());
}

/// A tar stream of regular files, closed by two zero blocks. Names longer
/// than 100 bytes get a GNU `L` record in front.
pub fn tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in entries {
        if name.len() > 100 {
            let mut long = name.as_bytes().to_vec();
            long.push(0);
            out.extend(tar_entry("././@LongLink", b'L', &long));
            out.extend(tar_entry(&name[..100], b'0', data));
        } else {
            out.extend(tar_entry(name, b'0', data));
        }
    }
    out.extend_from_slice(&[0u8; 1024]);
    out
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
