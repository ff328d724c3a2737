use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::archive::DecodeError;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Signatures that end the run of local entries
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const EOCD_SIGNATURE: &[u8] = b"PK\x05\x06";
pub const ZIP64_EOCD_SIGNATURE: &[u8] = b"PK\x06\x06";
pub const DIGITAL_SIGNATURE: &[u8] = b"PK\x05\x05";

/// Optional signature in front of a data descriptor
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";

/// General purpose flag bits
pub const FLAG_ENCRYPTED: u16 = 0x0001;
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// ZIP64 extended information extra field
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Fixed part of a local file header.
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < LFH_SIZE || &data[0..4] != LFH_SIGNATURE {
            return Err(DecodeError::Corrupt("invalid local file header".into()));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: CompressionMethod::from_u16(cursor.read_u16::<LittleEndian>()?),
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()? as u64,
            uncompressed_size: cursor.read_u32::<LittleEndian>()? as u64,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Apply the ZIP64 extra field, if present, to the 32-bit sizes.
    ///
    /// In a local header the ZIP64 record holds the uncompressed size then
    /// the compressed size, each only when the 32-bit field is saturated.
    /// Returns true when a ZIP64 record was found.
    pub fn apply_zip64_extra(&mut self, extra: &[u8]) -> Result<bool, DecodeError> {
        let mut cursor = Cursor::new(extra);
        let end = extra.len() as u64;

        while cursor.position() + 4 <= end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()? as u64;
            let field_end = cursor.position() + field_size;

            if header_id == ZIP64_EXTRA_ID {
                if self.uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    self.uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if self.compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    self.compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                return Ok(true);
            }

            // Skip unknown extra fields
            cursor.set_position(field_end);
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(flags: u16, method: u16, csize: u32, usize_: u32) -> Vec<u8> {
        let mut data = LFH_SIGNATURE.to_vec();
        data.extend_from_slice(&20u16.to_le_bytes());
        data.extend_from_slice(&flags.to_le_bytes());
        data.extend_from_slice(&method.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0xdeadbeefu32.to_le_bytes());
        data.extend_from_slice(&csize.to_le_bytes());
        data.extend_from_slice(&usize_.to_le_bytes());
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_local_header() {
        let lfh = LocalFileHeader::from_bytes(&header_bytes(FLAG_DATA_DESCRIPTOR, 8, 10, 20)).unwrap();
        assert_eq!(lfh.compression_method, CompressionMethod::Deflate);
        assert_eq!(lfh.crc32, 0xdeadbeef);
        assert_eq!(lfh.compressed_size, 10);
        assert_eq!(lfh.uncompressed_size, 20);
        assert_eq!(lfh.file_name_length, 5);
        assert!(lfh.has_data_descriptor());
        assert!(!lfh.is_encrypted());
    }

    #[test]
    fn test_rejects_wrong_signature() {
        let mut data = header_bytes(0, 0, 0, 0);
        data[2] = 1;
        assert!(LocalFileHeader::from_bytes(&data).is_err());
    }

    #[test]
    fn test_zip64_extra_overrides_saturated_sizes() {
        let mut lfh =
            LocalFileHeader::from_bytes(&header_bytes(0, 0, 0xFFFFFFFF, 0xFFFFFFFF)).unwrap();

        let mut extra = Vec::new();
        // An unrelated field first
        extra.extend_from_slice(&0x5455u16.to_le_bytes());
        extra.extend_from_slice(&1u16.to_le_bytes());
        extra.push(0);
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&16u16.to_le_bytes());
        extra.extend_from_slice(&(5u64 << 32).to_le_bytes());
        extra.extend_from_slice(&(3u64 << 32).to_le_bytes());

        assert!(lfh.apply_zip64_extra(&extra).unwrap());
        assert_eq!(lfh.uncompressed_size, 5u64 << 32);
        assert_eq!(lfh.compressed_size, 3u64 << 32);
    }

    #[test]
    fn test_method_round_trip_of_unknown() {
        assert_eq!(CompressionMethod::from_u16(14), CompressionMethod::Unknown(14));
        assert_eq!(CompressionMethod::Unknown(14).as_u16(), 14);
    }
}
