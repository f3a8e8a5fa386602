//! ZIP64 Extended Information extra field (header id 0x0001).
//!
//! Layout is variable: only the fields whose 32-bit counterpart in the
//! fixed header was the 0xFFFFFFFF sentinel are present, in the fixed
//! order uncompressed-size, compressed-size, local-header-offset,
//! disk-start-number. Because the set of present fields depends on the
//! surrounding header, parsing this field takes an explicit hint
//! instead of being self-describing like the other extra fields.

use crate::bytes::{read_u32_le, read_u64_le, write_u64_le};
use std::io::Cursor;

/// Which of the ZIP64 fields are present in a given occurrence of this
/// extra field, derived from which 32-bit header fields were sentinels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zip64Hint {
    pub uncompressed_size: bool,
    pub compressed_size: bool,
    pub offset: bool,
    pub disk_start: bool,
}

impl Zip64Hint {
    pub fn any(&self) -> bool {
        self.uncompressed_size || self.compressed_size || self.offset || self.disk_start
    }

    pub fn from_header_fields(
        uncompressed_size_32: u32,
        compressed_size_32: u32,
        offset_32: u32,
        disk_start_16: u16,
    ) -> Self {
        Zip64Hint {
            uncompressed_size: uncompressed_size_32 == crate::bytes::ZIP64_U32_SENTINEL,
            compressed_size: compressed_size_32 == crate::bytes::ZIP64_U32_SENTINEL,
            offset: offset_32 == crate::bytes::ZIP64_U32_SENTINEL,
            disk_start: disk_start_16 == 0xFFFF,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zip64ExtraField {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub offset: Option<u64>,
    pub disk_start: Option<u32>,
}

impl Zip64ExtraField {
    pub fn parse(data: &[u8], hint: Zip64Hint) -> std::io::Result<Self> {
        let mut cur = Cursor::new(data);
        let mut out = Zip64ExtraField::default();
        if hint.uncompressed_size && (cur.position() as usize) + 8 <= data.len() {
            out.uncompressed_size = Some(read_u64_le(&mut cur)?);
        }
        if hint.compressed_size && (cur.position() as usize) + 8 <= data.len() {
            out.compressed_size = Some(read_u64_le(&mut cur)?);
        }
        if hint.offset && (cur.position() as usize) + 8 <= data.len() {
            out.offset = Some(read_u64_le(&mut cur)?);
        }
        if hint.disk_start && (cur.position() as usize) + 4 <= data.len() {
            out.disk_start = Some(read_u32_le(&mut cur)?);
        }
        Ok(out)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(v) = self.uncompressed_size {
            write_u64_le(&mut buf, v).unwrap();
        }
        if let Some(v) = self.compressed_size {
            write_u64_le(&mut buf, v).unwrap();
        }
        if let Some(v) = self.offset {
            write_u64_le(&mut buf, v).unwrap();
        }
        if let Some(v) = self.disk_start {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    pub fn is_empty(&self) -> bool {
        self.uncompressed_size.is_none()
            && self.compressed_size.is_none()
            && self.offset.is_none()
            && self.disk_start.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_fields() {
        let hint = Zip64Hint {
            uncompressed_size: true,
            compressed_size: true,
            offset: true,
            disk_start: false,
        };
        let field = Zip64ExtraField {
            uncompressed_size: Some(5_000_000_000),
            compressed_size: Some(1_000_000_000),
            offset: Some(123_456_789_012),
            disk_start: None,
        };
        let bytes = field.serialize();
        let parsed = Zip64ExtraField::parse(&bytes, hint).unwrap();
        assert_eq!(parsed, field);
    }

    #[test]
    fn roundtrip_offset_only() {
        let hint = Zip64Hint {
            uncompressed_size: false,
            compressed_size: false,
            offset: true,
            disk_start: false,
        };
        let field = Zip64ExtraField {
            offset: Some(42),
            ..Default::default()
        };
        let bytes = field.serialize();
        assert_eq!(bytes.len(), 8);
        let parsed = Zip64ExtraField::parse(&bytes, hint).unwrap();
        assert_eq!(parsed, field);
    }
}
