//! Smaller extra fields that don't warrant their own module: ASI Unix,
//! Info-ZIP Unicode Path, the JAR marker, Android APK alignment, and
//! WinZip AES parameters.

use crate::bytes::{read_u16_le, read_u32_le, write_u16_le, write_u32_le};
use std::io::Cursor;

/// ASI Unix extra field (0x756E): mode/dev/uid/gid/symlink target, with a
/// CRC32 of the payload for integrity (not authentication).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsiUnixField {
    pub mode: u16,
    pub dev: u32,
    pub uid: u32,
    pub gid: u32,
    pub link_target: Vec<u8>,
}

impl AsiUnixField {
    pub fn parse(data: &[u8]) -> std::io::Result<Option<Self>> {
        if data.len() < 14 {
            return Ok(None);
        }
        let mut cur = Cursor::new(data);
        let _crc = read_u32_le(&mut cur)?;
        let mode = read_u16_le(&mut cur)?;
        let dev = read_u32_le(&mut cur)?;
        let uid = read_u32_le(&mut cur)?;
        let gid = read_u32_le(&mut cur)?;
        let link_target = data[14..].to_vec();
        Ok(Some(AsiUnixField {
            mode,
            dev,
            uid,
            gid,
            link_target,
        }))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(10 + self.link_target.len());
        write_u16_le(&mut payload, self.mode).unwrap();
        write_u32_le(&mut payload, self.dev).unwrap();
        write_u32_le(&mut payload, self.uid).unwrap();
        write_u32_le(&mut payload, self.gid).unwrap();
        payload.extend_from_slice(&self.link_target);
        let crc = crc32fast::hash(&payload);
        let mut buf = Vec::with_capacity(4 + payload.len());
        write_u32_le(&mut buf, crc).unwrap();
        buf.extend_from_slice(&payload);
        buf
    }
}

/// Info-ZIP Unicode Path extra field (0x7075): UTF-8 rendition of the
/// name, authenticated by a CRC32 of the legacy (header) name bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodePathField {
    pub name_crc32: u32,
    pub name: String,
}

impl UnicodePathField {
    pub fn parse(data: &[u8]) -> std::io::Result<Option<Self>> {
        if data.len() < 5 {
            return Ok(None);
        }
        let version = data[0];
        if version != 1 {
            return Ok(None);
        }
        let mut cur = Cursor::new(&data[1..5]);
        let name_crc32 = read_u32_le(&mut cur)?;
        let name = String::from_utf8_lossy(&data[5..]).into_owned();
        Ok(Some(UnicodePathField { name_crc32, name }))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(5 + self.name.len());
        buf.push(1); // version
        write_u32_le(&mut buf, self.name_crc32).unwrap();
        buf.extend_from_slice(self.name.as_bytes());
        buf
    }

    /// Whether this Unicode name is authoritative for `legacy_name` (its
    /// CRC matches), per spec.md 4.2/4.6: consumers only trust it when so.
    pub fn matches(&self, legacy_name: &[u8]) -> bool {
        crc32fast::hash(legacy_name) == self.name_crc32
    }

    pub fn for_name(legacy_name: &[u8], utf8_name: &str) -> Self {
        UnicodePathField {
            name_crc32: crc32fast::hash(legacy_name),
            name: utf8_name.to_string(),
        }
    }
}

/// Android APK alignment extra field (0xD935): alignment multiple plus
/// padding bytes so the *data* that follows the local header lands on
/// that boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApkAlignmentField {
    pub alignment: u16,
    pub padding: Vec<u8>,
}

impl ApkAlignmentField {
    pub fn parse(data: &[u8]) -> std::io::Result<Option<Self>> {
        if data.len() < 2 {
            return Ok(None);
        }
        let mut cur = Cursor::new(&data[0..2]);
        let alignment = read_u16_le(&mut cur)?;
        let padding = data[2..].to_vec();
        Ok(Some(ApkAlignmentField {
            alignment,
            padding,
        }))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + self.padding.len());
        write_u16_le(&mut buf, self.alignment).unwrap();
        buf.extend_from_slice(&self.padding);
        buf
    }
}

/// WinZip AES extra field (0x9901): fixed 7-byte payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinZipAesField {
    /// 1 = AE-1 (CRC kept), 2 = AE-2 (CRC zeroed).
    pub version: u16,
    /// Always `0x4541` ("AE").
    pub vendor_id: u16,
    /// 1 = AES-128, 2 = AES-192, 3 = AES-256.
    pub strength: u8,
    /// The compression method that was in effect before encryption replaced it.
    pub actual_method: u16,
}

pub const WINZIP_AES_VENDOR_ID: u16 = 0x4541;
pub const WINZIP_AES_DATA_SIZE: usize = 7;

impl WinZipAesField {
    pub fn parse(data: &[u8]) -> std::io::Result<Option<Self>> {
        if data.len() < WINZIP_AES_DATA_SIZE {
            return Ok(None);
        }
        let mut cur = Cursor::new(data);
        let version = read_u16_le(&mut cur)?;
        let vendor_id = read_u16_le(&mut cur)?;
        let strength = data[4];
        let mut cur2 = Cursor::new(&data[5..7]);
        let actual_method = read_u16_le(&mut cur2)?;
        Ok(Some(WinZipAesField {
            version,
            vendor_id,
            strength,
            actual_method,
        }))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(WINZIP_AES_DATA_SIZE);
        write_u16_le(&mut buf, self.version).unwrap();
        write_u16_le(&mut buf, self.vendor_id).unwrap();
        buf.push(self.strength);
        write_u16_le(&mut buf, self.actual_method).unwrap();
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asi_roundtrip() {
        let f = AsiUnixField {
            mode: 0o100644,
            dev: 0,
            uid: 1000,
            gid: 1000,
            link_target: Vec::new(),
        };
        let bytes = f.serialize();
        assert_eq!(AsiUnixField::parse(&bytes).unwrap().unwrap(), f);
    }

    #[test]
    fn unicode_path_match() {
        let legacy = b"caf\xe9.txt";
        let f = UnicodePathField::for_name(legacy, "café.txt");
        assert!(f.matches(legacy));
        assert!(!f.matches(b"other.txt"));
    }

    #[test]
    fn apk_alignment_roundtrip() {
        let f = ApkAlignmentField {
            alignment: 4,
            padding: vec![0, 0, 0],
        };
        let bytes = f.serialize();
        assert_eq!(ApkAlignmentField::parse(&bytes).unwrap().unwrap(), f);
    }

    #[test]
    fn winzip_aes_roundtrip() {
        let f = WinZipAesField {
            version: 2,
            vendor_id: WINZIP_AES_VENDOR_ID,
            strength: 3,
            actual_method: 8,
        };
        let bytes = f.serialize();
        assert_eq!(bytes.len(), WINZIP_AES_DATA_SIZE);
        assert_eq!(WinZipAesField::parse(&bytes).unwrap().unwrap(), f);
    }
}
