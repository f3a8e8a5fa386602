//! Info-ZIP Extended Timestamp extra field (header id 0x5455).
//!
//! The local copy may carry mtime/atime/ctime; by convention the central
//! copy carries only mtime (the flags byte still reflects what's present
//! in *this* occurrence of the field).

use crate::bytes::{read_u32_le, write_u32_le};
use std::io::Cursor;

const FLAG_MTIME: u8 = 0b001;
const FLAG_ATIME: u8 = 0b010;
const FLAG_CTIME: u8 = 0b100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtendedTimestampField {
    pub mtime: Option<i64>,
    pub atime: Option<i64>,
    pub ctime: Option<i64>,
}

impl ExtendedTimestampField {
    pub fn parse(data: &[u8]) -> std::io::Result<Self> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        let flags = data[0];
        let mut cur = Cursor::new(&data[1..]);
        let mut out = ExtendedTimestampField::default();
        if flags & FLAG_MTIME != 0 && cur.position() as usize + 4 <= cur.get_ref().len() {
            out.mtime = Some(read_u32_le(&mut cur)? as i64);
        }
        if flags & FLAG_ATIME != 0 && cur.position() as usize + 4 <= cur.get_ref().len() {
            out.atime = Some(read_u32_le(&mut cur)? as i64);
        }
        if flags & FLAG_CTIME != 0 && cur.position() as usize + 4 <= cur.get_ref().len() {
            out.ctime = Some(read_u32_le(&mut cur)? as i64);
        }
        Ok(out)
    }

    /// Serialize the fields present (for the local copy, everything set;
    /// for the central copy, callers typically only set `mtime`).
    pub fn serialize(&self) -> Vec<u8> {
        let mut flags = 0u8;
        if self.mtime.is_some() {
            flags |= FLAG_MTIME;
        }
        if self.atime.is_some() {
            flags |= FLAG_ATIME;
        }
        if self.ctime.is_some() {
            flags |= FLAG_CTIME;
        }
        let mut buf = vec![flags];
        if let Some(t) = self.mtime {
            write_u32_le(&mut buf, t as u32).unwrap();
        }
        if let Some(t) = self.atime {
            write_u32_le(&mut buf, t as u32).unwrap();
        }
        if let Some(t) = self.ctime {
            write_u32_le(&mut buf, t as u32).unwrap();
        }
        buf
    }

    /// The central-directory copy of this field (mtime only, per APPNOTE convention).
    pub fn central_only(&self) -> Self {
        ExtendedTimestampField {
            mtime: self.mtime,
            atime: None,
            ctime: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all() {
        let f = ExtendedTimestampField {
            mtime: Some(1000),
            atime: Some(2000),
            ctime: Some(3000),
        };
        let bytes = f.serialize();
        assert_eq!(ExtendedTimestampField::parse(&bytes).unwrap(), f);
    }

    #[test]
    fn central_copy_drops_atime_ctime() {
        let f = ExtendedTimestampField {
            mtime: Some(1000),
            atime: Some(2000),
            ctime: Some(3000),
        };
        let central = f.central_only();
        assert_eq!(central.atime, None);
        assert_eq!(central.ctime, None);
        assert_eq!(central.mtime, Some(1000));
    }
}
