//! NTFS extra field (header id 0x000A): mtime/atime/ctime as Windows
//! FILETIME values, exact to 100ns.

use crate::bytes::{filetime_to_unix, read_u16_le, read_u32_le, read_u64_le, unix_to_filetime};
use std::io::{self, Cursor, Write};

const TAG_TIMESTAMPS: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtfsExtraField {
    pub mtime: i64,
    pub atime: i64,
    pub ctime: i64,
}

impl NtfsExtraField {
    pub fn parse(data: &[u8]) -> io::Result<Option<Self>> {
        let mut cur = Cursor::new(data);
        if data.len() < 4 {
            return Ok(None);
        }
        let _reserved = read_u32_le(&mut cur)?;
        while (cur.position() as usize) + 4 <= data.len() {
            let tag = read_u16_le(&mut cur)?;
            let size = read_u16_le(&mut cur)? as usize;
            let start = cur.position() as usize;
            if start + size > data.len() {
                break;
            }
            if tag == TAG_TIMESTAMPS && size >= 24 {
                let mtime = read_u64_le(&mut cur)?;
                let atime = read_u64_le(&mut cur)?;
                let ctime = read_u64_le(&mut cur)?;
                return Ok(Some(NtfsExtraField {
                    mtime: filetime_to_unix(mtime),
                    atime: filetime_to_unix(atime),
                    ctime: filetime_to_unix(ctime),
                }));
            }
            cur.set_position((start + size) as u64);
        }
        Ok(None)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&0u32.to_le_bytes()); // reserved
        buf.extend_from_slice(&TAG_TIMESTAMPS.to_le_bytes());
        buf.extend_from_slice(&24u16.to_le_bytes());
        let _ = buf.write_all(&unix_to_filetime(self.mtime).to_le_bytes());
        let _ = buf.write_all(&unix_to_filetime(self.atime).to_le_bytes());
        let _ = buf.write_all(&unix_to_filetime(self.ctime).to_le_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let f = NtfsExtraField {
            mtime: 1_700_000_000,
            atime: 1_700_000_100,
            ctime: 1_600_000_000,
        };
        let bytes = f.serialize();
        let parsed = NtfsExtraField::parse(&bytes).unwrap().unwrap();
        assert_eq!(parsed, f);
    }
}
