//! Info-ZIP Unix extra fields: "old" (0x5855) and "new" (0x7875).

use crate::bytes::{read_u32_le, write_u32_le};
use std::io::Cursor;

/// Info-ZIP "old" Unix extra field (0x5855): atime, mtime, optional uid/gid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OldUnixField {
    pub atime: u32,
    pub mtime: u32,
    pub uid: Option<u16>,
    pub gid: Option<u16>,
}

impl OldUnixField {
    pub fn parse(data: &[u8]) -> std::io::Result<Option<Self>> {
        if data.len() < 8 {
            return Ok(None);
        }
        let mut cur = Cursor::new(data);
        let atime = read_u32_le(&mut cur)?;
        let mtime = read_u32_le(&mut cur)?;
        let (uid, gid) = if data.len() >= 12 {
            let mut c2 = Cursor::new(&data[8..]);
            let uid = crate::bytes::read_u16_le(&mut c2)?;
            let gid = crate::bytes::read_u16_le(&mut c2)?;
            (Some(uid), Some(gid))
        } else {
            (None, None)
        };
        Ok(Some(OldUnixField {
            atime,
            mtime,
            uid,
            gid,
        }))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12);
        write_u32_le(&mut buf, self.atime).unwrap();
        write_u32_le(&mut buf, self.mtime).unwrap();
        if let (Some(uid), Some(gid)) = (self.uid, self.gid) {
            buf.extend_from_slice(&uid.to_le_bytes());
            buf.extend_from_slice(&gid.to_le_bytes());
        }
        buf
    }
}

/// Info-ZIP "new" Unix extra field (0x7875): variable-width uid/gid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUnixField {
    pub version: u8,
    pub uid: Vec<u8>,
    pub gid: Vec<u8>,
}

impl NewUnixField {
    pub fn parse(data: &[u8]) -> std::io::Result<Option<Self>> {
        if data.len() < 3 {
            return Ok(None);
        }
        let version = data[0];
        let uid_size = data[1] as usize;
        let mut pos = 2;
        if pos + uid_size > data.len() {
            return Ok(None);
        }
        let uid = data[pos..pos + uid_size].to_vec();
        pos += uid_size;
        if pos >= data.len() {
            return Ok(None);
        }
        let gid_size = data[pos] as usize;
        pos += 1;
        if pos + gid_size > data.len() {
            return Ok(None);
        }
        let gid = data[pos..pos + gid_size].to_vec();
        Ok(Some(NewUnixField {
            version,
            uid,
            gid,
        }))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + self.uid.len() + self.gid.len());
        buf.push(self.version);
        buf.push(self.uid.len() as u8);
        buf.extend_from_slice(&self.uid);
        buf.push(self.gid.len() as u8);
        buf.extend_from_slice(&self.gid);
        buf
    }

    pub fn from_ids(uid: u32, gid: u32) -> Self {
        NewUnixField {
            version: 1,
            uid: uid.to_le_bytes().to_vec(),
            gid: gid.to_le_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_unix_roundtrip() {
        let f = OldUnixField {
            atime: 1,
            mtime: 2,
            uid: Some(1000),
            gid: Some(1000),
        };
        let bytes = f.serialize();
        assert_eq!(OldUnixField::parse(&bytes).unwrap().unwrap(), f);
    }

    #[test]
    fn new_unix_roundtrip() {
        let f = NewUnixField::from_ids(1000, 1000);
        let bytes = f.serialize();
        assert_eq!(NewUnixField::parse(&bytes).unwrap().unwrap(), f);
    }
}
