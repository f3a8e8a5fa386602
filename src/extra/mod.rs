//! Extra-field registry (spec.md C2): typed records for the known
//! PKWARE/third-party extra-field header ids, dispatched by a tagged
//! variant rather than the dynamic-dispatch-per-class pattern some ZIP
//! implementations use (see DESIGN.md).

mod misc;
mod ntfs;
mod timestamp;
mod unix;
mod zip64;

pub use misc::{
    AsiUnixField, ApkAlignmentField, UnicodePathField, WinZipAesField, WINZIP_AES_DATA_SIZE,
    WINZIP_AES_VENDOR_ID,
};
pub use ntfs::NtfsExtraField;
pub use timestamp::ExtendedTimestampField;
pub use unix::{NewUnixField, OldUnixField};
pub use zip64::{Zip64ExtraField, Zip64Hint};

use crate::bytes::{read_u16_le, write_u16_le};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::io::Cursor;

pub const ID_ZIP64: u16 = 0x0001;
pub const ID_NTFS: u16 = 0x000A;
pub const ID_EXTENDED_TIMESTAMP: u16 = 0x5455;
pub const ID_OLD_UNIX: u16 = 0x5855;
pub const ID_NEW_UNIX: u16 = 0x7875;
pub const ID_ASI_UNIX: u16 = 0x756E;
pub const ID_UNICODE_PATH: u16 = 0x7075;
pub const ID_JAR_MARKER: u16 = 0xCAFE;
pub const ID_APK_ALIGNMENT: u16 = 0xD935;
pub const ID_WINZIP_AES: u16 = 0x9901;

/// Every extra-field header id known to PKWARE APPNOTE or widely-used
/// third-party tooling. Only the ids above get a typed record; the rest
/// round-trip as [`ExtraField::Opaque`]. Kept for documentation and so a
/// future typed record is easy to slot in without touching callers.
pub const KNOWN_HEADER_IDS: [u16; 58] = [
    ID_ZIP64, 0x0007, 0x0008, 0x0009, ID_NTFS, 0x000c, 0x000d, 0x000e, 0x000f, 0x0014, 0x0015,
    0x0016, 0x0017, 0x0018, 0x0019, 0x0020, 0x0021, 0x0022, 0x0023, 0x0065, 0x0066, 0x4690,
    0x07c8, 0x1986, 0x2605, 0x2705, 0x2805, 0x334d, 0x4154, 0x4341, 0x4453, 0x4704, 0x470f,
    0x4854, 0x4b46, 0x4c41, 0x4d49, 0x4d63, 0x4f4c, 0x5356, 0x554e, ID_OLD_UNIX, 0x6375, 0x6542,
    0x6854, ID_UNICODE_PATH, 0x7441, ID_ASI_UNIX, 0x7855, ID_NEW_UNIX, ID_APK_ALIGNMENT, 0xa220,
    ID_JAR_MARKER, 0xe57a, 0xfd4a, ID_WINZIP_AES, 0x9902, 0xa11e,
];

/// One parsed extra-field record, keyed by its header id in the owning
/// [`indexmap::IndexMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    Zip64(Zip64ExtraField),
    Ntfs(NtfsExtraField),
    ExtendedTimestamp(ExtendedTimestampField),
    OldUnix(OldUnixField),
    NewUnix(NewUnixField),
    Asi(AsiUnixField),
    UnicodePath(UnicodePathField),
    Jar,
    ApkAlignment(ApkAlignmentField),
    WinZipAes(WinZipAesField),
    Opaque { id: u16, data: Vec<u8> },
}

impl ExtraField {
    pub fn header_id(&self) -> u16 {
        match self {
            ExtraField::Zip64(_) => ID_ZIP64,
            ExtraField::Ntfs(_) => ID_NTFS,
            ExtraField::ExtendedTimestamp(_) => ID_EXTENDED_TIMESTAMP,
            ExtraField::OldUnix(_) => ID_OLD_UNIX,
            ExtraField::NewUnix(_) => ID_NEW_UNIX,
            ExtraField::Asi(_) => ID_ASI_UNIX,
            ExtraField::UnicodePath(_) => ID_UNICODE_PATH,
            ExtraField::Jar => ID_JAR_MARKER,
            ExtraField::ApkAlignment(_) => ID_APK_ALIGNMENT,
            ExtraField::WinZipAes(_) => ID_WINZIP_AES,
            ExtraField::Opaque { id, .. } => *id,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            ExtraField::Zip64(f) => f.serialize(),
            ExtraField::Ntfs(f) => f.serialize(),
            ExtraField::ExtendedTimestamp(f) => f.serialize(),
            ExtraField::OldUnix(f) => f.serialize(),
            ExtraField::NewUnix(f) => f.serialize(),
            ExtraField::Asi(f) => f.serialize(),
            ExtraField::UnicodePath(f) => f.serialize(),
            ExtraField::Jar => Vec::new(),
            ExtraField::ApkAlignment(f) => f.serialize(),
            ExtraField::WinZipAes(f) => f.serialize(),
            ExtraField::Opaque { data, .. } => data.clone(),
        }
    }

    pub fn as_zip64(&self) -> Option<&Zip64ExtraField> {
        match self {
            ExtraField::Zip64(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_winzip_aes(&self) -> Option<&WinZipAesField> {
        match self {
            ExtraField::WinZipAes(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_unicode_path(&self) -> Option<&UnicodePathField> {
        match self {
            ExtraField::UnicodePath(f) => Some(f),
            _ => None,
        }
    }
}

/// Context needed to parse the handful of extra fields whose layout
/// depends on the surrounding header rather than being self-describing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseHint {
    pub zip64: Zip64Hint,
}

/// Parse a concatenated run of `(id, len, data)` extra-field records,
/// preserving insertion order. Unknown ids become [`ExtraField::Opaque`].
pub fn parse(bytes: &[u8], hint: ParseHint) -> Result<IndexMap<u16, ExtraField>> {
    let mut out = IndexMap::new();
    let mut cur = Cursor::new(bytes);
    loop {
        let pos = cur.position() as usize;
        if pos + 4 > bytes.len() {
            break;
        }
        let id = read_u16_le(&mut cur)?;
        let len = read_u16_le(&mut cur)? as usize;
        let start = cur.position() as usize;
        if start + len > bytes.len() {
            return Err(Error::corrupt("extra field length exceeds buffer"));
        }
        let data = &bytes[start..start + len];
        let field = decode_one(id, data, hint)?;
        out.insert(id, field);
        cur.set_position((start + len) as u64);
    }
    Ok(out)
}

fn decode_one(id: u16, data: &[u8], hint: ParseHint) -> Result<ExtraField> {
    let field = match id {
        ID_ZIP64 if hint.zip64.any() => {
            ExtraField::Zip64(Zip64ExtraField::parse(data, hint.zip64)?)
        }
        ID_NTFS => match NtfsExtraField::parse(data)? {
            Some(f) => ExtraField::Ntfs(f),
            None => ExtraField::Opaque {
                id,
                data: data.to_vec(),
            },
        },
        ID_EXTENDED_TIMESTAMP => ExtraField::ExtendedTimestamp(ExtendedTimestampField::parse(data)?),
        ID_OLD_UNIX => match OldUnixField::parse(data)? {
            Some(f) => ExtraField::OldUnix(f),
            None => ExtraField::Opaque {
                id,
                data: data.to_vec(),
            },
        },
        ID_NEW_UNIX => match NewUnixField::parse(data)? {
            Some(f) => ExtraField::NewUnix(f),
            None => ExtraField::Opaque {
                id,
                data: data.to_vec(),
            },
        },
        ID_ASI_UNIX => match AsiUnixField::parse(data)? {
            Some(f) => ExtraField::Asi(f),
            None => ExtraField::Opaque {
                id,
                data: data.to_vec(),
            },
        },
        ID_UNICODE_PATH => match UnicodePathField::parse(data)? {
            Some(f) => ExtraField::UnicodePath(f),
            None => ExtraField::Opaque {
                id,
                data: data.to_vec(),
            },
        },
        ID_JAR_MARKER => ExtraField::Jar,
        ID_APK_ALIGNMENT => match ApkAlignmentField::parse(data)? {
            Some(f) => ExtraField::ApkAlignment(f),
            None => ExtraField::Opaque {
                id,
                data: data.to_vec(),
            },
        },
        ID_WINZIP_AES => match WinZipAesField::parse(data)? {
            Some(f) => ExtraField::WinZipAes(f),
            None => ExtraField::Opaque {
                id,
                data: data.to_vec(),
            },
        },
        _ => ExtraField::Opaque {
            id,
            data: data.to_vec(),
        },
    };
    Ok(field)
}

/// Serialize an ordered extra-field map back into its concatenated wire
/// form, preserving insertion order.
pub fn serialize(fields: &IndexMap<u16, ExtraField>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for field in fields.values() {
        let payload = field.serialize();
        if payload.len() > u16::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "extra field 0x{:04x} payload too large",
                field.header_id()
            )));
        }
        write_u16_le(&mut buf, field.header_id())?;
        write_u16_le(&mut buf, payload.len() as u16)?;
        buf.extend_from_slice(&payload);
    }
    if buf.len() > u16::MAX as usize {
        return Err(Error::InvalidArgument(
            "combined extra field length exceeds 0xFFFF".to_string(),
        ));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serialize_roundtrip_preserves_order() {
        let mut fields: IndexMap<u16, ExtraField> = IndexMap::new();
        fields.insert(ID_JAR_MARKER, ExtraField::Jar);
        fields.insert(
            ID_EXTENDED_TIMESTAMP,
            ExtraField::ExtendedTimestamp(ExtendedTimestampField {
                mtime: Some(1000),
                atime: None,
                ctime: None,
            }),
        );
        let bytes = serialize(&fields).unwrap();
        let parsed = parse(&bytes, ParseHint::default()).unwrap();
        assert_eq!(parsed.keys().collect::<Vec<_>>(), fields.keys().collect::<Vec<_>>());
        assert_eq!(parsed, fields);
    }

    #[test]
    fn unknown_id_round_trips_opaque() {
        let mut fields: IndexMap<u16, ExtraField> = IndexMap::new();
        fields.insert(
            0x9999,
            ExtraField::Opaque {
                id: 0x9999,
                data: vec![1, 2, 3],
            },
        );
        let bytes = serialize(&fields).unwrap();
        let parsed = parse(&bytes, ParseHint::default()).unwrap();
        assert_eq!(parsed, fields);
    }

    #[test]
    fn zip64_requires_hint_to_decode() {
        let zf = Zip64ExtraField {
            offset: Some(99),
            ..Default::default()
        };
        let mut buf = Vec::new();
        write_u16_le(&mut buf, ID_ZIP64).unwrap();
        let payload = zf.serialize();
        write_u16_le(&mut buf, payload.len() as u16).unwrap();
        buf.extend_from_slice(&payload);

        // Without a hint, the field can't be interpreted and stays opaque.
        let parsed = parse(&buf, ParseHint::default()).unwrap();
        assert!(matches!(parsed[&ID_ZIP64], ExtraField::Opaque { .. }));

        let hint = ParseHint {
            zip64: Zip64Hint {
                offset: true,
                ..Default::default()
            },
        };
        let parsed = parse(&buf, hint).unwrap();
        assert_eq!(parsed[&ID_ZIP64].as_zip64().unwrap().offset, Some(99));
    }
}
