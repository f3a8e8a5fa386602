//! Archive reader (spec.md C7): locates the end-of-central-directory
//! record (with ZIP64 fallback and SFX preamble handling), parses the
//! central directory into a [`Container`], and streams individual entry
//! bodies through decrypt → decompress → CRC32 verification on demand.

use crate::bytes::{
    read_u16_le, read_u32_le, read_u64_le, ZIP64_U16_SENTINEL, ZIP64_U32_SENTINEL,
};
use crate::codec::{self, CompressionMethod};
use crate::container::Container;
use crate::crypto::{winzip_aes, zipcrypto, AesStrength, EncryptionMethod};
use crate::entry::{DataSource, Entry};
use crate::error::{Error, Result};
use crate::extra::{self, ExtraField, ParseHint, Zip64Hint, ID_WINZIP_AES};
use std::cell::RefCell;
use std::io::{Cursor, Read, Seek, SeekFrom};

const EOCD_FIXED_LEN: u64 = 22;
const MAX_COMMENT_LEN: u64 = 0xFFFF;
const ZIP64_LOCATOR_LEN: u64 = 20;

const SIG_EOCD_BYTES: [u8; 4] = crate::bytes::SIG_EOCD.to_le_bytes();

/// A seekable archive source plus the parsed container. Reads of
/// individual entry bodies go through the shared `source` handle
/// (spec.md 5): two reads never interleave because both borrow the
/// same `RefCell`.
pub struct Reader<R> {
    source: RefCell<R>,
    pub container: Container,
    /// Added to every local-header offset read from the central
    /// directory, to compensate for SFX preambles (spec.md 4.6 step 4).
    offset_adjustment: i64,
}

impl<R: Read + Seek> Reader<R> {
    /// Open an archive, parsing its central directory eagerly (entry
    /// bodies remain lazy).
    pub fn open(mut source: R) -> Result<Self> {
        let mut head = [0u8; 4];
        source.seek(SeekFrom::Start(0))?;
        let n = source.read(&mut head)?;
        if n == 4 {
            let sig = u32::from_le_bytes(head);
            if sig != crate::bytes::SIG_LOCAL_FILE_HEADER
                && sig != crate::bytes::SIG_EOCD
                && sig != crate::bytes::SIG_ZIP64_EOCD
            {
                return Err(Error::NotAZipFile);
            }
        } else {
            return Err(Error::NotAZipFile);
        }

        let file_len = source.seek(SeekFrom::End(0))?;
        let eocd_pos = match find_eocd(&mut source, file_len)? {
            Some(pos) => pos,
            None => {
                log::warn!("end of central directory not found; entering 0-entry recovery mode");
                let mut container = Container::new();
                container.snapshot_input();
                return Ok(Reader {
                    source: RefCell::new(source),
                    container,
                    offset_adjustment: 0,
                });
            }
        };

        source.seek(SeekFrom::Start(eocd_pos + 4))?;
        let disk_number = read_u16_le(&mut source)?;
        let cd_start_disk = read_u16_le(&mut source)?;
        let entries_on_disk = read_u16_le(&mut source)?;
        let total_entries_16 = read_u16_le(&mut source)?;
        let cd_size_32 = read_u32_le(&mut source)?;
        let cd_offset_32 = read_u32_le(&mut source)?;
        let comment_len = read_u16_le(&mut source)? as u64;
        if disk_number != 0 || cd_start_disk != 0 || entries_on_disk != total_entries_16 {
            return Err(Error::SpanningUnsupported);
        }
        let mut comment = String::new();
        if comment_len > 0 {
            let mut buf = vec![0u8; comment_len as usize];
            source.read_exact(&mut buf)?;
            comment = String::from_utf8_lossy(&buf).into_owned();
        }

        let mut total_entries = total_entries_16 as u64;
        let mut cd_size = cd_size_32 as u64;
        let mut cd_offset = cd_offset_32 as u64;
        let mut zip64 = false;

        if eocd_pos >= ZIP64_LOCATOR_LEN {
            let locator_pos = eocd_pos - ZIP64_LOCATOR_LEN;
            source.seek(SeekFrom::Start(locator_pos))?;
            let sig = read_u32_le(&mut source)?;
            if sig == crate::bytes::SIG_ZIP64_EOCD_LOCATOR {
                let _disk_with_zip64_eocd = read_u32_le(&mut source)?;
                let zip64_eocd_offset = read_u64_le(&mut source)?;

                source.seek(SeekFrom::Start(zip64_eocd_offset))?;
                let sig = read_u32_le(&mut source)?;
                if sig != crate::bytes::SIG_ZIP64_EOCD {
                    return Err(Error::corrupt("invalid ZIP64 end of central directory signature"));
                }
                let _record_size = read_u64_le(&mut source)?;
                let _version_made_by = read_u16_le(&mut source)?;
                let _version_needed = read_u16_le(&mut source)?;
                let _disk_number = read_u32_le(&mut source)?;
                let _cd_start_disk = read_u32_le(&mut source)?;
                let _entries_on_disk = read_u64_le(&mut source)?;
                total_entries = read_u64_le(&mut source)?;
                cd_size = read_u64_le(&mut source)?;
                cd_offset = read_u64_le(&mut source)?;
                zip64 = true;
            }
        }

        let offset_adjustment: i64 = if !zip64 {
            let expected_cd_start = eocd_pos.saturating_sub(cd_size);
            expected_cd_start as i64 - cd_offset as i64
        } else {
            0
        };

        source.seek(SeekFrom::Start((cd_offset as i64 + offset_adjustment.max(0)) as u64))?;
        let mut container = Container::new();
        for _ in 0..total_entries {
            let entry = read_central_header(&mut source, offset_adjustment)?;
            container.insert_or_replace(entry);
        }
        container.set_comment(&comment)?;
        container.snapshot_input();

        log::debug!(
            "opened archive: {} entries, zip64={}, offset_adjustment={}",
            total_entries,
            zip64,
            offset_adjustment
        );

        Ok(Reader {
            source: RefCell::new(source),
            container,
            offset_adjustment,
        })
    }

    /// Decrypt, decompress, and verify a single entry's body.
    /// `password` overrides any password recorded on the entry itself.
    pub fn read_entry_bytes(&self, name: &str, password: Option<&[u8]>) -> Result<Vec<u8>> {
        let entry = self
            .container
            .get(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;

        let (local_header_offset, compressed_size) = match entry.data_source {
            DataSource::Archived {
                local_header_offset,
                compressed_size,
                ..
            } => (local_header_offset, compressed_size),
            DataSource::Bytes(ref b) => return Ok(b.clone()),
            DataSource::Empty => return Ok(Vec::new()),
            DataSource::File(ref path) => return Ok(std::fs::read(path)?),
            DataSource::Stream(_) => return entry.data_source.take_stream_bytes(),
        };

        let adjusted_offset = (local_header_offset as i64 + self.offset_adjustment) as u64;
        let mut source = self.source.borrow_mut();
        source.seek(SeekFrom::Start(adjusted_offset))?;
        let sig = read_u32_le(&mut *source)?;
        if sig != crate::bytes::SIG_LOCAL_FILE_HEADER {
            return Err(Error::corrupt(format!("bad local file header for {name}")));
        }
        source.seek(SeekFrom::Current(22))?;
        let name_len = read_u16_le(&mut *source)? as i64;
        let extra_len = read_u16_le(&mut *source)? as i64;
        source.seek(SeekFrom::Current(name_len + extra_len))?;

        let mut region = vec![0u8; compressed_size as usize];
        source.read_exact(&mut region)?;
        drop(source);

        let password = password.or_else(|| entry.password());
        let method = entry.method();

        let plaintext = match entry.encryption_method() {
            None => decompress_all(&region, method)?,
            Some(EncryptionMethod::ZipCrypto) => {
                let password = password.ok_or(Error::UnsupportedEncryption)?;
                let check_byte = zipcrypto_check_byte(entry);
                let mut header = [0u8; zipcrypto::HEADER_LEN];
                header.copy_from_slice(&region[..zipcrypto::HEADER_LEN]);
                let mut dec = zipcrypto::ZipCryptoDecryptor::new(password, &header, check_byte)?;
                let mut body = region[zipcrypto::HEADER_LEN..].to_vec();
                dec.decrypt(&mut body);
                decompress_all(&body, method)?
            }
            Some(EncryptionMethod::WinZipAes(strength)) => {
                let password = password.ok_or(Error::UnsupportedEncryption)?;
                decrypt_winzip_aes(entry, &region, password, strength, method)?
            }
        };

        let is_ae2 = entry
            .get_extra(ID_WINZIP_AES, crate::entry::ExtraSide::Central)
            .and_then(ExtraField::as_winzip_aes)
            .map(|f| f.version == 2)
            .unwrap_or(false);
        if !is_ae2 && entry.crc32_known() {
            let actual = crc32fast::hash(&plaintext) as i64;
            if actual != entry.crc32 {
                return Err(Error::Crc32Mismatch(name.to_string()));
            }
        }

        Ok(plaintext)
    }
}

fn decompress_all(region: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    let mut reader = codec::decoder(Cursor::new(region), method);
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

fn decrypt_winzip_aes(
    entry: &Entry,
    region: &[u8],
    password: &[u8],
    strength: AesStrength,
    method: CompressionMethod,
) -> Result<Vec<u8>> {
    let salt_len = strength.salt_size();
    if region.len() < salt_len + 2 + 10 {
        return Err(Error::corrupt("WinZip AES region too short"));
    }
    let salt = &region[..salt_len];
    let pv = &region[salt_len..salt_len + 2];
    let ciphertext = &region[salt_len + 2..region.len() - 10];
    let tag = &region[region.len() - 10..];

    let keys = winzip_aes::derive_keys(password, salt, strength);
    if keys.pv != pv {
        return Err(Error::AuthenticationFailed(format!(
            "WinZip AES password verification failed for {}",
            entry.name()
        )));
    }

    let mut dec = winzip_aes::DecryptRead::new(Cursor::new(ciphertext), &keys, strength)?;
    let mut compressed = Vec::new();
    dec.read_to_end(&mut compressed)?;
    let computed_tag = dec.finalize();
    if computed_tag != tag {
        return Err(Error::AuthenticationFailed(format!(
            "WinZip AES authentication failed for {}",
            entry.name()
        )));
    }

    decompress_all(&compressed, method)
}

fn zipcrypto_check_byte(entry: &Entry) -> u8 {
    const GPBF_DATA_DESCRIPTOR: u16 = 1 << 3;
    if entry.gpbf & GPBF_DATA_DESCRIPTOR != 0 {
        (entry.dos_time >> 8) as u8
    } else {
        (entry.crc32 >> 24) as u8
    }
}

/// Scan backwards for the EOCD signature within the last `22 + 0xFFFF`
/// bytes of the file (spec.md 4.6 step 2). Returns `None` if absent
/// (recovery mode).
fn find_eocd<R: Read + Seek>(source: &mut R, file_len: u64) -> Result<Option<u64>> {
    if file_len < EOCD_FIXED_LEN {
        return Ok(None);
    }
    let window = EOCD_FIXED_LEN + MAX_COMMENT_LEN;
    let scan_floor = file_len.saturating_sub(window);
    source.seek(SeekFrom::Start(scan_floor))?;
    let mut buf = Vec::with_capacity((file_len - scan_floor) as usize);
    source.take(file_len - scan_floor).read_to_end(&mut buf)?;

    match memchr::memmem::rfind(&buf, &SIG_EOCD_BYTES) {
        Some(pos) => Ok(Some(scan_floor + pos as u64)),
        None => Ok(None),
    }
}

fn read_central_header<R: Read + Seek>(source: &mut R, offset_adjustment: i64) -> Result<Entry> {
    let sig = read_u32_le(source)?;
    if sig != crate::bytes::SIG_CENTRAL_DIR_HEADER {
        return Err(Error::corrupt("invalid central directory header signature"));
    }
    let version_made_by = read_u16_le(source)?;
    let _version_needed = read_u16_le(source)?;
    let gpbf = read_u16_le(source)?;
    let method_code = read_u16_le(source)?;
    let dos_time = read_u32_le(source)?;
    let crc32 = read_u32_le(source)?;
    let compressed_size_32 = read_u32_le(source)?;
    let uncompressed_size_32 = read_u32_le(source)?;
    let name_len = read_u16_le(source)? as usize;
    let extra_len = read_u16_le(source)? as usize;
    let comment_len = read_u16_le(source)? as usize;
    let disk_start = read_u16_le(source)?;
    let internal_attributes = read_u16_le(source)?;
    let external_attributes = read_u32_le(source)?;
    let local_header_offset_32 = read_u32_le(source)?;

    let mut name_buf = vec![0u8; name_len];
    source.read_exact(&mut name_buf)?;
    let mut extra_buf = vec![0u8; extra_len];
    source.read_exact(&mut extra_buf)?;
    let mut comment_buf = vec![0u8; comment_len];
    source.read_exact(&mut comment_buf)?;

    if disk_start != 0 {
        return Err(Error::SpanningUnsupported);
    }

    let hint = Zip64Hint::from_header_fields(
        uncompressed_size_32,
        compressed_size_32,
        local_header_offset_32,
        0,
    );
    let central_extra = extra::parse(&extra_buf, ParseHint { zip64: hint })?;

    let mut uncompressed_size = uncompressed_size_32 as i64;
    let mut compressed_size = compressed_size_32 as i64;
    let mut local_header_offset = local_header_offset_32 as i64;
    if let Some(ExtraField::Zip64(z)) = central_extra.get(&extra::ID_ZIP64) {
        if let Some(v) = z.uncompressed_size {
            uncompressed_size = v as i64;
        }
        if let Some(v) = z.compressed_size {
            compressed_size = v as i64;
        }
        if let Some(v) = z.offset {
            local_header_offset = v as i64;
        }
    }

    let name = String::from_utf8_lossy(&name_buf).into_owned();
    let utf8_name = gpbf & (1 << 11) != 0;
    let winzip_extra = central_extra
        .get(&ID_WINZIP_AES)
        .and_then(ExtraField::as_winzip_aes)
        .cloned();
    let real_method_code = match winzip_extra {
        Some(ref f) => f.actual_method,
        None => method_code,
    };

    let mut entry = Entry::new(if name.is_empty() { "_" } else { &name })?;
    entry.set_name(&name)?;
    entry.set_utf8_flag(utf8_name);
    entry.created_os = (version_made_by >> 8) as u8;
    entry.gpbf = gpbf;
    entry.set_method(CompressionMethod::from_code(real_method_code)?);
    entry.dos_time = dos_time;
    entry.crc32 = crc32 as i64;
    entry.compressed_size = compressed_size;
    entry.uncompressed_size = uncompressed_size;
    entry.internal_attributes = internal_attributes;
    entry.external_attributes = external_attributes;
    entry.local_header_offset = local_header_offset;
    entry.set_comment(&String::from_utf8_lossy(&comment_buf))?;
    entry.central_extra = central_extra;
    entry.resolve_unicode_name(&name_buf);

    const GPBF_ENCRYPTED: u16 = 1;
    if gpbf & GPBF_ENCRYPTED != 0 {
        let method = match winzip_extra {
            Some(f) => AesStrength::from_code(f.strength)
                .map(EncryptionMethod::WinZipAes)
                .ok_or_else(|| Error::corrupt("unrecognized WinZip AES strength code"))?,
            None => EncryptionMethod::ZipCrypto,
        };
        entry.set_read_encryption(Some(method));
    }

    entry.data_source = DataSource::Archived {
        local_header_offset: local_header_offset as u64,
        compressed_size: compressed_size as u64,
        uncompressed_size: uncompressed_size as u64,
    };
    entry.changed = false;
    let _ = offset_adjustment;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Writer;
    use std::io::Cursor;

    #[test]
    fn open_empty_archive_is_22_bytes() {
        let mut buf = Vec::new();
        {
            let mut writer = Writer::new(Cursor::new(&mut buf));
            writer.finish().unwrap();
        }
        assert_eq!(buf.len(), 22);
        let reader = Reader::open(Cursor::new(buf)).unwrap();
        assert_eq!(reader.container.len(), 0);
    }

    #[test]
    fn roundtrip_single_stored_entry() {
        let mut buf = Vec::new();
        {
            let mut writer = Writer::new(Cursor::new(&mut buf));
            let mut entry = Entry::new("file").unwrap();
            entry.set_method(CompressionMethod::Store);
            writer.add_entry(entry, b"content").unwrap();
            writer.finish().unwrap();
        }
        let reader = Reader::open(Cursor::new(buf)).unwrap();
        assert_eq!(reader.container.len(), 1);
        let data = reader.read_entry_bytes("file", None).unwrap();
        assert_eq!(data, b"content");
        assert_eq!(crc32fast::hash(b"content"), 0x68A9F036);
    }
}
