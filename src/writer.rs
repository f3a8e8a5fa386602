//! Archive writer (spec.md C8): emits local headers + bodies, the
//! central directory, and the (ZIP64) end-of-central-directory records,
//! applying zipalign padding and choosing raw-copy vs. re-encode per
//! entry.

use crate::bytes::{write_u16_le, write_u32_le, write_u64_le};
use crate::codec::{self, CompressionMethod};
use crate::container::Container;
use crate::crypto::{winzip_aes, zipcrypto, AesStrength, EncryptionMethod};
use crate::entry::{DataSource, Entry, ExtraSide};
use crate::error::{Error, Result};
use crate::extra::{self, ApkAlignmentField, ExtraField, Zip64ExtraField, ID_APK_ALIGNMENT, ID_ZIP64};
use crate::reader::Reader;
use std::io::{Read, Seek, SeekFrom, Write};

struct WrittenRecord {
    name: String,
    created_os: u8,
    extract_version: u16,
    gpbf: u16,
    method_code: u16,
    dos_time: u32,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
    internal_attributes: u16,
    external_attributes: u32,
    comment: String,
    central_extra: Vec<u8>,
}

/// Streams a container out to `W`, entry by entry.
pub struct Writer<W: Write + Seek> {
    output: W,
    records: Vec<WrittenRecord>,
    zip_align: Option<u32>,
}

impl<W: Write + Seek> Writer<W> {
    pub fn new(output: W) -> Self {
        Writer {
            output,
            records: Vec::new(),
            zip_align: None,
        }
    }

    /// Write every entry in `container`, sourcing bodies either from
    /// the container's own in-memory/file data or, for entries whose
    /// data source is an archived range, via `source_reader` (the
    /// container's originating archive, for the raw-copy path).
    pub fn write_container<R: Read + Seek>(
        &mut self,
        container: &Container,
        source_reader: Option<&Reader<R>>,
    ) -> Result<()> {
        self.zip_align = container.zip_align();
        for entry in container.entries() {
            self.write_entry(entry, source_reader)?;
        }
        self.finish_with_comment(container.comment(), container.needs_zip64())
    }

    /// Write a single entry from raw in-memory plaintext (convenience
    /// for tests and for freshly `add_bytes`-style entries).
    pub fn add_entry(&mut self, mut entry: Entry, plaintext: &[u8]) -> Result<()> {
        entry.data_source = DataSource::Bytes(plaintext.to_vec());
        self.write_entry::<std::io::Cursor<Vec<u8>>>(&entry, None)
    }

    fn write_entry<R: Read + Seek>(&mut self, entry: &Entry, source_reader: Option<&Reader<R>>) -> Result<()> {
        let local_header_offset = self.output.stream_position()?;
        let mut entry = entry.clone();
        if let Some(multiple) = self.zip_align {
            apply_zip_align(&mut entry, local_header_offset, multiple)?;
        }

        if let (DataSource::Archived { .. }, false) = (&entry.data_source, entry.changed) {
            if let Some(reader) = source_reader {
                return self.copy_raw(&entry, reader, local_header_offset);
            }
        }

        self.encode_entry(&entry, local_header_offset)
    }

    fn copy_raw<R: Read + Seek>(&mut self, entry: &Entry, reader: &Reader<R>, local_header_offset: u64) -> Result<()> {
        let plaintext = reader.read_entry_bytes(entry.name(), entry.password())?;
        self.encode_entry_with_plaintext(entry, &plaintext, local_header_offset)
    }

    fn encode_entry(&mut self, entry: &Entry, local_header_offset: u64) -> Result<()> {
        let plaintext: Vec<u8> = match &entry.data_source {
            DataSource::Empty => Vec::new(),
            DataSource::Bytes(b) => b.clone(),
            DataSource::File(path) => std::fs::read(path)?,
            DataSource::Stream(_) => entry.data_source.take_stream_bytes()?,
            DataSource::Archived { .. } => Vec::new(),
        };
        self.encode_entry_with_plaintext(entry, &plaintext, local_header_offset)
    }

    fn encode_entry_with_plaintext(&mut self, entry: &Entry, plaintext: &[u8], local_header_offset: u64) -> Result<()> {
        let crc32 = crc32fast::hash(plaintext);

        let mut compressed = Vec::new();
        {
            let mut encoder = codec::Encoder::new(&mut compressed, entry.method(), entry.compression_level());
            encoder.write_all(plaintext)?;
            encoder.finish()?;
        }

        let (body, encryption_overhead_note) = match entry.encryption_method() {
            None => (compressed, None),
            Some(EncryptionMethod::ZipCrypto) => {
                let password = entry.password().ok_or_else(|| {
                    Error::InvalidArgument(format!("entry {} is ZipCrypto-encrypted with no password", entry.name()))
                })?;
                let check_byte = if entry.needs_data_descriptor() {
                    (entry.dos_time >> 8) as u8
                } else {
                    (crc32 >> 24) as u8
                };
                let random_header = crypto_random_header()?;
                let mut out = Vec::with_capacity(zipcrypto::HEADER_LEN + compressed.len());
                let mut enc_writer = zipcrypto::EncryptWrite::new(&mut out, password, check_byte, random_header);
                enc_writer.write_all(&compressed)?;
                (out, None)
            }
            Some(EncryptionMethod::WinZipAes(strength)) => {
                let password = entry.password().ok_or_else(|| {
                    Error::InvalidArgument(format!("entry {} is WinZip AES-encrypted with no password", entry.name()))
                })?;
                let salt = winzip_aes::random_salt(strength.salt_size())?;
                let keys = winzip_aes::derive_keys(password, &salt, strength);
                let mut ciphertext = Vec::new();
                let tag;
                {
                    let mut enc = winzip_aes::EncryptWrite::new(&mut ciphertext, &keys, strength)?;
                    enc.write_all(&compressed)?;
                    tag = enc.finalize();
                }
                let mut out = Vec::with_capacity(salt.len() + 2 + ciphertext.len() + 10);
                out.extend_from_slice(&salt);
                out.extend_from_slice(&keys.pv);
                out.extend_from_slice(&ciphertext);
                out.extend_from_slice(&tag);
                (out, Some("winzip-aes"))
            }
        };
        let _ = encryption_overhead_note;

        let mut entry = entry.clone();
        entry.crc32 = crc32 as i64;
        entry.compressed_size = body.len() as i64;
        entry.uncompressed_size = plaintext.len() as i64;
        entry.apply_data_descriptor_flag();
        entry.apply_deflate_level_bits();

        let is_ae2 = entry
            .get_extra(crate::extra::ID_WINZIP_AES, ExtraSide::Local)
            .and_then(ExtraField::as_winzip_aes)
            .map(|f| f.version == 2)
            .unwrap_or(false);
        let header_crc = if is_ae2 { 0 } else { crc32 };

        let name_bytes = entry.name().as_bytes().to_vec();
        let mut local_extra_map = entry.local_extra.clone();

        // spec.md 3: ZIP64 must appear in the local extra-field set too
        // when this entry's (now-known) sizes overflow the 32-bit local
        // header fields; the central record's own copy is synthesized
        // separately in `finish_with_comment`.
        let need_local_zip64 = body.len() as u64 > 0xFFFF_FFFE || plaintext.len() as u64 > 0xFFFF_FFFE;
        if need_local_zip64 {
            let field = crate::extra::Zip64ExtraField {
                uncompressed_size: Some(plaintext.len() as u64),
                compressed_size: Some(body.len() as u64),
                offset: None,
                disk_start: None,
            };
            local_extra_map.insert(crate::extra::ID_ZIP64, ExtraField::Zip64(field));
        } else {
            local_extra_map.shift_remove(&crate::extra::ID_ZIP64);
        }

        self.output.write_all(&crate::bytes::SIG_LOCAL_FILE_HEADER.to_le_bytes())?;
        write_u16_le(&mut self.output, entry.extract_version())?;
        write_u16_le(&mut self.output, entry.gpbf)?;
        write_u16_le(&mut self.output, entry.header_method_code())?;
        write_u32_le(&mut self.output, entry.dos_time)?;
        write_u32_le(&mut self.output, header_crc)?;
        write_u32_le(
            &mut self.output,
            if need_local_zip64 { crate::bytes::ZIP64_U32_SENTINEL } else { body.len() as u32 },
        )?;
        write_u32_le(
            &mut self.output,
            if need_local_zip64 { crate::bytes::ZIP64_U32_SENTINEL } else { plaintext.len() as u32 },
        )?;
        write_u16_le(&mut self.output, name_bytes.len() as u16)?;

        let local_extra_bytes = extra::serialize(&local_extra_map)?;
        write_u16_le(&mut self.output, local_extra_bytes.len() as u16)?;
        self.output.write_all(&name_bytes)?;
        self.output.write_all(&local_extra_bytes)?;
        self.output.write_all(&body)?;

        if entry.needs_data_descriptor() {
            self.output.write_all(&crate::bytes::SIG_DATA_DESCRIPTOR.to_le_bytes())?;
            write_u32_le(&mut self.output, header_crc)?;
            write_u32_le(&mut self.output, body.len() as u32)?;
            write_u32_le(&mut self.output, plaintext.len() as u32)?;
        }

        let central_extra_bytes = extra::serialize(&entry.central_extra)?;

        self.records.push(WrittenRecord {
            name: entry.name().to_string(),
            created_os: entry.created_os,
            extract_version: entry.extract_version(),
            gpbf: entry.gpbf,
            method_code: entry.header_method_code(),
            dos_time: entry.dos_time,
            crc32: header_crc,
            compressed_size: body.len() as u64,
            uncompressed_size: plaintext.len() as u64,
            local_header_offset,
            internal_attributes: entry.internal_attributes,
            external_attributes: entry.external_attributes,
            comment: entry.comment().to_string(),
            central_extra: central_extra_bytes,
        });
        Ok(())
    }

    /// Write the central directory and (ZIP64) EOCD, consuming the
    /// accumulated per-entry records.
    pub fn finish(&mut self) -> Result<()> {
        self.finish_with_comment("", false)
    }

    fn finish_with_comment(&mut self, archive_comment: &str, force_zip64: bool) -> Result<()> {
        let cd_offset = self.output.stream_position()?;

        for record in &self.records {
            self.output.write_all(&crate::bytes::SIG_CENTRAL_DIR_HEADER.to_le_bytes())?;
            write_u16_le(&mut self.output, ((record.created_os as u16) << 8) | (record.extract_version & 0xFF))?;
            write_u16_le(&mut self.output, record.extract_version)?;
            write_u16_le(&mut self.output, record.gpbf)?;
            write_u16_le(&mut self.output, record.method_code)?;
            write_u32_le(&mut self.output, record.dos_time)?;
            write_u32_le(&mut self.output, record.crc32)?;

            let need_zip64_entry = record.compressed_size > 0xFFFF_FFFE
                || record.uncompressed_size > 0xFFFF_FFFE
                || record.local_header_offset > 0xFFFF_FFFE;

            write_u32_le(
                &mut self.output,
                if record.compressed_size > 0xFFFF_FFFE {
                    crate::bytes::ZIP64_U32_SENTINEL
                } else {
                    record.compressed_size as u32
                },
            )?;
            write_u32_le(
                &mut self.output,
                if record.uncompressed_size > 0xFFFF_FFFE {
                    crate::bytes::ZIP64_U32_SENTINEL
                } else {
                    record.uncompressed_size as u32
                },
            )?;

            let name_bytes = record.name.as_bytes();
            write_u16_le(&mut self.output, name_bytes.len() as u16)?;

            let mut zip64_extra = Vec::new();
            if need_zip64_entry {
                let field = crate::extra::Zip64ExtraField {
                    uncompressed_size: (record.uncompressed_size > 0xFFFF_FFFE).then_some(record.uncompressed_size),
                    compressed_size: (record.compressed_size > 0xFFFF_FFFE).then_some(record.compressed_size),
                    offset: (record.local_header_offset > 0xFFFF_FFFE).then_some(record.local_header_offset),
                    disk_start: None,
                };
                write_u16_le(&mut zip64_extra, crate::extra::ID_ZIP64)?;
                let payload = field.serialize();
                write_u16_le(&mut zip64_extra, payload.len() as u16)?;
                zip64_extra.extend_from_slice(&payload);
            }
            let total_extra_len = record.central_extra.len() + zip64_extra.len();
            write_u16_le(&mut self.output, total_extra_len as u16)?;
            write_u16_le(&mut self.output, record.comment.len() as u16)?;
            write_u16_le(&mut self.output, 0)?; // disk number start
            write_u16_le(&mut self.output, record.internal_attributes)?;
            write_u32_le(&mut self.output, record.external_attributes)?;
            write_u32_le(
                &mut self.output,
                if record.local_header_offset > 0xFFFF_FFFE {
                    crate::bytes::ZIP64_U32_SENTINEL
                } else {
                    record.local_header_offset as u32
                },
            )?;
            self.output.write_all(name_bytes)?;
            self.output.write_all(&zip64_extra)?;
            self.output.write_all(&record.central_extra)?;
            self.output.write_all(record.comment.as_bytes())?;
        }

        let cd_size = self.output.stream_position()? - cd_offset;
        let entry_count = self.records.len() as u64;
        let need_zip64 =
            force_zip64 || entry_count > 0xFFFE || cd_size > 0xFFFF_FFFE || cd_offset > 0xFFFF_FFFE;

        if need_zip64 {
            self.output.write_all(&crate::bytes::SIG_ZIP64_EOCD.to_le_bytes())?;
            write_u64_le(&mut self.output, 44)?;
            write_u16_le(&mut self.output, 45)?;
            write_u16_le(&mut self.output, 45)?;
            write_u32_le(&mut self.output, 0)?;
            write_u32_le(&mut self.output, 0)?;
            write_u64_le(&mut self.output, entry_count)?;
            write_u64_le(&mut self.output, entry_count)?;
            write_u64_le(&mut self.output, cd_size)?;
            write_u64_le(&mut self.output, cd_offset)?;

            self.output.write_all(&crate::bytes::SIG_ZIP64_EOCD_LOCATOR.to_le_bytes())?;
            write_u32_le(&mut self.output, 0)?;
            write_u64_le(&mut self.output, cd_offset + cd_size)?;
            write_u32_le(&mut self.output, 1)?;
        }

        self.output.write_all(&crate::bytes::SIG_EOCD.to_le_bytes())?;
        write_u16_le(&mut self.output, 0)?;
        write_u16_le(&mut self.output, 0)?;
        if entry_count > 0xFFFE {
            write_u16_le(&mut self.output, crate::bytes::ZIP64_U16_SENTINEL)?;
            write_u16_le(&mut self.output, crate::bytes::ZIP64_U16_SENTINEL)?;
        } else {
            write_u16_le(&mut self.output, entry_count as u16)?;
            write_u16_le(&mut self.output, entry_count as u16)?;
        }
        write_u32_le(
            &mut self.output,
            if cd_size > 0xFFFF_FFFE { crate::bytes::ZIP64_U32_SENTINEL } else { cd_size as u32 },
        )?;
        write_u32_le(
            &mut self.output,
            if cd_offset > 0xFFFF_FFFE { crate::bytes::ZIP64_U32_SENTINEL } else { cd_offset as u32 },
        )?;
        write_u16_le(&mut self.output, archive_comment.len() as u16)?;
        self.output.write_all(archive_comment.as_bytes())?;
        self.output.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

fn crypto_random_header() -> Result<[u8; zipcrypto::HEADER_LEN]> {
    let mut buf = [0u8; zipcrypto::HEADER_LEN];
    getrandom::getrandom(&mut buf)
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    Ok(buf)
}

/// Page size used to align shared-library (`.so`) entries regardless
/// of the container's configured zipalign multiple (spec.md 4.7).
const SO_PAGE_ALIGNMENT: u32 = 4096;

/// Pad an entry's local extra-fields with an APK-Alignment record so
/// that its body lands on `multiple` (spec.md 4.7), or on the 4096-byte
/// page size for `.so` entries regardless of `multiple`. Only applies
/// to STORE entries, per the REDESIGN-FLAGS-fixed policy: non-STORE
/// entries are never padded.
pub fn apply_zip_align(entry: &mut Entry, local_header_offset: u64, multiple: u32) -> Result<()> {
    if entry.method() != CompressionMethod::Store || multiple == 0 {
        return Ok(());
    }
    let multiple = if entry.name().ends_with(".so") {
        SO_PAGE_ALIGNMENT
    } else {
        multiple
    };
    let name_len = entry.name().len() as u64;
    let header_fixed_len = 30u64;
    loop {
        let extra_without_align = {
            let mut m = entry.local_extra.clone();
            m.shift_remove(&ID_APK_ALIGNMENT);
            extra::serialize(&m)?.len() as u64
        };
        let body_offset_guess = local_header_offset + header_fixed_len + name_len + extra_without_align;
        let remainder = body_offset_guess % multiple as u64;
        let padding_len = if remainder == 0 { 0 } else { multiple as u64 - remainder };
        let field = ApkAlignmentField {
            alignment: multiple as u16,
            padding: vec![0u8; padding_len as usize],
        };
        entry.local_extra.insert(ID_APK_ALIGNMENT, ExtraField::ApkAlignment(field));
        let body_offset = local_header_offset + header_fixed_len + name_len + {
            extra::serialize(&entry.local_extra)?.len() as u64
        };
        if body_offset % multiple as u64 == 0 {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_archive_is_exactly_22_bytes() {
        let mut buf = Vec::new();
        let mut writer = Writer::new(Cursor::new(&mut buf));
        writer.finish().unwrap();
        assert_eq!(buf.len(), 22);
        assert_eq!(&buf[0..4], &[0x50, 0x4B, 0x05, 0x06]);
        assert!(buf[4..22].iter().all(|&b| b == 0));
    }

    #[test]
    fn single_entry_roundtrips_crc() {
        let mut buf = Vec::new();
        let mut writer = Writer::new(Cursor::new(&mut buf));
        let mut entry = Entry::new("0").unwrap();
        entry.set_method(CompressionMethod::Store);
        writer.add_entry(entry, b"0").unwrap();
        writer.finish().unwrap();
        assert!(buf.len() > 22);
    }

    fn local_body_offset(entry: &Entry, local_header_offset: u64) -> u64 {
        let extra_len = extra::serialize(&entry.local_extra).unwrap().len() as u64;
        local_header_offset + 30 + entry.name().len() as u64 + extra_len
    }

    #[test]
    fn zip_align_pads_store_entries_to_configured_multiple() {
        let mut entry = Entry::new("lib/data.bin").unwrap();
        entry.set_method(CompressionMethod::Store);
        apply_zip_align(&mut entry, 17, 4).unwrap();
        assert_eq!(local_body_offset(&entry, 17) % 4, 0);
    }

    #[test]
    fn zip_align_uses_page_size_for_so_entries() {
        let mut entry = Entry::new("lib/arm64-v8a/libfoo.so").unwrap();
        entry.set_method(CompressionMethod::Store);
        apply_zip_align(&mut entry, 17, 4).unwrap();
        assert_eq!(local_body_offset(&entry, 17) % SO_PAGE_ALIGNMENT as u64, 0);
    }

    #[test]
    fn zip_align_skips_non_store_entries() {
        let mut entry = Entry::new("lib/arm64-v8a/libfoo.so").unwrap();
        entry.set_method(CompressionMethod::Deflate);
        apply_zip_align(&mut entry, 17, 4).unwrap();
        assert!(!entry.local_extra.contains_key(&ID_APK_ALIGNMENT));
    }
}
