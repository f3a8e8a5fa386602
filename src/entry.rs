//! Per-entry metadata, invariants, and the data-source abstraction
//! (spec.md C3).

use crate::bytes::{dos_to_unix, unix_to_dos, UNKNOWN};
use crate::codec::{CompressionLevel, CompressionMethod};
use crate::crypto::EncryptionMethod;
use crate::error::{Error, Result};
use crate::extra::{ExtraField, WinZipAesField, ID_UNICODE_PATH, ID_WINZIP_AES};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::io::Read;
use std::path::PathBuf;
use std::rc::Rc;

/// Created/extracted-OS codes (spec.md 3).
pub const OS_DOS: u8 = 0;
pub const OS_UNIX: u8 = 3;
pub const OS_OSX: u8 = 19;

const DOS_ATTR_DIRECTORY: u32 = 0x10;

/// A caller-supplied, non-seekable reader handed to `add_stream`. It is
/// read exactly once, at encode time; a second attempt (e.g. a save
/// after an earlier save already drained it) raises `Error::Io` rather
/// than silently producing an empty body (spec.md 7 propagation policy).
pub enum StreamState {
    Pending(Box<dyn Read>),
    Consumed,
}

/// Where an entry's uncompressed body comes from.
pub enum DataSource {
    /// No body (directories, or an entry that hasn't been given content yet).
    Empty,
    /// Content fully resident in memory.
    Bytes(Vec<u8>),
    /// Content read from a file on open/save (re-opened per read, per
    /// spec.md 5 clone semantics).
    File(PathBuf),
    /// Content read once from a caller-supplied stream. Shared via `Rc`
    /// so that cloning the owning entry (container mutations clone
    /// entries) shares the same one-shot handle rather than duplicating
    /// an un-cloneable reader.
    Stream(Rc<RefCell<StreamState>>),
    /// Content is a byte range inside the archive this entry was read
    /// from. The container, not the entry, owns the shared file handle;
    /// `changed` tracks whether the writer must re-encode instead of
    /// copying the range verbatim.
    Archived {
        local_header_offset: u64,
        compressed_size: u64,
        uncompressed_size: u64,
    },
}

impl DataSource {
    pub fn is_empty_source(&self) -> bool {
        matches!(self, DataSource::Empty)
    }

    pub fn from_stream<R: Read + 'static>(stream: R) -> Self {
        DataSource::Stream(Rc::new(RefCell::new(StreamState::Pending(Box::new(stream)))))
    }

    /// Drain a `Stream` source exactly once. Any other source is read
    /// through its own path and never reaches here.
    pub fn take_stream_bytes(&self) -> Result<Vec<u8>> {
        match self {
            DataSource::Stream(state) => {
                let mut guard = state.borrow_mut();
                match std::mem::replace(&mut *guard, StreamState::Consumed) {
                    StreamState::Pending(mut r) => {
                        let mut buf = Vec::new();
                        r.read_to_end(&mut buf)?;
                        Ok(buf)
                    }
                    StreamState::Consumed => Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "stream data source already consumed",
                    ))),
                }
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl Clone for DataSource {
    fn clone(&self) -> Self {
        match self {
            DataSource::Empty => DataSource::Empty,
            DataSource::Bytes(b) => DataSource::Bytes(b.clone()),
            DataSource::File(p) => DataSource::File(p.clone()),
            DataSource::Stream(s) => DataSource::Stream(Rc::clone(s)),
            DataSource::Archived {
                local_header_offset,
                compressed_size,
                uncompressed_size,
            } => DataSource::Archived {
                local_header_offset: *local_header_offset,
                compressed_size: *compressed_size,
                uncompressed_size: *uncompressed_size,
            },
        }
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Empty => write!(f, "Empty"),
            DataSource::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            DataSource::File(p) => write!(f, "File({})", p.display()),
            DataSource::Stream(_) => write!(f, "Stream(..)"),
            DataSource::Archived { compressed_size, .. } => {
                write!(f, "Archived({compressed_size} bytes compressed)")
            }
        }
    }
}

/// Which side(s) of an entry's extra-field collections an operation
/// targets (spec.md 4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraSide {
    Local,
    Central,
    Both,
}

/// A single archive entry: metadata plus an abstract data source.
#[derive(Debug, Clone)]
pub struct Entry {
    name: String,
    pub created_os: u8,
    pub extracted_os: u8,
    pub software_version: u8,
    pub gpbf: u16,
    method: CompressionMethod,
    pub dos_time: u32,
    pub crc32: i64,
    pub compressed_size: i64,
    pub uncompressed_size: i64,
    pub local_header_offset: i64,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    comment: String,
    pub charset: Option<String>,
    password: Option<Vec<u8>>,
    encryption_method: Option<EncryptionMethod>,
    compression_level: CompressionLevel,
    pub data_source: DataSource,
    pub local_extra: IndexMap<u16, ExtraField>,
    pub central_extra: IndexMap<u16, ExtraField>,
    /// Set once a central-directory-backed entry has been mutated, per
    /// spec.md 3 lifecycle; guides the writer's raw-copy-vs-re-encode choice.
    pub changed: bool,
}

const GPBF_UTF8: u16 = 1 << 11;
const GPBF_DATA_DESCRIPTOR: u16 = 1 << 3;
const GPBF_DEFLATE_LEVEL_MASK: u16 = 0b0110;

impl Entry {
    /// Construct a new entry with the given name and no content. `name`
    /// is validated per spec.md 4.3 `set_name`.
    pub fn new(name: &str) -> Result<Self> {
        let mut entry = Entry {
            name: String::new(),
            created_os: OS_UNIX,
            extracted_os: OS_UNIX,
            software_version: 20,
            gpbf: 0,
            method: CompressionMethod::Deflate,
            dos_time: unix_to_dos(0),
            crc32: UNKNOWN,
            compressed_size: UNKNOWN,
            uncompressed_size: UNKNOWN,
            local_header_offset: 0,
            internal_attributes: 0,
            external_attributes: 0,
            comment: String::new(),
            charset: None,
            password: None,
            encryption_method: None,
            compression_level: CompressionLevel::default(),
            data_source: DataSource::Empty,
            local_extra: IndexMap::new(),
            central_extra: IndexMap::new(),
            changed: false,
        };
        entry.set_name(name)?;
        Ok(entry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Rename, validating length and re-deriving UTF-8/directory state
    /// (spec.md 4.3 `set_name`).
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidName("entry name must not be empty".to_string()));
        }
        if name.len() > 0xFFFF {
            return Err(Error::InvalidName("entry name exceeds 0xFFFF bytes".to_string()));
        }
        let was_directory = self.is_directory();
        self.name = name.to_string();
        if self.charset.is_none() && !self.name.is_ascii() {
            self.gpbf |= GPBF_UTF8;
        }
        let is_directory = self.is_directory();
        if is_directory && !was_directory {
            self.external_attributes = DOS_ATTR_DIRECTORY;
            self.data_source = DataSource::Empty;
        }
        self.changed = true;
        Ok(())
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: &str) -> Result<()> {
        if comment.len() > 0xFFFF {
            return Err(Error::InvalidArgument("comment exceeds 0xFFFF bytes".to_string()));
        }
        self.comment = comment.to_string();
        self.changed = true;
        Ok(())
    }

    pub fn method(&self) -> CompressionMethod {
        self.method
    }

    /// Set the compression method. Setting WinZip AES with no
    /// encryption method currently set defaults to AES-256 (spec.md 4.3).
    pub fn set_method(&mut self, method: CompressionMethod) {
        self.method = method;
        self.changed = true;
    }

    pub fn encryption_method(&self) -> Option<EncryptionMethod> {
        self.encryption_method
    }

    /// Set the encryption method directly, with none of `set_password`'s
    /// side effects (no extra-field synthesis, no GPBF change). Used by
    /// the reader, which derives encryption purely from GPBF bit 0 plus
    /// the WinZip AES extra field already present on the parsed entry.
    pub(crate) fn set_read_encryption(&mut self, method: Option<EncryptionMethod>) {
        self.encryption_method = method;
    }

    pub fn password(&self) -> Option<&[u8]> {
        self.password.as_deref()
    }

    pub fn compression_level(&self) -> CompressionLevel {
        self.compression_level
    }

    pub fn set_compression_level(&mut self, level: CompressionLevel) {
        self.compression_level = level;
        self.changed = true;
    }

    pub fn set_time(&mut self, unix_epoch: i64) {
        self.dos_time = unix_to_dos(unix_epoch);
        self.changed = true;
    }

    pub fn time(&self) -> i64 {
        dos_to_unix(self.dos_time)
    }

    pub fn set_dos_time(&mut self, raw: u32) {
        self.dos_time = raw;
        self.changed = true;
    }

    /// Set (or clear, with `pw = None`) a password for this entry. A
    /// directory entry silently ignores this (spec.md 3/7).
    pub fn set_password(&mut self, pw: Option<&[u8]>, method: Option<EncryptionMethod>) {
        if self.is_directory() {
            return;
        }
        match pw {
            None => self.disable_encryption(),
            Some(pw) => {
                self.password = Some(pw.to_vec());
                self.encryption_method = Some(method.unwrap_or_else(|| {
                    self.encryption_method
                        .unwrap_or(EncryptionMethod::WinZipAes(crate::crypto::AesStrength::Aes256))
                }));
                if matches!(self.encryption_method, Some(EncryptionMethod::WinZipAes(_))) {
                    self.ensure_winzip_aes_extra();
                }
                self.changed = true;
            }
        }
    }

    /// Marks this entry as WinZip-AES-protected without assigning a
    /// password yet, matching the side effect spec.md 4.3's
    /// `set_method(WinZipAES)` documents: defaults the encryption
    /// method to AES-256 when none is set. Callers still need
    /// `set_password` before the entry can actually be written encrypted.
    pub fn mark_winzip_aes(&mut self) {
        if self.is_directory() {
            return;
        }
        if self.encryption_method.is_none() {
            self.encryption_method = Some(EncryptionMethod::WinZipAes(crate::crypto::AesStrength::Aes256));
        }
        self.changed = true;
    }

    /// Clears the password and, per the resolved open question in
    /// DESIGN.md, restores the method to the underlying compression
    /// method (from the WinZip AES extra) or leaves it unset if none.
    pub fn disable_encryption(&mut self) {
        self.password = None;
        self.encryption_method = None;
        if let Some(ExtraField::WinZipAes(f)) = self.local_extra.shift_remove(&ID_WINZIP_AES) {
            self.central_extra.shift_remove(&ID_WINZIP_AES);
            if let Ok(m) = CompressionMethod::from_code(f.actual_method) {
                self.method = m;
            }
        }
        self.changed = true;
    }

    fn ensure_winzip_aes_extra(&mut self) {
        let strength = match self.encryption_method {
            Some(EncryptionMethod::WinZipAes(s)) => s,
            _ => return,
        };
        let field = ExtraField::WinZipAes(WinZipAesField {
            version: 2,
            vendor_id: crate::extra::WINZIP_AES_VENDOR_ID,
            strength: strength.to_code(),
            actual_method: self.method.to_code(),
        });
        self.local_extra.insert(ID_WINZIP_AES, field.clone());
        self.central_extra.insert(ID_WINZIP_AES, field);
    }

    pub fn add_extra(&mut self, field: ExtraField, which: ExtraSide) {
        let id = field.header_id();
        if matches!(which, ExtraSide::Local | ExtraSide::Both) {
            self.local_extra.insert(id, field.clone());
        }
        if matches!(which, ExtraSide::Central | ExtraSide::Both) {
            self.central_extra.insert(id, field);
        }
        self.changed = true;
    }

    pub fn get_extra(&self, id: u16, side: ExtraSide) -> Option<&ExtraField> {
        match side {
            ExtraSide::Local => self.local_extra.get(&id),
            ExtraSide::Central => self.central_extra.get(&id),
            ExtraSide::Both => self.local_extra.get(&id).or_else(|| self.central_extra.get(&id)),
        }
    }

    pub fn remove_extra(&mut self, id: u16, which: ExtraSide) {
        if matches!(which, ExtraSide::Local | ExtraSide::Both) {
            self.local_extra.shift_remove(&id);
        }
        if matches!(which, ExtraSide::Central | ExtraSide::Both) {
            self.central_extra.shift_remove(&id);
        }
        self.changed = true;
    }

    /// If a Unicode Path extra is present (locally or centrally) and its
    /// CRC matches `legacy_name_bytes`, it's the authoritative name
    /// (spec.md 4.2/4.6); the local copy, where ZIP tools are more likely
    /// to have placed it, takes precedence over the central one.
    pub fn resolve_unicode_name(&mut self, legacy_name_bytes: &[u8]) {
        let found = self
            .local_extra
            .get(&ID_UNICODE_PATH)
            .or_else(|| self.central_extra.get(&ID_UNICODE_PATH))
            .and_then(ExtraField::as_unicode_path)
            .filter(|u| u.matches(legacy_name_bytes))
            .map(|u| u.name.clone());
        if let Some(name) = found {
            self.name = name;
        }
    }

    pub fn crc32_known(&self) -> bool {
        self.crc32 != UNKNOWN
    }

    pub fn sizes_known(&self) -> bool {
        self.compressed_size != UNKNOWN && self.uncompressed_size != UNKNOWN
    }

    /// GPBF bit 3 is required iff any of {crc, compressed, uncompressed}
    /// is unknown at local-header emission time (spec.md 3).
    pub fn needs_data_descriptor(&self) -> bool {
        !self.crc32_known() || !self.sizes_known()
    }

    pub fn apply_data_descriptor_flag(&mut self) {
        if self.needs_data_descriptor() {
            self.gpbf |= GPBF_DATA_DESCRIPTOR;
        } else {
            self.gpbf &= !GPBF_DATA_DESCRIPTOR;
        }
    }

    pub fn utf8_flag(&self) -> bool {
        self.gpbf & GPBF_UTF8 != 0
    }

    pub fn set_utf8_flag(&mut self, on: bool) {
        if on {
            self.gpbf |= GPBF_UTF8;
        } else {
            self.gpbf &= !GPBF_UTF8;
        }
    }

    /// Bucket an arbitrary write-time DEFLATE level into the GPBF bits
    /// 1-2 sub-level (spec.md 3) and store it in the flags.
    pub fn apply_deflate_level_bits(&mut self) {
        self.gpbf &= !GPBF_DEFLATE_LEVEL_MASK;
        if self.method == CompressionMethod::Deflate {
            self.gpbf |= self.compression_level.deflate_gpbf_bits() << 1;
        }
    }

    /// Whether ZIP64 is required for this entry alone (spec.md 3):
    /// any size > 0xFFFFFFFE or offset > 0xFFFFFFFE.
    pub fn needs_zip64(&self) -> bool {
        const LIMIT: i64 = 0xFFFF_FFFE;
        self.compressed_size > LIMIT
            || self.uncompressed_size > LIMIT
            || self.local_header_offset > LIMIT
    }

    /// Deterministic extract-version derivation (spec.md 4.3): the
    /// minimum version number that satisfies every applicable rule,
    /// i.e. the maximum of the individual thresholds.
    pub fn extract_version(&self) -> u16 {
        let mut version: u16 = 10;
        let is_zipcrypto = matches!(self.encryption_method, Some(EncryptionMethod::ZipCrypto));
        if self.method == CompressionMethod::Deflate || self.is_directory() || is_zipcrypto {
            version = version.max(20);
        }
        if self.needs_zip64() {
            version = version.max(45);
        }
        if self.method == CompressionMethod::Bzip2 {
            version = version.max(46);
        }
        if matches!(self.encryption_method, Some(EncryptionMethod::WinZipAes(_))) {
            version = version.max(51);
        }
        version
    }

    /// The on-disk compression method field: WinZipAES's pseudo-method
    /// code (99) if encrypted that way, else the real method.
    pub fn header_method_code(&self) -> u16 {
        if matches!(self.encryption_method, Some(EncryptionMethod::WinZipAes(_))) {
            CompressionMethod::WINZIP_AES_METHOD_CODE
        } else {
            self.method.to_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_to_directory_resets_data_source() {
        let mut e = Entry::new("file").unwrap();
        e.data_source = DataSource::Bytes(vec![1, 2, 3]);
        e.set_name("dir/").unwrap();
        assert!(e.is_directory());
        assert!(e.data_source.is_empty_source());
    }

    #[test]
    fn non_ascii_name_sets_utf8_bit() {
        let e = Entry::new("café.txt").unwrap();
        assert!(e.utf8_flag());
    }

    #[test]
    fn unicode_path_extra_overrides_legacy_name_when_crc_matches() {
        use crate::extra::{ExtraField, UnicodePathField};
        let legacy = b"caf\xe9.txt";
        let mut e = Entry::new("placeholder").unwrap();
        e.add_extra(
            ExtraField::UnicodePath(UnicodePathField::for_name(legacy, "café.txt")),
            ExtraSide::Central,
        );
        e.resolve_unicode_name(legacy);
        assert_eq!(e.name(), "café.txt");
    }

    #[test]
    fn unicode_path_extra_ignored_when_crc_mismatches() {
        use crate::extra::{ExtraField, UnicodePathField};
        let mut e = Entry::new("legacy.txt").unwrap();
        e.add_extra(
            ExtraField::UnicodePath(UnicodePathField::for_name(b"other.txt", "unrelated.txt")),
            ExtraSide::Central,
        );
        e.resolve_unicode_name(b"legacy.txt");
        assert_eq!(e.name(), "legacy.txt");
    }

    #[test]
    fn ascii_name_does_not_set_utf8_bit() {
        let e = Entry::new("plain.txt").unwrap();
        assert!(!e.utf8_flag());
    }

    #[test]
    fn extract_version_escalates() {
        let mut e = Entry::new("a.txt").unwrap();
        e.set_method(CompressionMethod::Store);
        assert_eq!(e.extract_version(), 10);
        e.set_method(CompressionMethod::Deflate);
        assert_eq!(e.extract_version(), 20);
        e.set_method(CompressionMethod::Bzip2);
        assert_eq!(e.extract_version(), 46);
        e.set_password(Some(b"x"), Some(EncryptionMethod::WinZipAes(crate::crypto::AesStrength::Aes256)));
        assert_eq!(e.extract_version(), 51);
    }

    #[test]
    fn disable_encryption_restores_underlying_method() {
        let mut e = Entry::new("a.txt").unwrap();
        e.set_method(CompressionMethod::Deflate);
        e.set_password(Some(b"pw"), Some(EncryptionMethod::WinZipAes(crate::crypto::AesStrength::Aes256)));
        e.set_method(CompressionMethod::Deflate); // method stays logical; header uses 99 via header_method_code
        assert_eq!(e.header_method_code(), CompressionMethod::WINZIP_AES_METHOD_CODE);
        e.disable_encryption();
        assert!(e.encryption_method().is_none());
        assert_eq!(e.header_method_code(), CompressionMethod::Deflate.to_code());
    }

    #[test]
    fn directory_rejects_password() {
        let mut e = Entry::new("dir/").unwrap();
        e.set_password(Some(b"pw"), None);
        assert!(e.encryption_method().is_none());
    }

    #[test]
    fn data_descriptor_flag_tracks_known_fields() {
        let mut e = Entry::new("a.txt").unwrap();
        e.apply_data_descriptor_flag();
        assert!(e.needs_data_descriptor());
        e.crc32 = 1;
        e.compressed_size = 1;
        e.uncompressed_size = 1;
        e.apply_data_descriptor_flag();
        assert!(!e.needs_data_descriptor());
    }
}
