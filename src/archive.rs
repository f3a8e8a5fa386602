//! Public container operations (spec.md C9): the façade a caller
//! actually drives — open/create, add/rename/delete, passwords,
//! compression policy, extraction, and save. Everything below this
//! layer (C1-C8) is an implementation detail of these operations.

use crate::codec::{CompressionLevel, CompressionMethod};
use crate::container::Container;
use crate::crypto::{AesStrength, EncryptionMethod};
use crate::entry::{DataSource, Entry, ExtraSide};
use crate::error::{Error, Result};
use crate::extra::ID_UNICODE_PATH;
use crate::mime;
use crate::reader::Reader;
use crate::writer::Writer;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

/// Compression method choice for an `add_*` call (spec.md 4.8/6).
/// `Auto` defers to [`mime::choose_method`] on the entry's first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Store,
    Deflate,
    Bzip2,
    WinZipAes,
    Auto,
}

impl Default for Method {
    fn default() -> Self {
        Method::Auto
    }
}

/// Options governing [`Archive::extract_to`] (spec.md 6).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// When true, an entry whose Unix mode marks it a symlink and whose
    /// target is a relative, non-escaping path is recreated as a real
    /// symlink; otherwise the target text is written as a regular file.
    pub extract_symlinks: bool,
}

/// A predicate used by [`Archive::delete_matching`] / `add_from_matched`,
/// standing in for the glob/regex engines spec.md §1 treats as external
/// collaborators: this crate consumes a caller-supplied match decision
/// rather than compiling patterns itself.
pub trait NameMatcher {
    fn is_match(&self, name: &str) -> bool;
}

impl<F: Fn(&str) -> bool> NameMatcher for F {
    fn is_match(&self, name: &str) -> bool {
        self(name)
    }
}

const S_IFLNK: u32 = 0o120000;
const S_IFMT: u32 = 0o170000;

/// The in-memory, mutable view of a ZIP archive plus the (optional)
/// seekable source it was opened from. Generic over the source type so
/// callers can open from a file, an in-memory buffer, or any other
/// `Read + Seek` (spec.md 4.8 `open_file` / `open_from_bytes` /
/// `open_from_stream`).
pub struct Archive<R: Read + Seek> {
    container: Container,
    reader: Option<Reader<R>>,
    read_password: Option<Vec<u8>>,
    default_level: CompressionLevel,
    /// Path this archive was last opened from or saved to, used to
    /// detect a rewrite-in-place save (spec.md 4.7/6).
    open_path: Option<PathBuf>,
    /// Whether `open_path` (if set) names a real local file this
    /// archive can safely be rewritten onto (spec.md 6 `OverwriteNotLocal`).
    source_is_local_file: bool,
}

impl<R: Read + Seek> Archive<R> {
    fn empty() -> Self {
        Archive {
            container: Container::new(),
            reader: None,
            read_password: None,
            default_level: CompressionLevel::default(),
            open_path: None,
            source_is_local_file: false,
        }
    }

    /// Open an already-populated central directory from any seekable
    /// source (spec.md 4.8 `open_from_stream`).
    pub fn open_from_stream(stream: R) -> Result<Self> {
        let reader = Reader::open(stream)?;
        Ok(Archive {
            container: reader.container.clone(),
            reader: Some(reader),
            read_password: None,
            default_level: CompressionLevel::default(),
            open_path: None,
            source_is_local_file: false,
        })
    }

    pub fn len(&self) -> usize {
        self.container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.container.contains(name)
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.container.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.container.entries()
    }

    pub fn comment(&self) -> &str {
        self.container.comment()
    }

    fn normalize_name(name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(Error::InvalidName("entry name must not be empty".to_string()));
        }
        Ok(name.replace('\\', "/"))
    }

    fn make_entry(&self, name: &str, method: Method, data: &[u8]) -> Result<Entry> {
        let name = Self::normalize_name(name)?;
        let mut entry = Entry::new(&name)?;
        let resolved = match method {
            Method::Store => CompressionMethod::Store,
            Method::Deflate => CompressionMethod::Deflate,
            Method::Bzip2 => CompressionMethod::Bzip2,
            Method::WinZipAes => CompressionMethod::Deflate,
            Method::Auto => mime::choose_method(data),
        };
        entry.set_method(resolved);
        entry.set_compression_level(self.default_level);
        if method == Method::WinZipAes {
            entry.mark_winzip_aes();
        }
        Ok(entry)
    }

    /// Add content fully resident in memory (spec.md 4.8 `add_bytes`).
    pub fn add_bytes(&mut self, name: &str, bytes: Vec<u8>, method: Method) -> Result<()> {
        let mut entry = self.make_entry(name, method, &bytes)?;
        entry.uncompressed_size = bytes.len() as i64;
        entry.data_source = DataSource::Bytes(bytes);
        self.container.insert(entry)
    }

    /// Add a file from disk, defaulting `name` to the file's base name
    /// (spec.md 4.8 `add_file`). Metadata (mtime, Unix mode) is captured
    /// from the filesystem at call time, not re-read at save time.
    pub fn add_file(&mut self, path: &Path, name: Option<&str>, method: Method) -> Result<()> {
        let base_name = name
            .map(str::to_string)
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .ok_or_else(|| Error::InvalidName("no file name could be derived".to_string()))?;
        let metadata = std::fs::metadata(path)?;
        let sniff_len = 512.min(metadata.len() as usize);
        let mut probe = vec![0u8; sniff_len];
        {
            let mut f = File::open(path)?;
            f.read_exact(&mut probe)?;
        }
        let mut entry = self.make_entry(&base_name, method, &probe)?;
        entry.uncompressed_size = metadata.len() as i64;
        apply_fs_metadata(&mut entry, &metadata);
        entry.data_source = DataSource::File(path.to_path_buf());
        self.container.insert(entry)
    }

    /// Add content from a stream that is read exactly once, at save
    /// time (spec.md 4.8 `add_stream`; spec.md 7 on single-read streams).
    pub fn add_stream<S: Read + 'static>(&mut self, stream: S, name: &str, method: Method) -> Result<()> {
        let name = Self::normalize_name(name)?;
        let mut entry = Entry::new(&name)?;
        let resolved = match method {
            Method::Store => CompressionMethod::Store,
            Method::Deflate => CompressionMethod::Deflate,
            Method::Bzip2 => CompressionMethod::Bzip2,
            Method::WinZipAes | Method::Auto => CompressionMethod::Deflate,
        };
        entry.set_method(resolved);
        entry.set_compression_level(self.default_level);
        if method == Method::WinZipAes {
            entry.mark_winzip_aes();
        }
        entry.data_source = DataSource::from_stream(stream);
        self.container.insert(entry)
    }

    /// Add a zero-length directory entry (spec.md 4.8 `add_empty_dir`).
    pub fn add_empty_dir(&mut self, name: &str) -> Result<()> {
        let name = Self::normalize_name(name)?;
        let name = if name.ends_with('/') { name } else { format!("{name}/") };
        let entry = Entry::new(&name)?;
        self.container.insert(entry)
    }

    /// Add every regular file directly inside `path` (non-recursive),
    /// prefixed by `local_prefix` in the archive (spec.md 4.8 `add_dir`).
    pub fn add_dir(&mut self, path: &Path, local_prefix: Option<&str>) -> Result<()> {
        self.add_dir_inner(path, local_prefix, false)
    }

    /// Recursive variant of [`Archive::add_dir`] (spec.md 4.8).
    pub fn add_dir_recursive(&mut self, path: &Path, local_prefix: Option<&str>) -> Result<()> {
        self.add_dir_inner(path, local_prefix, true)
    }

    fn add_dir_inner(&mut self, path: &Path, local_prefix: Option<&str>, recursive: bool) -> Result<()> {
        let prefix = local_prefix.unwrap_or("").trim_end_matches('/');
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let archive_name = if prefix.is_empty() { name.clone() } else { format!("{prefix}/{name}") };
            if file_type.is_dir() {
                if recursive {
                    self.add_dir_inner(&entry.path(), Some(&archive_name), true)?;
                } else {
                    self.add_empty_dir(&archive_name)?;
                }
            } else if file_type.is_file() {
                self.add_file(&entry.path(), Some(&archive_name), Method::Auto)?;
            }
        }
        Ok(())
    }

    /// Add every path yielded by `iter`, the base primitive glob/regex
    /// helpers and the `Finder` adapter are expected to feed (spec.md
    /// 4.8, §1 external collaborators).
    pub fn add_from_iterator<I>(&mut self, iter: I, local_prefix: Option<&str>) -> Result<()>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let prefix = local_prefix.unwrap_or("").trim_end_matches('/');
        for path in iter {
            let base = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::InvalidName("no file name could be derived".to_string()))?;
            let archive_name = if prefix.is_empty() { base } else { format!("{prefix}/{base}") };
            self.add_file(&path, Some(&archive_name), Method::Auto)?;
        }
        Ok(())
    }

    /// Add every path in `candidates` whose archive-relative name
    /// matches `matcher` (spec.md 4.8 `add_from_glob` / `add_from_regex`,
    /// backed by a caller-supplied matcher rather than a bundled
    /// glob/regex engine).
    pub fn add_from_matched<I, M>(&mut self, candidates: I, matcher: &M, local_prefix: Option<&str>) -> Result<()>
    where
        I: IntoIterator<Item = PathBuf>,
        M: NameMatcher,
    {
        let matched = candidates.into_iter().filter(|p| {
            p.file_name()
                .map(|n| matcher.is_match(&n.to_string_lossy()))
                .unwrap_or(false)
        });
        self.add_from_iterator(matched, local_prefix)
    }

    /// Rename an entry, preserving its position (spec.md 4.8 `rename`).
    /// Drops any now-stale Unicode Path extra since it authenticates
    /// against the old legacy name.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let new = Self::normalize_name(new)?;
        self.container.rename(old, &new)?;
        let entry = self.container.get_mut(&new).expect("just renamed");
        entry.remove_extra(ID_UNICODE_PATH, ExtraSide::Both);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<Entry> {
        self.container.remove(name)
    }

    /// Delete every entry whose name matches `matcher` (spec.md 4.8
    /// `delete_glob` / `delete_regex`), returning the deleted names.
    pub fn delete_matching<M: NameMatcher>(&mut self, matcher: &M) -> Result<Vec<String>> {
        let names: Vec<String> = self
            .container
            .iter()
            .map(|(n, _)| n.clone())
            .filter(|n| matcher.is_match(n))
            .collect();
        for name in &names {
            self.container.remove(name)?;
        }
        Ok(names)
    }

    pub fn set_archive_comment(&mut self, comment: Option<&str>) -> Result<()> {
        self.container.set_comment(comment.unwrap_or(""))
    }

    pub fn set_entry_comment(&mut self, name: &str, comment: Option<&str>) -> Result<()> {
        let entry = self
            .container
            .get_mut(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        entry.set_comment(comment.unwrap_or(""))
    }

    /// Set (or clear) the write password and encryption method for
    /// every current entry (spec.md 4.8 `set_password`). Directory
    /// entries silently ignore this, per [`Entry::set_password`].
    pub fn set_password(&mut self, password: Option<&[u8]>, method: Option<EncryptionMethod>) {
        for (_, entry) in self.container_entries_mut() {
            entry.set_password(password, method);
        }
    }

    pub fn set_password_entry(&mut self, name: &str, password: Option<&[u8]>, method: Option<EncryptionMethod>) -> Result<()> {
        let entry = self
            .container
            .get_mut(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        entry.set_password(password, method);
        Ok(())
    }

    /// Password used to decrypt entries on read/extract when no
    /// per-call password is given (spec.md 4.8 `set_read_password`).
    pub fn set_read_password(&mut self, password: Option<&[u8]>) {
        self.read_password = password.map(|p| p.to_vec());
    }

    pub fn set_compression_level(&mut self, level: u8) -> Result<()> {
        let level = CompressionLevel::new(level)?;
        self.default_level = level;
        for (_, entry) in self.container_entries_mut() {
            entry.set_compression_level(level);
        }
        Ok(())
    }

    pub fn set_compression_level_entry(&mut self, name: &str, level: u8) -> Result<()> {
        let level = CompressionLevel::new(level)?;
        let entry = self
            .container
            .get_mut(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        entry.set_compression_level(level);
        Ok(())
    }

    pub fn set_zip_align(&mut self, multiple: Option<u32>) -> Result<()> {
        self.container.set_zip_align(multiple)
    }

    fn container_entries_mut(&mut self) -> impl Iterator<Item = (&String, &mut Entry)> {
        self.container.iter_mut()
    }

    /// Read and fully decode one entry's plaintext (spec.md 4.6/4.8),
    /// regardless of which data-source variant backs it.
    pub fn read_entry_bytes(&self, name: &str, password: Option<&[u8]>) -> Result<Vec<u8>> {
        let entry = self
            .container
            .get(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        match &entry.data_source {
            DataSource::Empty => Ok(Vec::new()),
            DataSource::Bytes(b) => Ok(b.clone()),
            DataSource::File(path) => Ok(std::fs::read(path)?),
            DataSource::Stream(_) => entry.data_source.take_stream_bytes(),
            DataSource::Archived { .. } => {
                let reader = self.reader.as_ref().ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
                let password = password.or_else(|| self.read_password.as_deref());
                reader.read_entry_bytes(name, password)
            }
        }
    }

    /// Extract entries into `dir` (spec.md 6 extraction policy). `names`
    /// restricts extraction to the given entries; `None` extracts all.
    /// Returns the entries actually materialized, mapped to their
    /// on-disk path.
    pub fn extract_to(&self, dir: &Path, names: Option<&[String]>, options: ExtractOptions) -> Result<HashMap<String, PathBuf>> {
        let mut out = HashMap::new();
        let selected: Vec<&str> = match names {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => self.container.iter().map(|(n, _)| n.as_str()).collect(),
        };
        for name in selected {
            let entry = self
                .container
                .get(name)
                .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
            let rel_path = sanitize_extraction_path(name)?;
            let dest = dir.join(&rel_path);

            if entry.is_directory() {
                std::fs::create_dir_all(&dest)?;
                out.insert(name.to_string(), dest);
                continue;
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let data = self.read_entry_bytes(name, None)?;
            let unix_mode = if entry.created_os == crate::entry::OS_UNIX {
                Some(entry.external_attributes >> 16)
            } else {
                None
            };

            let wrote_symlink = options.extract_symlinks
                && unix_mode.map(|m| m & S_IFMT == S_IFLNK).unwrap_or(false)
                && write_symlink_if_safe(&dest, &data, dir)?;

            if !wrote_symlink {
                std::fs::write(&dest, &data)?;
                #[cfg(unix)]
                if let Some(mode) = unix_mode {
                    use std::os::unix::fs::PermissionsExt;
                    let perm_bits = mode & 0o7777;
                    if perm_bits != 0 {
                        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(perm_bits))?;
                    }
                }
            }
            out.insert(name.to_string(), dest);
        }
        Ok(out)
    }

    pub fn unchange_all(&mut self) {
        self.container.unchange_all();
    }

    pub fn unchange_entry(&mut self, name: &str) -> Result<()> {
        self.container.unchange_entry(name)
    }

    pub fn unchange_archive_comment(&mut self) {
        self.container.unchange_archive_comment();
    }

    /// Write this archive to any seekable sink (spec.md 4.8 `save_as_stream`).
    pub fn save_as_stream<W: Write + Seek>(&mut self, output: W) -> Result<W> {
        let mut writer = Writer::new(output);
        writer.write_container(&self.container, self.reader.as_ref())?;
        Ok(writer.into_inner())
    }

    /// Write this archive to `path` (spec.md 4.8 `save_as_file`). If
    /// `path` is the same path this archive was opened from (or last
    /// saved to) and that source is a local file, the write goes
    /// through a sibling temp file and an atomic rename (spec.md 4.7/6);
    /// a non-local source refuses with `OverwriteNotLocal`.
    pub fn save_as_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let rewriting_in_place = self.open_path.as_deref() == Some(path.as_path());
        if rewriting_in_place {
            if !self.source_is_local_file {
                return Err(Error::OverwriteNotLocal);
            }
            self.rewrite_to(&path)?;
        } else {
            let file = File::create(&path)?;
            self.save_as_stream(file)?;
            self.open_path = Some(path);
            self.source_is_local_file = true;
        }
        Ok(())
    }

    /// Re-save over the path this archive was opened from (spec.md 4.8
    /// `rewrite`). Requires a local-file source.
    pub fn rewrite(&mut self) -> Result<()> {
        let path = self
            .open_path
            .clone()
            .ok_or(Error::OverwriteNotLocal)?;
        if !self.source_is_local_file {
            return Err(Error::OverwriteNotLocal);
        }
        self.rewrite_to(&path)
    }

    fn rewrite_to(&mut self, path: &Path) -> Result<()> {
        let suffix = crate::crypto::winzip_aes::random_salt(4)
            .map(|b| b.iter().map(|x| format!("{x:02x}")).collect::<String>())
            .unwrap_or_else(|_| "tmp".to_string());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive.zip".to_string());
        let tmp_path = path.with_file_name(format!("{file_name}.tmp.{suffix}"));
        let tmp_file = File::create(&tmp_path)?;
        match self.save_as_stream(tmp_file) {
            Ok(_) => {
                std::fs::rename(&tmp_path, path)?;
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }
}

impl Archive<File> {
    /// Open an archive from a local file (spec.md 4.8 `open_file`).
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let reader = Reader::open(file)?;
        Ok(Archive {
            container: reader.container.clone(),
            reader: Some(reader),
            read_password: None,
            default_level: CompressionLevel::default(),
            open_path: Some(path),
            source_is_local_file: true,
        })
    }
}

impl Archive<Cursor<Vec<u8>>> {
    /// A brand-new, empty archive with no backing source (spec.md 4.8,
    /// the implicit "create" path behind `add_*` + `save_as_*`).
    pub fn create() -> Self {
        Archive::empty()
    }

    /// Open an archive whose bytes are fully resident in memory
    /// (spec.md 4.8 `open_from_bytes`).
    pub fn open_from_bytes(buf: Vec<u8>) -> Result<Self> {
        let reader = Reader::open(Cursor::new(buf))?;
        Ok(Archive {
            container: reader.container.clone(),
            reader: Some(reader),
            read_password: None,
            default_level: CompressionLevel::default(),
            open_path: None,
            source_is_local_file: false,
        })
    }

    /// Serialize this archive to an in-memory buffer (the Rust
    /// equivalent of the source's `output_as_string`: ZIP bytes are not
    /// valid UTF-8 in general, so a `Vec<u8>` is the faithful return
    /// type here rather than a `String` — see DESIGN.md).
    pub fn output_as_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.save_as_stream(Cursor::new(Vec::new()))?.into_inner())
    }
}

fn apply_fs_metadata(entry: &mut Entry, metadata: &std::fs::Metadata) {
    if let Ok(modified) = metadata.modified() {
        if let Ok(duration) = modified.duration_since(std::time::UNIX_EPOCH) {
            entry.set_time(duration.as_secs() as i64);
        }
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        entry.created_os = crate::entry::OS_UNIX;
        entry.extracted_os = crate::entry::OS_UNIX;
        entry.external_attributes = metadata.mode() << 16;
    }
}

/// Reject absolute paths and `..` segments (spec.md 6 extraction
/// policy), returning the sanitized relative path otherwise.
fn sanitize_extraction_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return Err(Error::UnsafePath(name.to_string()));
    }
    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::Normal(part) => sanitized.push(part),
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir | std::path::Component::RootDir | std::path::Component::Prefix(_) => {
                return Err(Error::UnsafePath(name.to_string()));
            }
        }
    }
    Ok(sanitized)
}

/// Create `dest` as a symlink to the UTF-8 target in `data`, if the
/// target is relative and does not escape `root` (spec.md 6). Returns
/// `Ok(false)` (not an error) when the target is unsafe, so the caller
/// falls back to writing a regular file.
fn write_symlink_if_safe(dest: &Path, data: &[u8], root: &Path) -> Result<bool> {
    let target = match std::str::from_utf8(data) {
        Ok(t) => t,
        Err(_) => return Ok(false),
    };
    let target_path = Path::new(target);
    if target_path.is_absolute() {
        return Ok(false);
    }
    let resolved = dest.parent().unwrap_or(root).join(target_path);
    if !path_stays_within(root, &resolved) {
        return Ok(false);
    }
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target_path, dest)?;
        return Ok(true);
    }
    #[cfg(not(unix))]
    {
        let _ = dest;
        Ok(false)
    }
}

/// Lexical containment check: resolves `..`/`.` components of `candidate`
/// relative to `root` without touching the filesystem (the target may
/// not exist yet) and verifies the result cannot climb above `root`.
fn path_stays_within(root: &Path, candidate: &Path) -> bool {
    let mut depth: i64 = 0;
    for component in candidate.components() {
        match component {
            std::path::Component::ParentDir => depth -= 1,
            std::path::Component::Normal(_) => depth += 1,
            std::path::Component::CurDir => {}
            std::path::Component::RootDir | std::path::Component::Prefix(_) => return false,
        }
        if depth < 0 {
            return false;
        }
    }
    let _ = root;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_get_roundtrip() {
        let mut archive = Archive::create();
        archive.add_bytes("file", b"content".to_vec(), Method::Store).unwrap();
        assert_eq!(archive.read_entry_bytes("file", None).unwrap(), b"content");
    }

    #[test]
    fn rename_then_lookup() {
        let mut archive = Archive::create();
        archive.add_bytes("a", b"x".to_vec(), Method::Store).unwrap();
        archive.rename("a", "b").unwrap();
        assert_eq!(archive.read_entry_bytes("b", None).unwrap(), b"x");
        assert!(matches!(archive.read_entry_bytes("a", None), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn integer_like_name_stays_string_key() {
        let mut archive = Archive::create();
        archive.add_bytes("0", b"0".to_vec(), Method::Store).unwrap();
        let bytes = archive.output_as_bytes().unwrap();
        let reopened = Archive::open_from_bytes(bytes).unwrap();
        assert!(reopened.contains("0"));
        assert_eq!(reopened.read_entry_bytes("0", None).unwrap(), b"0");
    }

    #[test]
    fn empty_name_rejected() {
        let mut archive = Archive::create();
        assert!(matches!(archive.add_bytes("", Vec::new(), Method::Store), Err(Error::InvalidName(_))));
    }

    #[test]
    fn sanitize_rejects_parent_traversal() {
        assert!(sanitize_extraction_path("../evil").is_err());
        assert!(sanitize_extraction_path("/etc/passwd").is_err());
        assert!(sanitize_extraction_path("ok/nested.txt").is_ok());
    }

    #[test]
    fn save_and_reopen_preserves_entries() {
        let mut archive = Archive::create();
        archive.add_bytes("a.txt", b"hello".to_vec(), Method::Deflate).unwrap();
        archive.add_empty_dir("dir").unwrap();
        let bytes = archive.output_as_bytes().unwrap();
        let reopened = Archive::open_from_bytes(bytes).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.read_entry_bytes("a.txt", None).unwrap(), b"hello");
    }

    #[test]
    fn password_roundtrip_wrong_password_fails() {
        let mut archive = Archive::create();
        archive.add_bytes("secret.txt", vec![7u8; 512], Method::Store).unwrap();
        archive.set_password_entry(
            "secret.txt",
            Some(b"correct horse"),
            Some(EncryptionMethod::WinZipAes(AesStrength::Aes256)),
        ).unwrap();
        let bytes = archive.output_as_bytes().unwrap();
        let reopened = Archive::open_from_bytes(bytes).unwrap();
        assert!(matches!(
            reopened.read_entry_bytes("secret.txt", Some(b"wrong")),
            Err(Error::AuthenticationFailed(_))
        ));
        assert_eq!(
            reopened.read_entry_bytes("secret.txt", Some(b"correct horse")).unwrap(),
            vec![7u8; 512]
        );
    }

    #[test]
    fn winzip_aes_method_enables_encryption_without_password() {
        let mut archive = Archive::create();
        archive.add_bytes("secret.bin", vec![1u8; 32], Method::WinZipAes).unwrap();
        let entry = archive.entry("secret.bin").unwrap();
        assert!(matches!(entry.encryption_method(), Some(EncryptionMethod::WinZipAes(AesStrength::Aes256))));
        // No password set yet: saving must fail rather than silently write plaintext.
        assert!(archive.output_as_bytes().is_err());
        archive.set_password_entry("secret.bin", Some(b"pw"), None).unwrap();
        let bytes = archive.output_as_bytes().unwrap();
        let reopened = Archive::open_from_bytes(bytes).unwrap();
        assert_eq!(reopened.read_entry_bytes("secret.bin", Some(b"pw")).unwrap(), vec![1u8; 32]);
    }

    #[test]
    fn delete_matching_removes_selected() {
        let mut archive = Archive::create();
        archive.add_bytes("keep.txt", b"1".to_vec(), Method::Store).unwrap();
        archive.add_bytes("drop.log", b"2".to_vec(), Method::Store).unwrap();
        let matcher = |n: &str| n.ends_with(".log");
        let deleted = archive.delete_matching(&matcher).unwrap();
        assert_eq!(deleted, vec!["drop.log".to_string()]);
        assert!(archive.contains("keep.txt"));
        assert!(!archive.contains("drop.log"));
    }
}
