//! Error types for zipcraft

use std::io;

/// Result type for zipcraft operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds that can occur while reading, writing, or mutating an archive.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller-supplied argument was out of range (e.g. a comment longer
    /// than 0xFFFF bytes, a compression level outside 1..9).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An entry name failed validation (empty, too long, etc).
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// No entry with the given name exists in the container.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// An entry with the given name already exists.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// The input does not look like a ZIP file at all.
    #[error("not a zip file")]
    NotAZipFile,

    /// The archive structure is corrupt or inconsistent.
    #[error("corrupt archive: {0}")]
    Corrupt(String),

    /// Multi-disk archives are not supported.
    #[error("multi-disk archives are not supported")]
    SpanningUnsupported,

    /// A compression method is not implemented.
    #[error("unsupported compression method: {0}")]
    UnsupportedMethod(u16),

    /// An encryption scheme is not implemented (e.g. APPNOTE strong encryption).
    #[error("unsupported encryption scheme")]
    UnsupportedEncryption,

    /// Password verification or HMAC authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The decompressed body's CRC32 did not match the header.
    #[error("crc32 mismatch for entry {0}")]
    Crc32Mismatch(String),

    /// An extraction path attempted to escape the destination directory.
    #[error("unsafe path: {0}")]
    UnsafePath(String),

    /// The archive is not backed by a local file, so it cannot be rewritten in place.
    #[error("cannot overwrite a non-local source")]
    OverwriteNotLocal,

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }
}
