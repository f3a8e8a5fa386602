//! # zipcraft: a ZIP archive engine
//!
//! `zipcraft` reads, builds, and modifies ZIP archives in memory, on disk,
//! or against any `Read + Seek` stream. It implements the PKWARE APPNOTE
//! local/central/end-of-central-directory structures, ZIP64 extensions for
//! archives and entries beyond the 32-bit limits, STORE/DEFLATE/BZIP2
//! compression, and both Traditional PKWARE (ZipCrypto) and WinZip AES
//! encryption.
//!
//! ## Quick start
//!
//! ### Building an archive
//!
//! ```no_run
//! use zipcraft::{Archive, Method};
//!
//! let mut archive = Archive::create();
//! archive.add_bytes("hello.txt", b"Hello, World!".to_vec(), Method::Auto)?;
//! archive.save_as_file("output.zip")?;
//! # Ok::<(), zipcraft::Error>(())
//! ```
//!
//! ### Reading an archive
//!
//! ```no_run
//! use zipcraft::Archive;
//!
//! let archive = Archive::open_file("archive.zip")?;
//! for entry in archive.entries() {
//!     println!("{}: {} bytes", entry.name(), entry.uncompressed_size);
//! }
//! let data = archive.read_entry_bytes("file.txt", None)?;
//! # Ok::<(), zipcraft::Error>(())
//! ```

pub mod archive;
pub mod bytes;
pub mod codec;
pub mod container;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod extra;
pub mod mime;
pub mod reader;
pub mod writer;

pub use archive::{Archive, ExtractOptions, Method, NameMatcher};
pub use codec::{CompressionLevel, CompressionMethod};
pub use container::Container;
pub use crypto::{AesStrength, EncryptionMethod};
pub use entry::Entry;
pub use error::{Error, Result};
