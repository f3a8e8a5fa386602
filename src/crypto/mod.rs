//! Encryption/decryption streams (spec.md C5): traditional PKWARE
//! ("ZipCrypto") and WinZip AES.

pub mod winzip_aes;
pub mod zipcrypto;

pub use winzip_aes::AesStrength;

/// The encryption scheme an entry is protected with. Distinct from
/// compression method: WinZip AES *replaces* the compression method in
/// the header (spec.md 3), but the underlying method is preserved in
/// the WinZip AES extra field and restored when encryption is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    ZipCrypto,
    WinZipAes(AesStrength),
}

impl EncryptionMethod {
    pub fn is_winzip_aes(&self) -> bool {
        matches!(self, EncryptionMethod::WinZipAes(_))
    }
}
