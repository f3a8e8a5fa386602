//! WinZip AES encryption (AE-1/AE-2), 128/192/256-bit.
//!
//! Wire layout per spec.md 4.4: `salt | pv(2) | ciphertext | hmac(10)`.
//! Key derivation is PBKDF2-HMAC-SHA1 over `(password, salt)` with 1000
//! iterations, producing `2*key_len + 2` bytes split into the AES-CTR
//! key, the HMAC-SHA1 key, and a 2-byte password-verification value.
//! The HMAC is computed over the ciphertext (not the plaintext), and
//! the CTR counter is a little-endian 128-bit value starting at 1.

use crate::error::{Error, Result};
use aes::{Aes128, Aes192, Aes256};
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128LE;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use std::io::{self, Read, Write};

type HmacSha1 = Hmac<Sha1>;

/// WinZip AES key strength, mirroring the extra field's 1-byte code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesStrength {
    Aes128,
    Aes192,
    Aes256,
}

impl AesStrength {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(AesStrength::Aes128),
            2 => Some(AesStrength::Aes192),
            3 => Some(AesStrength::Aes256),
            _ => None,
        }
    }

    pub fn to_code(self) -> u8 {
        match self {
            AesStrength::Aes128 => 1,
            AesStrength::Aes192 => 2,
            AesStrength::Aes256 => 3,
        }
    }

    pub fn key_size(self) -> usize {
        match self {
            AesStrength::Aes128 => 16,
            AesStrength::Aes192 => 24,
            AesStrength::Aes256 => 32,
        }
    }

    pub fn salt_size(self) -> usize {
        match self {
            AesStrength::Aes128 => 8,
            AesStrength::Aes192 => 12,
            AesStrength::Aes256 => 16,
        }
    }

    fn derived_key_len(self) -> usize {
        self.key_size() * 2 + 2
    }
}

/// Key material derived from a password and salt: the AES-CTR key, the
/// HMAC-SHA1 signing key, and the 2-byte password-verification value.
pub struct DerivedKeys {
    pub crypt_key: Vec<u8>,
    pub mac_key: Vec<u8>,
    pub pv: [u8; 2],
}

pub fn derive_keys(password: &[u8], salt: &[u8], strength: AesStrength) -> DerivedKeys {
    let total = strength.derived_key_len();
    let mut derived = vec![0u8; total];
    pbkdf2_hmac::<Sha1>(password, salt, 1000, &mut derived);
    let key_size = strength.key_size();
    let crypt_key = derived[..key_size].to_vec();
    let mac_key = derived[key_size..key_size * 2].to_vec();
    let pv = [derived[key_size * 2], derived[key_size * 2 + 1]];
    DerivedKeys {
        crypt_key,
        mac_key,
        pv,
    }
}

fn make_cipher(key: &[u8], strength: AesStrength) -> Box<dyn StreamCipher + Send> {
    let iv = 1u128.to_le_bytes();
    match strength {
        AesStrength::Aes128 => Box::new(Ctr128LE::<Aes128>::new(key.into(), iv.as_slice().into())),
        AesStrength::Aes192 => Box::new(Ctr128LE::<Aes192>::new(key.into(), iv.as_slice().into())),
        AesStrength::Aes256 => Box::new(Ctr128LE::<Aes256>::new(key.into(), iv.as_slice().into())),
    }
}

/// Generate a cryptographically secure random salt of the given length.
pub fn random_salt(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf).map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?;
    Ok(buf)
}

/// Decrypts a bounded ciphertext stream, updating the HMAC over the raw
/// ciphertext bytes as they're read, per spec.md 4.4.
pub struct DecryptRead<R> {
    inner: R,
    cipher: Box<dyn StreamCipher + Send>,
    mac: HmacSha1,
}

impl<R: Read> DecryptRead<R> {
    pub fn new(inner: R, keys: &DerivedKeys, strength: AesStrength) -> Result<Self> {
        let mac = HmacSha1::new_from_slice(&keys.mac_key)
            .map_err(|e| Error::AuthenticationFailed(e.to_string()))?;
        Ok(DecryptRead {
            inner,
            cipher: make_cipher(&keys.crypt_key, strength),
            mac,
        })
    }

    /// Consumes the stream and returns the first 10 bytes of the HMAC,
    /// to be compared against the trailing authentication code.
    pub fn finalize(self) -> [u8; 10] {
        let mac_bytes = self.mac.finalize().into_bytes();
        let mut out = [0u8; 10];
        out.copy_from_slice(&mac_bytes[..10]);
        out
    }
}

impl<R: Read> Read for DecryptRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.mac.update(&buf[..n]);
        self.cipher.apply_keystream(&mut buf[..n]);
        Ok(n)
    }
}

/// Encrypts a stream, updating the HMAC over the ciphertext as it's
/// produced.
pub struct EncryptWrite<W> {
    inner: W,
    cipher: Box<dyn StreamCipher + Send>,
    mac: HmacSha1,
}

impl<W: Write> EncryptWrite<W> {
    pub fn new(inner: W, keys: &DerivedKeys, strength: AesStrength) -> Result<Self> {
        let mac = HmacSha1::new_from_slice(&keys.mac_key)
            .map_err(|e| Error::AuthenticationFailed(e.to_string()))?;
        Ok(EncryptWrite {
            inner,
            cipher: make_cipher(&keys.crypt_key, strength),
            mac,
        })
    }

    /// Consumes the stream and returns the 10-byte authentication code to
    /// append after the ciphertext.
    pub fn finalize(self) -> [u8; 10] {
        let mac_bytes = self.mac.finalize().into_bytes();
        let mut out = [0u8; 10];
        out.copy_from_slice(&mac_bytes[..10]);
        out
    }
}

impl<W: Write> Write for EncryptWrite<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = buf.to_vec();
        self.cipher.apply_keystream(&mut data);
        self.mac.update(&data);
        self.inner.write_all(&data)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_strengths() {
        for strength in [AesStrength::Aes128, AesStrength::Aes192, AesStrength::Aes256] {
            let salt = vec![0x42; strength.salt_size()];
            let keys = derive_keys(b"hunter2", &salt, strength);
            let plain = b"round trip me please, this is a decent chunk of plaintext data";

            let mut writer = EncryptWrite::new(Vec::new(), &keys, strength).unwrap();
            writer.write_all(plain).unwrap();
            let auth = writer.finalize();
            let cipher_bytes = writer.inner;
            assert_ne!(cipher_bytes, plain);

            let mut reader = DecryptRead::new(&cipher_bytes[..], &keys, strength).unwrap();
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            let check = reader.finalize();
            assert_eq!(out, plain);
            assert_eq!(check, auth);
        }
    }

    #[test]
    fn wrong_password_mismatches_pv() {
        let salt = vec![1u8; 16];
        let keys_right = derive_keys(b"right", &salt, AesStrength::Aes256);
        let keys_wrong = derive_keys(b"wrong", &salt, AesStrength::Aes256);
        assert_ne!(keys_right.pv, keys_wrong.pv);
    }

    #[test]
    fn wrong_password_fails_hmac() {
        let salt = vec![9u8; 16];
        let keys_right = derive_keys(b"right", &salt, AesStrength::Aes256);
        let keys_wrong = derive_keys(b"wrong", &salt, AesStrength::Aes256);

        let mut writer = EncryptWrite::new(Vec::new(), &keys_right, AesStrength::Aes256).unwrap();
        writer.write_all(b"plaintext").unwrap();
        let auth = writer.finalize();
        let cipher_bytes = writer.inner;

        let mut reader = DecryptRead::new(&cipher_bytes[..], &keys_wrong, AesStrength::Aes256).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        let check = reader.finalize();
        assert_ne!(check, auth);
    }
}
