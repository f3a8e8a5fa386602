//! Compression/decompression streams (spec.md C6): STORE, raw DEFLATE,
//! and BZIP2, with compression-level propagation.

use crate::error::{Error, Result};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression as BzCompression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression as DeflateCompression;
use std::io::{self, Read, Write};

/// Compression methods this engine implements. Values match the
/// on-disk `compression method` field (spec.md 3); WinZipAES (99) is
/// not itself a compression method but is modeled alongside since it
/// occupies the same header slot once encryption is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Store,
    Deflate,
    Bzip2,
}

impl CompressionMethod {
    pub const WINZIP_AES_METHOD_CODE: u16 = 99;

    pub fn to_code(self) -> u16 {
        match self {
            CompressionMethod::Store => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Bzip2 => 12,
        }
    }

    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(CompressionMethod::Store),
            8 => Ok(CompressionMethod::Deflate),
            12 => Ok(CompressionMethod::Bzip2),
            other => Err(Error::UnsupportedMethod(other)),
        }
    }
}

/// A compression level in 1..9 (spec.md 3), default 6. Only meaningful
/// for DEFLATE/BZIP2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u8);

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel(6)
    }
}

impl CompressionLevel {
    pub fn new(level: u8) -> Result<Self> {
        if (1..=9).contains(&level) {
            Ok(CompressionLevel(level))
        } else {
            Err(Error::InvalidArgument(format!(
                "compression level {level} out of range 1..9"
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The GPBF bits 1-2 sub-level bucket for DEFLATE (spec.md 3):
    /// 00 normal, 01 max, 10 fast, 11 super-fast.
    pub fn deflate_gpbf_bits(self) -> u16 {
        match self.0 {
            9 => 0b01,
            1..=2 => 0b10,
            3..=4 => 0b11,
            _ => 0b00,
        }
    }
}

/// Wrap `inner` in a decompressing `Read` for `method`.
pub fn decoder<'a, R: Read + 'a>(inner: R, method: CompressionMethod) -> Box<dyn Read + 'a> {
    match method {
        CompressionMethod::Store => Box::new(inner),
        CompressionMethod::Deflate => Box::new(DeflateDecoder::new(inner)),
        CompressionMethod::Bzip2 => Box::new(BzDecoder::new(inner)),
    }
}

/// A sink that compresses everything written to it and forwards the
/// compressed bytes to `inner`. `finish()` must be called to flush any
/// buffered compressor state.
pub enum Encoder<W: Write> {
    Store(W),
    Deflate(DeflateEncoder<W>),
    Bzip2(BzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    pub fn new(inner: W, method: CompressionMethod, level: CompressionLevel) -> Self {
        match method {
            CompressionMethod::Store => Encoder::Store(inner),
            CompressionMethod::Deflate => {
                Encoder::Deflate(DeflateEncoder::new(inner, DeflateCompression::new(level.get() as u32)))
            }
            CompressionMethod::Bzip2 => {
                Encoder::Bzip2(BzEncoder::new(inner, BzCompression::new(level.get() as u32)))
            }
        }
    }

    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Store(w) => Ok(w),
            Encoder::Deflate(e) => e.finish(),
            Encoder::Bzip2(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Store(w) => w.write(buf),
            Encoder::Deflate(e) => e.write(buf),
            Encoder::Bzip2(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Store(w) => w.flush(),
            Encoder::Deflate(e) => e.flush(),
            Encoder::Bzip2(e) => e.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(method: CompressionMethod) {
        let data = b"The quick brown fox jumps over the lazy dog. ".repeat(50);
        let mut enc = Encoder::new(Vec::new(), method, CompressionLevel::default());
        enc.write_all(&data).unwrap();
        let compressed = enc.finish().unwrap();

        let mut dec = decoder(&compressed[..], method);
        let mut out = Vec::new();
        dec.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn store_roundtrip() {
        roundtrip(CompressionMethod::Store);
    }

    #[test]
    fn deflate_roundtrip() {
        roundtrip(CompressionMethod::Deflate);
    }

    #[test]
    fn bzip2_roundtrip() {
        roundtrip(CompressionMethod::Bzip2);
    }

    #[test]
    fn level_out_of_range_rejected() {
        assert!(CompressionLevel::new(0).is_err());
        assert!(CompressionLevel::new(10).is_err());
        assert!(CompressionLevel::new(6).is_ok());
    }

    #[test]
    fn deflate_gpbf_bucketing() {
        assert_eq!(CompressionLevel::new(9).unwrap().deflate_gpbf_bits(), 0b01);
        assert_eq!(CompressionLevel::new(1).unwrap().deflate_gpbf_bits(), 0b10);
        assert_eq!(CompressionLevel::new(6).unwrap().deflate_gpbf_bits(), 0b00);
    }
}
