//! Minimal content sniffing used only to implement the façade's "auto"
//! compression method (spec.md 4.8, 8): already-compressed media and
//! archive formats are stored rather than re-deflated. This is not a
//! general MIME sniffer — it is the one internal approximation spec.md
//! §1 allows since no external sniffer is supplied to the core.

use crate::codec::CompressionMethod;

/// Below this size, STORE always wins: DEFLATE's framing overhead would
/// make the compressed form larger than the input (spec.md 8).
const TINY_FILE_THRESHOLD: usize = 8;

/// A short table of magic byte prefixes for formats that gain nothing
/// from a second compression pass (images, audio, video, and archive
/// containers already compressed internally).
const STORE_SIGNATURES: &[&[u8]] = &[
    b"\xFF\xD8\xFF",         // JPEG
    b"\x89PNG\r\n\x1a\n",    // PNG
    b"GIF87a",               // GIF
    b"GIF89a",               // GIF
    b"BM",                   // BMP
    b"RIFF",                 // WEBP/WAV/AVI container (checked further below)
    b"ID3",                  // MP3 (ID3 tag)
    b"fLaC",                 // FLAC
    b"OggS",                 // OGG (audio/video)
    b"\x1aE\xdf\xa3",        // Matroska/WebM (EBML)
    b"PK\x03\x04",           // ZIP (and JAR/APK/DOCX/...)
    b"\x1f\x8b",             // GZIP
    b"BZh",                  // BZIP2
    b"7z\xbc\xaf\x27\x1c",   // 7-Zip
    b"Rar!\x1a\x07",         // RAR
    b"\xfd7zXZ\x00",         // XZ
    b"\x00\x00\x00\x18ftyp", // MP4 (ftyp box, offset 4)
];

/// Choose between STORE and DEFLATE for an "auto" entry, based purely on
/// the first bytes of `data` (spec.md 4.8, 8). BZIP2 and WinZip AES are
/// never auto-selected; callers opt into them explicitly.
pub fn choose_method(data: &[u8]) -> CompressionMethod {
    if data.len() < TINY_FILE_THRESHOLD {
        return CompressionMethod::Store;
    }
    if looks_precompressed(data) {
        CompressionMethod::Store
    } else {
        CompressionMethod::Deflate
    }
}

fn looks_precompressed(data: &[u8]) -> bool {
    // MP4's signature starts at offset 4, not 0.
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return true;
    }
    STORE_SIGNATURES
        .iter()
        .any(|sig| data.len() >= sig.len() && &data[..sig.len()] == *sig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_input_always_stored() {
        assert_eq!(choose_method(b"short"), CompressionMethod::Store);
    }

    #[test]
    fn png_signature_stored() {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.extend_from_slice(&[0u8; 32]);
        assert_eq!(choose_method(&data), CompressionMethod::Store);
    }

    #[test]
    fn text_is_deflated() {
        let data = b"plain text content that is long enough to not be tiny".to_vec();
        assert_eq!(choose_method(&data), CompressionMethod::Deflate);
    }

    #[test]
    fn nested_zip_stored() {
        let mut data = b"PK\x03\x04".to_vec();
        data.extend_from_slice(&[0u8; 32]);
        assert_eq!(choose_method(&data), CompressionMethod::Store);
    }
}
