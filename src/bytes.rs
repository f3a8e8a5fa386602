//! Little-endian pack/unpack helpers, DOS<->Unix time conversion, and
//! the ZIP record signatures used throughout the reader and writer.

use chrono::{Datelike, Local, TimeZone, Timelike};
use std::io::{self, Read, Write};

/// Local file header signature.
pub const SIG_LOCAL_FILE_HEADER: u32 = 0x0403_4b50;
/// Central directory file header signature.
pub const SIG_CENTRAL_DIR_HEADER: u32 = 0x0201_4b50;
/// End of central directory record signature.
pub const SIG_EOCD: u32 = 0x0605_4b50;
/// ZIP64 end of central directory record signature.
pub const SIG_ZIP64_EOCD: u32 = 0x0606_4b50;
/// ZIP64 end of central directory locator signature.
pub const SIG_ZIP64_EOCD_LOCATOR: u32 = 0x0706_4b50;
/// Data descriptor signature (optional, but universally emitted).
pub const SIG_DATA_DESCRIPTOR: u32 = 0x0807_4b50;

/// Sentinel for a 32-bit field promoted to ZIP64.
pub const ZIP64_U32_SENTINEL: u32 = 0xFFFF_FFFF;
/// Sentinel for a 16-bit entry count promoted to ZIP64.
pub const ZIP64_U16_SENTINEL: u16 = 0xFFFF;

pub fn read_u16_le<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_u64_le<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn write_u16_le<W: Write>(w: &mut W, v: u16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_u32_le<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_u64_le<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Unknown/absent numeric field, as used for CRC32, sizes (i64) per the data model.
pub const UNKNOWN: i64 = -1;

/// Convert a DOS date+time pair (as packed into the 4-byte `mod time/date`
/// header field, date in the high 16 bits) into a Unix epoch timestamp,
/// treating the DOS fields as local time, per APPNOTE. Resolution is 2s.
pub fn dos_to_unix(dos: u32) -> i64 {
    let time = (dos & 0xFFFF) as u16;
    let date = (dos >> 16) as u16;

    let seconds = ((time & 0x1F) as u32) * 2;
    let minutes = ((time >> 5) & 0x3F) as u32;
    let hours = ((time >> 11) & 0x1F) as u32;

    let day = (date & 0x1F) as u32;
    let month = ((date >> 5) & 0x0F) as u32;
    let year = ((date >> 9) & 0x7F) as i32 + 1980;

    let day = day.max(1);
    let month = month.clamp(1, 12);

    let naive = chrono::NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(1980, 1, 1).unwrap())
        .and_hms_opt(hours.min(23), minutes.min(59), seconds.min(59))
        .unwrap();

    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.timestamp(),
        chrono::LocalResult::Ambiguous(dt, _) => dt.timestamp(),
        chrono::LocalResult::None => naive.and_utc().timestamp(),
    }
}

/// Convert a Unix epoch timestamp into a packed DOS date+time field,
/// via the local timezone (inverse of [`dos_to_unix`]).
pub fn unix_to_dos(epoch: i64) -> u32 {
    let dt = match Local.timestamp_opt(epoch, 0) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => return dos_epoch_floor(),
    };

    let year = dt.year();
    if year < 1980 {
        return dos_epoch_floor();
    }
    let year = ((year - 1980).min(127)) as u32;
    let month = dt.month();
    let day = dt.day();
    let date: u16 = ((year << 9) | (month << 5) | day) as u16;

    let hour = dt.hour();
    let minute = dt.minute();
    let second = dt.second() / 2;
    let time: u16 = ((hour << 11) | (minute << 5) | second) as u16;

    ((date as u32) << 16) | time as u32
}

fn dos_epoch_floor() -> u32 {
    // 1980-01-01 00:00:00
    (1u32 << 5 | 1) << 16
}

/// A Windows FILETIME (100ns ticks since 1601-01-01) <-> Unix epoch seconds,
/// used by the NTFS extra field (0x000A).
pub fn filetime_to_unix(ticks: u64) -> i64 {
    const TICKS_PER_SEC: i64 = 10_000_000;
    const EPOCH_DIFF_SECS: i64 = 11_644_473_600;
    (ticks as i64) / TICKS_PER_SEC - EPOCH_DIFF_SECS
}

pub fn unix_to_filetime(epoch: i64) -> u64 {
    const TICKS_PER_SEC: i64 = 10_000_000;
    const EPOCH_DIFF_SECS: i64 = 11_644_473_600;
    ((epoch + EPOCH_DIFF_SECS) * TICKS_PER_SEC) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dos_time_roundtrip_within_2s() {
        let t = Local.with_ymd_and_hms(2024, 6, 15, 10, 30, 44).unwrap().timestamp();
        let dos = unix_to_dos(t);
        let back = dos_to_unix(dos);
        assert!((back - t).abs() <= 2);
    }

    #[test]
    fn dos_epoch_base() {
        let dos = unix_to_dos(0);
        // Any pre-1980 timestamp floors to the DOS epoch.
        assert_eq!(dos >> 16, (1u32 << 5 | 1));
    }

    #[test]
    fn filetime_roundtrip() {
        let epoch = 1_700_000_000i64;
        let ft = unix_to_filetime(epoch);
        assert_eq!(filetime_to_unix(ft), epoch);
    }
}
