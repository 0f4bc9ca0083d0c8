//! Utility functions for converting registry data to and from raw bytes.

use crate::error::DecodeError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use encoding_rs::UTF_16LE;
use std::io::Cursor;

/// Reads a UTF-16LE string from a byte slice, trimming null terminators.
///
/// Registry strings are typically null-terminated. This function decodes
/// UTF-16LE data and removes trailing null characters.
///
/// # Errors
///
/// Returns an error if the data length is not even (UTF-16 requires 2-byte units)
/// or if the UTF-16 decoding fails.
pub fn read_utf16_string(data: &[u8]) -> Result<String, DecodeError> {
    if data.is_empty() {
        return Ok(String::new());
    }

    if data.len() % 2 != 0 {
        return Err(DecodeError::InvalidUtf16);
    }

    let (decoded, _encoding, had_errors) = UTF_16LE.decode(data);

    if had_errors {
        return Err(DecodeError::InvalidUtf16);
    }

    Ok(decoded.trim_end_matches('\0').to_string())
}

/// Appends `s` to `out` as UTF-16LE followed by a null terminator.
pub fn write_utf16_string(out: &mut Vec<u8>, s: &str) {
    for unit in s.encode_utf16().chain(std::iter::once(0)) {
        // writing to a Vec cannot fail
        let _ = out.write_u16::<LittleEndian>(unit);
    }
}

/// Reads a little-endian u32 from the start of a byte slice.
pub fn read_u32_le(data: &[u8]) -> Result<u32, DecodeError> {
    if data.len() < 4 {
        return Err(DecodeError::Truncated {
            expected: 4,
            actual: data.len(),
        });
    }

    let mut cursor = Cursor::new(data);
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| DecodeError::Truncated {
            expected: 4,
            actual: data.len(),
        })
}

/// Reads a little-endian u64 from the start of a byte slice.
pub fn read_u64_le(data: &[u8]) -> Result<u64, DecodeError> {
    if data.len() < 8 {
        return Err(DecodeError::Truncated {
            expected: 8,
            actual: data.len(),
        });
    }

    let mut cursor = Cursor::new(data);
    cursor
        .read_u64::<LittleEndian>()
        .map_err(|_| DecodeError::Truncated {
            expected: 8,
            actual: data.len(),
        })
}
