//! Registry value types and their raw byte representation.
//!
//! The registry stores every value as a type id plus a byte buffer. This
//! module converts between that wire form and the typed [`ValueData`]
//! the reconciler compares.

use crate::codec::ValueData;
use crate::error::DecodeError;
use crate::utils::{read_u32_le, read_u64_le, read_utf16_string, write_utf16_string};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// Registry value data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value type.
    None,

    /// String (null-terminated).
    String,

    /// String with environment variables.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit little-endian integer.
    Dword,

    /// 32-bit big-endian integer.
    DwordBigEndian,

    /// Symbolic link (Unicode).
    Link,

    /// Multiple strings.
    MultiString,

    /// Resource list.
    ResourceList,

    /// Full resource descriptor.
    FullResourceDescriptor,

    /// Resource requirements list.
    ResourceRequirementsList,

    /// 64-bit little-endian integer.
    Qword,

    /// Unknown or non-standard value type.
    /// Contains the raw type value.
    Unknown(u32),
}

impl ValueType {
    /// Parses a value type from its numeric id.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            _ => ValueType::Unknown(value),
        }
    }

    /// Returns the numeric id of this value type.
    pub fn as_u32(&self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::Qword => 11,
            ValueType::Unknown(value) => *value,
        }
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> String {
        match self {
            ValueType::None => "REG_NONE".to_string(),
            ValueType::String => "REG_SZ".to_string(),
            ValueType::ExpandString => "REG_EXPAND_SZ".to_string(),
            ValueType::Binary => "REG_BINARY".to_string(),
            ValueType::Dword => "REG_DWORD".to_string(),
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN".to_string(),
            ValueType::Link => "REG_LINK".to_string(),
            ValueType::MultiString => "REG_MULTI_SZ".to_string(),
            ValueType::ResourceList => "REG_RESOURCE_LIST".to_string(),
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR".to_string(),
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST".to_string(),
            ValueType::Qword => "REG_QWORD".to_string(),
            ValueType::Unknown(value) => format!("REG_UNKNOWN_{:#010x}", value),
        }
    }
}

/// A value as the registry stores it: a type id and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValue {
    /// Registry type of the data.
    pub value_type: ValueType,

    /// Raw data bytes.
    pub bytes: Vec<u8>,
}

impl RawValue {
    /// Creates a raw value.
    pub fn new(value_type: ValueType, bytes: Vec<u8>) -> Self {
        Self { value_type, bytes }
    }

    /// Serializes typed data into its registry representation.
    pub fn encode(data: &ValueData) -> Self {
        let mut bytes = Vec::new();
        match data {
            ValueData::String(s) | ValueData::ExpandString(s) => write_utf16_string(&mut bytes, s),
            ValueData::MultiString(strings) => {
                for s in strings {
                    write_utf16_string(&mut bytes, s);
                }
                // list terminator
                bytes.extend_from_slice(&[0, 0]);
            }
            ValueData::Dword(d) => bytes.extend_from_slice(&d.to_le_bytes()),
            ValueData::Qword(q) => bytes.extend_from_slice(&q.to_le_bytes()),
            ValueData::Binary(_) => bytes = data.binary_bytes().unwrap_or_default(),
        }

        Self {
            value_type: data.kind().value_type(),
            bytes,
        }
    }

    /// Parses the raw bytes into typed data.
    ///
    /// # Errors
    ///
    /// Returns an error if the type has no supported counterpart or the
    /// bytes are truncated or not valid UTF-16.
    pub fn decode(&self) -> Result<ValueData, DecodeError> {
        let data = self.bytes.as_slice();

        match self.value_type {
            ValueType::String => Ok(ValueData::String(read_utf16_string(data)?)),

            ValueType::ExpandString => Ok(ValueData::ExpandString(read_utf16_string(data)?)),

            ValueType::Binary => Ok(ValueData::from_bytes(data)),

            ValueType::Dword => Ok(ValueData::Dword(read_u32_le(data)?)),

            ValueType::DwordBigEndian => {
                if data.len() < 4 {
                    return Err(DecodeError::Truncated {
                        expected: 4,
                        actual: data.len(),
                    });
                }
                Ok(ValueData::Dword(BigEndian::read_u32(data)))
            }

            ValueType::Qword => Ok(ValueData::Qword(read_u64_le(data)?)),

            ValueType::MultiString => {
                let full_string = read_utf16_string(data)?;
                let strings: Vec<String> = full_string
                    .split('\0')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect();
                Ok(ValueData::MultiString(strings))
            }

            other => Err(DecodeError::UnsupportedType(other)),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Ok(data) => write!(f, "{} {}", self.value_type.name(), data),
            Err(_) => write!(f, "{} {:02x?}", self.value_type.name(), self.bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type() {
        assert_eq!(ValueType::from_u32(1), ValueType::String);
        assert_eq!(ValueType::from_u32(4), ValueType::Dword);
        assert_eq!(ValueType::String.name(), "REG_SZ");
        assert_eq!(ValueType::from_u32(999), ValueType::Unknown(999));
        for id in 0..=11 {
            assert_eq!(ValueType::from_u32(id).as_u32(), id);
        }
    }

    #[test]
    fn test_dword_layout() {
        let raw = RawValue::encode(&ValueData::Dword(0x12345678));
        assert_eq!(raw.value_type, ValueType::Dword);
        assert_eq!(raw.bytes, vec![0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_big_endian_dword_decodes_as_dword() {
        let raw = RawValue::new(ValueType::DwordBigEndian, vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(raw.decode().unwrap(), ValueData::Dword(0x12345678));
    }

    #[test]
    fn test_multi_string_layout() {
        let data = ValueData::MultiString(vec!["a".to_string(), "b".to_string()]);
        let raw = RawValue::encode(&data);
        assert_eq!(raw.value_type, ValueType::MultiString);
        assert_eq!(raw.bytes, vec![b'a', 0, 0, 0, b'b', 0, 0, 0, 0, 0]);
        assert_eq!(raw.decode().unwrap(), data);
    }

    #[test]
    fn test_binary_layout() {
        let data = ValueData::Binary("ca fe be ef".to_string());
        let raw = RawValue::encode(&data);
        assert_eq!(raw.bytes, vec![0xca, 0xfe, 0xbe, 0xef]);
        assert_eq!(raw.decode().unwrap(), data);
    }

    #[test]
    fn test_empty_string() {
        let raw = RawValue::encode(&ValueData::String(String::new()));
        assert_eq!(raw.bytes, vec![0, 0]);
        assert_eq!(raw.decode().unwrap(), ValueData::String(String::new()));
    }

    #[test]
    fn test_truncated_qword() {
        let raw = RawValue::new(ValueType::Qword, vec![1, 2, 3]);
        assert!(matches!(raw.decode(), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_unsupported_type() {
        let raw = RawValue::new(ValueType::Link, vec![0, 0]);
        assert_eq!(
            raw.decode(),
            Err(DecodeError::UnsupportedType(ValueType::Link))
        );
    }
}
