//! Value data encoding, validation and comparison.
//!
//! Declared data arrives as loosely typed input ([`RawData`]) and is turned
//! into a [`ValueData`] that always satisfies the contract of its
//! [`ValueKind`]:
//!
//! - `string`, `expand`: stored as given, compared exactly.
//! - `array`: ordered list of strings, compared element-wise.
//! - `dword`, `qword`: integer literals whose magnitude fits in 32/64 bits.
//! - `binary`: hex digit pairs, canonicalized to lower case with one space
//!   between pairs (`"CaFE BEEF"` becomes `"ca fe be ef"`), compared
//!   ignoring case.

use crate::error::ValidationError;
use crate::value::ValueType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// REG_SZ.
    #[default]
    String,

    /// REG_EXPAND_SZ.
    Expand,

    /// REG_MULTI_SZ.
    Array,

    /// REG_DWORD.
    Dword,

    /// REG_QWORD.
    Qword,

    /// REG_BINARY.
    Binary,
}

impl ValueKind {
    /// Returns the registry type used to store this kind.
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueKind::String => ValueType::String,
            ValueKind::Expand => ValueType::ExpandString,
            ValueKind::Array => ValueType::MultiString,
            ValueKind::Dword => ValueType::Dword,
            ValueKind::Qword => ValueType::Qword,
            ValueKind::Binary => ValueType::Binary,
        }
    }

    /// Returns the declared name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Expand => "expand",
            ValueKind::Array => "array",
            ValueKind::Dword => "dword",
            ValueKind::Qword => "qword",
            ValueKind::Binary => "binary",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared data before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawData {
    /// A single string literal.
    Text(String),

    /// A bare number literal.
    Number(serde_json::Number),

    /// A list of strings.
    List(Vec<String>),
}

impl RawData {
    /// Data assumed when none is declared.
    pub fn default_for(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Array => RawData::List(Vec::new()),
            _ => RawData::Text(String::new()),
        }
    }
}

impl From<&str> for RawData {
    fn from(s: &str) -> Self {
        RawData::Text(s.to_string())
    }
}

impl From<Vec<&str>> for RawData {
    fn from(items: Vec<&str>) -> Self {
        RawData::List(items.into_iter().map(str::to_string).collect())
    }
}

/// Validated value data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueData {
    /// String value.
    String(String),

    /// Expandable string value.
    ExpandString(String),

    /// Multiple strings.
    MultiString(Vec<String>),

    /// 32-bit integer.
    Dword(u32),

    /// 64-bit integer.
    Qword(u64),

    /// Binary data in canonical hex form.
    Binary(String),
}

impl ValueData {
    /// Returns the kind of this data.
    pub fn kind(&self) -> ValueKind {
        match self {
            ValueData::String(_) => ValueKind::String,
            ValueData::ExpandString(_) => ValueKind::Expand,
            ValueData::MultiString(_) => ValueKind::Array,
            ValueData::Dword(_) => ValueKind::Dword,
            ValueData::Qword(_) => ValueKind::Qword,
            ValueData::Binary(_) => ValueKind::Binary,
        }
    }

    /// Returns true if `self`, read from the registry, satisfies `desired`.
    pub fn matches(&self, desired: &ValueData) -> bool {
        matches(desired.kind(), self, desired)
    }

    /// Creates binary data from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        ValueData::Binary(canonical_hex(bytes))
    }

    /// Returns the bytes of binary data, or `None` for other kinds.
    pub fn binary_bytes(&self) -> Option<Vec<u8>> {
        match self {
            ValueData::Binary(hex) => hex::decode(hex.replace(' ', "")).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueData::String(s) | ValueData::ExpandString(s) => f.write_str(s),
            ValueData::MultiString(strings) => f.write_str(&strings.join(",")),
            ValueData::Dword(d) => write!(f, "{}", d),
            ValueData::Qword(q) => write!(f, "{}", q),
            ValueData::Binary(hex) => f.write_str(hex),
        }
    }
}

/// Validates declared data for `kind`.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the offending literal if the data
/// does not satisfy the kind's contract.
///
/// # Examples
///
/// ```rust
/// use reg_reconcile::codec::{encode, RawData, ValueData, ValueKind};
///
/// let data = encode(ValueKind::Binary, &RawData::from("CaFE BEEF")).unwrap();
/// assert_eq!(data, ValueData::Binary("ca fe be ef".to_string()));
///
/// assert!(encode(ValueKind::Dword, &RawData::from("4294967296")).is_err());
/// ```
pub fn encode(kind: ValueKind, raw: &RawData) -> Result<ValueData, ValidationError> {
    match kind {
        ValueKind::Array => encode_array(raw),
        ValueKind::String => string_literal(kind, raw).map(ValueData::String),
        ValueKind::Expand => string_literal(kind, raw).map(ValueData::ExpandString),
        ValueKind::Dword => {
            let (literal, _) = scalar_literal(kind, raw)?;
            parse_integer(&literal)
                .filter(|(_, magnitude)| magnitude >> 32 == 0)
                .map(|(negative, magnitude)| {
                    let value = magnitude as u32;
                    ValueData::Dword(if negative { value.wrapping_neg() } else { value })
                })
                .ok_or(ValidationError::NotAValidDword(literal))
        }
        ValueKind::Qword => {
            let (literal, _) = scalar_literal(kind, raw)?;
            parse_integer(&literal)
                .filter(|(_, magnitude)| magnitude >> 64 == 0)
                .map(|(negative, magnitude)| {
                    let value = magnitude as u64;
                    ValueData::Qword(if negative { value.wrapping_neg() } else { value })
                })
                .ok_or(ValidationError::NotAValidQword(literal))
        }
        ValueKind::Binary => {
            let (literal, is_number) = scalar_literal(kind, raw)?;
            let small_number =
                is_number && parse_integer(&literal).map_or(false, |(neg, m)| neg || m <= 9);
            let padded = if literal.chars().count() == 1 || small_number {
                format!("0{}", literal)
            } else {
                literal
            };
            normalize_hex(&padded).map(ValueData::Binary)
        }
    }
}

fn encode_array(raw: &RawData) -> Result<ValueData, ValidationError> {
    let items = match raw {
        RawData::Text(s) => vec![s.clone()],
        RawData::Number(n) => vec![n.to_string()],
        RawData::List(items) => items.clone(),
    };
    if let Some(bad) = items.iter().find(|s| s.is_empty() || s.contains('\0')) {
        return Err(ValidationError::NotAValidArray(bad.clone()));
    }
    Ok(ValueData::MultiString(items))
}

/// REG_SZ data ends at the first NUL, so a string holding one would never
/// read back equal.
fn string_literal(kind: ValueKind, raw: &RawData) -> Result<String, ValidationError> {
    let (literal, _) = scalar_literal(kind, raw)?;
    if literal.contains('\0') {
        return Err(ValidationError::NotAValidString(literal));
    }
    Ok(literal)
}

/// The single literal of scalar data, and whether it was a bare number.
fn scalar_literal(kind: ValueKind, raw: &RawData) -> Result<(String, bool), ValidationError> {
    match raw {
        RawData::Text(s) => Ok((s.clone(), false)),
        RawData::Number(n) => Ok((number_literal(n), true)),
        RawData::List(items) if items.len() == 1 => Ok((items[0].clone(), false)),
        RawData::List(items) => Err(ValidationError::UnexpectedArray {
            kind,
            len: items.len(),
        }),
    }
}

/// Spells a JSON number as an integer literal when it has no fractional
/// part, so `1.0` reads as `1`.
fn number_literal(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 => format!("{}", f as i128),
        _ => n.to_string(),
    }
}

/// Compares current registry data against desired data of `kind`.
///
/// Binary data is compared ignoring case; every other kind must be exactly
/// equal, arrays element by element in order. Data of a different kind
/// never matches.
pub fn matches(kind: ValueKind, current: &ValueData, desired: &ValueData) -> bool {
    if current.kind() != kind || desired.kind() != kind {
        return false;
    }

    match (current, desired) {
        (ValueData::Binary(a), ValueData::Binary(b)) => a.eq_ignore_ascii_case(b),
        _ => current == desired,
    }
}

/// Validates and canonicalizes a hex string.
///
/// The input must be a sequence of hex digit pairs, each optionally
/// followed by a single space.
pub fn normalize_hex(raw: &str) -> Result<String, ValidationError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if i + 1 >= bytes.len()
            || !bytes[i].is_ascii_hexdigit()
            || !bytes[i + 1].is_ascii_hexdigit()
        {
            return Err(ValidationError::NotAValidHex(raw.to_string()));
        }
        i += 2;
        if bytes.get(i) == Some(&b' ') {
            i += 1;
        }
    }

    let compact: String = raw.split_whitespace().collect();
    let decoded =
        hex::decode(&compact).map_err(|_| ValidationError::NotAValidHex(raw.to_string()))?;
    Ok(canonical_hex(&decoded))
}

fn canonical_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses an integer literal into its sign and magnitude.
///
/// Accepts an optional sign followed by decimal, `0x` hex, `0b` binary,
/// `0o` or leading-zero octal digits, with single underscores allowed
/// between digits.
fn parse_integer(literal: &str) -> Option<(bool, u128)> {
    let trimmed = literal.trim();
    let (negative, unsigned) = match trimmed.as_bytes().first()? {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let lower = unsigned.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__")
    {
        return None;
    }

    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    if !cleaned.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    u128::from_str_radix(&cleaned, radix)
        .ok()
        .map(|magnitude| (negative, magnitude))
}
