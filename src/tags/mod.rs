//! Tag attributes
//!
//! A record's tag region is a run of `{tag: [u8; 2], type: u8, value}` entries with
//! no count; it ends where the record buffer ends. This module defines the tag and
//! type codes, the closed set of values the codec reads and writes, and the sizing
//! rules used to walk the region.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, RecordError, Result, TagError, UnsupportedError};

pub mod directory;
pub mod standard;

pub use directory::AttributeDirectory;

/// A two-character tag name
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag([u8; 2]);

impl Tag {
    #[must_use]
    pub const fn new(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }

    /// The 16-bit binary code, second character in the high byte
    ///
    /// ```
    /// use bamrec::tags::Tag;
    ///
    /// assert_eq!(Tag::new(*b"RG").code(), u16::from(b'G') << 8 | u16::from(b'R'));
    /// ```
    #[must_use]
    pub fn code(self) -> u16 {
        u16::from_le_bytes(self.0)
    }

    #[must_use]
    pub fn from_code(code: u16) -> Self {
        Self(code.to_le_bytes())
    }
}

impl TryFrom<&str> for Tag {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        match name.as_bytes() {
            &[a, b] if a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric() => Ok(Self([a, b])),
            _ => Err(TagError::InvalidName(name.to_string()).into()),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

/// Tag value type codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagType {
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float,
    String,
    Hex,
    Array,
}

impl TagType {
    #[must_use]
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            b'A' => Self::Char,
            b'c' => Self::Int8,
            b'C' => Self::UInt8,
            b's' => Self::Int16,
            b'S' => Self::UInt16,
            b'i' => Self::Int32,
            b'I' => Self::UInt32,
            b'f' => Self::Float,
            b'Z' => Self::String,
            b'H' => Self::Hex,
            b'B' => Self::Array,
            _ => return None,
        })
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Char => b'A',
            Self::Int8 => b'c',
            Self::UInt8 => b'C',
            Self::Int16 => b's',
            Self::UInt16 => b'S',
            Self::Int32 => b'i',
            Self::UInt32 => b'I',
            Self::Float => b'f',
            Self::String => b'Z',
            Self::Hex => b'H',
            Self::Array => b'B',
        }
    }

    /// Value width for fixed-size types
    #[must_use]
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Char | Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float => Some(4),
            Self::String | Self::Hex | Self::Array => None,
        }
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::UInt8 | Self::Int16 | Self::UInt16 | Self::Int32 | Self::UInt32
        )
    }

    /// Whether a value declared as `self` may be stored in a slot of type `stored`
    ///
    /// Integers may be written into a slot of the same or a strictly wider width.
    #[must_use]
    pub fn fits_into(self, stored: TagType) -> bool {
        if self == stored {
            return true;
        }
        match (self.fixed_size(), stored.fixed_size()) {
            (Some(requested), Some(existing)) if self.is_integer() && stored.is_integer() => {
                requested < existing
            }
            _ => false,
        }
    }

    /// Smallest integer type holding `value`, preferring signed at each width
    #[must_use]
    pub fn smallest_int(value: i64) -> Option<Self> {
        [
            Self::Int8,
            Self::UInt8,
            Self::Int16,
            Self::UInt16,
            Self::Int32,
            Self::UInt32,
        ]
        .into_iter()
        .find(|ty| ty.holds(value))
    }

    pub(crate) fn holds(self, value: i64) -> bool {
        match self {
            Self::Int8 => i8::try_from(value).is_ok(),
            Self::UInt8 => u8::try_from(value).is_ok(),
            Self::Int16 => i16::try_from(value).is_ok(),
            Self::UInt16 => u16::try_from(value).is_ok(),
            Self::Int32 => i32::try_from(value).is_ok(),
            Self::UInt32 => u32::try_from(value).is_ok(),
            _ => false,
        }
    }

    /// Reinterprets the low bits of `value` at this integer width
    pub(crate) fn truncate(self, value: i64) -> i64 {
        if self.is_integer() {
            read_int(self, &value.to_le_bytes())
        } else {
            value
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code() as char)
    }
}

/// Integer `B` arrays
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Array {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
}

impl Array {
    #[must_use]
    pub fn element_type(&self) -> TagType {
        match self {
            Self::Int8(_) => TagType::Int8,
            Self::UInt8(_) => TagType::UInt8,
            Self::Int16(_) => TagType::Int16,
            Self::UInt16(_) => TagType::UInt16,
            Self::Int32(_) => TagType::Int32,
            Self::UInt32(_) => TagType::UInt32,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int8(v) => v.len(),
            Self::UInt8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::UInt32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_i64s(&self) -> Vec<i64> {
        match self {
            Self::Int8(v) => v.iter().map(|&x| i64::from(x)).collect(),
            Self::UInt8(v) => v.iter().map(|&x| i64::from(x)).collect(),
            Self::Int16(v) => v.iter().map(|&x| i64::from(x)).collect(),
            Self::UInt16(v) => v.iter().map(|&x| i64::from(x)).collect(),
            Self::Int32(v) => v.iter().map(|&x| i64::from(x)).collect(),
            Self::UInt32(v) => v.iter().map(|&x| i64::from(x)).collect(),
        }
    }
}

/// A decoded tag value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Char(u8),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float(f32),
    String(String),
    Array(Array),
}

impl Value {
    /// The type this value is written as when no type is given
    #[must_use]
    pub fn tag_type(&self) -> TagType {
        match self {
            Self::Char(_) => TagType::Char,
            Self::Int8(_) => TagType::Int8,
            Self::UInt8(_) => TagType::UInt8,
            Self::Int16(_) => TagType::Int16,
            Self::UInt16(_) => TagType::UInt16,
            Self::Int32(_) => TagType::Int32,
            Self::UInt32(_) => TagType::UInt32,
            Self::Float(_) => TagType::Float,
            Self::String(_) => TagType::String,
            Self::Array(_) => TagType::Array,
        }
    }

    /// The value widened to `i64`, for integer variants
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int8(v) => Some(i64::from(v)),
            Self::UInt8(v) => Some(i64::from(v)),
            Self::Int16(v) => Some(i64::from(v)),
            Self::UInt16(v) => Some(i64::from(v)),
            Self::Int32(v) => Some(i64::from(v)),
            Self::UInt32(v) => Some(i64::from(v)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Builds the integer variant for `ty` from an `i64` already in range
    pub(crate) fn int_of_type(ty: TagType, value: i64) -> Option<Self> {
        Some(match ty {
            TagType::Int8 => Self::Int8(i8::try_from(value).ok()?),
            TagType::UInt8 => Self::UInt8(u8::try_from(value).ok()?),
            TagType::Int16 => Self::Int16(i16::try_from(value).ok()?),
            TagType::UInt16 => Self::UInt16(u16::try_from(value).ok()?),
            TagType::Int32 => Self::Int32(i32::try_from(value).ok()?),
            TagType::UInt32 => Self::UInt32(u32::try_from(value).ok()?),
            _ => return None,
        })
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::Int8(v)
    }
}
impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::UInt8(v)
    }
}
impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int16(v)
    }
}
impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::UInt16(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}
impl From<Array> for Value {
    fn from(v: Array) -> Self {
        Self::Array(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{}", *c as char),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Array(array) => {
                write!(f, "{}", array.element_type())?;
                for v in array.to_i64s() {
                    write!(f, ",{v}")?;
                }
                Ok(())
            }
            other => match other.as_int() {
                Some(v) => write!(f, "{v}"),
                None => Ok(()),
            },
        }
    }
}

/// Size in bytes of the value following a type byte
///
/// `data` starts at the first value byte and runs to the end of the tag region;
/// `entry` is the region offset of the entry, used in error reports.
pub(crate) fn value_size(tag: Tag, code: u8, data: &[u8], entry: usize) -> Result<usize> {
    let ty = TagType::from_u8(code).ok_or(RecordError::UnknownTagType { tag, code })?;
    let size = match ty.fixed_size() {
        Some(size) => size,
        None => match ty {
            TagType::String | TagType::Hex => {
                memchr::memchr(0, data).ok_or(RecordError::TagOverrun(entry))? + 1
            }
            _ => {
                if data.len() < 5 {
                    return Err(RecordError::TagOverrun(entry).into());
                }
                let elem_code = data[0];
                let elem_size = TagType::from_u8(elem_code)
                    .filter(|t| t.is_integer() || *t == TagType::Float)
                    .and_then(TagType::fixed_size)
                    .ok_or(RecordError::UnknownTagType {
                        tag,
                        code: elem_code,
                    })?;
                let count = LittleEndian::read_u32(&data[1..5]) as usize;
                count
                    .checked_mul(elem_size)
                    .and_then(|n| n.checked_add(5))
                    .ok_or(RecordError::TagOverrun(entry))?
            }
        },
    };
    if size > data.len() {
        return Err(RecordError::TagOverrun(entry).into());
    }
    Ok(size)
}

fn read_int(ty: TagType, data: &[u8]) -> i64 {
    match ty {
        TagType::Int8 => i64::from(i8::from_le_bytes([data[0]])),
        TagType::UInt8 => i64::from(data[0]),
        TagType::Int16 => i64::from(LittleEndian::read_i16(data)),
        TagType::UInt16 => i64::from(LittleEndian::read_u16(data)),
        TagType::Int32 => i64::from(LittleEndian::read_i32(data)),
        _ => i64::from(LittleEndian::read_u32(data)),
    }
}

/// Decodes the value of `tag` stored with type `code`; `data` starts at the value
pub(crate) fn decode_value(tag: Tag, code: u8, data: &[u8]) -> Result<Value> {
    let ty = TagType::from_u8(code).ok_or(RecordError::UnknownTagType { tag, code })?;
    match ty {
        TagType::Char => Ok(Value::Char(data[0])),
        TagType::Float => Err(UnsupportedError::FloatTag(tag).into()),
        TagType::Hex => Err(UnsupportedError::HexTag(tag).into()),
        TagType::String => {
            let end = memchr::memchr(0, data).unwrap_or(data.len());
            Ok(Value::String(std::str::from_utf8(&data[..end])?.to_string()))
        }
        TagType::Array => decode_array(tag, data),
        int => Value::int_of_type(int, read_int(int, data))
            .ok_or_else(|| RecordError::UnknownTagType { tag, code }.into()),
    }
}

fn decode_array(tag: Tag, data: &[u8]) -> Result<Value> {
    let elem_code = data[0];
    let count = LittleEndian::read_u32(&data[1..5]) as usize;
    let body = &data[5..];
    let array = match TagType::from_u8(elem_code) {
        Some(TagType::Int8) => Array::Int8(body[..count].iter().map(|&b| b as i8).collect()),
        Some(TagType::UInt8) => Array::UInt8(body[..count].to_vec()),
        Some(TagType::Int16) => Array::Int16(
            body[..count * 2]
                .chunks_exact(2)
                .map(LittleEndian::read_i16)
                .collect(),
        ),
        Some(TagType::UInt16) => Array::UInt16(
            body[..count * 2]
                .chunks_exact(2)
                .map(LittleEndian::read_u16)
                .collect(),
        ),
        Some(TagType::Int32) => Array::Int32(
            body[..count * 4]
                .chunks_exact(4)
                .map(LittleEndian::read_i32)
                .collect(),
        ),
        Some(TagType::UInt32) => Array::UInt32(
            body[..count * 4]
                .chunks_exact(4)
                .map(LittleEndian::read_u32)
                .collect(),
        ),
        Some(TagType::Float) => return Err(UnsupportedError::FloatTag(tag).into()),
        _ => {
            return Err(RecordError::UnknownTagType {
                tag,
                code: elem_code,
            }
            .into())
        }
    };
    Ok(Value::Array(array))
}

fn incompatible(tag: Tag, ty: TagType, value: &Value) -> Error {
    TagError::IncompatibleValue {
        tag,
        ty: ty.code() as char,
        value: value.to_string(),
    }
    .into()
}

/// Encodes `value` as type `ty`, appending only the value bytes to `out`
///
/// Integer values are truncated to the width of `ty`.
pub(crate) fn encode_value(tag: Tag, ty: TagType, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match ty {
        TagType::Float => return Err(UnsupportedError::FloatTag(tag).into()),
        TagType::Hex => return Err(UnsupportedError::HexTag(tag).into()),
        TagType::Char => match value {
            Value::Char(c) if c.is_ascii_graphic() => out.push(*c),
            _ => return Err(incompatible(tag, ty, value)),
        },
        TagType::String => match value {
            Value::String(s) if !s.as_bytes().contains(&0) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            _ => return Err(incompatible(tag, ty, value)),
        },
        TagType::Array => match value {
            Value::Array(array) => encode_array(tag, array, value, out)?,
            _ => return Err(incompatible(tag, ty, value)),
        },
        int => {
            let v = value.as_int().ok_or_else(|| incompatible(tag, ty, value))?;
            encode_int(int, int.truncate(v), out);
        }
    }
    Ok(())
}

/// Appends the low bits of `value` at the width of integer type `ty`
pub(crate) fn encode_int(ty: TagType, value: i64, out: &mut Vec<u8>) {
    let width = ty.fixed_size().unwrap_or(4);
    out.extend_from_slice(&value.to_le_bytes()[..width]);
}

fn encode_array(tag: Tag, array: &Array, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    let count = u32::try_from(array.len()).map_err(|_| incompatible(tag, TagType::Array, value))?;
    let elem = array.element_type();
    out.push(elem.code());
    out.extend_from_slice(&count.to_le_bytes());
    for v in array.to_i64s() {
        encode_int(elem, v, out);
    }
    Ok(())
}

#[cfg(test)]
mod testing {
    use rstest::rstest;

    use super::*;

    fn xa() -> Tag {
        Tag::new(*b"XA")
    }

    #[test]
    fn test_tag_code() {
        let tag = Tag::try_from("RG").unwrap();
        assert_eq!(tag.code(), 0x4752);
        assert_eq!(Tag::from_code(0x4752), tag);
        assert_eq!(tag.to_string(), "RG");
    }

    #[rstest]
    #[case("")]
    #[case("R")]
    #[case("RGX")]
    #[case("R!")]
    fn test_invalid_tag_name(#[case] name: &str) {
        assert!(Tag::try_from(name).is_err());
    }

    #[rstest]
    #[case(0, TagType::Int8)]
    #[case(-128, TagType::Int8)]
    #[case(200, TagType::UInt8)]
    #[case(-129, TagType::Int16)]
    #[case(40_000, TagType::UInt16)]
    #[case(-40_000, TagType::Int32)]
    #[case(3_000_000_000, TagType::UInt32)]
    fn test_smallest_int(#[case] value: i64, #[case] expected: TagType) {
        assert_eq!(TagType::smallest_int(value), Some(expected));
    }

    #[test]
    fn test_smallest_int_out_of_range() {
        assert_eq!(TagType::smallest_int(1 << 40), None);
        assert_eq!(TagType::smallest_int(-(1 << 40)), None);
    }

    #[rstest]
    #[case(TagType::Int8, TagType::Int16, true)]
    #[case(TagType::UInt8, TagType::Int32, true)]
    #[case(TagType::Int16, TagType::Int16, true)]
    #[case(TagType::Int16, TagType::Int8, false)]
    #[case(TagType::Int32, TagType::Int16, false)]
    #[case(TagType::String, TagType::Int8, false)]
    #[case(TagType::Int8, TagType::Char, false)]
    fn test_fits_into(#[case] requested: TagType, #[case] stored: TagType, #[case] ok: bool) {
        assert_eq!(requested.fits_into(stored), ok);
    }

    #[test]
    fn test_value_sizes() -> Result<()> {
        assert_eq!(value_size(xa(), b'A', b"x", 0)?, 1);
        assert_eq!(value_size(xa(), b's', &[0, 0], 0)?, 2);
        assert_eq!(value_size(xa(), b'Z', b"abc\0rest", 0)?, 4);
        assert_eq!(value_size(xa(), b'H', b"1F\0", 0)?, 3);
        let array = [b'S', 2, 0, 0, 0, 1, 0, 2, 0];
        assert_eq!(value_size(xa(), b'B', &array, 0)?, 9);
        Ok(())
    }

    #[test]
    fn test_value_size_errors() {
        assert!(value_size(xa(), b'q', b"x", 0).unwrap_err().is_malformed());
        assert!(value_size(xa(), b'i', &[0, 0], 0).unwrap_err().is_malformed());
        assert!(value_size(xa(), b'Z', b"abc", 0).unwrap_err().is_malformed());
        assert!(value_size(xa(), b'B', &[b'c', 4, 0, 0, 0, 1], 0)
            .unwrap_err()
            .is_malformed());
        assert!(value_size(xa(), b'B', &[b'Z', 0, 0, 0, 0], 0)
            .unwrap_err()
            .is_malformed());
    }

    #[test]
    fn test_encode_truncates_integers() -> Result<()> {
        let mut out = Vec::new();
        encode_value(xa(), TagType::Int8, &Value::Int32(0x8F), &mut out)?;
        assert_eq!(out, [0x8F]);
        assert_eq!(decode_value(xa(), b'c', &out)?, Value::Int8(-113));
        Ok(())
    }

    #[test]
    fn test_encode_decode_values() -> Result<()> {
        let cases = [
            (TagType::Char, Value::Char(b'q')),
            (TagType::UInt16, Value::UInt16(65_000)),
            (TagType::Int32, Value::Int32(-5)),
            (TagType::UInt32, Value::UInt32(4_000_000_000)),
            (TagType::String, Value::from("chr1,100,+,10M,0")),
            (
                TagType::Array,
                Value::Array(Array::Int16(vec![-3, 0, 700])),
            ),
        ];
        for (ty, value) in cases {
            let mut out = Vec::new();
            encode_value(xa(), ty, &value, &mut out)?;
            assert_eq!(value_size(xa(), ty.code(), &out, 0)?, out.len());
            assert_eq!(decode_value(xa(), ty.code(), &out)?, value);
        }
        Ok(())
    }

    #[test]
    fn test_unsupported_types() {
        let mut out = Vec::new();
        let err = encode_value(xa(), TagType::Float, &Value::Float(1.5), &mut out).unwrap_err();
        assert!(err.is_unsupported());
        assert!(decode_value(xa(), b'f', &[0, 0, 0, 0])
            .unwrap_err()
            .is_unsupported());
        assert!(decode_value(xa(), b'H', b"1F\0")
            .unwrap_err()
            .is_unsupported());
        assert!(decode_value(xa(), b'B', &[b'f', 0, 0, 0, 0])
            .unwrap_err()
            .is_unsupported());
    }

    #[test]
    fn test_incompatible_values() {
        let mut out = Vec::new();
        assert!(encode_value(xa(), TagType::Int8, &Value::from("x"), &mut out).is_err());
        assert!(encode_value(xa(), TagType::String, &Value::Int8(1), &mut out).is_err());
        assert!(encode_value(xa(), TagType::String, &Value::from("a\0b"), &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int16(-7).to_string(), "-7");
        assert_eq!(Value::Array(Array::UInt8(vec![1, 2])).to_string(), "C,1,2");
    }
}
