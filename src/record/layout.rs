//! Byte layout of a binary alignment record
//!
//! The record opens with a 32-byte fixed header, followed by five variable
//! regions in order: read name, CIGAR operators, packed bases, qualities and
//! tags. The tag region has no length field and runs to the end of the buffer.

use bytemuck::{Pod, Zeroable};

use crate::error::{RecordError, Result};
use crate::nuc::packed_len;

pub const REFERENCE_INDEX: usize = 0;
pub const POSITION: usize = 4;
pub const READ_NAME_LEN: usize = 8;
pub const MAPPING_QUALITY: usize = 9;
pub const BIN: usize = 10;
pub const CIGAR_LEN: usize = 12;
pub const FLAGS: usize = 14;
pub const READ_LEN: usize = 16;
pub const MATE_REFERENCE_INDEX: usize = 20;
pub const MATE_POSITION: usize = 24;
pub const TEMPLATE_LEN: usize = 28;

/// Size of the fixed header, and the smallest valid record
pub const FIXED_HEADER_LEN: usize = 32;

/// Longest read name, excluding the NUL terminator
pub const MAX_READ_NAME_LEN: usize = 254;

/// Fill byte of a quality region that carries no scores
pub const QUALITY_ABSENT: u8 = 0xFF;

/// The 32-byte fixed header
///
/// Field order and widths match the on-disk layout exactly, so the struct has no
/// padding and can be read from or written to a record with a single copy.
#[derive(Copy, Clone, Pod, Zeroable, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct FixedHeader {
    pub reference_index: i32,
    /// 0-based leftmost position, -1 when unplaced
    pub position: i32,
    /// Read name length including the NUL terminator
    pub read_name_len: u8,
    pub mapping_quality: u8,
    pub bin: u16,
    pub cigar_len: u16,
    pub flags: u16,
    pub read_len: u32,
    pub mate_reference_index: i32,
    pub mate_position: i32,
    pub template_len: i32,
}

impl FixedHeader {
    /// Reads the header from the first 32 bytes of a record
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let header: Self = bytemuck::pod_read_unaligned(&bytes[..FIXED_HEADER_LEN]);
        header.swap_le()
    }

    /// Writes the header over the first 32 bytes of a record
    pub fn write_to(&self, bytes: &mut [u8]) {
        let le = self.swap_le();
        bytes[..FIXED_HEADER_LEN].copy_from_slice(bytemuck::bytes_of(&le));
    }

    /// Converts between host and little-endian order; a no-op on little-endian hosts
    fn swap_le(self) -> Self {
        Self {
            reference_index: i32::from_le(self.reference_index),
            position: i32::from_le(self.position),
            read_name_len: self.read_name_len,
            mapping_quality: self.mapping_quality,
            bin: u16::from_le(self.bin),
            cigar_len: u16::from_le(self.cigar_len),
            flags: u16::from_le(self.flags),
            read_len: u32::from_le(self.read_len),
            mate_reference_index: i32::from_le(self.mate_reference_index),
            mate_position: i32::from_le(self.mate_position),
            template_len: i32::from_le(self.template_len),
        }
    }

    /// Computes the variable regions this header declares
    #[must_use]
    pub fn regions(&self, record_len: usize) -> Regions {
        let mut offset = FIXED_HEADER_LEN;
        let read_name = Span::advance(&mut offset, usize::from(self.read_name_len));
        let cigar = Span::advance(&mut offset, usize::from(self.cigar_len) * 4);
        let bases = Span::advance(&mut offset, packed_len(self.read_len as usize));
        let qualities = Span::advance(&mut offset, self.read_len as usize);
        let tags = Span {
            offset,
            len: record_len.saturating_sub(offset),
        };
        Regions {
            read_name,
            cigar,
            bases,
            qualities,
            tags,
        }
    }

    /// Checks that the declared regions fit inside a record of `record_len` bytes
    pub fn validate(&self, record_len: usize) -> Result<()> {
        if record_len < FIXED_HEADER_LEN {
            return Err(RecordError::TooShort(record_len).into());
        }
        if self.read_name_len == 0 {
            return Err(RecordError::MissingReadNameTerminator.into());
        }
        let regions = self.regions(record_len);
        if regions.tags.offset > record_len {
            return Err(RecordError::Truncated {
                expected: regions.tags.offset - FIXED_HEADER_LEN,
                actual: record_len - FIXED_HEADER_LEN,
            }
            .into());
        }
        Ok(())
    }
}

/// A contiguous byte range of a record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    fn advance(offset: &mut usize, len: usize) -> Self {
        let span = Self {
            offset: *offset,
            len,
        };
        *offset += len;
        span
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    #[must_use]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.end()
    }
}

/// Offsets of the five variable regions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Regions {
    pub read_name: Span,
    pub cigar: Span,
    pub bases: Span,
    pub qualities: Span,
    pub tags: Span,
}

#[cfg(test)]
mod testing {
    use super::*;

    fn header() -> FixedHeader {
        FixedHeader {
            reference_index: 0,
            position: 9996,
            read_name_len: 3,
            mapping_quality: 0,
            bin: 4681,
            cigar_len: 2,
            flags: 99,
            read_len: 101,
            mate_reference_index: 0,
            mate_position: 10_100,
            template_len: 205,
        }
    }

    #[test]
    fn test_header_size() {
        assert_eq!(std::mem::size_of::<FixedHeader>(), FIXED_HEADER_LEN);
    }

    #[test]
    fn test_field_offsets() {
        let mut bytes = [0u8; FIXED_HEADER_LEN];
        header().write_to(&mut bytes);
        assert_eq!(bytes[POSITION..POSITION + 4], 9996i32.to_le_bytes());
        assert_eq!(bytes[READ_NAME_LEN], 3);
        assert_eq!(bytes[BIN..BIN + 2], 4681u16.to_le_bytes());
        assert_eq!(bytes[CIGAR_LEN..CIGAR_LEN + 2], 2u16.to_le_bytes());
        assert_eq!(bytes[FLAGS..FLAGS + 2], 99u16.to_le_bytes());
        assert_eq!(bytes[READ_LEN..READ_LEN + 4], 101u32.to_le_bytes());
        assert_eq!(bytes[MATE_POSITION..MATE_POSITION + 4], 10_100i32.to_le_bytes());
        assert_eq!(bytes[TEMPLATE_LEN..TEMPLATE_LEN + 4], 205i32.to_le_bytes());
        assert_eq!(FixedHeader::from_bytes(&bytes), header());
    }

    #[test]
    fn test_regions() {
        let regions = header().regions(300);
        assert_eq!(regions.read_name, Span { offset: 32, len: 3 });
        assert_eq!(regions.cigar, Span { offset: 35, len: 8 });
        assert_eq!(regions.bases, Span { offset: 43, len: 51 });
        assert_eq!(regions.qualities, Span { offset: 94, len: 101 });
        assert_eq!(regions.tags, Span { offset: 195, len: 105 });
    }

    #[test]
    fn test_validate() {
        assert!(header().validate(195).is_ok());
        assert!(header().validate(194).unwrap_err().is_malformed());
        assert!(header().validate(20).unwrap_err().is_malformed());

        let mut nameless = header();
        nameless.read_name_len = 0;
        assert!(nameless.validate(400).unwrap_err().is_malformed());
    }
}
