//! Packed CIGAR operators
//!
//! Each operator is a little-endian `u32`: the run length in the upper 28 bits and
//! the operator code in the lower 4 bits. [`CigarView`] reads the operator array
//! in place; [`CigarViewMut`] rewrites single slots.

use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, FieldError, RecordError, Result};

/// Largest run length representable in 28 bits
pub const MAX_OP_LEN: u32 = (1 << 28) - 1;

/// The nine CIGAR operators, valued by their binary code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    /// `M`
    Match = 0,
    /// `I`
    Insertion = 1,
    /// `D`
    Deletion = 2,
    /// `N`
    Skip = 3,
    /// `S`
    SoftClip = 4,
    /// `H`
    HardClip = 5,
    /// `P`
    Pad = 6,
    /// `=`
    SequenceMatch = 7,
    /// `X`
    SequenceMismatch = 8,
}

impl Kind {
    /// Decodes a 4-bit operator code
    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => Self::Match,
            1 => Self::Insertion,
            2 => Self::Deletion,
            3 => Self::Skip,
            4 => Self::SoftClip,
            5 => Self::HardClip,
            6 => Self::Pad,
            7 => Self::SequenceMatch,
            8 => Self::SequenceMismatch,
            _ => return Err(RecordError::InvalidCigarOp(code).into()),
        })
    }

    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The SAM text character of the operator
    #[must_use]
    pub fn symbol(self) -> u8 {
        b"MIDNSHP=X"[self as usize]
    }

    /// Parses a SAM text operator character
    #[must_use]
    pub fn from_symbol(symbol: u8) -> Option<Self> {
        b"MIDNSHP=X"
            .iter()
            .position(|&s| s == symbol)
            .and_then(|code| Self::from_code(code as u8).ok())
    }

    /// Whether the operator advances along the reference
    #[must_use]
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            Self::Match | Self::Deletion | Self::Skip | Self::SequenceMatch | Self::SequenceMismatch
        )
    }

    /// Whether the operator advances along the stored read bases
    #[must_use]
    pub fn consumes_read(self) -> bool {
        matches!(
            self,
            Self::Match
                | Self::Insertion
                | Self::SoftClip
                | Self::SequenceMatch
                | Self::SequenceMismatch
        )
    }
}

/// A single operator and its run length
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CigarOp {
    pub kind: Kind,
    pub len: u32,
}

impl CigarOp {
    #[must_use]
    pub fn new(kind: Kind, len: u32) -> Self {
        Self { kind, len }
    }

    /// Decodes a packed `u32` operator
    pub fn from_packed(packed: u32) -> Result<Self> {
        Ok(Self {
            kind: Kind::from_code((packed & 0xF) as u8)?,
            len: packed >> 4,
        })
    }

    /// Encodes to the packed `u32` form
    pub fn to_packed(self) -> Result<u32> {
        if self.len > MAX_OP_LEN {
            return Err(FieldError::CigarOpTooLong(self.len).into());
        }
        Ok((self.len << 4) | u32::from(self.kind.code()))
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind.symbol() as char)
    }
}

/// Parses SAM CIGAR text. `*` parses to no operators.
///
/// # Example
///
/// ```
/// use bamrec::cigar::{parse_cigar, CigarOp, Kind};
///
/// let ops = parse_cigar("45M56S").unwrap();
/// assert_eq!(ops, [CigarOp::new(Kind::Match, 45), CigarOp::new(Kind::SoftClip, 56)]);
/// ```
pub fn parse_cigar(text: &str) -> Result<Vec<CigarOp>> {
    if text == "*" {
        return Ok(Vec::new());
    }
    let invalid = || -> Error { FieldError::InvalidCigarString(text.to_string()).into() };

    let mut ops = Vec::new();
    let mut len: Option<u32> = None;
    for &b in text.as_bytes() {
        if b.is_ascii_digit() {
            let digit = u32::from(b - b'0');
            let next = len
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(invalid)?;
            len = Some(next);
        } else {
            let kind = Kind::from_symbol(b).ok_or_else(invalid)?;
            let run = len.take().ok_or_else(invalid)?;
            ops.push(CigarOp::new(kind, run));
        }
    }
    if len.is_some() || ops.is_empty() {
        return Err(invalid());
    }
    Ok(ops)
}

/// A contiguous, gap-free alignment between read and reference
///
/// Both coordinates are 1-based: `read_start` within the stored bases (soft clips
/// included), `reference_start` on the reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlignmentBlock {
    pub read_start: u32,
    pub reference_start: i32,
    pub len: u32,
}

/// Read-only view over a packed operator array
#[derive(Clone, Copy)]
pub struct CigarView<'a> {
    bytes: &'a [u8],
}

impl<'a> CigarView<'a> {
    /// Wraps a byte slice whose length is a multiple of 4
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len() % 4, 0);
        Self { bytes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / 4
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn packed(&self, index: usize) -> Result<u32> {
        if index >= self.len() {
            return Err(FieldError::CigarIndexOutOfRange {
                index,
                len: self.len(),
            }
            .into());
        }
        Ok(LittleEndian::read_u32(&self.bytes[index * 4..index * 4 + 4]))
    }

    /// Decodes operator `index`
    pub fn get(&self, index: usize) -> Result<CigarOp> {
        CigarOp::from_packed(self.packed(index)?)
    }

    /// Operator kind at `index`
    pub fn kind(&self, index: usize) -> Result<Kind> {
        Kind::from_code((self.packed(index)? & 0xF) as u8)
    }

    /// Run length at `index`
    pub fn op_len(&self, index: usize) -> Result<u32> {
        Ok(self.packed(index)? >> 4)
    }

    /// Iterates over decoded operators
    pub fn iter(&self) -> impl Iterator<Item = Result<CigarOp>> + 'a {
        self.bytes
            .chunks_exact(4)
            .map(|c| CigarOp::from_packed(LittleEndian::read_u32(c)))
    }

    /// Decodes every operator
    pub fn to_vec(&self) -> Result<Vec<CigarOp>> {
        self.iter().collect()
    }

    /// Number of reference bases covered (M, D, N, =, X)
    pub fn reference_length(&self) -> Result<i32> {
        let total = self.iter().try_fold(0i64, |acc, op| {
            let op = op?;
            Ok::<_, Error>(if op.kind.consumes_reference() {
                acc + i64::from(op.len)
            } else {
                acc
            })
        })?;
        i32::try_from(total).map_err(|_| RecordError::CoordinateOverflow(total).into())
    }

    /// Number of stored read bases described (M, I, S, =, X)
    pub fn read_length(&self) -> Result<u32> {
        let total = self.iter().try_fold(0i64, |acc, op| {
            let op = op?;
            Ok::<_, Error>(if op.kind.consumes_read() {
                acc + i64::from(op.len)
            } else {
                acc
            })
        })?;
        u32::try_from(total).map_err(|_| RecordError::CoordinateOverflow(total).into())
    }

    /// Gap-free blocks of the alignment starting at 1-based `alignment_start`
    pub fn alignment_blocks(&self, alignment_start: i32) -> Result<Vec<AlignmentBlock>> {
        let mut blocks = Vec::new();
        let mut read_base = 1i64;
        let mut ref_base = i64::from(alignment_start);
        for op in self.iter() {
            let op = op?;
            let len = i64::from(op.len);
            match op.kind {
                Kind::HardClip | Kind::Pad => {}
                Kind::SoftClip | Kind::Insertion => read_base += len,
                Kind::Deletion | Kind::Skip => ref_base += len,
                Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => {
                    blocks.push(AlignmentBlock {
                        read_start: u32::try_from(read_base)
                            .map_err(|_| RecordError::CoordinateOverflow(read_base))?,
                        reference_start: i32::try_from(ref_base)
                            .map_err(|_| RecordError::CoordinateOverflow(ref_base))?,
                        len: op.len,
                    });
                    read_base += len;
                    ref_base += len;
                }
            }
        }
        Ok(blocks)
    }

    /// Appends the SAM text form to `out`; `*` when there are no operators
    pub fn write_text(&self, out: &mut String) -> Result<()> {
        if self.is_empty() {
            out.push('*');
            return Ok(());
        }
        let mut buffer = itoa::Buffer::new();
        for op in self.iter() {
            let op = op?;
            out.push_str(buffer.format(op.len));
            out.push(op.kind.symbol() as char);
        }
        Ok(())
    }
}

impl fmt::Debug for CigarView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = String::new();
        match self.write_text(&mut text) {
            Ok(()) => write!(f, "CigarView({text})"),
            Err(_) => write!(f, "CigarView(<invalid>)"),
        }
    }
}

/// Mutable view over a packed operator array
pub struct CigarViewMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> CigarViewMut<'a> {
    #[must_use]
    pub fn new(bytes: &'a mut [u8]) -> Self {
        debug_assert_eq!(bytes.len() % 4, 0);
        Self { bytes }
    }

    fn slot(&mut self, index: usize) -> Result<&mut [u8]> {
        let len = self.bytes.len() / 4;
        if index >= len {
            return Err(FieldError::CigarIndexOutOfRange { index, len }.into());
        }
        Ok(&mut self.bytes[index * 4..index * 4 + 4])
    }

    /// Replaces the operator kind at `index`, keeping its run length
    pub fn set_kind(&mut self, index: usize, kind: Kind) -> Result<()> {
        let slot = self.slot(index)?;
        slot[0] = (slot[0] & 0xF0) | kind.code();
        Ok(())
    }

    /// Replaces the run length at `index`, keeping its operator kind
    pub fn set_len(&mut self, index: usize, len: u32) -> Result<()> {
        if len > MAX_OP_LEN {
            return Err(FieldError::CigarOpTooLong(len).into());
        }
        let slot = self.slot(index)?;
        let code = u32::from(slot[0] & 0xF);
        LittleEndian::write_u32(slot, (len << 4) | code);
        Ok(())
    }

    /// Writes `ops` over the whole array; lengths must match
    pub fn write_all(&mut self, ops: &[CigarOp]) -> Result<()> {
        debug_assert_eq!(ops.len() * 4, self.bytes.len());
        for (op, slot) in ops.iter().zip(self.bytes.chunks_exact_mut(4)) {
            LittleEndian::write_u32(slot, op.to_packed()?);
        }
        Ok(())
    }
}

/// Packs operators into a fresh byte vector
pub fn pack_ops(ops: &[CigarOp]) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; ops.len() * 4];
    CigarViewMut::new(&mut bytes).write_all(ops)?;
    Ok(bytes)
}

impl FromStr for CigarOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match parse_cigar(s)?.as_slice() {
            [op] => Ok(*op),
            _ => Err(FieldError::InvalidCigarString(s.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod testing {
    use rstest::rstest;

    use super::*;

    fn view_of(text: &str) -> Vec<u8> {
        pack_ops(&parse_cigar(text).unwrap()).unwrap()
    }

    #[test]
    fn test_reference_length() -> Result<()> {
        let bytes = view_of("45M56S");
        let view = CigarView::new(&bytes);
        assert_eq!(view.len(), 2);
        assert_eq!(view.reference_length()?, 45);
        assert_eq!(view.read_length()?, 101);
        assert_eq!(view.kind(0)?, Kind::Match);
        assert_eq!(view.kind(1)?, Kind::SoftClip);
        assert_eq!(view.op_len(0)?, 45);
        assert_eq!(view.op_len(1)?, 56);
        Ok(())
    }

    #[rstest]
    #[case("10M", 10)]
    #[case("4M1D6M", 11)]
    #[case("5H3S10M2I4M1N6=1X2P", 22)]
    #[case("*", 0)]
    fn test_reference_length_cases(#[case] cigar: &str, #[case] expected: i32) {
        let bytes = view_of(cigar);
        assert_eq!(CigarView::new(&bytes).reference_length().unwrap(), expected);
    }

    #[test]
    fn test_alignment_blocks_across_deletion() -> Result<()> {
        let bytes = view_of("4M1D6M");
        let blocks = CigarView::new(&bytes).alignment_blocks(1)?;
        assert_eq!(
            blocks,
            [
                AlignmentBlock { read_start: 1, reference_start: 1, len: 4 },
                AlignmentBlock { read_start: 5, reference_start: 6, len: 6 },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_alignment_blocks_clips_and_insertions() -> Result<()> {
        let bytes = view_of("2H3S4M2I5=1N3X");
        let blocks = CigarView::new(&bytes).alignment_blocks(100)?;
        assert_eq!(
            blocks,
            [
                AlignmentBlock { read_start: 4, reference_start: 100, len: 4 },
                AlignmentBlock { read_start: 10, reference_start: 104, len: 5 },
                AlignmentBlock { read_start: 15, reference_start: 110, len: 3 },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_mutation() -> Result<()> {
        let mut bytes = view_of("45M56S");
        let mut view = CigarViewMut::new(&mut bytes);
        view.set_kind(1, Kind::Insertion)?;
        view.set_len(0, 300)?;
        let view = CigarView::new(&bytes);
        assert_eq!(view.get(0)?, CigarOp::new(Kind::Match, 300));
        assert_eq!(view.get(1)?, CigarOp::new(Kind::Insertion, 56));
        Ok(())
    }

    #[test]
    fn test_out_of_range() {
        let bytes = view_of("10M");
        assert!(CigarView::new(&bytes).get(1).is_err());
    }

    #[test]
    fn test_invalid_code() {
        let bytes = 0x0000_00A9u32.to_le_bytes();
        let err = CigarView::new(&bytes).get(0).unwrap_err();
        assert!(err.is_malformed());
    }

    #[rstest]
    #[case("")]
    #[case("M")]
    #[case("10")]
    #[case("10Q")]
    #[case("99999999999M")]
    fn test_parse_invalid(#[case] text: &str) {
        assert!(parse_cigar(text).is_err());
    }

    #[test]
    fn test_text_round_trip() -> Result<()> {
        for text in ["*", "101M", "45M56S", "3S4M1I2D10N6=1X5H2P"] {
            let bytes = view_of(text);
            let mut out = String::new();
            CigarView::new(&bytes).write_text(&mut out)?;
            assert_eq!(out, text);
        }
        Ok(())
    }

    #[test]
    fn test_reference_length_beyond_32_bits() {
        let ops = vec![CigarOp::new(Kind::Deletion, MAX_OP_LEN); 9];
        let bytes = pack_ops(&ops).unwrap();
        let err = CigarView::new(&bytes).reference_length().unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_alignment_blocks_beyond_32_bits() {
        let mut ops = vec![CigarOp::new(Kind::Skip, MAX_OP_LEN); 9];
        ops.push(CigarOp::new(Kind::Match, 10));
        let bytes = pack_ops(&ops).unwrap();
        let view = CigarView::new(&bytes);
        assert!(view.alignment_blocks(1).unwrap_err().is_malformed());
        assert_eq!(view.read_length().unwrap(), 10);
    }

    #[test]
    fn test_op_too_long() {
        assert!(CigarOp::new(Kind::Match, MAX_OP_LEN + 1).to_packed().is_err());
    }
}
