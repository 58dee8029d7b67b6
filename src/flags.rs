//! The 16-bit alignment flag word
//!
//! Mate and segment bits are only meaningful when [`PAIRED`] is set, so their
//! getters return [`StateError::NotPaired`] for unpaired records. Setters never
//! validate pairing.

use std::fmt;

use crate::error::{Result, StateError};

/// Read is paired in sequencing.
pub const PAIRED: u16 = 0x1;
/// Each segment is properly aligned according to the aligner.
pub const PROPER_PAIR: u16 = 0x2;
/// Read is unmapped.
pub const UNMAPPED: u16 = 0x4;
/// Mate is unmapped.
pub const MATE_UNMAPPED: u16 = 0x8;
/// Read is reverse complemented.
pub const REVERSE: u16 = 0x10;
/// Mate is reverse complemented.
pub const MATE_REVERSE: u16 = 0x20;
/// First segment in template (R1).
pub const FIRST_SEGMENT: u16 = 0x40;
/// Last segment in template (R2).
pub const LAST_SEGMENT: u16 = 0x80;
/// Secondary alignment.
pub const SECONDARY: u16 = 0x100;
/// Not passing quality controls.
pub const QC_FAIL: u16 = 0x200;
/// PCR or optical duplicate.
pub const DUPLICATE: u16 = 0x400;
/// Supplementary alignment.
pub const SUPPLEMENTARY: u16 = 0x800;

/// A copy of a record's flag word with typed accessors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u16);

impl Flags {
    #[inline]
    #[must_use]
    pub fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn contains(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    pub fn set(&mut self, bit: u16, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    fn require_paired(self, name: &'static str) -> Result<()> {
        if self.is_paired() {
            Ok(())
        } else {
            Err(StateError::NotPaired(name).into())
        }
    }

    #[must_use]
    pub fn is_paired(self) -> bool {
        self.contains(PAIRED)
    }

    /// Proper-pair is readable on any record; it is simply unset when unpaired.
    #[must_use]
    pub fn is_proper_pair(self) -> bool {
        self.contains(PROPER_PAIR)
    }

    #[must_use]
    pub fn is_unmapped(self) -> bool {
        self.contains(UNMAPPED)
    }

    #[must_use]
    pub fn is_reverse(self) -> bool {
        self.contains(REVERSE)
    }

    #[must_use]
    pub fn is_secondary(self) -> bool {
        self.contains(SECONDARY)
    }

    #[must_use]
    pub fn is_qc_fail(self) -> bool {
        self.contains(QC_FAIL)
    }

    #[must_use]
    pub fn is_duplicate(self) -> bool {
        self.contains(DUPLICATE)
    }

    #[must_use]
    pub fn is_supplementary(self) -> bool {
        self.contains(SUPPLEMENTARY)
    }

    /// True for any non-primary alignment (secondary or supplementary)
    #[must_use]
    pub fn is_secondary_or_supplementary(self) -> bool {
        self.contains(SECONDARY | SUPPLEMENTARY)
    }

    /// Whether the mate is unmapped. Fails if the record is not paired.
    pub fn is_mate_unmapped(self) -> Result<bool> {
        self.require_paired("mate unmapped")?;
        Ok(self.contains(MATE_UNMAPPED))
    }

    /// Whether the mate is on the reverse strand. Fails if the record is not paired.
    pub fn is_mate_reverse(self) -> Result<bool> {
        self.require_paired("mate negative strand")?;
        Ok(self.contains(MATE_REVERSE))
    }

    /// Whether this is the first segment of the template. Fails if the record is not paired.
    pub fn is_first_of_pair(self) -> Result<bool> {
        self.require_paired("first of pair")?;
        Ok(self.contains(FIRST_SEGMENT))
    }

    /// Whether this is the last segment of the template. Fails if the record is not paired.
    pub fn is_second_of_pair(self) -> Result<bool> {
        self.require_paired("second of pair")?;
        Ok(self.contains(LAST_SEGMENT))
    }

    pub fn set_paired(&mut self, value: bool) {
        self.set(PAIRED, value);
    }
    pub fn set_proper_pair(&mut self, value: bool) {
        self.set(PROPER_PAIR, value);
    }
    pub fn set_unmapped(&mut self, value: bool) {
        self.set(UNMAPPED, value);
    }
    pub fn set_mate_unmapped(&mut self, value: bool) {
        self.set(MATE_UNMAPPED, value);
    }
    pub fn set_reverse(&mut self, value: bool) {
        self.set(REVERSE, value);
    }
    pub fn set_mate_reverse(&mut self, value: bool) {
        self.set(MATE_REVERSE, value);
    }
    pub fn set_first_of_pair(&mut self, value: bool) {
        self.set(FIRST_SEGMENT, value);
    }
    pub fn set_second_of_pair(&mut self, value: bool) {
        self.set(LAST_SEGMENT, value);
    }
    pub fn set_secondary(&mut self, value: bool) {
        self.set(SECONDARY, value);
    }
    pub fn set_qc_fail(&mut self, value: bool) {
        self.set(QC_FAIL, value);
    }
    pub fn set_duplicate(&mut self, value: bool) {
        self.set(DUPLICATE, value);
    }
    pub fn set_supplementary(&mut self, value: bool) {
        self.set(SUPPLEMENTARY, value);
    }
}

impl From<u16> for Flags {
    fn from(bits: u16) -> Self {
        Self(bits)
    }
}

impl From<Flags> for u16 {
    fn from(flags: Flags) -> Self {
        flags.0
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
