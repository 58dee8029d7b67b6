//! Hierarchical spatial binning (UCSC scheme, as used by BAI indexes)
//!
//! Six tiers partition a reference of up to 2^29 bases into bins of 512 Mbp,
//! 64 Mbp, 8 Mbp, 1 Mbp, 128 kbp and 16 kbp. The bin of an interval is the
//! smallest bin that fully contains it.

/// Exclusive upper bound of the positions the six tiers address
pub const MAX_BINNED_POSITION: i64 = 1 << 29;

/// (right-shift, first bin id) for each tier, finest first
const TIERS: [(u32, i64); 5] = [
    (14, tier_base(5)),
    (17, tier_base(4)),
    (20, tier_base(3)),
    (23, tier_base(2)),
    (26, tier_base(1)),
];

/// First bin id of the tier `level` steps below the root
const fn tier_base(level: u32) -> i64 {
    ((1 << (3 * level)) - 1) / 7
}

/// Bin of an unplaced record, `reg2bin(-1, 0)`
pub const UNMAPPED_BIN: u16 = 4680;

/// Computes the bin for the 0-based half-open interval `[start, end)`
///
/// The scheme covers positions below 2^29 ([`MAX_BINNED_POSITION`]); an interval
/// reaching past that limit, or starting before -1, is placed in the root bin 0.
///
/// # Example
///
/// ```
/// use bamrec::binning::reg2bin;
///
/// assert_eq!(reg2bin(9996, 10041), 4681);
/// assert_eq!(reg2bin(-1, 0), 4680);
/// ```
#[must_use]
pub fn reg2bin(start: i64, end: i64) -> u16 {
    if start < -1 || end > MAX_BINNED_POSITION {
        return 0;
    }
    let last = end - 1;
    for (shift, base) in TIERS {
        if start >> shift == last >> shift {
            return u16::try_from(base + (start >> shift)).unwrap_or(0);
        }
    }
    0
}

#[cfg(test)]
mod testing {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 1, 4681)]
    #[case(9996, 10041, 4681)]
    #[case(16383, 16384, 4681)]
    #[case(16384, 16385, 4682)]
    #[case(16383, 16385, 585)]
    #[case(0, 1 << 17, 585)]
    #[case(0, (1 << 17) + 1, 73)]
    #[case(0, 1 << 26, 1)]
    #[case(0, (1 << 26) + 1, 0)]
    #[case(-1, 0, UNMAPPED_BIN)]
    #[case(MAX_BINNED_POSITION - 1, MAX_BINNED_POSITION, 37448)]
    #[case(600_000_000, 600_000_100, 0)]
    #[case(-5, 10, 0)]
    fn test_reg2bin(#[case] start: i64, #[case] end: i64, #[case] expected: u16) {
        assert_eq!(reg2bin(start, end), expected);
    }
}
