//! Nucleotide packing and unpacking for the 4-bit BAM base encoding
//!
//! Bases are stored two per byte using the 16-letter alphabet `=ACMGRSVTWYHKDBN`,
//! where each letter is encoded as its index into that alphabet. The first base of
//! every pair occupies the high nibble. A read of odd length leaves the low nibble
//! of its final byte unused (zero).
//!
//! This module also provides the in-place reverse-complement used when a record is
//! flipped to the opposite strand without unpacking its bases.

use crate::error::{FieldError, Result};

/// The 16-letter alphabet, indexed by 4-bit code
pub const BASES: &[u8; 16] = b"=ACMGRSVTWYHKDBN";

/// Packed code of `A`
pub const CODE_A: u8 = 1;
/// Packed code of `C`
pub const CODE_C: u8 = 2;
/// Packed code of `G`
pub const CODE_G: u8 = 4;
/// Packed code of `T`
pub const CODE_T: u8 = 8;
/// Packed code of `N`
pub const CODE_N: u8 = 15;

/// ASCII to 4-bit code, `0xFF` for bytes outside the alphabet.
/// Lower-case letters map to the same code as their upper-case form.
const ENCODE_TABLE: [u8; 256] = {
    let mut table = [0xFFu8; 256];
    let mut code = 0;
    while code < 16 {
        let base = BASES[code];
        table[base as usize] = code as u8;
        table[base.to_ascii_lowercase() as usize] = code as u8;
        code += 1;
    }
    table
};

/// Complement of each 4-bit code. Only A, C, G and T are complemented;
/// ambiguity codes pass through unchanged.
const COMPLEMENT_TABLE: [u8; 16] = {
    let mut table = [0u8; 16];
    let mut code = 0;
    while code < 16 {
        table[code] = code as u8;
        code += 1;
    }
    table[CODE_A as usize] = CODE_T;
    table[CODE_C as usize] = CODE_G;
    table[CODE_G as usize] = CODE_C;
    table[CODE_T as usize] = CODE_A;
    table
};

/// Returns the 4-bit code for an ASCII base, or `None` if it is outside the alphabet
#[inline]
#[must_use]
pub fn encode_base(base: u8) -> Option<u8> {
    match ENCODE_TABLE[base as usize] {
        0xFF => None,
        code => Some(code),
    }
}

/// Returns the upper-case ASCII base for a 4-bit code
#[inline]
#[must_use]
pub fn decode_base(code: u8) -> u8 {
    BASES[(code & 0xF) as usize]
}

/// Returns the complement of a 4-bit code
#[inline]
#[must_use]
pub fn complement_code(code: u8) -> u8 {
    COMPLEMENT_TABLE[(code & 0xF) as usize]
}

/// Number of bytes needed to pack `num_bases` bases
#[inline]
#[must_use]
pub fn packed_len(num_bases: usize) -> usize {
    num_bases.div_ceil(2)
}

/// Packs ASCII bases into 4-bit codes, two per byte
///
/// # Arguments
///
/// * `bases` - ASCII bases drawn from `=ACMGRSVTWYHKDBN` (either case)
/// * `output` - Destination slice of exactly `packed_len(bases.len())` bytes
///
/// # Returns
///
/// * `Ok(())` - If every base was encoded
/// * `Err(Error)` - If a base is outside the alphabet; `output` may be partially written
///
/// # Example
///
/// ```
/// use bamrec::nuc;
///
/// let mut packed = [0u8; 2];
/// nuc::pack(b"ACG", &mut packed).unwrap();
/// assert_eq!(packed, [0x12, 0x40]);
/// ```
pub fn pack(bases: &[u8], output: &mut [u8]) -> Result<()> {
    debug_assert_eq!(output.len(), packed_len(bases.len()));
    for (pair, byte) in bases.chunks(2).zip(output.iter_mut()) {
        let high = encode_base(pair[0]).ok_or(FieldError::InvalidBase(pair[0]))?;
        let low = match pair.get(1) {
            Some(&b) => encode_base(b).ok_or(FieldError::InvalidBase(b))?,
            None => 0,
        };
        *byte = (high << 4) | low;
    }
    Ok(())
}

/// Unpacks `len` bases from 4-bit codes into upper-case ASCII
///
/// # Example
///
/// ```
/// use bamrec::nuc;
///
/// let mut bases = Vec::new();
/// nuc::unpack(&[0x12, 0x40], 3, &mut bases);
/// assert_eq!(bases, b"ACG");
/// ```
pub fn unpack(packed: &[u8], len: usize, output: &mut Vec<u8>) {
    output.reserve(len);
    for &byte in &packed[..len / 2] {
        output.push(decode_base(byte >> 4));
        output.push(decode_base(byte & 0xF));
    }
    if !len.is_multiple_of(2) {
        output.push(decode_base(packed[len / 2] >> 4));
    }
}

#[inline]
fn complement_high(byte: u8) -> u8 {
    complement_code(byte >> 4) << 4
}

#[inline]
fn complement_low(byte: u8) -> u8 {
    complement_code(byte & 0xF)
}

/// Swaps the two nibbles of a byte and complements both
#[inline]
#[must_use]
pub(crate) fn swap_and_complement_nibbles(byte: u8) -> u8 {
    (complement_low(byte) << 4) | (complement_high(byte) >> 4)
}

/// Reverse-complements `len` packed bases in place
///
/// For an even number of bases the bytes are reversed and then each byte has its
/// nibbles swapped and complemented. For an odd number the high and low nibbles are
/// exchanged in two independent passes, since the final byte only carries one base;
/// the middle base of each pass is complemented where it stands.
pub fn reverse_complement_in_place(packed: &mut [u8], len: usize) {
    let packed = &mut packed[..packed_len(len)];
    if packed.is_empty() {
        return;
    }

    if len.is_multiple_of(2) {
        packed.reverse();
        for byte in packed.iter_mut() {
            *byte = swap_and_complement_nibbles(*byte);
        }
        return;
    }

    // high nibbles hold bases 0, 2, 4, ... and mirror across the whole region
    let (mut i, mut j) = (0, packed.len() - 1);
    while i < j {
        let (a, b) = (packed[i], packed[j]);
        packed[i] = complement_high(b) | (a & 0x0F);
        packed[j] = complement_high(a) | (b & 0x0F);
        i += 1;
        j -= 1;
    }
    if i == j {
        packed[i] = complement_high(packed[i]) | (packed[i] & 0x0F);
    }

    // low nibbles hold bases 1, 3, 5, ... and skip the final byte
    if packed.len() < 2 {
        return;
    }
    let (mut i, mut j) = (0, packed.len() - 2);
    while i < j {
        let (a, b) = (packed[i], packed[j]);
        packed[i] = (a & 0xF0) | complement_low(b);
        packed[j] = (b & 0xF0) | complement_low(a);
        i += 1;
        j -= 1;
    }
    if i == j {
        packed[i] = (packed[i] & 0xF0) | complement_low(packed[i]);
    }
}

/// Reverses one-byte-per-base values (quality scores) in place
#[inline]
pub fn reverse_in_place(values: &mut [u8]) {
    values.reverse();
}

/// Complements an ASCII base, preserving case. Non-ACGT bytes are returned unchanged.
#[inline]
#[must_use]
pub fn complement_ascii(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        other => other,
    }
}

/// Reverse-complements ASCII bases in place
pub fn reverse_complement_ascii(bases: &mut [u8]) {
    bases.reverse();
    for base in bases.iter_mut() {
        *base = complement_ascii(*base);
    }
}

#[cfg(test)]
mod testing {
    use rand::{Rng, SeedableRng, rngs::SmallRng};
    use rstest::rstest;

    use super::*;

    fn packed(bases: &[u8]) -> Vec<u8> {
        let mut out = vec![0; packed_len(bases.len())];
        pack(bases, &mut out).unwrap();
        out
    }

    fn unpacked(packed: &[u8], len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        unpack(packed, len, &mut out);
        out
    }

    #[test]
    fn test_pack_unpack_full_alphabet() {
        let bases = packed(BASES);
        assert_eq!(bases, [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);
        assert_eq!(unpacked(&bases, 16), BASES);
    }

    #[test]
    fn test_pack_lowercase() {
        assert_eq!(packed(b"acgt"), packed(b"ACGT"));
    }

    #[test]
    fn test_pack_invalid() {
        let mut out = [0u8; 2];
        let result = pack(b"AC.T", &mut out);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "Invalid field value: Invalid nucleotide base: 46"
        );
    }

    #[test]
    fn test_odd_length_leaves_low_nibble_clear() {
        assert_eq!(packed(b"T"), [0x80]);
        assert_eq!(unpacked(&[0x8F], 1), b"T");
    }

    #[rstest]
    #[case(b"CG", b"CG")]
    #[case(b"CT", b"AG")]
    #[case(b"AT", b"AT")]
    #[case(b"AG", b"CT")]
    #[case(b"TT", b"AA")]
    #[case(b"GG", b"CC")]
    #[case(b"CC", b"GG")]
    #[case(b"AA", b"TT")]
    fn test_swap_and_complement_nibbles(#[case] input: &[u8], #[case] expected: &[u8]) {
        let byte = packed(input)[0];
        assert_eq!(unpacked(&[swap_and_complement_nibbles(byte)], 2), expected);
    }

    #[rstest]
    #[case(b"", b"")]
    #[case(b"T", b"A")]
    #[case(b"AG", b"CT")]
    #[case(b"AGC", b"GCT")]
    #[case(b"CGCT", b"AGCG")]
    #[case(b"AGCTA", b"TAGCT")]
    #[case(b"ACGTGC", b"GCACGT")]
    #[case(b"NACGTRN", b"NRACGTN")]
    fn test_reverse_complement_in_place(#[case] input: &[u8], #[case] expected: &[u8]) {
        let mut bases = packed(input);
        reverse_complement_in_place(&mut bases, input.len());
        assert_eq!(unpacked(&bases, input.len()), expected);
        if !input.len().is_multiple_of(2) {
            assert_eq!(bases.last().unwrap() & 0x0F, 0);
        }
    }

    #[test]
    fn test_reverse_complement_involution() {
        let mut rng = SmallRng::seed_from_u64(42);
        for len in 0..64 {
            let bases: Vec<u8> = (0..len)
                .map(|_| BASES[rng.random_range(0..16)])
                .collect();
            let original = packed(&bases);
            let mut twice = original.clone();
            reverse_complement_in_place(&mut twice, len);
            reverse_complement_in_place(&mut twice, len);
            assert_eq!(twice, original, "length {len}");

            let mut once = original.clone();
            reverse_complement_in_place(&mut once, len);
            let mut expected = bases.clone();
            reverse_complement_ascii(&mut expected);
            assert_eq!(unpacked(&once, len), expected, "length {len}");
        }
    }

    #[test]
    fn test_reverse_complement_ascii() {
        let mut bases = b"ACGTCAGC".to_vec();
        reverse_complement_ascii(&mut bases);
        assert_eq!(bases, b"GCTGACGT");

        let mut bases = b"acgN".to_vec();
        reverse_complement_ascii(&mut bases);
        assert_eq!(bases, b"Ncgt");
    }

    #[test]
    fn test_reverse_in_place() {
        let mut quals = vec![1, 2, 3, 4, 5];
        reverse_in_place(&mut quals);
        assert_eq!(quals, [5, 4, 3, 2, 1]);
    }
}
