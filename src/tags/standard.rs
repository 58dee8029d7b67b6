//! Reserved tag names

use super::Tag;

/// Read group
pub const RG: Tag = Tag::new(*b"RG");
/// Library
pub const LB: Tag = Tag::new(*b"LB");
/// Platform unit
pub const PU: Tag = Tag::new(*b"PU");
/// Program
pub const PG: Tag = Tag::new(*b"PG");
/// Alignment score
pub const AS: Tag = Tag::new(*b"AS");
/// Legacy read sequence tag; records carrying it cannot be reverse-complemented
pub const SQ: Tag = Tag::new(*b"SQ");
/// Mate mapping quality
pub const MQ: Tag = Tag::new(*b"MQ");
/// Edit distance to the reference
pub const NM: Tag = Tag::new(*b"NM");
/// Number of perfect hits
pub const H0: Tag = Tag::new(*b"H0");
/// Number of one-difference hits
pub const H1: Tag = Tag::new(*b"H1");
/// Number of two-difference hits
pub const H2: Tag = Tag::new(*b"H2");
/// Phred likelihood of the segment
pub const UQ: Tag = Tag::new(*b"UQ");
/// Phred likelihood of the template
pub const PQ: Tag = Tag::new(*b"PQ");
/// Number of reported alignments
pub const NH: Tag = Tag::new(*b"NH");
/// Number of stored alignments
pub const IH: Tag = Tag::new(*b"IH");
/// Query hit index
pub const HI: Tag = Tag::new(*b"HI");
/// Mismatching positions
pub const MD: Tag = Tag::new(*b"MD");
/// Color read sequence
pub const CS: Tag = Tag::new(*b"CS");
/// Color read qualities
pub const CQ: Tag = Tag::new(*b"CQ");
/// Color edit distance
pub const CM: Tag = Tag::new(*b"CM");
/// Mate sequence
pub const R2: Tag = Tag::new(*b"R2");
/// Mate qualities
pub const Q2: Tag = Tag::new(*b"Q2");
/// Mate sequence and qualities
pub const S2: Tag = Tag::new(*b"S2");
/// Reference name of the next hit
pub const CC: Tag = Tag::new(*b"CC");
/// Leftmost coordinate of the next hit
pub const CP: Tag = Tag::new(*b"CP");
/// Template-independent mapping quality
pub const SM: Tag = Tag::new(*b"SM");
/// Smallest template-independent mapping quality in the template
pub const AM: Tag = Tag::new(*b"AM");
/// MAQ pair flag
pub const MF: Tag = Tag::new(*b"MF");
/// Second most likely base calls
pub const E2: Tag = Tag::new(*b"E2");
/// Phred probability of the second call
pub const U2: Tag = Tag::new(*b"U2");
/// Original base qualities
pub const OQ: Tag = Tag::new(*b"OQ");
/// Flow signal intensities
pub const FZ: Tag = Tag::new(*b"FZ");
/// Supplementary alignments
pub const SA: Tag = Tag::new(*b"SA");
/// Mate CIGAR
pub const MC: Tag = Tag::new(*b"MC");
/// BWA alignment type
pub const XT: Tag = Tag::new(*b"XT");
/// BWA ambiguous-base count
pub const XN: Tag = Tag::new(*b"XN");
