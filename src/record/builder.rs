//! Construction of new records from field values
//!
//! The builder lays out every region at once and then wraps the bytes with
//! [`BamRecord::from_bytes`], so a built record passes the same checks as a
//! decoded one.

use crate::cigar::{pack_ops, CigarOp};
use crate::dictionary::{SharedDictionary, NO_REFERENCE_INDEX};
use crate::error::{FieldError, Result};
use crate::nuc;
use crate::policy::Policy;
use crate::tags::{self, Tag, Value};

use super::layout::{FixedHeader, FIXED_HEADER_LEN, MAX_READ_NAME_LEN, QUALITY_ABSENT};
use super::{to_stored_position, BamRecord};

/// Assembles a [`BamRecord`] from field values
///
/// Positions are 1-based, with 0 meaning unplaced. Tags are written in the order
/// they are added, each with the type of its value.
///
/// # Example
///
/// ```
/// use bamrec::{BamRecord, cigar::parse_cigar};
///
/// let cigar = parse_cigar("4M").unwrap();
/// let record = BamRecord::builder()
///     .read_name(b"r1")
///     .reference_index(0)
///     .alignment_start(100)
///     .cigar(&cigar)
///     .bases(b"ACGT")
///     .qualities(&[30, 30, 20, 10])
///     .build()
///     .unwrap();
///
/// assert_eq!(record.alignment_end().unwrap(), Some(103));
/// assert_eq!(record.base_quality_string(), "??5+");
/// ```
#[derive(Clone)]
pub struct RecordBuilder<'a> {
    read_name: &'a [u8],
    flags: u16,
    reference_index: i32,
    alignment_start: i32,
    mapping_quality: u8,
    cigar: &'a [CigarOp],
    bases: &'a [u8],
    qualities: Option<&'a [u8]>,
    mate_reference_index: i32,
    mate_alignment_start: i32,
    template_len: i32,
    tags: Vec<(Tag, Value)>,
    policy: Policy,
    dictionary: Option<SharedDictionary>,
}

impl Default for RecordBuilder<'_> {
    fn default() -> Self {
        Self {
            read_name: b"",
            flags: 0,
            reference_index: NO_REFERENCE_INDEX,
            alignment_start: 0,
            mapping_quality: 0,
            cigar: &[],
            bases: &[],
            qualities: None,
            mate_reference_index: NO_REFERENCE_INDEX,
            mate_alignment_start: 0,
            template_len: 0,
            tags: Vec::new(),
            policy: Policy::default(),
            dictionary: None,
        }
    }
}

impl<'a> RecordBuilder<'a> {
    #[must_use]
    pub fn read_name(mut self, name: &'a [u8]) -> Self {
        self.read_name = name;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn reference_index(mut self, index: i32) -> Self {
        self.reference_index = index;
        self
    }

    #[must_use]
    pub fn alignment_start(mut self, start: i32) -> Self {
        self.alignment_start = start;
        self
    }

    #[must_use]
    pub fn mapping_quality(mut self, mapq: u8) -> Self {
        self.mapping_quality = mapq;
        self
    }

    #[must_use]
    pub fn cigar(mut self, ops: &'a [CigarOp]) -> Self {
        self.cigar = ops;
        self
    }

    /// ASCII bases, handled with the builder's [`Policy`]
    #[must_use]
    pub fn bases(mut self, bases: &'a [u8]) -> Self {
        self.bases = bases;
        self
    }

    /// Phred scores, one per base; omitted scores are stored as absent
    #[must_use]
    pub fn qualities(mut self, qualities: &'a [u8]) -> Self {
        self.qualities = Some(qualities);
        self
    }

    #[must_use]
    pub fn mate_reference_index(mut self, index: i32) -> Self {
        self.mate_reference_index = index;
        self
    }

    #[must_use]
    pub fn mate_alignment_start(mut self, start: i32) -> Self {
        self.mate_alignment_start = start;
        self
    }

    #[must_use]
    pub fn template_len(mut self, len: i32) -> Self {
        self.template_len = len;
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: Tag, value: impl Into<Value>) -> Self {
        self.tags.push((tag, value.into()));
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn dictionary(mut self, dictionary: SharedDictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Encodes the fields into a record and stores its indexing bin
    pub fn build(self) -> Result<BamRecord> {
        if self.read_name.len() > MAX_READ_NAME_LEN {
            return Err(FieldError::ReadNameTooLong(self.read_name.len()).into());
        }
        if memchr::memchr(0, self.read_name).is_some() {
            return Err(FieldError::InvalidReadName.into());
        }
        let cigar_len = u16::try_from(self.cigar.len())
            .map_err(|_| FieldError::TooManyCigarOps(self.cigar.len()))?;
        let cigar = pack_ops(self.cigar)?;

        let mut bases = Vec::new();
        self.policy.handle(self.bases, &mut bases)?;
        let read_len =
            u32::try_from(bases.len()).map_err(|_| FieldError::ReadTooLong(bases.len()))?;
        if let Some(quals) = self.qualities {
            if !quals.is_empty() && quals.len() != bases.len() {
                return Err(FieldError::QualityLengthMismatch {
                    expected: bases.len(),
                    got: quals.len(),
                }
                .into());
            }
            if let Some(&q) = quals.iter().find(|&&q| q == QUALITY_ABSENT) {
                return Err(FieldError::InvalidQuality(q).into());
            }
        }

        let mut tag_bytes = Vec::new();
        for (tag, value) in &self.tags {
            let ty = value.tag_type();
            tag_bytes.extend_from_slice(tag.as_bytes());
            tag_bytes.push(ty.code());
            tags::encode_value(*tag, ty, value, &mut tag_bytes)?;
        }

        let header = FixedHeader {
            reference_index: self.reference_index,
            position: to_stored_position(self.alignment_start),
            read_name_len: (self.read_name.len() + 1) as u8,
            mapping_quality: self.mapping_quality,
            bin: 0,
            cigar_len,
            flags: self.flags,
            read_len,
            mate_reference_index: self.mate_reference_index,
            mate_position: to_stored_position(self.mate_alignment_start),
            template_len: self.template_len,
        };

        let packed_len = nuc::packed_len(bases.len());
        let mut bytes = vec![
            0u8;
            FIXED_HEADER_LEN
                + self.read_name.len()
                + 1
                + cigar.len()
                + packed_len
                + bases.len()
                + tag_bytes.len()
        ];
        header.write_to(&mut bytes);

        let regions = header.regions(bytes.len());
        bytes[regions.read_name.offset..regions.read_name.end() - 1]
            .copy_from_slice(self.read_name);
        bytes[regions.cigar.range()].copy_from_slice(&cigar);
        nuc::pack(&bases, &mut bytes[regions.bases.range()])?;
        match self.qualities {
            Some(quals) if !quals.is_empty() => {
                bytes[regions.qualities.range()].copy_from_slice(quals);
            }
            _ => bytes[regions.qualities.range()].fill(QUALITY_ABSENT),
        }
        bytes[regions.tags.range()].copy_from_slice(&tag_bytes);

        let mut record = BamRecord::from_bytes(bytes)?;
        record.set_dictionary(self.dictionary);
        record.refresh_bin()?;
        Ok(record)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::cigar::{parse_cigar, Kind};
    use crate::tags::standard::{NM, RG};

    #[test]
    fn test_build_layout() -> Result<()> {
        let cigar = [CigarOp::new(Kind::Match, 3)];
        let record = BamRecord::builder()
            .read_name(b"q")
            .reference_index(1)
            .alignment_start(5)
            .mapping_quality(60)
            .cigar(&cigar)
            .bases(b"ACG")
            .tag(NM, 1u8)
            .build()?;

        // header + "q\0" + 1 op + 2 packed + 3 quals + "NMC\x01"
        assert_eq!(record.encoded_len(), 32 + 2 + 4 + 2 + 3 + 4);
        assert_eq!(record.read_name(), b"q");
        assert_eq!(record.read_bases(), b"ACG");
        assert_eq!(record.base_qualities(), None);
        assert_eq!(record.alignment_start(), 5);
        assert_eq!(record.mapping_quality(), 60);
        assert_eq!(record.int_attribute(NM)?, 1);
        assert_eq!(record.bin(), Some(4681));
        Ok(())
    }

    #[test]
    fn test_unplaced_record_gets_bin_zero() -> Result<()> {
        let record = BamRecord::builder()
            .read_name(b"u")
            .flags(crate::flags::UNMAPPED)
            .bases(b"ACGTN")
            .build()?;
        assert_eq!(record.alignment_start(), 0);
        assert_eq!(record.reference_index(), -1);
        assert_eq!(record.bin(), Some(0));
        assert_eq!(record.alignment_end()?, None);
        Ok(())
    }

    #[test]
    fn test_tags_in_insertion_order() -> Result<()> {
        let record = BamRecord::builder()
            .read_name(b"t")
            .tag(RG, "grp")
            .tag(NM, 2i32)
            .build()?;
        assert_eq!(record.attribute_tags()?, [RG, NM]);
        assert_eq!(record.attribute(RG)?, Some(Value::from("grp")));
        Ok(())
    }

    #[test]
    fn test_build_rejects_bad_fields() {
        let long_name = [b'a'; MAX_READ_NAME_LEN + 1];
        assert!(BamRecord::builder().read_name(&long_name).build().is_err());
        assert!(BamRecord::builder()
            .bases(b"ACGT")
            .qualities(&[1, 2])
            .build()
            .is_err());
        assert!(BamRecord::builder().bases(b"AXGT").build().is_err());
    }

    #[test]
    fn test_policy_applies_to_bases() -> Result<()> {
        let cigar = parse_cigar("4M")?;
        let record = BamRecord::builder()
            .cigar(&cigar)
            .bases(b"axgt")
            .policy(Policy::SetToN)
            .build()?;
        assert_eq!(record.read_bases(), b"ANGT");
        Ok(())
    }
}
