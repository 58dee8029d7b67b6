//! The single-buffer alignment record
//!
//! A [`BamRecord`] owns exactly one byte buffer laid out as on disk (see
//! [`layout`]). Fixed header fields are read and written at their offsets;
//! variable regions are resized through [`RecordBuffer::splice`]. Values derived
//! from the buffer (decoded bases, alignment end, indexing bin, the tag
//! directory) are cached and dropped by every mutator that can change them.

use std::fmt;
use std::sync::OnceLock;

use log::warn;

use crate::binning::{reg2bin, UNMAPPED_BIN};
use crate::cigar::{pack_ops, parse_cigar, AlignmentBlock, CigarOp, CigarView, CigarViewMut, Kind};
use crate::dictionary::{SequenceDictionary, SharedDictionary, NO_REFERENCE_INDEX, NO_REFERENCE_NAME};
use crate::error::{FieldError, RecordError, Result, TagError, UnsupportedError};
use crate::flags::Flags;
use crate::nuc;
use crate::policy::Policy;
use crate::tags::{self, standard, AttributeDirectory, Tag, TagType, Value};

mod buffer;
mod builder;
pub mod layout;

pub use buffer::RecordBuffer;
pub use builder::RecordBuilder;
pub use layout::{FixedHeader, Regions, Span};

use layout::{
    BIN, CIGAR_LEN, FIXED_HEADER_LEN, FLAGS, MAPPING_QUALITY, MATE_POSITION,
    MATE_REFERENCE_INDEX, MAX_READ_NAME_LEN, POSITION, QUALITY_ABSENT, READ_LEN, READ_NAME_LEN,
    REFERENCE_INDEX, TEMPLATE_LEN,
};

/// Sequence and quality text of a record without bases or scores
const NULL_FIELD: &str = "*";

/// Offset added to Phred scores in quality text
const PHRED_OFFSET: u8 = 33;

/// One alignment record held as its binary encoding
#[derive(Clone)]
pub struct BamRecord {
    buffer: RecordBuffer,
    dictionary: Option<SharedDictionary>,

    // names set without a dictionary entry, resolved on encode
    pending_reference_name: Option<String>,
    pending_mate_reference_name: Option<String>,

    // derived values
    bin: Option<u16>,
    alignment_end: OnceLock<Option<i32>>,
    bases: OnceLock<Vec<u8>>,
    directory: OnceLock<AttributeDirectory>,
}

impl BamRecord {
    /// Wraps the bytes of one record (without its length prefix)
    ///
    /// Only the fixed header and the region widths it declares are checked here;
    /// the tag region is scanned on first use.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < FIXED_HEADER_LEN {
            return Err(RecordError::TooShort(bytes.len()).into());
        }
        let header = FixedHeader::from_bytes(&bytes);
        header.validate(bytes.len())?;
        Ok(Self {
            buffer: RecordBuffer::new(bytes),
            dictionary: None,
            pending_reference_name: None,
            pending_mate_reference_name: None,
            bin: Some(header.bin),
            alignment_end: OnceLock::new(),
            bases: OnceLock::new(),
            directory: OnceLock::new(),
        })
    }

    /// An unplaced record with an empty name and no bases, CIGAR or tags
    #[must_use]
    pub fn new() -> Self {
        let header = FixedHeader {
            reference_index: NO_REFERENCE_INDEX,
            position: -1,
            read_name_len: 1,
            bin: UNMAPPED_BIN,
            mate_reference_index: NO_REFERENCE_INDEX,
            mate_position: -1,
            ..FixedHeader::default()
        };
        let mut bytes = vec![0u8; FIXED_HEADER_LEN + 1];
        header.write_to(&mut bytes);
        Self {
            buffer: RecordBuffer::new(bytes),
            dictionary: None,
            pending_reference_name: None,
            pending_mate_reference_name: None,
            bin: Some(UNMAPPED_BIN),
            alignment_end: OnceLock::new(),
            bases: OnceLock::new(),
            directory: OnceLock::new(),
        }
    }

    /// Starts building a record from field values
    #[must_use]
    pub fn builder<'a>() -> RecordBuilder<'a> {
        RecordBuilder::default()
    }

    /// Attaches the dictionary used to resolve reference names
    #[must_use]
    pub fn with_dictionary(mut self, dictionary: SharedDictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn set_dictionary(&mut self, dictionary: Option<SharedDictionary>) {
        self.dictionary = dictionary;
    }

    #[must_use]
    pub fn dictionary(&self) -> Option<&SharedDictionary> {
        self.dictionary.as_ref()
    }

    /// The record bytes
    ///
    /// The bin field reflects the last stored bin; it is refreshed on encode or by
    /// [`BamRecord::refresh_bin`].
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_inner()
    }

    /// Size of the record in bytes, excluding the stream length prefix
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.buffer.len()
    }

    /// A copy of the fixed header fields
    #[must_use]
    pub fn fixed_header(&self) -> FixedHeader {
        FixedHeader::from_bytes(self.buffer.as_slice())
    }

    fn regions(&self) -> Regions {
        self.fixed_header().regions(self.buffer.len())
    }

    fn invalidate_alignment(&mut self) {
        self.alignment_end.take();
        self.bin = None;
    }

    // ------------------------------------------------------------------
    // Reference placement
    // ------------------------------------------------------------------

    #[must_use]
    pub fn reference_index(&self) -> i32 {
        self.buffer.i32_at(REFERENCE_INDEX)
    }

    /// Places the record on reference `index`; the bin is recomputed on encode
    pub fn set_reference_index(&mut self, index: i32) {
        self.pending_reference_name = None;
        self.buffer.set_i32(REFERENCE_INDEX, index);
        self.bin = None;
    }

    /// Name of the reference the record is placed on
    ///
    /// A name set while missing from the dictionary is returned as given.
    pub fn reference_name(&self) -> Result<&str> {
        if let Some(name) = &self.pending_reference_name {
            return Ok(name);
        }
        self.name_of(self.reference_index())
    }

    /// Places the record on the reference called `name`
    ///
    /// `*` clears the placement. A name missing from the dictionary is kept as
    /// pending and the stored index is left unchanged; encoding a record with a
    /// pending name resolves it again and fails if it is still unknown.
    pub fn set_reference_name(&mut self, name: &str) {
        if let Some(index) = self.index_of(name) {
            self.set_reference_index(index);
        } else {
            warn!("Reference name '{name}' is not in the sequence dictionary; resolution deferred");
            self.pending_reference_name = Some(name.to_string());
        }
    }

    #[must_use]
    pub fn pending_reference_name(&self) -> Option<&str> {
        self.pending_reference_name.as_deref()
    }

    #[must_use]
    pub fn mate_reference_index(&self) -> i32 {
        self.buffer.i32_at(MATE_REFERENCE_INDEX)
    }

    pub fn set_mate_reference_index(&mut self, index: i32) {
        self.pending_mate_reference_name = None;
        self.buffer.set_i32(MATE_REFERENCE_INDEX, index);
    }

    pub fn mate_reference_name(&self) -> Result<&str> {
        if let Some(name) = &self.pending_mate_reference_name {
            return Ok(name);
        }
        self.name_of(self.mate_reference_index())
    }

    /// Places the mate on the reference called `name`, deferring unknown names
    pub fn set_mate_reference_name(&mut self, name: &str) {
        if let Some(index) = self.index_of(name) {
            self.set_mate_reference_index(index);
        } else {
            warn!("Mate reference name '{name}' is not in the sequence dictionary; resolution deferred");
            self.pending_mate_reference_name = Some(name.to_string());
        }
    }

    #[must_use]
    pub fn pending_mate_reference_name(&self) -> Option<&str> {
        self.pending_mate_reference_name.as_deref()
    }

    fn name_of(&self, index: i32) -> Result<&str> {
        if index == NO_REFERENCE_INDEX {
            return Ok(NO_REFERENCE_NAME);
        }
        self.dictionary
            .as_ref()
            .and_then(|dict| dict.name_of(index))
            .ok_or_else(|| RecordError::UnknownReferenceIndex(index).into())
    }

    fn index_of(&self, name: &str) -> Option<i32> {
        if name == NO_REFERENCE_NAME {
            return Some(NO_REFERENCE_INDEX);
        }
        self.dictionary.as_ref().and_then(|dict| dict.index_of(name))
    }

    /// Resolves pending reference names against `dictionary`, falling back to the
    /// record's own
    pub(crate) fn resolve_pending_names(
        &mut self,
        dictionary: Option<&SharedDictionary>,
    ) -> Result<()> {
        let dictionary = dictionary.or(self.dictionary.as_ref()).cloned();
        let resolve = |name: &str| -> Result<i32> {
            if name == NO_REFERENCE_NAME {
                return Ok(NO_REFERENCE_INDEX);
            }
            dictionary
                .as_ref()
                .and_then(|dict| dict.index_of(name))
                .ok_or_else(|| RecordError::UnresolvedReference(name.to_string()).into())
        };
        if let Some(name) = self.pending_reference_name.as_deref() {
            let index = resolve(name)?;
            self.set_reference_index(index);
        }
        if let Some(name) = self.pending_mate_reference_name.as_deref() {
            let index = resolve(name)?;
            self.set_mate_reference_index(index);
        }
        Ok(())
    }

    /// 1-based leftmost aligned position, 0 when unplaced
    #[must_use]
    pub fn alignment_start(&self) -> i32 {
        self.buffer.i32_at(POSITION).saturating_add(1)
    }

    /// Sets the 1-based leftmost position; 0 or less marks the record unplaced
    pub fn set_alignment_start(&mut self, start: i32) {
        self.buffer.set_i32(POSITION, to_stored_position(start));
        self.invalidate_alignment();
    }

    /// 1-based rightmost aligned position, `None` for unmapped records
    pub fn alignment_end(&self) -> Result<Option<i32>> {
        if let Some(end) = self.alignment_end.get() {
            return Ok(*end);
        }
        let end = if self.flags().is_unmapped() {
            None
        } else {
            let end = i64::from(self.alignment_start())
                + i64::from(self.cigar().reference_length()?)
                - 1;
            Some(i32::try_from(end).map_err(|_| RecordError::CoordinateOverflow(end))?)
        };
        Ok(*self.alignment_end.get_or_init(|| end))
    }

    #[must_use]
    pub fn mate_alignment_start(&self) -> i32 {
        self.buffer.i32_at(MATE_POSITION).saturating_add(1)
    }

    pub fn set_mate_alignment_start(&mut self, start: i32) {
        self.buffer.set_i32(MATE_POSITION, to_stored_position(start));
    }

    #[must_use]
    pub fn template_len(&self) -> i32 {
        self.buffer.i32_at(TEMPLATE_LEN)
    }

    pub fn set_template_len(&mut self, len: i32) {
        self.buffer.set_i32(TEMPLATE_LEN, len);
    }

    #[must_use]
    pub fn mapping_quality(&self) -> u8 {
        self.buffer.u8_at(MAPPING_QUALITY)
    }

    pub fn set_mapping_quality(&mut self, mapq: u8) {
        self.buffer.set_u8(MAPPING_QUALITY, mapq);
    }

    #[must_use]
    pub fn flags(&self) -> Flags {
        Flags(self.buffer.u16_at(FLAGS))
    }

    /// Replaces the flag word
    ///
    /// Mapped-ness changes the alignment end and the binning convention, so both
    /// are recomputed on next use.
    pub fn set_flags(&mut self, flags: impl Into<Flags>) {
        self.buffer.set_u16(FLAGS, flags.into().bits());
        self.invalidate_alignment();
    }

    // ------------------------------------------------------------------
    // Indexing bin
    // ------------------------------------------------------------------

    /// The cached indexing bin; `None` once a placement change invalidated it
    #[must_use]
    pub fn bin(&self) -> Option<u16> {
        self.bin
    }

    /// Bin of the interval `[start - 1, end)`
    ///
    /// Records whose end cannot be determined are binned as a one-base interval.
    pub fn compute_indexing_bin(&self) -> Result<u16> {
        let start = self.alignment_start();
        let end = self.alignment_end()?.filter(|&end| end > 0).unwrap_or(start);
        Ok(reg2bin(i64::from(start) - 1, i64::from(end)))
    }

    /// Computes and stores the bin: placed records are binned by their interval,
    /// records without a reference get bin 0
    pub fn refresh_bin(&mut self) -> Result<u16> {
        let bin = if self.reference_index() >= 0 {
            self.compute_indexing_bin()?
        } else {
            0
        };
        self.store_bin(bin);
        Ok(bin)
    }

    fn store_bin(&mut self, bin: u16) {
        self.buffer.set_u16(BIN, bin);
        self.bin = Some(bin);
    }

    /// Resolves deferred names and fills an invalidated bin before the bytes are written
    pub(crate) fn prepare_for_encode(&mut self, dictionary: Option<&SharedDictionary>) -> Result<()> {
        self.resolve_pending_names(dictionary)?;
        if let Some(bin) = self.bin {
            self.store_bin(bin);
        } else {
            self.refresh_bin()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read name
    // ------------------------------------------------------------------

    /// The read name without its NUL terminator
    #[must_use]
    pub fn read_name(&self) -> &[u8] {
        let span = self.regions().read_name;
        &self.buffer.as_slice()[span.offset..span.end() - 1]
    }

    pub fn read_name_str(&self) -> Result<&str> {
        Ok(std::str::from_utf8(self.read_name())?)
    }

    /// Length of the read name without its terminator
    #[must_use]
    pub fn read_name_len(&self) -> usize {
        usize::from(self.buffer.u8_at(READ_NAME_LEN)) - 1
    }

    pub fn set_read_name(&mut self, name: &[u8]) -> Result<()> {
        if name.len() > MAX_READ_NAME_LEN {
            return Err(FieldError::ReadNameTooLong(name.len()).into());
        }
        if memchr::memchr(0, name).is_some() {
            return Err(FieldError::InvalidReadName.into());
        }
        let span = self.regions().read_name;
        let region = self.buffer.splice(span.offset, span.len, name.len() + 1);
        region[..name.len()].copy_from_slice(name);
        self.buffer.set_u8(READ_NAME_LEN, (name.len() + 1) as u8);
        if span.len != name.len() + 1 {
            self.directory.take();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // CIGAR
    // ------------------------------------------------------------------

    #[must_use]
    pub fn cigar(&self) -> CigarView<'_> {
        let span = self.regions().cigar;
        CigarView::new(&self.buffer.as_slice()[span.range()])
    }

    #[must_use]
    pub fn cigar_len(&self) -> usize {
        usize::from(self.buffer.u16_at(CIGAR_LEN))
    }

    pub fn cigar_op(&self, index: usize) -> Result<Kind> {
        self.cigar().kind(index)
    }

    pub fn cigar_op_len(&self, index: usize) -> Result<u32> {
        self.cigar().op_len(index)
    }

    /// SAM text of the CIGAR, `*` when empty
    pub fn cigar_string(&self) -> Result<String> {
        let mut text = String::new();
        self.cigar().write_text(&mut text)?;
        Ok(text)
    }

    pub fn cigar_reference_length(&self) -> Result<i32> {
        self.cigar().reference_length()
    }

    /// Gap-free blocks of the alignment, in reference order
    pub fn alignment_blocks(&self) -> Result<Vec<AlignmentBlock>> {
        self.cigar().alignment_blocks(self.alignment_start())
    }

    fn cigar_mut(&mut self) -> CigarViewMut<'_> {
        let span = self.regions().cigar;
        CigarViewMut::new(&mut self.buffer.as_mut_slice()[span.range()])
    }

    pub fn set_cigar_op(&mut self, index: usize, kind: Kind) -> Result<()> {
        self.cigar_mut().set_kind(index, kind)?;
        self.invalidate_alignment();
        Ok(())
    }

    pub fn set_cigar_op_len(&mut self, index: usize, len: u32) -> Result<()> {
        self.cigar_mut().set_len(index, len)?;
        self.invalidate_alignment();
        Ok(())
    }

    /// Replaces every CIGAR operator
    pub fn set_cigar(&mut self, ops: &[CigarOp]) -> Result<()> {
        let packed = pack_ops(ops)?;
        self.replace_cigar_bytes(&packed)
    }

    /// Replaces the CIGAR with parsed SAM text; `*` clears it
    pub fn set_cigar_string(&mut self, text: &str) -> Result<()> {
        self.set_cigar(&parse_cigar(text)?)
    }

    /// Copies the operators of `other` verbatim
    pub fn copy_cigar_from(&mut self, other: &BamRecord) -> Result<()> {
        let packed = other.cigar().as_bytes().to_vec();
        self.replace_cigar_bytes(&packed)
    }

    fn replace_cigar_bytes(&mut self, packed: &[u8]) -> Result<()> {
        let count = packed.len() / 4;
        let count = u16::try_from(count).map_err(|_| FieldError::TooManyCigarOps(count))?;
        let span = self.regions().cigar;
        self.buffer.replace(span.offset, span.len, packed);
        self.buffer.set_u16(CIGAR_LEN, count);
        if span.len != packed.len() {
            self.directory.take();
        }
        self.invalidate_alignment();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bases and qualities
    // ------------------------------------------------------------------

    /// Number of bases, and of quality scores
    #[must_use]
    pub fn read_len(&self) -> usize {
        self.buffer.u32_at(READ_LEN) as usize
    }

    /// The packed 4-bit bases as stored
    #[must_use]
    pub fn packed_bases(&self) -> &[u8] {
        let span = self.regions().bases;
        &self.buffer.as_slice()[span.range()]
    }

    /// Upper-case ASCII bases
    #[must_use]
    pub fn read_bases(&self) -> &[u8] {
        self.bases.get_or_init(|| {
            let mut bases = Vec::with_capacity(self.read_len());
            nuc::unpack(self.packed_bases(), self.read_len(), &mut bases);
            bases
        })
    }

    /// Bases as text, `*` for a record without bases
    pub fn read_string(&self) -> Result<&str> {
        if self.read_len() == 0 {
            return Ok(NULL_FIELD);
        }
        Ok(std::str::from_utf8(self.read_bases())?)
    }

    /// Replaces the bases, rejecting characters outside the BAM alphabet
    pub fn set_read_bases(&mut self, bases: &[u8]) -> Result<()> {
        self.set_read_bases_with_policy(bases, Policy::default())
    }

    /// Replaces the bases, handling invalid characters with `policy`
    ///
    /// Qualities are kept when the length is unchanged. Otherwise the quality
    /// region is resized along with the bases and marked absent.
    pub fn set_read_bases_with_policy(&mut self, bases: &[u8], policy: Policy) -> Result<()> {
        let mut ibuf = Vec::new();
        policy.handle(bases, &mut ibuf)?;
        let read_len =
            u32::try_from(ibuf.len()).map_err(|_| FieldError::ReadTooLong(ibuf.len()))?;
        let mut packed = vec![0u8; nuc::packed_len(ibuf.len())];
        nuc::pack(&ibuf, &mut packed)?;

        let regions = self.regions();
        if ibuf.len() == self.read_len() {
            self.buffer.replace(regions.bases.offset, regions.bases.len, &packed);
        } else {
            let old_len = regions.bases.len + regions.qualities.len;
            let region = self
                .buffer
                .splice(regions.bases.offset, old_len, packed.len() + ibuf.len());
            let (packed_region, qualities) = region.split_at_mut(packed.len());
            packed_region.copy_from_slice(&packed);
            qualities.fill(QUALITY_ABSENT);
            self.buffer.set_u32(READ_LEN, read_len);
            self.directory.take();
        }
        self.bases.take();
        Ok(())
    }

    /// Replaces the bases from SAM text; `*` clears them
    pub fn set_read_string(&mut self, text: &str) -> Result<()> {
        self.set_read_string_with_policy(text, Policy::default())
    }

    pub fn set_read_string_with_policy(&mut self, text: &str, policy: Policy) -> Result<()> {
        if text == NULL_FIELD {
            return self.set_read_bases_with_policy(&[], policy);
        }
        self.set_read_bases_with_policy(text.as_bytes(), policy)
    }

    fn has_base_qualities(&self) -> bool {
        let span = self.regions().qualities;
        span.len > 0 && self.buffer.u8_at(span.offset) != QUALITY_ABSENT
    }

    /// Phred scores, `None` when the record carries none
    #[must_use]
    pub fn base_qualities(&self) -> Option<&[u8]> {
        if !self.has_base_qualities() {
            return None;
        }
        let span = self.regions().qualities;
        Some(&self.buffer.as_slice()[span.range()])
    }

    /// Phred+33 text of the scores, `*` when absent
    #[must_use]
    pub fn base_quality_string(&self) -> String {
        match self.base_qualities() {
            Some(quals) => quals
                .iter()
                .map(|&q| q.saturating_add(PHRED_OFFSET) as char)
                .collect(),
            None => NULL_FIELD.to_string(),
        }
    }

    /// Writes Phred scores over the quality region
    ///
    /// An empty slice marks the scores absent. Otherwise the length must equal the
    /// read length, which is never changed by this call.
    pub fn set_base_qualities(&mut self, quals: &[u8]) -> Result<()> {
        let span = self.regions().qualities;
        if quals.is_empty() {
            self.buffer.as_mut_slice()[span.range()].fill(QUALITY_ABSENT);
            return Ok(());
        }
        if quals.len() != span.len {
            return Err(FieldError::QualityLengthMismatch {
                expected: span.len,
                got: quals.len(),
            }
            .into());
        }
        if let Some(&q) = quals.iter().find(|&&q| q == QUALITY_ABSENT) {
            return Err(FieldError::InvalidQuality(q).into());
        }
        self.buffer.as_mut_slice()[span.range()].copy_from_slice(quals);
        Ok(())
    }

    /// Writes scores from Phred+33 text; `*` marks them absent
    pub fn set_base_quality_string(&mut self, text: &str) -> Result<()> {
        if text == NULL_FIELD {
            return self.set_base_qualities(&[]);
        }
        let quals = text
            .bytes()
            .map(|c| {
                c.checked_sub(PHRED_OFFSET)
                    .ok_or_else(|| FieldError::InvalidQuality(c).into())
            })
            .collect::<Result<Vec<u8>>>()?;
        self.set_base_qualities(&quals)
    }

    pub fn reverse_complement_read_bases(&mut self) {
        let span = self.regions().bases;
        let read_len = self.read_len();
        nuc::reverse_complement_in_place(&mut self.buffer.as_mut_slice()[span.range()], read_len);
        self.bases.take();
    }

    pub fn reverse_base_qualities(&mut self) {
        let span = self.regions().qualities;
        nuc::reverse_in_place(&mut self.buffer.as_mut_slice()[span.range()]);
    }

    /// Flips the record to the opposite strand
    ///
    /// Bases are reverse-complemented and qualities reversed, along with the
    /// per-base string tags `E2` (complemented), `U2` and `OQ`. The strand flag is
    /// left as is.
    pub fn reverse_complement(&mut self) -> Result<()> {
        if self.has_attribute(standard::SQ)? {
            return Err(UnsupportedError::SqTag.into());
        }
        let per_base = [(standard::E2, true), (standard::U2, false), (standard::OQ, false)];
        let mut present = Vec::with_capacity(per_base.len());
        for (tag, complement) in per_base {
            match self.attribute_type(tag)? {
                Some(TagType::String) => present.push((tag, complement)),
                Some(other) => {
                    return Err(TagError::NotAString {
                        tag,
                        stored: other.code() as char,
                    }
                    .into());
                }
                None => {}
            }
        }

        self.reverse_complement_read_bases();
        self.reverse_base_qualities();
        for (tag, complement) in present {
            self.reverse_string_attribute(tag, complement)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    fn tag_region(&self) -> &[u8] {
        let span = self.regions().tags;
        &self.buffer.as_slice()[span.range()]
    }

    fn directory(&self) -> Result<&AttributeDirectory> {
        if let Some(directory) = self.directory.get() {
            return Ok(directory);
        }
        let directory = AttributeDirectory::scan(self.tag_region())?;
        Ok(self.directory.get_or_init(|| directory))
    }

    fn take_directory(&mut self) -> Result<AttributeDirectory> {
        self.directory
            .take()
            .map_or_else(|| AttributeDirectory::scan(self.tag_region()), Ok)
    }

    /// The value of `tag`, `None` when absent
    pub fn attribute(&self, tag: Tag) -> Result<Option<Value>> {
        let Some(offset) = self.directory()?.offset_of(tag) else {
            return Ok(None);
        };
        let region = self.tag_region();
        tags::decode_value(tag, region[offset], &region[offset + 1..]).map(Some)
    }

    /// The stored type of `tag`, `None` when absent
    pub fn attribute_type(&self, tag: Tag) -> Result<Option<TagType>> {
        let Some(offset) = self.directory()?.offset_of(tag) else {
            return Ok(None);
        };
        let code = self.tag_region()[offset];
        TagType::from_u8(code)
            .map(Some)
            .ok_or_else(|| RecordError::UnknownTagType { tag, code }.into())
    }

    pub fn has_attribute(&self, tag: Tag) -> Result<bool> {
        Ok(self.directory()?.contains(tag))
    }

    pub fn num_attributes(&self) -> Result<usize> {
        Ok(self.directory()?.len())
    }

    /// Tags in storage order
    pub fn attribute_tags(&self) -> Result<Vec<Tag>> {
        Ok(self.directory()?.tags().collect())
    }

    /// Sets `tag` to `value`, typed by the value itself; `None` deletes the tag
    pub fn set_attribute(&mut self, tag: Tag, value: Option<Value>) -> Result<()> {
        match value {
            Some(value) => self.set_typed_attribute(tag, value.tag_type(), &value),
            None => self.delete_attribute(tag).map(|_| ()),
        }
    }

    /// Sets `tag` to `value` written as type `ty`; `None` deletes the tag
    ///
    /// An existing tag keeps its stored type. `ty` must equal it, or be a strictly
    /// narrower integer type, in which case the value is narrowed to `ty` and then
    /// stored at the existing width. Integers are truncated to the width of `ty`.
    pub fn set_attribute_as(&mut self, tag: Tag, ty: TagType, value: Option<Value>) -> Result<()> {
        match value {
            Some(value) => self.set_typed_attribute(tag, ty, &value),
            None => self.delete_attribute(tag).map(|_| ()),
        }
    }

    fn set_typed_attribute(&mut self, tag: Tag, ty: TagType, value: &Value) -> Result<()> {
        let tags_offset = self.regions().tags.offset;
        let Some(span) = self.directory()?.span_of(self.tag_region(), tag)? else {
            return self.append_attribute(tag, ty, value);
        };
        let code = self.tag_region()[span.start + 2];
        let stored = TagType::from_u8(code).ok_or(RecordError::UnknownTagType { tag, code })?;
        if !ty.fits_into(stored) {
            return Err(TagError::TypeMismatch {
                tag,
                requested: ty.code() as char,
                stored: stored.code() as char,
            }
            .into());
        }

        let mut encoded = Vec::new();
        if stored.is_integer() {
            let narrowed = value.as_int().map(|v| ty.truncate(v)).ok_or_else(|| {
                TagError::IncompatibleValue {
                    tag,
                    ty: ty.code() as char,
                    value: value.to_string(),
                }
            })?;
            tags::encode_int(stored, narrowed, &mut encoded);
        } else {
            tags::encode_value(tag, stored, value, &mut encoded)?;
        }

        let value_len = span.len() - 3;
        if encoded.len() == value_len {
            let start = tags_offset + span.value_start();
            self.buffer.as_mut_slice()[start..start + value_len].copy_from_slice(&encoded);
            Ok(())
        } else {
            self.delete_attribute(tag)?;
            self.append_entry(tag, stored, &encoded)
        }
    }

    fn append_attribute(&mut self, tag: Tag, ty: TagType, value: &Value) -> Result<()> {
        let mut encoded = Vec::new();
        tags::encode_value(tag, ty, value, &mut encoded)?;
        self.append_entry(tag, ty, &encoded)
    }

    /// Appends an entry at the end of the buffer and registers it without a rescan
    fn append_entry(&mut self, tag: Tag, ty: TagType, value: &[u8]) -> Result<()> {
        let mut directory = self.take_directory()?;
        let tags_offset = self.regions().tags.offset;
        let end = self.buffer.len();

        let mut entry = Vec::with_capacity(3 + value.len());
        entry.extend_from_slice(tag.as_bytes());
        entry.push(ty.code());
        entry.extend_from_slice(value);
        self.buffer.replace(end, 0, &entry);

        directory.push(tag, end - tags_offset + 2);
        self.directory = OnceLock::from(directory);
        Ok(())
    }

    /// Sets an integer tag
    ///
    /// An existing integer tag is rewritten at its stored width when the value
    /// fits, and re-added with the smallest fitting type otherwise. A new tag gets
    /// the smallest type of `c`, `C`, `s`, `S`, `i`, `I` that holds the value.
    pub fn set_int_attribute(&mut self, tag: Tag, value: i64) -> Result<()> {
        let smallest = TagType::smallest_int(value).ok_or_else(|| TagError::IncompatibleValue {
            tag,
            ty: 'i',
            value: value.to_string(),
        })?;
        match self.attribute_type(tag)? {
            Some(stored) if !stored.is_integer() => Err(TagError::TypeMismatch {
                tag,
                requested: smallest.code() as char,
                stored: stored.code() as char,
            }
            .into()),
            Some(stored) if stored.holds(value) => {
                let v = Value::int_of_type(stored, value).ok_or_else(|| {
                    TagError::IncompatibleValue {
                        tag,
                        ty: stored.code() as char,
                        value: value.to_string(),
                    }
                })?;
                self.set_typed_attribute(tag, stored, &v)
            }
            _ => {
                self.delete_attribute(tag)?;
                let mut encoded = Vec::new();
                tags::encode_int(smallest, value, &mut encoded);
                self.append_entry(tag, smallest, &encoded)
            }
        }
    }

    /// Integer value of `tag`
    pub fn int_attribute(&self, tag: Tag) -> Result<i64> {
        let value = self.attribute(tag)?.ok_or(TagError::NotPresent(tag))?;
        value.as_int().ok_or_else(|| {
            TagError::TypeMismatch {
                tag,
                requested: 'i',
                stored: value.tag_type().code() as char,
            }
            .into()
        })
    }

    /// Removes `tag`, returning whether it was present
    pub fn delete_attribute(&mut self, tag: Tag) -> Result<bool> {
        let Some(span) = self.directory()?.span_of(self.tag_region(), tag)? else {
            return Ok(false);
        };
        let tags_offset = self.regions().tags.offset;
        self.buffer.splice(tags_offset + span.start, span.len(), 0);
        self.directory.take();
        Ok(true)
    }

    /// Removes every tag
    pub fn clear_attributes(&mut self) {
        let span = self.regions().tags;
        self.buffer.splice(span.offset, span.len, 0);
        self.directory = OnceLock::from(AttributeDirectory::default());
    }

    /// Copies the entry of `tag` from `other` byte for byte, or deletes `tag`
    /// here when `other` lacks it
    pub fn copy_attribute_from(&mut self, other: &BamRecord, tag: Tag) -> Result<()> {
        let region = other.tag_region();
        let Some(span) = other.directory()?.span_of(region, tag)? else {
            self.delete_attribute(tag)?;
            return Ok(());
        };
        let code = region[span.start + 2];
        let ty = TagType::from_u8(code).ok_or(RecordError::UnknownTagType { tag, code })?;
        let value = region[span.value_start()..span.end].to_vec();
        self.delete_attribute(tag)?;
        self.append_entry(tag, ty, &value)
    }

    /// Reverses a string tag in place, complementing each base if `complement`
    pub fn reverse_string_attribute(&mut self, tag: Tag, complement: bool) -> Result<()> {
        let Some(span) = self.directory()?.span_of(self.tag_region(), tag)? else {
            return Err(TagError::NotPresent(tag).into());
        };
        let tags_offset = self.regions().tags.offset;
        let code = self.tag_region()[span.start + 2];
        if code != TagType::String.code() {
            return Err(TagError::NotAString {
                tag,
                stored: code as char,
            }
            .into());
        }
        // the value span ends with the NUL terminator
        let start = tags_offset + span.value_start();
        let end = tags_offset + span.end - 1;
        let text = &mut self.buffer.as_mut_slice()[start..end];
        if complement {
            nuc::reverse_complement_ascii(text);
        } else {
            text.reverse();
        }
        Ok(())
    }
}

impl Default for BamRecord {
    fn default() -> Self {
        Self::new()
    }
}

fn to_stored_position(start: i32) -> i32 {
    if start <= 0 {
        -1
    } else {
        start - 1
    }
}

impl PartialEq for BamRecord {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
            && self.pending_reference_name == other.pending_reference_name
            && self.pending_mate_reference_name == other.pending_mate_reference_name
    }
}

impl Eq for BamRecord {}

impl fmt::Debug for BamRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BamRecord")
            .field("read_name", &String::from_utf8_lossy(self.read_name()))
            .field("flags", &self.flags().bits())
            .field("reference_index", &self.reference_index())
            .field("alignment_start", &self.alignment_start())
            .field("len", &self.encoded_len())
            .finish_non_exhaustive()
    }
}

/// Tab-separated SAM-like line of the mandatory fields
impl fmt::Display for BamRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cigar = self.cigar_string().map_err(|_| fmt::Error)?;
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            String::from_utf8_lossy(self.read_name()),
            self.flags(),
            self.reference_name().unwrap_or(NO_REFERENCE_NAME),
            self.alignment_start(),
            self.mapping_quality(),
            cigar,
            self.mate_reference_name().unwrap_or(NO_REFERENCE_NAME),
            self.mate_alignment_start(),
            self.template_len(),
            self.read_string().unwrap_or(NULL_FIELD),
            self.base_quality_string(),
        )
    }
}
