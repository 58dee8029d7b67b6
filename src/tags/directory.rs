//! Tag directory
//!
//! Maps each tag to the offset of its type byte, relative to the start of the tag
//! region, in storage order. Built by one linear scan and extended in place when a
//! tag is appended; any other change to the region is handled by rebuilding.

use log::trace;

use super::{value_size, Tag};
use crate::error::{RecordError, Result};

/// Byte span of one tag entry within the tag region
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntrySpan {
    /// Offset of the first tag character
    pub start: usize,
    /// Offset one past the last value byte
    pub end: usize,
}

impl EntrySpan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Offset of the first value byte
    #[must_use]
    pub fn value_start(&self) -> usize {
        self.start + 3
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeDirectory {
    entries: Vec<(Tag, usize)>,
}

impl AttributeDirectory {
    /// Walks the tag region once, recording every entry
    ///
    /// Fails on an unknown type code or an entry running past the end of `region`.
    pub fn scan(region: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut pos = 0;
        while pos < region.len() {
            if pos + 3 > region.len() {
                return Err(RecordError::TagOverrun(pos).into());
            }
            let tag = Tag::new([region[pos], region[pos + 1]]);
            let size = value_size(tag, region[pos + 2], &region[pos + 3..], pos)?;
            entries.push((tag, pos + 2));
            pos += 3 + size;
        }
        trace!("Scanned {} tags over {} bytes", entries.len(), region.len());
        Ok(Self { entries })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the type byte of `tag`; the first occurrence wins
    #[must_use]
    pub fn offset_of(&self, tag: Tag) -> Option<usize> {
        self.entries
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|&(_, offset)| offset)
    }

    #[must_use]
    pub fn contains(&self, tag: Tag) -> bool {
        self.offset_of(tag).is_some()
    }

    /// `(tag, type-byte offset)` pairs in storage order
    pub fn iter(&self) -> impl Iterator<Item = (Tag, usize)> + '_ {
        self.entries.iter().copied()
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.entries.iter().map(|&(tag, _)| tag)
    }

    /// Registers an entry appended at the end of the region
    pub(crate) fn push(&mut self, tag: Tag, type_offset: usize) {
        self.entries.push((tag, type_offset));
    }

    /// Byte span of the entry of `tag` in `region`
    pub fn span_of(&self, region: &[u8], tag: Tag) -> Result<Option<EntrySpan>> {
        let Some(type_offset) = self.offset_of(tag) else {
            return Ok(None);
        };
        let start = type_offset - 2;
        let size = value_size(
            tag,
            region[type_offset],
            &region[type_offset + 1..],
            start,
        )?;
        Ok(Some(EntrySpan {
            start,
            end: type_offset + 1 + size,
        }))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::tags::standard::{NM, RG};

    fn region() -> Vec<u8> {
        let mut region = Vec::new();
        region.extend_from_slice(b"RGZgrp1\0");
        region.extend_from_slice(b"NMC\x02");
        region.extend_from_slice(b"XBBs\x02\0\0\0\x01\0\x02\0");
        region.extend_from_slice(b"XIi\x01\0\0\0");
        region
    }

    #[test]
    fn test_scan_storage_order() -> Result<()> {
        let dir = AttributeDirectory::scan(&region())?;
        assert_eq!(dir.len(), 4);
        let tags: Vec<String> = dir.tags().map(|t| t.to_string()).collect();
        assert_eq!(tags, ["RG", "NM", "XB", "XI"]);
        assert_eq!(dir.offset_of(RG), Some(2));
        assert_eq!(dir.offset_of(NM), Some(10));
        assert_eq!(dir.offset_of(Tag::new(*b"XB")), Some(14));
        assert_eq!(dir.offset_of(Tag::new(*b"XI")), Some(26));
        Ok(())
    }

    #[test]
    fn test_offsets_point_at_type_bytes() -> Result<()> {
        let region = region();
        let dir = AttributeDirectory::scan(&region)?;
        for (tag, offset) in dir.iter() {
            assert_eq!(&region[offset - 2..offset], tag.as_bytes());
        }
        Ok(())
    }

    #[test]
    fn test_span_of() -> Result<()> {
        let region = region();
        let dir = AttributeDirectory::scan(&region)?;
        let span = dir.span_of(&region, Tag::new(*b"XB"))?.unwrap();
        assert_eq!(span, EntrySpan { start: 12, end: 24 });
        assert_eq!(span.len(), 12);
        assert!(dir.span_of(&region, Tag::new(*b"ZZ"))?.is_none());
        Ok(())
    }

    #[test]
    fn test_empty_region() -> Result<()> {
        let dir = AttributeDirectory::scan(&[])?;
        assert!(dir.is_empty());
        Ok(())
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let err = AttributeDirectory::scan(b"XAq\x01").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_overrun_is_malformed() {
        assert!(AttributeDirectory::scan(b"XAi\x01\0").unwrap_err().is_malformed());
        assert!(AttributeDirectory::scan(b"XAZabc").unwrap_err().is_malformed());
        assert!(AttributeDirectory::scan(b"XA").unwrap_err().is_malformed());
    }

    #[test]
    fn test_push() -> Result<()> {
        let mut dir = AttributeDirectory::scan(b"NMC\x02")?;
        dir.push(RG, 6);
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.offset_of(RG), Some(6));
        Ok(())
    }
}
