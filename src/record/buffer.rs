//! Owned record storage with a single resize primitive

use byteorder::{ByteOrder, LittleEndian};

/// The owned bytes of one record
///
/// Every change in the width of a region goes through [`RecordBuffer::splice`],
/// which builds the resized buffer aside and swaps it in, so a failure before the
/// swap leaves the previous bytes untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordBuffer {
    bytes: Vec<u8>,
}

impl RecordBuffer {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }

    /// Resizes the `old_len` bytes at `offset` to `new_len` bytes
    ///
    /// Bytes before and after the region keep their values. The returned region
    /// is zero-filled.
    pub fn splice(&mut self, offset: usize, old_len: usize, new_len: usize) -> &mut [u8] {
        debug_assert!(offset + old_len <= self.bytes.len());
        if old_len != new_len {
            let mut next = Vec::with_capacity(self.bytes.len() - old_len + new_len);
            next.extend_from_slice(&self.bytes[..offset]);
            next.resize(offset + new_len, 0);
            next.extend_from_slice(&self.bytes[offset + old_len..]);
            self.bytes = next;
        }
        let region = &mut self.bytes[offset..offset + new_len];
        region.fill(0);
        region
    }

    /// Replaces the `old_len` bytes at `offset` with `data`
    pub fn replace(&mut self, offset: usize, old_len: usize, data: &[u8]) {
        self.splice(offset, old_len, data.len()).copy_from_slice(data);
    }

    #[inline]
    #[must_use]
    pub fn u8_at(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    #[inline]
    #[must_use]
    pub fn u16_at(&self, offset: usize) -> u16 {
        LittleEndian::read_u16(&self.bytes[offset..offset + 2])
    }

    #[inline]
    #[must_use]
    pub fn u32_at(&self, offset: usize) -> u32 {
        LittleEndian::read_u32(&self.bytes[offset..offset + 4])
    }

    #[inline]
    #[must_use]
    pub fn i32_at(&self, offset: usize) -> i32 {
        LittleEndian::read_i32(&self.bytes[offset..offset + 4])
    }

    #[inline]
    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
    }

    #[inline]
    pub fn set_u16(&mut self, offset: usize, value: u16) {
        LittleEndian::write_u16(&mut self.bytes[offset..offset + 2], value);
    }

    #[inline]
    pub fn set_u32(&mut self, offset: usize, value: u32) {
        LittleEndian::write_u32(&mut self.bytes[offset..offset + 4], value);
    }

    #[inline]
    pub fn set_i32(&mut self, offset: usize, value: i32) {
        LittleEndian::write_i32(&mut self.bytes[offset..offset + 4], value);
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_splice_grow() {
        let mut buffer = RecordBuffer::new(b"abcdef".to_vec());
        buffer.splice(2, 1, 3).copy_from_slice(b"XYZ");
        assert_eq!(buffer.as_slice(), b"abXYZdef");
    }

    #[test]
    fn test_splice_shrink() {
        let mut buffer = RecordBuffer::new(b"abcdef".to_vec());
        let region = buffer.splice(1, 3, 1);
        assert_eq!(region, [0]);
        assert_eq!(buffer.as_slice(), b"a\0ef");
    }

    #[test]
    fn test_splice_at_end() {
        let mut buffer = RecordBuffer::new(b"ab".to_vec());
        buffer.replace(2, 0, b"cd");
        assert_eq!(buffer.as_slice(), b"abcd");
        buffer.replace(2, 2, b"");
        assert_eq!(buffer.as_slice(), b"ab");
    }

    #[test]
    fn test_splice_same_width() {
        let mut buffer = RecordBuffer::new(b"abcdef".to_vec());
        buffer.replace(2, 2, b"XY");
        assert_eq!(buffer.as_slice(), b"abXYef");
    }

    #[test]
    fn test_integer_fields() {
        let mut buffer = RecordBuffer::new(vec![0; 12]);
        buffer.set_i32(0, -1);
        buffer.set_u16(4, 0xBEEF);
        buffer.set_u32(8, 101);
        assert_eq!(buffer.i32_at(0), -1);
        assert_eq!(buffer.u16_at(4), 0xBEEF);
        assert_eq!(buffer.u8_at(4), 0xEF);
        assert_eq!(buffer.u32_at(8), 101);
    }
}
