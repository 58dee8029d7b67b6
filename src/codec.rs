//! Length-prefixed record framing
//!
//! Each record on a stream is preceded by its size as a little-endian `u32`. The
//! stream is expected to be already decompressed; block compression belongs to
//! the transport layer.
//!
//! # Example
//!
//! ```
//! use bamrec::{BamRecord, RecordCodec};
//!
//! let codec = RecordCodec::default();
//! let mut record = BamRecord::builder().read_name(b"r1").bases(b"ACGT").build().unwrap();
//!
//! let mut stream = Vec::new();
//! codec.encode(&mut record, &mut stream).unwrap();
//!
//! let mut reader = stream.as_slice();
//! let decoded = codec.decode(&mut reader).unwrap().unwrap();
//! assert_eq!(decoded, record);
//! assert!(codec.decode(&mut reader).unwrap().is_none());
//! ```

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, trace};

use crate::dictionary::SharedDictionary;
use crate::error::{Result, StreamError};
use crate::record::layout::FIXED_HEADER_LEN;
use crate::record::BamRecord;

/// Largest record accepted by default, guarding against corrupt length prefixes
pub const DEFAULT_MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

/// Reads and writes framed records
#[derive(Clone)]
pub struct RecordCodec {
    dictionary: Option<SharedDictionary>,
    max_record_size: u32,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self {
            dictionary: None,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl RecordCodec {
    #[must_use]
    pub fn builder() -> RecordCodecBuilder {
        RecordCodecBuilder::default()
    }

    #[must_use]
    pub fn dictionary(&self) -> Option<&SharedDictionary> {
        self.dictionary.as_ref()
    }

    #[must_use]
    pub fn max_record_size(&self) -> u32 {
        self.max_record_size
    }

    /// Reads the next record
    ///
    /// Returns `Ok(None)` when the stream ends cleanly before a length prefix.
    /// Field decoding is deferred to the record's accessors.
    pub fn decode<R: Read>(&self, reader: &mut R) -> Result<Option<BamRecord>> {
        let mut prefix = [0u8; 4];
        let filled = read_prefix(reader, &mut prefix)?;
        if filled == 0 {
            debug!("End of record stream");
            return Ok(None);
        }
        if filled < prefix.len() {
            return Err(StreamError::PartialPrefix(filled).into());
        }

        let length = u32::from_le_bytes(prefix);
        if (length as usize) < FIXED_HEADER_LEN {
            return Err(StreamError::InvalidRecordLength(length).into());
        }
        if length > self.max_record_size {
            return Err(StreamError::RecordTooLarge {
                length,
                max: self.max_record_size,
            }
            .into());
        }

        let mut bytes = vec![0u8; length as usize];
        reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => StreamError::TruncatedRecord {
                expected: length as usize,
            }
            .into(),
            _ => crate::Error::from(e),
        })?;
        trace!("Decoded record of {length} bytes");

        let mut record = BamRecord::from_bytes(bytes)?;
        if let Some(dictionary) = &self.dictionary {
            record.set_dictionary(Some(dictionary.clone()));
        }
        Ok(Some(record))
    }

    /// Writes `record` with its length prefix
    ///
    /// Pending reference names are resolved first, and a bin invalidated by a
    /// placement change is recomputed. A decoded record that was not modified is
    /// written back byte for byte.
    pub fn encode<W: Write>(&self, record: &mut BamRecord, writer: &mut W) -> Result<()> {
        record.prepare_for_encode(self.dictionary.as_ref())?;
        let bytes = record.as_bytes();
        let length =
            u32::try_from(bytes.len()).map_err(|_| StreamError::Unframeable(bytes.len()))?;
        writer.write_u32::<LittleEndian>(length)?;
        writer.write_all(bytes)?;
        trace!("Encoded record of {length} bytes");
        Ok(())
    }
}

/// Fills `prefix` until it is full or the stream ends, returning the bytes read
fn read_prefix<R: Read>(reader: &mut R, prefix: &mut [u8; 4]) -> Result<usize> {
    let mut filled = 0;
    while filled < prefix.len() {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Builder for [`RecordCodec`]
#[derive(Clone)]
pub struct RecordCodecBuilder {
    dictionary: Option<SharedDictionary>,
    max_record_size: u32,
}

impl Default for RecordCodecBuilder {
    fn default() -> Self {
        Self {
            dictionary: None,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl RecordCodecBuilder {
    /// Dictionary attached to decoded records and used to resolve pending names on encode
    #[must_use]
    pub fn dictionary(mut self, dictionary: SharedDictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Largest record length accepted by `decode`
    #[must_use]
    pub fn max_record_size(mut self, size: u32) -> Self {
        self.max_record_size = size;
        self
    }

    #[must_use]
    pub fn build(self) -> RecordCodec {
        RecordCodec {
            dictionary: self.dictionary,
            max_record_size: self.max_record_size,
        }
    }
}

/// Iterates over the records of a stream
///
/// The iterator stops after the first error.
pub struct RecordReader<R: Read> {
    inner: R,
    codec: RecordCodec,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_codec(inner, RecordCodec::default())
    }

    pub fn with_codec(inner: R, codec: RecordCodec) -> Self {
        Self {
            inner,
            codec,
            done: false,
        }
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<BamRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.codec.decode(&mut self.inner) {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Writes framed records to a stream
pub struct RecordWriter<W: Write> {
    inner: W,
    codec: RecordCodec,
    num_records: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_codec(inner, RecordCodec::default())
    }

    pub fn with_codec(inner: W, codec: RecordCodec) -> Self {
        Self {
            inner,
            codec,
            num_records: 0,
        }
    }

    pub fn write_record(&mut self, record: &mut BamRecord) -> Result<()> {
        self.codec.encode(record, &mut self.inner)?;
        self.num_records += 1;
        Ok(())
    }

    /// Number of records written so far
    pub fn num_records(&self) -> usize {
        self.num_records
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        debug!("Flushed {} records", self.num_records);
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod testing {
    use std::io::Cursor;

    use super::*;
    use crate::cigar::parse_cigar;
    use crate::dictionary::ReferenceDictionary;

    fn record(name: &[u8]) -> BamRecord {
        let cigar = parse_cigar("4M").unwrap();
        BamRecord::builder()
            .read_name(name)
            .reference_index(0)
            .alignment_start(10)
            .cigar(&cigar)
            .bases(b"ACGT")
            .qualities(&[30, 31, 32, 33])
            .build()
            .unwrap()
    }

    fn framed(records: &mut [BamRecord]) -> Vec<u8> {
        let mut writer = RecordWriter::new(Vec::new());
        for record in records.iter_mut() {
            writer.write_record(record).unwrap();
        }
        writer.into_inner()
    }

    #[test]
    fn test_empty_stream() -> Result<()> {
        let codec = RecordCodec::default();
        assert!(codec.decode(&mut io::empty())?.is_none());
        Ok(())
    }

    #[test]
    fn test_reader_yields_all_records() -> Result<()> {
        let mut records = [record(b"a"), record(b"b"), record(b"c")];
        let stream = framed(&mut records);
        let decoded = RecordReader::new(Cursor::new(stream)).collect::<Result<Vec<_>>>()?;
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[1].read_name(), b"b");
        assert_eq!(decoded, records);
        Ok(())
    }

    #[test]
    fn test_length_prefix() {
        let mut records = [record(b"a")];
        let stream = framed(&mut records);
        let length = u32::from_le_bytes([stream[0], stream[1], stream[2], stream[3]]);
        assert_eq!(length as usize, stream.len() - 4);
        assert_eq!(&stream[4..], records[0].as_bytes());
    }

    #[test]
    fn test_length_below_header_is_malformed() {
        let mut stream = 12u32.to_le_bytes().to_vec();
        stream.extend_from_slice(&[0; 12]);
        let err = RecordCodec::default()
            .decode(&mut stream.as_slice())
            .unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(err.to_string(), "Malformed stream: Invalid record length: 12");
    }

    #[test]
    fn test_truncated_record_is_malformed() {
        let mut records = [record(b"a")];
        let stream = framed(&mut records);
        let truncated = &stream[..stream.len() - 3];
        let err = RecordCodec::default()
            .decode(&mut &truncated[..])
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_partial_prefix_is_malformed() {
        let err = RecordCodec::default()
            .decode(&mut &[1u8, 0][..])
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_max_record_size() {
        let mut records = [record(b"a")];
        let stream = framed(&mut records);
        let codec = RecordCodec::builder().max_record_size(40).build();
        assert!(codec.decode(&mut stream.as_slice()).unwrap_err().is_malformed());
    }

    #[test]
    fn test_reader_stops_after_error() {
        let mut records = [record(b"a")];
        let mut stream = framed(&mut records);
        stream.extend_from_slice(&[7, 0, 0, 0]);
        let mut reader = RecordReader::new(stream.as_slice());
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_decoded_records_carry_dictionary() -> Result<()> {
        let dict = ["chr1"].into_iter().collect::<ReferenceDictionary>().into_shared();
        let codec = RecordCodec::builder().dictionary(dict).build();
        let mut records = [record(b"a")];
        let stream = framed(&mut records);
        let decoded = codec.decode(&mut stream.as_slice())?.unwrap();
        assert_eq!(decoded.reference_name()?, "chr1");
        Ok(())
    }

    #[test]
    fn test_pending_name_resolved_on_encode() -> Result<()> {
        let dict = ["1", "2"].into_iter().collect::<ReferenceDictionary>().into_shared();
        let mut record = record(b"a");
        record.set_reference_name("2");
        assert_eq!(record.pending_reference_name(), Some("2"));
        assert_eq!(record.reference_index(), 0);

        let codec = RecordCodec::builder().dictionary(dict).build();
        let mut stream = Vec::new();
        codec.encode(&mut record, &mut stream)?;
        assert_eq!(record.pending_reference_name(), None);
        assert_eq!(record.reference_index(), 1);
        Ok(())
    }

    #[test]
    fn test_unresolved_name_fails_encode() {
        let mut record = record(b"a");
        record.set_reference_name("chrUn");
        let err = RecordCodec::default()
            .encode(&mut record, &mut Vec::new())
            .unwrap_err();
        assert!(err.is_malformed());
    }
}
