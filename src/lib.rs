//! # bamrec
//!
//! Binary alignment (BAM) records held as a single byte buffer.
//!
//! A [`BamRecord`] keeps the exact on-disk encoding of one record and reads or
//! writes fields in place. Decoding a record from a stream does no per-field
//! work; bases, the alignment end and the tag directory are decoded lazily and
//! cached until a mutation invalidates them. An unmodified record is re-encoded
//! byte for byte.
//!
//! The [`RecordCodec`] frames records on an already-decompressed stream, and
//! [`RecordReader`] / [`RecordWriter`] wrap it for iteration and sequential output.
//!
//! # Example
//!
//! ```
//! use bamrec::{tags::standard::NM, BamRecord, RecordReader, RecordWriter};
//!
//! let mut record = BamRecord::builder()
//!     .read_name(b"read1")
//!     .bases(b"ACGTN")
//!     .tag(NM, 0u8)
//!     .build()
//!     .unwrap();
//! record.set_int_attribute(NM, 3).unwrap();
//!
//! let mut writer = RecordWriter::new(Vec::new());
//! writer.write_record(&mut record).unwrap();
//! let stream = writer.into_inner();
//!
//! for result in RecordReader::new(stream.as_slice()) {
//!     let record = result.unwrap();
//!     assert_eq!(record.read_bases(), b"ACGTN");
//!     assert_eq!(record.int_attribute(NM).unwrap(), 3);
//! }
//! ```

pub mod binning;
pub mod cigar;
pub mod codec;
pub mod dictionary;
pub mod error;
pub mod flags;
pub mod nuc;
mod policy;
pub mod record;
pub mod tags;

pub use codec::{RecordCodec, RecordCodecBuilder, RecordReader, RecordWriter};
pub use dictionary::{ReferenceDictionary, SequenceDictionary, SharedDictionary};
pub use error::{Error, Result};
pub use flags::Flags;
pub use policy::{Policy, RNG_SEED};
pub use record::{BamRecord, RecordBuilder};
pub use tags::{Tag, TagType, Value};
