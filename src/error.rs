use crate::tags::Tag;

/// Custom Result type for bamrec operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the bamrec library, encompassing all possible error cases
/// that can occur while decoding, mutating, or framing a binary alignment record.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The record buffer does not follow the binary layout
    #[error("Malformed record: {0}")]
    MalformedRecord(#[from] RecordError),

    /// The framed byte stream is truncated or carries an impossible length
    #[error("Malformed stream: {0}")]
    MalformedStream(#[from] StreamError),

    /// A query was made that is undefined for the current record state
    #[error("Invalid state: {0}")]
    InvalidState(#[from] StateError),

    /// Errors related to tag attributes
    #[error("Tag error: {0}")]
    TagError(#[from] TagError),

    /// A field value cannot be represented in the binary layout
    #[error("Invalid field value: {0}")]
    FieldError(#[from] FieldError),

    /// The operation is not provided by the binary codec layer
    #[error("Unsupported operation: {0}")]
    Unsupported(#[from] UnsupportedError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// UTF-8 conversion errors
    #[error("Error with UTF8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}
impl Error {
    /// Checks if the error reports a malformed record or stream
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedRecord(_) | Self::MalformedStream(_))
    }

    /// Checks if the error reports a missing tag
    #[must_use]
    pub fn is_tag_not_present(&self) -> bool {
        matches!(self, Self::TagError(TagError::NotPresent(_)))
    }

    /// Checks if the error comes from a paired-only flag query on an unpaired record
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }

    /// Checks if the error marks an operation outside the codec's contract
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

/// Errors describing a record buffer that violates the binary layout
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// The buffer is shorter than the fixed header
    ///
    /// # Arguments
    /// * `usize` - The number of bytes provided
    #[error("Record of {0} bytes is shorter than the 32-byte fixed header")]
    TooShort(usize),

    /// The stored read-name length is zero, so there is no room for the NUL terminator
    #[error("Read name length must include the NUL terminator")]
    MissingReadNameTerminator,

    /// The variable-length regions declared by the header do not fit the buffer
    #[error("Header declares {expected} bytes of variable data but only {actual} are present")]
    Truncated { expected: usize, actual: usize },

    /// An unrecognized tag type code was found while scanning the tag region
    #[error("Unrecognized tag type code {code:#04x} for tag {tag}")]
    UnknownTagType { tag: Tag, code: u8 },

    /// A tag entry extends past the end of the buffer
    ///
    /// # Arguments
    /// * `usize` - The offset of the entry relative to the start of the tag region
    #[error("Tag entry at tag-region offset {0} runs past the end of the record")]
    TagOverrun(usize),

    /// A CIGAR operator code outside the nine defined operators
    #[error("Invalid CIGAR operator code: {0}")]
    InvalidCigarOp(u8),

    /// A reference name was set but never resolved against a sequence dictionary
    #[error("Reference name '{0}' is not present in the sequence dictionary")]
    UnresolvedReference(String),

    /// A reference index does not exist in the sequence dictionary
    #[error("Reference index {0} not found in sequence dictionary")]
    UnknownReferenceIndex(i32),

    /// A coordinate or length derived from the header and CIGAR exceeds 32 bits
    #[error("Derived coordinate {0} does not fit in 32 bits")]
    CoordinateOverflow(i64),
}

/// Errors that can occur while reading or writing framed records
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// The length prefix is below the fixed-header size
    #[error("Invalid record length: {0}")]
    InvalidRecordLength(u32),

    /// The length prefix exceeds the configured maximum record size
    #[error("Record length {length} exceeds the configured maximum of {max}")]
    RecordTooLarge { length: u32, max: u32 },

    /// The stream ended partway through a length prefix
    ///
    /// # Arguments
    /// * `usize` - The number of prefix bytes read before end of stream
    #[error("Partial length prefix at end of stream ({0} bytes)")]
    PartialPrefix(usize),

    /// The stream ended partway through a record body
    #[error("Stream ended inside a record of {expected} bytes")]
    TruncatedRecord { expected: usize },

    /// The record is too large to be framed with a 32-bit length prefix
    #[error("Record of {0} bytes cannot be framed")]
    Unframeable(usize),
}

/// Errors raised when a query makes no sense for the record's current flags
#[derive(thiserror::Error, Debug)]
pub enum StateError {
    /// A mate or segment flag was queried on a record that is not paired
    ///
    /// # Arguments
    /// * `&'static str` - The name of the queried flag
    #[error("Inappropriate call if not paired read: {0}")]
    NotPaired(&'static str),
}

/// Errors related to tag attributes
#[derive(thiserror::Error, Debug)]
pub enum TagError {
    /// The tag does not exist on the record
    #[error("Tag not present: {0}")]
    NotPresent(Tag),

    /// A tag name that is not exactly two ASCII characters
    #[error("Tag name must be two ASCII characters: {0:?}")]
    InvalidName(String),

    /// The declared type is incompatible with the type already stored for the tag
    #[error("Type '{requested}' for tag {tag} does not match the stored type '{stored}'")]
    TypeMismatch {
        tag: Tag,
        requested: char,
        stored: char,
    },

    /// The value cannot be written with the requested type
    #[error("Value {value} cannot be written to tag {tag} as type '{ty}'")]
    IncompatibleValue {
        tag: Tag,
        ty: char,
        value: String,
    },

    /// A string-only operation was requested on a tag of another type
    #[error("Tag {tag} has type '{stored}' instead of 'Z'")]
    NotAString { tag: Tag, stored: char },
}

/// Errors raised when a field value cannot be stored in the binary layout
#[derive(thiserror::Error, Debug)]
pub enum FieldError {
    /// Read names are stored with a one-byte length including the terminator
    #[error("Invalid read name length: {0} (maximum 254)")]
    ReadNameTooLong(usize),

    /// Read names are NUL-terminated on disk
    #[error("Read name contains a NUL byte")]
    InvalidReadName,

    /// The CIGAR operator count is a 16-bit field
    #[error("Too many CIGAR operators: {0} (maximum 65535)")]
    TooManyCigarOps(usize),

    /// CIGAR run lengths are 28-bit values
    #[error("CIGAR operator length {0} does not fit in 28 bits")]
    CigarOpTooLong(u32),

    /// The requested CIGAR operator does not exist
    #[error("{index} is >= the number of operators in the cigar string: {len}")]
    CigarIndexOutOfRange { index: usize, len: usize },

    /// The CIGAR text could not be parsed
    #[error("Invalid CIGAR string: {0}")]
    InvalidCigarString(String),

    /// A base outside the 16-letter alphabet under the `BreakOnInvalid` policy
    #[error("Invalid nucleotide base: {0}")]
    InvalidBase(u8),

    /// Quality scores must cover every base
    #[error("Quality length ({got}) does not match the read length ({expected})")]
    QualityLengthMismatch { expected: usize, got: usize },

    /// A quality score that collides with the absent-quality fill byte, or a
    /// Phred+33 character below '!'
    #[error("Invalid base quality: {0}")]
    InvalidQuality(u8),

    /// The read length is stored as a 32-bit field
    #[error("Read length {0} does not fit in the record")]
    ReadTooLong(usize),
}

/// Operations that belong to the full-featured record type rather than the binary codec
#[derive(thiserror::Error, Debug)]
pub enum UnsupportedError {
    /// Float-typed tag values are not decoded or encoded by this layer
    #[error("float-typed tag values (tag {0})")]
    FloatTag(Tag),

    /// Hex-string tag values are reserved
    #[error("hex-typed tag values (tag {0})")]
    HexTag(Tag),

    /// The legacy SQ tag is no longer supported
    #[error("reverse-complementing records carrying an SQ tag")]
    SqTag,
}
