//! Reference name lookup
//!
//! Records store reference indices; the names live in the surrounding file
//! header. [`SequenceDictionary`] is the seam through which records resolve one
//! from the other.

use std::collections::HashMap;
use std::sync::Arc;

use auto_impl::auto_impl;

/// Reference name used for records that are not placed on any reference
pub const NO_REFERENCE_NAME: &str = "*";

/// Reference index used for records that are not placed on any reference
pub const NO_REFERENCE_INDEX: i32 = -1;

/// Bidirectional reference name and index lookup
#[auto_impl(&, Box, Arc)]
pub trait SequenceDictionary {
    /// Index of the reference called `name`
    fn index_of(&self, name: &str) -> Option<i32>;

    /// Name of the reference at `index`
    fn name_of(&self, index: i32) -> Option<&str>;

    /// Number of references
    fn num_references(&self) -> usize;
}

/// A dictionary shared between records and the codec that produced them
pub type SharedDictionary = Arc<dyn SequenceDictionary + Send + Sync>;

/// An in-memory dictionary built from an ordered list of reference names
#[derive(Clone, Debug, Default)]
pub struct ReferenceDictionary {
    names: Vec<String>,
    indices: HashMap<String, i32>,
}

impl ReferenceDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reference and returns its index
    ///
    /// A name that is already present keeps its original index.
    pub fn push(&mut self, name: impl Into<String>) -> i32 {
        let name = name.into();
        if let Some(&index) = self.indices.get(&name) {
            return index;
        }
        #[allow(clippy::cast_possible_wrap, reason = "reference counts are 32-bit in the BAM header")]
        let index = self.names.len() as i32;
        self.indices.insert(name.clone(), index);
        self.names.push(name);
        index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Wraps the dictionary for sharing across records
    #[must_use]
    pub fn into_shared(self) -> SharedDictionary {
        Arc::new(self)
    }
}

impl<S: Into<String>> FromIterator<S> for ReferenceDictionary {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut dict = Self::new();
        for name in iter {
            dict.push(name);
        }
        dict
    }
}

impl SequenceDictionary for ReferenceDictionary {
    fn index_of(&self, name: &str) -> Option<i32> {
        self.indices.get(name).copied()
    }

    fn name_of(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    fn num_references(&self) -> usize {
        self.names.len()
    }
}
