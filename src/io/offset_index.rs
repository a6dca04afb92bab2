#[allow(unused)]
use std::io::prelude::*;

use indexmap::map::{Iter, Keys};
use indexmap::IndexMap;

/**
An ordered mapping from entity ID to byte offset into the source
file it resides in.

A wrapper around [`indexmap::IndexMap`].
*/
#[derive(Default, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffsetIndex {
    /// The name of the index, e.g. `"spectrum"` or `"chromatogram"`
    pub name: String,

    /// The mapping from ID to byte offset, ordered by occurrence
    #[cfg_attr(feature = "serde", serde(with = "indexmap::map::serde_seq"))]
    pub offsets: IndexMap<Box<str>, u64>,

    /// Whether the index has been initalized explicitly or not, as
    /// it may be initially empty or read as empty.
    pub init: bool,
}

impl OffsetIndex {
    pub fn new(name: String) -> OffsetIndex {
        OffsetIndex {
            name,
            ..Default::default()
        }
    }

    /// Get the offset of the specified key
    #[inline]
    pub fn get(&self, key: &str) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    /// Get the associated key and offset for the specified index position
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<(&str, u64)> {
        self.offsets
            .get_index(index)
            .map(|(key, offset)| (key.as_ref(), *offset))
    }

    /// Insert `key` into the index with an offset value. An existing key keeps
    /// its position and takes the new offset.
    #[inline]
    pub fn insert<T: Into<Box<str>>>(&mut self, key: T, offset: u64) -> Option<u64> {
        self.offsets.insert(key.into(), offset)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn keys(&self) -> Keys<'_, Box<str>, u64> {
        self.offsets.keys()
    }

    /// Iterate over the keys and offsets in the order they were recorded
    pub fn iter(&self) -> Iter<'_, Box<str>, u64> {
        self.offsets.iter()
    }

    /// The entries ordered by ascending byte offset, which is the order they
    /// appear in the document
    pub fn sorted_by_offset(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self.iter().map(|(k, v)| (k.as_ref(), *v)).collect();
        entries.sort_by_key(|(_, offset)| *offset);
        entries
    }

    /// Check if the key is in the index
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.offsets.contains_key(key)
    }

    #[cfg(feature = "serde")]
    /// Write the index out in JSON format to `writer`
    pub fn to_writer<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer(writer, self)
    }

    #[cfg(feature = "serde")]
    /// Read an index in JSON format from `reader`
    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }
}

/**
The `<index>` blocks of an `<indexList>`, one [`OffsetIndex`] per category
name, in the order they were first seen.
*/
#[derive(Default, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexList {
    #[cfg_attr(feature = "serde", serde(with = "indexmap::map::serde_seq"))]
    categories: IndexMap<String, OffsetIndex>,
}

impl IndexList {
    pub fn new() -> Self {
        Self::default()
    }

    /// The index for `name`, e.g. `"spectrum"`
    pub fn get(&self, name: &str) -> Option<&OffsetIndex> {
        self.categories.get(name)
    }

    /// Store `index` under its name. A category that was already present is
    /// replaced wholesale.
    pub fn insert(&mut self, index: OffsetIndex) -> Option<OffsetIndex> {
        self.categories.insert(index.name.clone(), index)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OffsetIndex)> {
        self.categories.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up the offset of `id` within the `name` category
    pub fn offset_of(&self, name: &str, id: &str) -> Option<u64> {
        self.get(name).and_then(|index| index.get(id))
    }
}
