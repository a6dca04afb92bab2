//! Strategies for locating an element by `id`, composed with
//! [`Fallback`](crate::io::traits::Fallback).
use std::io::SeekFrom;

use log::debug;

use crate::io::offset_index::OffsetIndex;
use crate::io::traits::{ElementSource, IdResolver};
use crate::spectrum::Record;

use super::reading_shared::{MzMLParserError, MzMLParserState};

/// Seek to the offset recorded for an id and read forward from there.
///
/// A missing index, an id absent from the index, and an offset that does not
/// lead to the element are all misses rather than errors, since the offsets
/// of an index can be wrong.
#[derive(Debug, Clone, Copy)]
pub struct IndexedResolver<'a> {
    index: Option<&'a OffsetIndex>,
}

impl<'a> IndexedResolver<'a> {
    pub fn new(index: Option<&'a OffsetIndex>) -> Self {
        Self { index }
    }
}

impl<S: ElementSource> IdResolver<S> for IndexedResolver<'_> {
    fn resolve(&self, source: &mut S, id: &str) -> Result<Option<Record>, MzMLParserError> {
        let Some(index) = self.index else {
            debug!("No offset index available for {id}");
            return Ok(None);
        };
        let Some(offset) = index.get(id) else {
            debug!("{id} not found in the {} index", index.name);
            return Ok(None);
        };
        source
            .seek(SeekFrom::Start(offset))
            .map_err(|e| MzMLParserError::IOError(MzMLParserState::Resume, e))?;
        match source.read_element_by_id(id) {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => {
                debug!("{id} was not found after its indexed offset {offset}");
                Ok(None)
            }
            Err(err) if err.is_structural() => {
                debug!("Failed to read {id} at its indexed offset {offset}: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Scan the whole document from its start
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearResolver;

impl<S: ElementSource> IdResolver<S> for LinearResolver {
    fn resolve(&self, source: &mut S, id: &str) -> Result<Option<Record>, MzMLParserError> {
        source
            .reset()
            .map_err(|e| MzMLParserError::IOError(MzMLParserState::Start, e))?;
        source.read_element_by_id(id)
    }
}
