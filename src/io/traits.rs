use std::io::{self, SeekFrom};

use crate::io::mzml::MzMLParserError;
use crate::spectrum::Record;

pub trait SeekRead: io::Read + io::Seek {}
impl<T: io::Read + io::Seek> SeekRead for T {}

/// A seekable stream of XML elements which are read into [`Record`]s
pub trait ElementSource {
    /// Move back to the start of the document
    fn reset(&mut self) -> io::Result<()>;

    /// Move to an absolute position, after which reading resumes mid-document
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Read forward to the next element of any kind whose `id` attribute is
    /// `id`, discarding every other subtree along the way
    fn read_element_by_id(&mut self, id: &str) -> Result<Option<Record>, MzMLParserError>;
}

/// A strategy for finding an element by its `id` in an [`ElementSource`].
///
/// `Ok(None)` means this strategy could not find the element, and another
/// one may still succeed. Errors are reserved for failures that no other
/// strategy would avoid.
pub trait IdResolver<S: ElementSource> {
    fn resolve(&self, source: &mut S, id: &str) -> Result<Option<Record>, MzMLParserError>;
}

/// Try `primary`, and when it cannot find the element, `secondary`
#[derive(Debug, Clone, Copy)]
pub struct Fallback<A, B> {
    pub primary: A,
    pub secondary: B,
}

impl<A, B> Fallback<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<S: ElementSource, A: IdResolver<S>, B: IdResolver<S>> IdResolver<S> for Fallback<A, B> {
    fn resolve(&self, source: &mut S, id: &str) -> Result<Option<Record>, MzMLParserError> {
        match self.primary.resolve(source, id)? {
            Some(record) => Ok(Some(record)),
            None => self.secondary.resolve(source, id),
        }
    }
}
