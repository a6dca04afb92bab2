use std::io;

use quick_xml::events::{BytesEnd, BytesStart, BytesText};
use quick_xml::Error as XMLError;

use thiserror::Error;

use crate::spectrum::bindata::DecodeError;

pub type Bytes = Vec<u8>;

/**
The different states the [`MzMLReaderType`](super::MzMLReaderType) can enter
while locating and reading elements. This information is really only needed
by the module consumer to determine where in the document an error occurred.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum MzMLParserState {
    Start = 0,
    /// The stream was moved and parsing picks up mid-document
    Resume,

    /// Scanning forward for the next element of interest
    Seeking,
    /// Inside the subtree of the element being read
    Element,
    /// The element being read just closed
    ElementDone,

    EOF,
    ParserError,
}

/// A `<binaryDataArray>` or other record whose content cannot be interpreted
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("A binary data array does not declare a recognized type (\"32-bit float\" or \"64-bit float\")")]
    MissingArrayType,
    #[error("The value {value:?} of {key:?} is not an integer")]
    InvalidInteger { key: String, value: String },
}

/**
All the ways that mzML parsing can go wrong
*/
#[derive(Debug, Error)]
pub enum MzMLParserError {
    #[error("An error occurred outside of normal conditions {0:?}")]
    UnknownError(MzMLParserState),
    #[error("An incomplete element {0} was encountered in {1:?}")]
    IncompleteElementError(String, MzMLParserState),
    #[error("An XML error {1:?} was encountered in {0:?}")]
    XMLError(MzMLParserState, #[source] XMLError),
    #[error("An IO error {1} was encountered in {0:?}")]
    IOError(MzMLParserState, #[source] io::Error),
    #[error("Failed to decode a binary data array: {0}")]
    DecodeError(#[from] DecodeError),
    #[error("{0}")]
    SchemaError(#[from] SchemaError),
    #[error("The requested element ID {0} was not found")]
    NotFound(String),
}

impl MzMLParserError {
    /// Whether the error comes from the XML framing rather than the content of
    /// a record, as happens when reading from a position that is not the start
    /// of an element.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::XMLError(..) | Self::IncompleteElementError(..) | Self::UnknownError(_)
        )
    }

    /// Whether a reader can carry on with the next element after this error,
    /// which holds when the element was read in full but could not be
    /// interpreted
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DecodeError(_) | Self::SchemaError(_) | Self::NotFound(_)
        )
    }
}

impl From<MzMLParserError> for io::Error {
    fn from(value: MzMLParserError) -> Self {
        match value {
            MzMLParserError::IOError(_, ref e) => io::Error::new(e.kind(), value),
            MzMLParserError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, value),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

pub type ParserResult = Result<MzMLParserState, MzMLParserError>;

/// Why a trailer offset index could not be read. These are never fatal to a
/// reader, which falls back to scanning the document.
#[derive(Debug, Error)]
pub enum MzMLIndexingError {
    #[error("Offset index not found")]
    OffsetNotFound,
    #[error("IO error {0} occurred while reading out mzML index")]
    IOError(#[from] #[source] io::Error),
}

/**
Common XML error handling behaviors
*/
pub trait XMLParseBase {
    fn handle_xml_error(&self, error: quick_xml::Error, state: MzMLParserState) -> MzMLParserError {
        MzMLParserError::XMLError(state, error)
    }
}

/// Receives the events of an XML subtree one at a time
pub trait MzMLSAX {
    fn start_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult;

    fn empty_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult;

    fn end_element(&mut self, event: &BytesEnd, state: MzMLParserState) -> ParserResult;

    fn text(&mut self, event: &BytesText, state: MzMLParserState) -> ParserResult;
}
