//! Implements a reader for the PSI-MS mzML and indexedmzML XML file formats,
//! producing a [`Record`](crate::spectrum::Record) per element.

mod builder;
mod index;
mod normalize;
mod reader;
mod reading_shared;
mod resolve;
mod schema;
#[cfg(test)]
pub(crate) mod test_data;

pub use crate::io::mzml::builder::{RecordBuilder, DOCUMENT_ROOTS};
pub use crate::io::mzml::index::{
    find_checksum_from_reader, find_index_list, IndexParserState, IndexedMzMLIndexExtractor,
    MINIMUM_INDEX_LIST_OFFSET, TRAILER_WINDOW,
};
pub use crate::io::mzml::normalize::{has_fact, name_terms, normalize, take_fact, FactLookup};
pub use crate::io::mzml::reader::{
    ElementIter, IndexedMzMLReader, IndexedMzMLReaderType, IndexedSpectrumIter, MzMLReader,
    MzMLReaderType, CHROMATOGRAM_INDEX, SPECTRUM_INDEX,
};
pub use crate::io::mzml::reading_shared::{
    MzMLIndexingError, MzMLParserError, MzMLParserState, MzMLSAX, ParserResult, SchemaError,
};
pub use crate::io::mzml::resolve::{IndexedResolver, LinearResolver};
pub use crate::io::mzml::schema::{MzMLSchema, SchemaLookup};
