//! Reading mzML documents, with or without their trailing offset index.

pub mod mzml;
mod offset_index;
pub mod traits;
mod utils;

pub use crate::io::mzml::{
    IndexedMzMLReader, IndexedMzMLReaderType, MzMLIndexingError, MzMLParserError, MzMLReader,
    MzMLReaderType,
};
pub use crate::io::offset_index::{IndexList, OffsetIndex};
pub use crate::io::traits::{ElementSource, Fallback, IdResolver, SeekRead};
pub use crate::io::utils::DetailLevel;
