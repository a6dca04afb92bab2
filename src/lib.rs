//! `mzrecord` reads mzML mass spectrometry documents into generic records.
//!
//! Each `<spectrum>` becomes a [`Record`], an ordered map holding its XML
//! attributes, its controlled vocabulary facts, and its binary data arrays
//! decoded into numeric vectors under names like `"m/z array"`.
//!
//! ```no_run
//! use mzrecord::IndexedMzMLReader;
//!
//! # fn main() -> std::io::Result<()> {
//! let mut reader = IndexedMzMLReader::open_path("small.mzML")?;
//! let scan = reader.get_by_id("controllerType=0 controllerNumber=1 scan=1")?;
//! println!("{:?}", scan.get("ms level"));
//! for spectrum in reader.iter() {
//!     let spectrum = spectrum?;
//!     println!("{:?} {:?}", spectrum.id(), spectrum.get_array("m/z array").map(|a| a.len()));
//! }
//! # Ok(())
//! # }
//! ```
pub mod io;
pub mod params;
pub mod prelude;
pub mod spectrum;

pub use crate::io::mzml::{MzMLParserError, MzMLReader};
pub use crate::io::{DetailLevel, IndexList, IndexedMzMLReader, OffsetIndex};

pub use crate::params::{Param, ParamLike};
pub use crate::spectrum::{
    BinaryCompressionType, BinaryDataArrayType, DecodeError, DecodedArray, Record, SpectrumRecord,
    Value,
};
