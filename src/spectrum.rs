//! The record model produced for each `<spectrum>` (or any other element) read
//! from an mzML document, and the binary array decoding it relies on.
pub mod bindata;
pub mod record;

pub use crate::spectrum::bindata::{
    BinaryCompressionType, BinaryDataArrayType, DecodeError, DecodedArray,
};
pub use crate::spectrum::record::{Record, SpectrumRecord, Value};
