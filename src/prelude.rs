//! A set of foundational traits used throughout the library.
pub use crate::io::traits::{ElementSource, IdResolver, SeekRead};
pub use crate::io::mzml::SchemaLookup;
pub use crate::params::ParamLike;
pub use std::io::prelude::*;
