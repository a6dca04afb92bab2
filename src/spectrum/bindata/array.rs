use std::borrow::Cow;
use std::fmt::{self, Formatter};

use super::encodings::{cast_le_bytes, BinaryDataArrayType, DecodeError};

/// A decoded numeric array, held in the element type the source declared.
///
/// This is the value stored under a record's `"m/z array"`, `"intensity array"`
/// and similar keys once the `<binaryDataArray>` it came from has been
/// normalized.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecodedArray {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl core::fmt::Debug for DecodedArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedArray")
            .field("dtype", &self.dtype())
            .field("len", &self.len())
            .finish()
    }
}

impl Default for DecodedArray {
    fn default() -> Self {
        Self::empty(BinaryDataArrayType::default())
    }
}

impl DecodedArray {
    pub fn empty(dtype: BinaryDataArrayType) -> Self {
        match dtype {
            BinaryDataArrayType::Float32 => Self::Float32(Vec::new()),
            BinaryDataArrayType::Float64 => Self::Float64(Vec::new()),
        }
    }

    /// Read `bytes` as contiguous little endian values of `dtype`.
    pub fn from_le_bytes(bytes: &[u8], dtype: BinaryDataArrayType) -> Result<Self, DecodeError> {
        match dtype {
            BinaryDataArrayType::Float32 => {
                let mut values: Vec<f32> = cast_le_bytes(bytes)?;
                if cfg!(target_endian = "big") {
                    values
                        .iter_mut()
                        .for_each(|v| *v = f32::from_bits(u32::from_le(v.to_bits())));
                }
                Ok(Self::Float32(values))
            }
            BinaryDataArrayType::Float64 => {
                let mut values: Vec<f64> = cast_le_bytes(bytes)?;
                if cfg!(target_endian = "big") {
                    values
                        .iter_mut()
                        .for_each(|v| *v = f64::from_bits(u64::from_le(v.to_bits())));
                }
                Ok(Self::Float64(values))
            }
        }
    }

    pub fn dtype(&self) -> BinaryDataArrayType {
        match self {
            Self::Float32(_) => BinaryDataArrayType::Float32,
            Self::Float64(_) => BinaryDataArrayType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::Float32(v) => Some(v),
            Self::Float64(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Self::Float64(v) => Some(v),
            Self::Float32(_) => None,
        }
    }

    /// View the values as `f64`, widening `f32` arrays with a copy.
    pub fn to_f64(&self) -> Cow<'_, [f64]> {
        match self {
            Self::Float64(v) => Cow::Borrowed(v.as_slice()),
            Self::Float32(v) => Cow::Owned(v.iter().map(|x| *x as f64).collect()),
        }
    }
}

impl From<Vec<f32>> for DecodedArray {
    fn from(value: Vec<f32>) -> Self {
        Self::Float32(value)
    }
}

impl From<Vec<f64>> for DecodedArray {
    fn from(value: Vec<f64>) -> Self {
        Self::Float64(value)
    }
}
