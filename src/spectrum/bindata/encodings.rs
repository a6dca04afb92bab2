use std::io::{self, prelude::*};

use bytemuck::Pod;
use flate2::write::ZlibDecoder;
use thiserror::{self, Error};

use super::array::DecodedArray;

pub type Bytes = Vec<u8>;

/// The numeric element types a `<binaryDataArray>` may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryDataArrayType {
    Float32,
    #[default]
    Float64,
}

impl BinaryDataArrayType {
    /// The order in which type terms are tested, `32-bit float` first.
    pub const TYPES: [Self; 2] = [Self::Float32, Self::Float64];

    pub const fn size_of(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// The controlled vocabulary term name for this type
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Float32 => "32-bit float",
            Self::Float64 => "64-bit float",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::TYPES.into_iter().find(|t| t.name() == name)
    }
}

/// The compression states an encoded array may be in. Both variants still
/// carry a base64 text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryCompressionType {
    #[default]
    NoCompression,
    Zlib,
}

impl BinaryCompressionType {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NoCompression => "no compression",
            Self::Zlib => "zlib compression",
        }
    }

    pub const fn is_compressed(&self) -> bool {
        matches!(self, Self::Zlib)
    }
}

impl From<bool> for BinaryCompressionType {
    fn from(compressed: bool) -> Self {
        if compressed {
            Self::Zlib
        } else {
            Self::NoCompression
        }
    }
}

/// All the ways that turning an encoded payload into numbers can fail
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to decode base64 array: {0}")]
    Base64(String),
    #[error("An error occurred while decompressing: {0}")]
    Decompression(#[source] io::Error),
    #[error("A buffer of {len} bytes is not a multiple of the {width} byte element width")]
    DataTypeSizeMismatch { len: usize, width: usize },
}

impl From<DecodeError> for io::Error {
    fn from(value: DecodeError) -> Self {
        match value {
            DecodeError::Decompression(e) => io::Error::new(e.kind(), e),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// Decode base64 text. ASCII whitespace inside the payload is ignored, as some
/// writers wrap long lines.
pub fn decode_base64(payload: &str) -> Result<Bytes, DecodeError> {
    let payload = payload.trim();
    let result = if payload.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: Bytes = payload
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        base64_simd::STANDARD.decode_to_vec(compact)
    } else {
        base64_simd::STANDARD.decode_to_vec(payload)
    };
    result.map_err(|e| DecodeError::Base64(e.to_string()))
}

pub fn decompress_zlib(bytestring: &[u8]) -> Result<Bytes, DecodeError> {
    let mut decompressor = ZlibDecoder::new(Bytes::new());
    decompressor
        .write_all(bytestring)
        .map_err(DecodeError::Decompression)?;
    decompressor.finish().map_err(DecodeError::Decompression)
}

/// Reinterpret a little endian byte buffer as a vector of `T`.
pub(crate) fn cast_le_bytes<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, DecodeError> {
    let width = std::mem::size_of::<T>();
    if bytes.len() % width != 0 {
        return Err(DecodeError::DataTypeSizeMismatch {
            len: bytes.len(),
            width,
        });
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// Decode a `<binary>` payload into a numeric array.
///
/// The payload is base64 decoded, zlib inflated when `compressed` is set, and
/// the resulting bytes are read as little endian values of `dtype`. An empty
/// payload is a zero-length array of `dtype`, whether or not it is marked as
/// compressed.
pub fn decode(
    payload: &str,
    dtype: BinaryDataArrayType,
    compressed: bool,
) -> Result<DecodedArray, DecodeError> {
    if payload.trim().is_empty() {
        return Ok(DecodedArray::empty(dtype));
    }
    let bytestring = decode_base64(payload)?;
    let bytestring = match BinaryCompressionType::from(compressed) {
        BinaryCompressionType::Zlib => decompress_zlib(&bytestring)?,
        BinaryCompressionType::NoCompression => bytestring,
    };
    DecodedArray::from_le_bytes(&bytestring, dtype)
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::{write::ZlibEncoder, Compression};

    fn encode(bytes: &[u8], compressed: bool) -> String {
        if compressed {
            let mut compressor = ZlibEncoder::new(Bytes::new(), Compression::best());
            compressor.write_all(bytes).unwrap();
            base64_simd::STANDARD.encode_to_string(compressor.finish().unwrap())
        } else {
            base64_simd::STANDARD.encode_to_string(bytes)
        }
    }

    fn le_bytes_f64(values: &[f64]) -> Bytes {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn le_bytes_f32(values: &[f32]) -> Bytes {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_f64_exact() -> Result<(), DecodeError> {
        let values = [0.0, 1e-300, 204.7233, std::f64::consts::PI, -17.5, f64::MAX];
        for compressed in [false, true] {
            let payload = encode(&le_bytes_f64(&values), compressed);
            let decoded = decode(&payload, BinaryDataArrayType::Float64, compressed)?;
            let found = decoded.as_f64().unwrap();
            assert_eq!(found.len(), values.len());
            for (a, b) in found.iter().zip(values.iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
        Ok(())
    }

    #[test]
    fn test_f32_exact() -> Result<(), DecodeError> {
        let values = [810.41_f32, 1500.25, 0.125, 3.3e7];
        for compressed in [false, true] {
            let payload = encode(&le_bytes_f32(&values), compressed);
            let decoded = decode(&payload, BinaryDataArrayType::Float32, compressed)?;
            assert_eq!(decoded.as_f32().unwrap(), &values);
            assert_eq!(decoded.dtype(), BinaryDataArrayType::Float32);
        }
        Ok(())
    }

    #[test]
    fn test_empty_payload() -> Result<(), DecodeError> {
        for dtype in BinaryDataArrayType::TYPES {
            for compressed in [false, true] {
                let decoded = decode("", dtype, compressed)?;
                assert!(decoded.is_empty());
                assert_eq!(decoded.dtype(), dtype);
            }
        }
        Ok(())
    }

    #[test]
    fn test_wrapped_payload() -> Result<(), DecodeError> {
        let payload = encode(&le_bytes_f64(&[1.0, 2.0, 3.0]), false);
        let (head, tail) = payload.split_at(8);
        let wrapped = format!("{head}\n    {tail}\n");
        let decoded = decode(&wrapped, BinaryDataArrayType::Float64, false)?;
        assert_eq!(decoded.as_f64().unwrap(), &[1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_malformed_base64() {
        let err = decode("@@not base64@@", BinaryDataArrayType::Float64, false).unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn test_corrupt_zlib() {
        let payload = encode(b"these bytes were never deflated", false);
        let err = decode(&payload, BinaryDataArrayType::Float32, true).unwrap_err();
        assert!(matches!(err, DecodeError::Decompression(_)));
    }

    #[test]
    fn test_width_mismatch() {
        let payload = encode(&[0u8; 12], false);
        let err = decode(&payload, BinaryDataArrayType::Float64, false).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::DataTypeSizeMismatch { len: 12, width: 8 }
        ));
        assert!(decode(&payload, BinaryDataArrayType::Float32, false).is_ok());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(
            BinaryDataArrayType::from_name("32-bit float"),
            Some(BinaryDataArrayType::Float32)
        );
        assert_eq!(BinaryDataArrayType::from_name("16-bit float"), None);
        assert_eq!(BinaryDataArrayType::Float64.size_of(), 8);
        assert!(BinaryCompressionType::from(true).is_compressed());
    }
}
