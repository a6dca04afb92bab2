mod array;
mod encodings;

pub use array::DecodedArray;
pub use encodings::{
    decode, decode_base64, decompress_zlib, BinaryCompressionType, BinaryDataArrayType, Bytes,
    DecodeError,
};
