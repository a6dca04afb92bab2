//! Folding generic element records into their controlled vocabulary form.
//!
//! mzML can state the same fact in more than one place depending on the
//! writer and schema version: a `<cvParam>` with a value becomes a key of its
//! own, while a valueless one only contributes an entry to the element's
//! `"name"` list. Every decision below consults the places a term may live
//! through [`FACT_LOOKUP_ORDER`].
use log::trace;

use crate::spectrum::bindata::{self, BinaryCompressionType, BinaryDataArrayType, DecodedArray};
use crate::spectrum::{Record, Value};

use super::reading_shared::{MzMLParserError, SchemaError};

/// The key holding a `<binaryDataArray>`'s raw `<binary>` payload
pub const BINARY_KEY: &str = "binary";
/// The key collecting the names of valueless parameters
pub const NAME_KEY: &str = "name";
/// The key under which normalized `<binaryDataArray>` records are collected
pub const BINARY_DATA_ARRAY_KEY: &str = "binaryDataArray";
/// The key mapping each controlled vocabulary term of a record, and each unit
/// its values are measured in, to the term's accession
pub const ACCESSIONS_KEY: &str = "accessions";
/// Appended to a parameter's name to form the key holding its unit, e.g.
/// `"scan start time unit"`
pub const UNIT_SUFFIX: &str = " unit";
/// The suffix every semantic array name ends with, e.g. `"m/z array"`
pub const ARRAY_SUFFIX: &str = " array";
/// Facts that are coerced to strict integers
pub const INTEGER_FACTS: &[&str] = &["ms level"];

/// A place a controlled vocabulary term may be recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactLookup {
    /// The term is a key of the record
    Key,
    /// The term is an entry of the record's `"name"` value
    NameList,
}

/// The order in which a term's possible locations are tried
pub const FACT_LOOKUP_ORDER: [FactLookup; 2] = [FactLookup::Key, FactLookup::NameList];

impl FactLookup {
    pub fn contains(self, record: &Record, term: &str) -> bool {
        match self {
            FactLookup::Key => record.contains_key(term),
            FactLookup::NameList => name_terms(record).contains(&term),
        }
    }

    /// Remove `term` from this location, returning whether it was present
    pub fn take(self, record: &mut Record, term: &str) -> bool {
        match self {
            FactLookup::Key => record.remove(term).is_some(),
            FactLookup::NameList => take_name(record, term),
        }
    }
}

/// The terms stored under `"name"`, which holds text for a single valueless
/// parameter and a list once there are several.
pub fn name_terms(record: &Record) -> Vec<&str> {
    match record.get(NAME_KEY) {
        Some(Value::Text(s)) => vec![s.as_str()],
        Some(Value::List(values)) => values.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn take_name(record: &mut Record, term: &str) -> bool {
    let emptied = match record.get_mut(NAME_KEY) {
        Some(Value::Text(s)) => {
            if s != term {
                return false;
            }
            true
        }
        Some(Value::List(values)) => {
            let Some(i) = values.iter().position(|v| v.as_str() == Some(term)) else {
                return false;
            };
            values.remove(i);
            values.is_empty()
        }
        _ => return false,
    };
    if emptied {
        record.remove(NAME_KEY);
    }
    true
}

/// Remove `term` from the first location holding it
pub fn take_fact(record: &mut Record, term: &str) -> bool {
    FACT_LOOKUP_ORDER
        .iter()
        .any(|lookup| lookup.take(record, term))
}

pub fn has_fact(record: &Record, term: &str) -> bool {
    FACT_LOOKUP_ORDER
        .iter()
        .any(|lookup| lookup.contains(record, term))
}

/// Consume the element type term. Keys are checked before the name list, and
/// within each location `32-bit float` wins over `64-bit float`.
fn take_array_type(record: &mut Record) -> Option<BinaryDataArrayType> {
    for lookup in FACT_LOOKUP_ORDER {
        for dtype in BinaryDataArrayType::TYPES {
            if lookup.take(record, dtype.name()) {
                return Some(dtype);
            }
        }
    }
    None
}

/// Consume the compression terms. Without a `zlib compression` fact the
/// payload is read as uncompressed, whether or not `no compression` is stated.
fn take_compression(record: &mut Record) -> BinaryCompressionType {
    if take_fact(record, BinaryCompressionType::Zlib.name()) {
        return BinaryCompressionType::Zlib;
    }
    for lookup in FACT_LOOKUP_ORDER {
        lookup.take(record, BinaryCompressionType::NoCompression.name());
    }
    BinaryCompressionType::NoCompression
}

/// Whether the record still holds an undecoded `<binary>` payload
fn has_raw_binary(record: &Record) -> bool {
    matches!(record.get(BINARY_KEY), Some(v) if !matches!(v, Value::Array(_)))
}

/// Find the semantic name of the array: a placeholder key such as
/// `"m/z array"` with an empty value, else an entry of the name list.
fn array_key(record: &Record) -> Option<String> {
    record
        .iter()
        .find(|(k, v)| k.ends_with(ARRAY_SUFFIX) && v.is_falsy())
        .map(|(k, _)| k.clone())
        .or_else(|| {
            name_terms(record)
                .into_iter()
                .find(|n| n.ends_with(ARRAY_SUFFIX))
                .map(str::to_string)
        })
}

fn fold_binary_data_array(mut record: Record) -> Result<Record, MzMLParserError> {
    let dtype = take_array_type(&mut record).ok_or(SchemaError::MissingArrayType)?;
    let compression = take_compression(&mut record);

    let array = match record.remove(BINARY_KEY) {
        Some(Value::Text(payload)) if !payload.is_empty() => {
            bindata::decode(&payload, dtype, compression.is_compressed())?
        }
        _ => DecodedArray::empty(dtype),
    };

    match array_key(&record) {
        Some(key) => {
            let mut folded = Record::new();
            folded.insert(key, Value::Array(array));
            Ok(folded)
        }
        None => {
            trace!("No array name found, storing decoded array under {BINARY_KEY:?}");
            record.insert(BINARY_KEY, Value::Array(array));
            Ok(record)
        }
    }
}

fn merge_binary_data_arrays(record: &mut Record) {
    if !matches!(
        record.get(BINARY_DATA_ARRAY_KEY),
        Some(Value::List(_) | Value::Record(_))
    ) {
        return;
    }
    match record.remove(BINARY_DATA_ARRAY_KEY) {
        Some(Value::List(arrays)) => {
            for array in arrays {
                if let Value::Record(array) = array {
                    merge_array(record, array);
                }
            }
        }
        Some(Value::Record(array)) => merge_array(record, array),
        _ => {}
    }
}

/// The terms describing an array's encoding stay with the array
fn merge_array(record: &mut Record, mut array: Record) {
    array.remove(ACCESSIONS_KEY);
    record.merge(array);
}

fn coerce_integer_facts(record: &mut Record) -> Result<(), SchemaError> {
    for key in INTEGER_FACTS {
        if let Some(value) = record.get_mut(key) {
            if matches!(value, Value::Int(_)) {
                continue;
            }
            match value.coerce_int() {
                Some(i) => *value = Value::Int(i),
                None => {
                    return Err(SchemaError::InvalidInteger {
                        key: key.to_string(),
                        value: value.to_string(),
                    })
                }
            }
        }
    }
    Ok(())
}

/// Normalize one element's record, whose children have already been
/// normalized.
///
/// 1. A `<binaryDataArray>` record (one holding a raw `"binary"` payload) is
///    decoded and replaced by `{array name: decoded array}`.
/// 2. Normalized `<binaryDataArray>` records collected under
///    `"binaryDataArray"` are merged into this record, later arrays winning.
/// 3. Integer facts such as `"ms level"` are coerced to [`Value::Int`].
///
/// Normalizing an already normalized record leaves it unchanged.
pub fn normalize(mut record: Record) -> Result<Record, MzMLParserError> {
    if has_raw_binary(&record) {
        record = fold_binary_data_array(record)?;
    }
    merge_binary_data_arrays(&mut record);
    coerce_integer_facts(&mut record)?;
    Ok(record)
}
