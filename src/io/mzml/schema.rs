//! Default attribute interpretations for mzML, used when converting elements
//! into records.
use crate::spectrum::Value;

/// Answers the type questions an XML schema would, for a given
/// `(element, attribute)` pair or element name.
pub trait SchemaLookup {
    /// Whether `attribute` of `element` holds an integer
    fn is_int(&self, element: &str, attribute: &str) -> bool;

    /// Whether `element` may repeat under its parent, so that its records are
    /// collected into a list
    fn is_list(&self, element: &str) -> bool;

    /// Convert an attribute's text into a typed [`Value`]. Text that does not
    /// parse as the expected type is kept as text.
    fn coerce_attribute(&self, element: &str, attribute: &str, value: String) -> Value {
        if self.is_int(element, attribute) {
            match value.trim().parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Text(value),
            }
        } else {
            Value::Text(value)
        }
    }
}

const INT_ATTRIBUTES: &[(&str, &str)] = &[
    ("spectrum", "index"),
    ("spectrum", "defaultArrayLength"),
    ("chromatogram", "index"),
    ("chromatogram", "defaultArrayLength"),
    ("binaryDataArray", "encodedLength"),
    ("binaryDataArray", "arrayLength"),
    ("processingMethod", "order"),
    ("source", "order"),
    ("analyzer", "order"),
    ("detector", "order"),
];

const LIST_ELEMENTS: &[&str] = &[
    "spectrum",
    "chromatogram",
    "scan",
    "scanWindow",
    "precursor",
    "product",
    "selectedIon",
    "binaryDataArray",
    "cv",
    "sourceFile",
    "sourceFileRef",
    "software",
    "sample",
    "dataProcessing",
    "processingMethod",
    "instrumentConfiguration",
    "component",
    "source",
    "analyzer",
    "detector",
    "scanSettings",
    "target",
    "referenceableParamGroup",
    "referenceableParamGroupRef",
    "offset",
];

/// The built-in defaults for mzML 1.1
#[derive(Debug, Default, Clone, Copy)]
pub struct MzMLSchema;

impl SchemaLookup for MzMLSchema {
    fn is_int(&self, element: &str, attribute: &str) -> bool {
        // Every `*List` container carries an integer `count`
        (attribute == "count" && element.ends_with("List"))
            || INT_ATTRIBUTES.contains(&(element, attribute))
    }

    fn is_list(&self, element: &str) -> bool {
        LIST_ELEMENTS.contains(&element)
    }
}
