//! Controlled vocabulary parameters as they appear in `<cvParam>` and
//! `<userParam>` elements, and their conversion into record values.

use crate::spectrum::Value;

pub trait ParamLike {
    fn name(&self) -> &str;
    fn value(&self) -> &str;
    fn accession(&self) -> Option<&str>;
    fn unit_name(&self) -> Option<&str>;
    fn unit_accession(&self) -> Option<&str>;

    /// A parameter without a value is a bare fact, recorded by name alone
    fn is_flag(&self) -> bool {
        self.value().is_empty()
    }
}

/// One `<cvParam>` or `<userParam>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: String,
    pub accession: Option<String>,
    pub unit_name: Option<String>,
    pub unit_accession: Option<String>,
    /// The XML schema type a `<userParam>` declared for its value, e.g. `xsd:int`
    pub value_type: Option<String>,
}

impl Param {
    pub fn new() -> Param {
        Param {
            ..Default::default()
        }
    }

    pub fn new_key_value(name: String, value: String) -> Param {
        let mut inst = Self::new();
        inst.name = name;
        inst.value = value;
        inst
    }

    /// Set a field from an XML attribute of the param element. Unknown
    /// attributes such as `cvRef` are ignored.
    pub fn set_attribute(&mut self, key: &[u8], value: String) {
        match key {
            b"name" => self.name = value,
            b"value" => self.value = value,
            b"accession" => self.accession = Some(value),
            b"unitName" => self.unit_name = Some(value),
            b"unitAccession" => self.unit_accession = Some(value),
            b"type" => self.value_type = Some(value),
            _ => {}
        }
    }

    /// Convert the textual value into a [`Value`].
    ///
    /// A declared integer, floating point or boolean schema type is honored
    /// when the text parses as one. Otherwise anything that reads as a number
    /// becomes a float, and everything else stays text.
    pub fn to_value(&self) -> Value {
        let text = self.value.trim();
        if let Some(tp) = self.value_type.as_deref() {
            let tp = tp.rsplit(':').next().unwrap_or(tp);
            let typed = match tp {
                "int" | "integer" | "long" | "short" | "nonNegativeInteger"
                | "positiveInteger" => text.parse().ok().map(Value::Int),
                "float" | "double" | "decimal" => text.parse().ok().map(Value::Float),
                "boolean" => match text {
                    "true" | "1" => Some(Value::Bool(true)),
                    "false" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                "string" => Some(Value::Text(self.value.clone())),
                _ => None,
            };
            if let Some(value) = typed {
                return value;
            }
        }
        match text.parse::<f64>() {
            Ok(v) => Value::Float(v),
            Err(_) => Value::Text(self.value.clone()),
        }
    }
}

impl ParamLike for Param {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> &str {
        &self.value
    }

    fn accession(&self) -> Option<&str> {
        self.accession.as_deref()
    }

    fn unit_name(&self) -> Option<&str> {
        self.unit_name.as_deref()
    }

    fn unit_accession(&self) -> Option<&str> {
        self.unit_accession.as_deref()
    }
}
