use log::trace;
use quick_xml::events::{BytesEnd, BytesStart, BytesText};

use crate::io::utils::DetailLevel;
use crate::params::{Param, ParamLike};
use crate::spectrum::{Record, Value};

use super::normalize::{normalize, ACCESSIONS_KEY, NAME_KEY, UNIT_SUFFIX};
use super::reading_shared::{MzMLParserError, MzMLParserState, MzMLSAX, ParserResult, XMLParseBase};
use super::schema::{MzMLSchema, SchemaLookup};

/// Elements describing the whole document, whose children are skipped unless
/// recursion is requested explicitly
pub const DOCUMENT_ROOTS: &[&str] = &["mzML", "indexedmzML"];

const PARAM_ELEMENTS: &[&str] = &["cvParam", "userParam"];
const FLATTENED_ELEMENTS: &[&str] = &["binaryDataArrayList"];
const BINARY_DATA_ARRAY_LIST: &str = "binaryDataArrayList";
const VALUE_KEY: &str = "value";

pub(crate) fn local_name_of(event: &BytesStart) -> String {
    String::from_utf8_lossy(event.local_name().as_ref()).into_owned()
}

/// Add entries to the record's term-to-accession map, creating it if needed
fn note_accessions<I: IntoIterator<Item = (String, Value)>>(record: &mut Record, entries: I) {
    match record.get_mut(ACCESSIONS_KEY) {
        Some(Value::Record(accessions)) => accessions.extend(entries),
        _ => {
            let accessions: Record = entries.into_iter().collect();
            if !accessions.is_empty() {
                record.insert(ACCESSIONS_KEY, Value::Record(accessions));
            }
        }
    }
}

/// Merge `other` into `record`, pooling their accessions
fn merge_into(record: &mut Record, mut other: Record) {
    if let Some(Value::Record(accessions)) = other.remove(ACCESSIONS_KEY) {
        note_accessions(record, accessions);
    }
    record.merge(other);
}

/// Whether a record says nothing beyond naming a term
fn is_name_only(record: &Record) -> bool {
    record.contains_key(NAME_KEY)
        && record
            .keys()
            .all(|k| k == NAME_KEY || k == ACCESSIONS_KEY)
}

/// Read the `id` attribute of a start tag, if it has one
pub(crate) fn element_id(event: &BytesStart) -> Result<Option<String>, quick_xml::Error> {
    for attr in event.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == b"id" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[derive(Debug)]
enum Frame {
    Element {
        name: String,
        record: Record,
        text: String,
    },
    /// A `<cvParam>` or `<userParam>` already folded into its parent
    Param,
}

/**
Converts the events of one XML element subtree into a [`Record`].

Attributes become entries, parameters are folded into their parent element,
and child elements are converted recursively and stored under their local
names. Each element's record is normalized as soon as the element closes, so
a `<spectrum>` arrives with its binary data arrays already decoded.

A failure to interpret a `<binaryDataArray>` does not interrupt the event
stream. The first such failure is reported by [`RecordBuilder::finish`] once
the whole subtree has been consumed.
*/
#[derive(Debug)]
pub struct RecordBuilder<'a, S: SchemaLookup = MzMLSchema> {
    schema: &'a S,
    detail_level: DetailLevel,
    recursive: Option<bool>,
    root_name: String,
    root_recursive: bool,
    stack: Vec<Frame>,
    skip_depth: usize,
    error: Option<MzMLParserError>,
    result: Option<Record>,
}

impl<S: SchemaLookup> XMLParseBase for RecordBuilder<'_, S> {}

impl<'a, S: SchemaLookup> RecordBuilder<'a, S> {
    pub fn new(schema: &'a S, detail_level: DetailLevel) -> Self {
        Self {
            schema,
            detail_level,
            recursive: None,
            root_name: String::new(),
            root_recursive: true,
            stack: Vec::new(),
            skip_depth: 0,
            error: None,
            result: None,
        }
    }

    /// Force (`Some(true)`) or suppress (`Some(false)`) reading the root
    /// element's children. By default only [`DOCUMENT_ROOTS`] are read
    /// shallowly.
    pub fn with_recursion(mut self, recursive: Option<bool>) -> Self {
        self.recursive = recursive;
        self
    }

    /// The local name of the element being built
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn is_done(&self) -> bool {
        self.result.is_some()
    }

    pub fn finish(self) -> Result<Record, MzMLParserError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.result.ok_or_else(|| {
            MzMLParserError::IncompleteElementError(self.root_name, MzMLParserState::Element)
        })
    }

    fn record_error(&mut self, err: MzMLParserError) {
        trace!("Deferring error in {}: {err}", self.root_name);
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn begin(&mut self, name: &str) {
        self.root_name = name.to_string();
        self.root_recursive = self
            .recursive
            .unwrap_or_else(|| !DOCUMENT_ROOTS.contains(&name));
    }

    fn should_skip(&self, name: &str) -> bool {
        (self.stack.len() == 1 && !self.root_recursive)
            || (!self.detail_level.reads_arrays() && name == BINARY_DATA_ARRAY_LIST)
    }

    fn read_attributes(
        &self,
        element: &str,
        event: &BytesStart,
        state: MzMLParserState,
    ) -> Result<Record, MzMLParserError> {
        let mut record = Record::new();
        for attr_parsed in event.attributes() {
            match attr_parsed {
                Ok(attr) => {
                    let key = attr.key.as_ref();
                    if key == b"xmlns" || key.starts_with(b"xmlns:") {
                        continue;
                    }
                    let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                    let value = attr
                        .unescape_value()
                        .map_err(|e| self.handle_xml_error(e, state))?
                        .into_owned();
                    let value = self.schema.coerce_attribute(element, &name, value);
                    record.insert(name, value);
                }
                Err(msg) => return Err(self.handle_xml_error(msg.into(), state)),
            }
        }
        Ok(record)
    }

    fn read_param(&self, event: &BytesStart, state: MzMLParserState) -> Result<Param, MzMLParserError> {
        let mut param = Param::new();
        for attr_parsed in event.attributes() {
            match attr_parsed {
                Ok(attr) => {
                    let value = attr
                        .unescape_value()
                        .map_err(|e| self.handle_xml_error(e, state))?
                        .into_owned();
                    param.set_attribute(attr.key.local_name().as_ref(), value);
                }
                Err(msg) => return Err(self.handle_xml_error(msg.into(), state)),
            }
        }
        Ok(param)
    }

    fn fold_param(&mut self, param: Param) {
        let Some(Frame::Element { record, .. }) = self.stack.last_mut() else {
            return;
        };
        if let Some(accession) = param.accession() {
            note_accessions(record, [(param.name.clone(), Value::from(accession))]);
        }
        if param.is_flag() {
            if record.contains_key(NAME_KEY) {
                record.push_to_list(NAME_KEY, Value::Text(param.name));
            } else {
                record.insert(NAME_KEY, Value::Text(param.name));
            }
            return;
        }
        if let (Some(unit), Some(accession)) = (param.unit_name(), param.unit_accession()) {
            note_accessions(record, [(unit.to_string(), Value::from(accession))]);
        }
        let unit = param
            .unit_name()
            .map(|unit| (format!("{}{UNIT_SUFFIX}", param.name), Value::from(unit)));
        let value = param.to_value();
        record.insert(param.name, value);
        if let Some((key, unit)) = unit {
            record.insert(key, unit);
        }
    }

    fn attach(&mut self, name: String, value: Value) {
        let list_valued = self.schema.is_list(&name);
        if let Some(Frame::Element { record, .. }) = self.stack.last_mut() {
            if list_valued {
                record.push_to_list(name, value);
            } else {
                record.insert(name, value);
            }
        }
    }

    /// Turn a closed element's accumulated state into its value
    fn finish_element(&mut self, name: &str, mut record: Record, text: &str) -> Value {
        let text = text.trim();
        if !text.is_empty() {
            if record.is_empty() {
                return Value::Text(text.to_string());
            }
            record.insert(name, Value::Text(text.to_string()));
        }

        for key in FLATTENED_ELEMENTS {
            match record.remove(key) {
                Some(Value::Record(inner)) => merge_into(&mut record, inner),
                Some(Value::List(items)) => {
                    for item in items {
                        if let Value::Record(inner) = item {
                            merge_into(&mut record, inner);
                        }
                    }
                }
                _ => {}
            }
        }

        // A child that only names a term is replaced by the term, and the
        // term's accession moves up with it
        let mut inherited = Record::new();
        for value in record.values_mut() {
            if let Value::Record(child) = value {
                if is_name_only(child) {
                    if let Some(Value::Record(accessions)) = child.remove(ACCESSIONS_KEY) {
                        inherited.extend(accessions);
                    }
                    if let Some(term) = child.remove(NAME_KEY) {
                        *value = term;
                    }
                }
            }
        }
        note_accessions(&mut record, inherited);

        let described = record.keys().filter(|k| *k != ACCESSIONS_KEY).count();
        if described == 2 && record.contains_key(VALUE_KEY) {
            if let Some(Value::Text(key)) = record.get(NAME_KEY) {
                let key = key.clone();
                let value = record.remove(VALUE_KEY).unwrap_or_default();
                let accessions = record.remove(ACCESSIONS_KEY);
                record = Record::from_iter([(key, value)]);
                if let Some(accessions) = accessions {
                    record.insert(ACCESSIONS_KEY, accessions);
                }
            }
        }

        match normalize(record) {
            Ok(record) if record.is_empty() => Value::Empty,
            Ok(record) => Value::Record(record),
            Err(err) => {
                self.record_error(err);
                Value::Empty
            }
        }
    }

    fn complete(&mut self, name: &str, value: Value) -> MzMLParserState {
        let record = match value {
            Value::Record(record) => record,
            Value::Empty => Record::new(),
            other => Record::from_iter([(name, other)]),
        };
        self.result = Some(record);
        MzMLParserState::ElementDone
    }
}

impl<S: SchemaLookup> MzMLSAX for RecordBuilder<'_, S> {
    fn start_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(state);
        }
        let name = local_name_of(event);
        if self.stack.is_empty() {
            self.begin(&name);
        } else if PARAM_ELEMENTS.contains(&name.as_str()) {
            let param = self.read_param(event, state)?;
            self.fold_param(param);
            self.stack.push(Frame::Param);
            return Ok(state);
        } else if self.should_skip(&name) {
            trace!("Skipping {name} in {}", self.root_name);
            self.skip_depth = 1;
            return Ok(state);
        }
        let record = self.read_attributes(&name, event, state)?;
        self.stack.push(Frame::Element {
            name,
            record,
            text: String::new(),
        });
        Ok(MzMLParserState::Element)
    }

    fn empty_element(&mut self, event: &BytesStart, state: MzMLParserState) -> ParserResult {
        if self.skip_depth > 0 {
            return Ok(state);
        }
        let name = local_name_of(event);
        if self.stack.is_empty() {
            self.begin(&name);
            let record = self.read_attributes(&name, event, state)?;
            let value = self.finish_element(&name, record, "");
            return Ok(self.complete(&name, value));
        }
        if PARAM_ELEMENTS.contains(&name.as_str()) {
            let param = self.read_param(event, state)?;
            self.fold_param(param);
            return Ok(state);
        }
        if self.should_skip(&name) {
            return Ok(state);
        }
        let record = self.read_attributes(&name, event, state)?;
        let value = self.finish_element(&name, record, "");
        self.attach(name, value);
        Ok(state)
    }

    fn end_element(&mut self, _event: &BytesEnd, state: MzMLParserState) -> ParserResult {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(state);
        }
        match self.stack.pop() {
            Some(Frame::Param) => Ok(state),
            Some(Frame::Element { name, record, text }) => {
                let value = self.finish_element(&name, record, &text);
                if self.stack.is_empty() {
                    Ok(self.complete(&name, value))
                } else {
                    self.attach(name, value);
                    Ok(state)
                }
            }
            None => Err(MzMLParserError::UnknownError(state)),
        }
    }

    fn text(&mut self, event: &BytesText, state: MzMLParserState) -> ParserResult {
        if self.skip_depth > 0 {
            return Ok(state);
        }
        if let Some(Frame::Element { text, .. }) = self.stack.last_mut() {
            let content = event.unescape().map_err(|e| MzMLParserError::XMLError(state, e))?;
            text.push_str(&content);
        }
        Ok(state)
    }
}
