use std::fmt::Display;
use std::fs;
use std::io::{self, prelude::*, BufReader, SeekFrom};
use std::path::Path;

use log::{debug, trace, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Error as XMLError, Reader};

use crate::io::offset_index::{IndexList, OffsetIndex};
use crate::io::traits::{ElementSource, Fallback, IdResolver, SeekRead};
use crate::io::utils::DetailLevel;
use crate::spectrum::{Record, SpectrumRecord};

use super::builder::{element_id, RecordBuilder};
use super::index::{find_checksum_from_reader, find_index_list};
use super::reading_shared::{Bytes, MzMLIndexingError, MzMLParserError, MzMLParserState, MzMLSAX};
use super::resolve::{IndexedResolver, LinearResolver};
use super::schema::{MzMLSchema, SchemaLookup};

const BUFFER_SIZE: usize = 10000;

/// The index category holding `<spectrum>` offsets
pub const SPECTRUM_INDEX: &str = "spectrum";
/// The index category holding `<chromatogram>` offsets
pub const CHROMATOGRAM_INDEX: &str = "chromatogram";

/// Which start tag the reader is looking for
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    LocalName(&'a str),
    Id(&'a str),
}

impl Target<'_> {
    fn matches(&self, event: &BytesStart) -> Result<bool, XMLError> {
        match self {
            Target::LocalName(name) => Ok(event.local_name().as_ref() == name.as_bytes()),
            Target::Id(id) => Ok(element_id(event)?.as_deref() == Some(*id)),
        }
    }
}

impl Display for Target<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::LocalName(name) => write!(f, "<{name}>"),
            Target::Id(id) => write!(f, "id={id}"),
        }
    }
}

fn parser_error_from_xml(err: XMLError, state: MzMLParserState) -> MzMLParserError {
    match err {
        XMLError::Io(e) => MzMLParserError::IOError(state, io::Error::new(e.kind(), e.to_string())),
        e => MzMLParserError::XMLError(state, e),
    }
}

/**
An mzML parser that reads elements into [`Record`]s from any [`Read`]
stream, in document order.

Iterating over the reader yields each `<spectrum>`. A spectrum whose binary
data arrays cannot be decoded is yielded as an error and iteration carries on
with the next one, while a malformed document ends iteration after its error.

When the stream is also [`Seek`], elements can be looked up by `id` with a
scan from the start of the document. Use [`IndexedMzMLReaderType`] to make
use of an `indexedmzML` offset index instead.
*/
pub struct MzMLReaderType<R: Read, S: SchemaLookup = MzMLSchema> {
    /// The state the parser was in last.
    pub state: MzMLParserState,
    /// The raw reader
    handle: BufReader<R>,
    buffer: Bytes,
    pub detail_level: DetailLevel,
    schema: S,
}

pub type MzMLReader<R> = MzMLReaderType<R, MzMLSchema>;

impl<R: Read> MzMLReaderType<R, MzMLSchema> {
    /// Create a new [`MzMLReaderType`] instance, wrapping the [`io::Read`] handle
    /// provided with an [`io::BufReader`].
    pub fn new(file: R) -> MzMLReaderType<R, MzMLSchema> {
        Self::with_buffer_capacity_and_detail_level(file, BUFFER_SIZE, DetailLevel::Full)
    }

    pub fn with_buffer_capacity_and_detail_level(
        file: R,
        capacity: usize,
        detail_level: DetailLevel,
    ) -> MzMLReaderType<R, MzMLSchema> {
        Self::with_schema(file, capacity, detail_level, MzMLSchema)
    }
}

impl<R: Read, S: SchemaLookup> MzMLReaderType<R, S> {
    /// Create a reader which interprets attributes through `schema`
    pub fn with_schema(file: R, capacity: usize, detail_level: DetailLevel, schema: S) -> Self {
        Self {
            state: MzMLParserState::Start,
            handle: BufReader::with_capacity(capacity, file),
            buffer: Bytes::new(),
            detail_level,
            schema,
        }
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn set_detail_level(&mut self, detail_level: DetailLevel) {
        self.detail_level = detail_level;
    }

    pub fn into_inner(self) -> R {
        self.handle.into_inner()
    }

    pub(crate) fn get_mut(&mut self) -> &mut BufReader<R> {
        &mut self.handle
    }

    /// Read forward until an element matching `target` has been read in full,
    /// skipping everything before it.
    fn read_matching(
        &mut self,
        target: Target<'_>,
        recursive: Option<bool>,
    ) -> Result<Option<Record>, MzMLParserError> {
        if self.state == MzMLParserState::EOF {
            return Ok(None);
        }
        self.buffer.clear();
        if self.state != MzMLParserState::Resume {
            self.state = MzMLParserState::Seeking;
        }

        let mut reader = Reader::from_reader(&mut self.handle);
        reader.trim_text(true);
        // Reading may start mid-document, where closing tags have no partner
        reader.check_end_names(false);

        let mut builder: Option<RecordBuilder<'_, S>> = None;

        macro_rules! err_state {
            ($err:expr) => {{
                let err = $err;
                self.state = MzMLParserState::ParserError;
                return Err(err);
            }};
        }

        macro_rules! dispatch {
            ($result:expr) => {
                match $result {
                    Ok(state) => self.state = state,
                    Err(err) => err_state!(err),
                }
            };
        }

        loop {
            match reader.read_event_into(&mut self.buffer) {
                Ok(Event::Start(ref e)) => {
                    if let Some(b) = builder.as_mut() {
                        dispatch!(b.start_element(e, self.state));
                    } else {
                        match target.matches(e) {
                            Ok(true) => {
                                trace!("Reading {target}");
                                let mut b = RecordBuilder::new(&self.schema, self.detail_level)
                                    .with_recursion(recursive);
                                dispatch!(b.start_element(e, self.state));
                                builder = Some(b);
                            }
                            Ok(false) => {}
                            Err(err) => err_state!(MzMLParserError::XMLError(self.state, err)),
                        }
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    if let Some(b) = builder.as_mut() {
                        dispatch!(b.empty_element(e, self.state));
                    } else {
                        match target.matches(e) {
                            Ok(true) => {
                                trace!("Reading empty {target}");
                                let mut b = RecordBuilder::new(&self.schema, self.detail_level)
                                    .with_recursion(recursive);
                                dispatch!(b.empty_element(e, self.state));
                                builder = Some(b);
                            }
                            Ok(false) => {}
                            Err(err) => err_state!(MzMLParserError::XMLError(self.state, err)),
                        }
                    }
                }
                Ok(Event::End(ref e)) => {
                    if let Some(b) = builder.as_mut() {
                        dispatch!(b.end_element(e, self.state));
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if let Some(b) = builder.as_mut() {
                        dispatch!(b.text(e, self.state));
                    }
                }
                Ok(Event::Eof) => {
                    if let Some(b) = builder.take() {
                        err_state!(MzMLParserError::IncompleteElementError(
                            b.root_name().to_string(),
                            self.state
                        ));
                    }
                    trace!("Reached EOF looking for {target}");
                    self.state = MzMLParserState::EOF;
                    return Ok(None);
                }
                Err(err) => err_state!(parser_error_from_xml(err, self.state)),
                _ => {}
            }
            self.buffer.clear();

            if self.state == MzMLParserState::ElementDone {
                if let Some(b) = builder.take() {
                    return b.finish().map(Some);
                }
            }
        }
    }

    /// Read the next `<spectrum>` in document order
    pub fn read_next(&mut self) -> Result<Option<SpectrumRecord>, MzMLParserError> {
        self.read_matching(Target::LocalName("spectrum"), None)
    }

    /// Iterate over every element with the local name `local_name` from the
    /// current position. `recursive` forces (or suppresses) reading their
    /// child elements, which by default only `<mzML>` and `<indexedmzML>`
    /// skip.
    pub fn iterfind<'a>(&'a mut self, local_name: &str, recursive: Option<bool>) -> ElementIter<'a, R, S> {
        ElementIter {
            reader: self,
            local_name: local_name.to_string(),
            recursive,
        }
    }
}

impl<R: SeekRead, S: SchemaLookup> MzMLReaderType<R, S> {
    pub fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = self.handle.seek(pos)?;
        self.state = MzMLParserState::Resume;
        Ok(position)
    }

    pub fn stream_position(&mut self) -> io::Result<u64> {
        self.handle.stream_position()
    }

    /// Move back to the start of the document
    pub fn reset(&mut self) -> io::Result<()> {
        self.handle.seek(SeekFrom::Start(0))?;
        self.buffer.clear();
        self.state = MzMLParserState::Start;
        Ok(())
    }

    /// Find an element by `id` by reading the document from its start
    pub fn get_by_id(&mut self, id: &str) -> Result<Record, MzMLParserError> {
        LinearResolver
            .resolve(self, id)?
            .ok_or_else(|| MzMLParserError::NotFound(id.to_string()))
    }

    /// Run `f` and then restore the stream position and parser state
    fn with_restore<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, MzMLParserError>,
    ) -> Result<T, MzMLParserError> {
        let state = self.state;
        let position = self
            .stream_position()
            .map_err(|e| MzMLParserError::IOError(state, e))?;
        let result = f(self);
        self.handle
            .seek(SeekFrom::Start(position))
            .map_err(|e| MzMLParserError::IOError(state, e))?;
        self.buffer.clear();
        self.state = state;
        result
    }

    /// The `version` attribute of the `<mzML>` element
    pub fn version_info(&mut self) -> Result<Option<String>, MzMLParserError> {
        self.with_restore(|this| {
            this.reset()
                .map_err(|e| MzMLParserError::IOError(MzMLParserState::Start, e))?;
            let root = this.read_matching(Target::LocalName("mzML"), Some(false))?;
            Ok(root.and_then(|r| r.get_str("version").map(str::to_string)))
        })
    }

    /// Read the checksum from the end of an `indexedmzML` document
    pub fn read_checksum(&mut self) -> io::Result<Option<String>> {
        let current_position = self.handle.stream_position()?;
        let checksum = find_checksum_from_reader(&mut self.handle);
        self.handle.seek(SeekFrom::Start(current_position))?;
        checksum
    }
}

impl<R: SeekRead, S: SchemaLookup> ElementSource for MzMLReaderType<R, S> {
    fn reset(&mut self) -> io::Result<()> {
        MzMLReaderType::reset(self)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        MzMLReaderType::seek(self, pos)
    }

    fn read_element_by_id(&mut self, id: &str) -> Result<Option<Record>, MzMLParserError> {
        self.read_matching(Target::Id(id), None)
    }
}

/// [`MzMLReaderType`] instances are [`Iterator`]s over [`SpectrumRecord`]s
impl<R: Read, S: SchemaLookup> Iterator for MzMLReaderType<R, S> {
    type Item = Result<SpectrumRecord, MzMLParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(
            self.state,
            MzMLParserState::EOF | MzMLParserState::ParserError
        ) {
            return None;
        }
        self.read_next().transpose()
    }
}

/// Iterates over elements with a given local name, see [`MzMLReaderType::iterfind`]
pub struct ElementIter<'a, R: Read, S: SchemaLookup = MzMLSchema> {
    reader: &'a mut MzMLReaderType<R, S>,
    local_name: String,
    recursive: Option<bool>,
}

impl<R: Read, S: SchemaLookup> Iterator for ElementIter<'_, R, S> {
    type Item = Result<Record, MzMLParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(
            self.reader.state,
            MzMLParserState::EOF | MzMLParserState::ParserError
        ) {
            return None;
        }
        self.reader
            .read_matching(Target::LocalName(&self.local_name), self.recursive)
            .transpose()
    }
}

/**
An mzML reader that uses the offset index at the end of an `indexedmzML`
document for random access.

The index is read once, when the reader is created. A document without a
usable index is still read in full, with every lookup falling back to a scan
from the start of the document.
*/
pub struct IndexedMzMLReaderType<R: SeekRead, S: SchemaLookup = MzMLSchema> {
    reader: MzMLReaderType<R, S>,
    index: IndexList,
}

pub type IndexedMzMLReader<R> = IndexedMzMLReaderType<R, MzMLSchema>;

impl<R: SeekRead> IndexedMzMLReaderType<R, MzMLSchema> {
    pub fn new(file: R) -> io::Result<Self> {
        Self::from_reader(MzMLReaderType::new(file))
    }

    pub fn with_buffer_capacity_and_detail_level(
        file: R,
        capacity: usize,
        detail_level: DetailLevel,
    ) -> io::Result<Self> {
        Self::from_reader(MzMLReaderType::with_buffer_capacity_and_detail_level(
            file,
            capacity,
            detail_level,
        ))
    }
}

impl IndexedMzMLReaderType<fs::File, MzMLSchema> {
    pub fn open_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let handle = fs::File::open(path)?;
        Self::new(handle)
    }
}

impl<R: SeekRead, S: SchemaLookup> IndexedMzMLReaderType<R, S> {
    /// Wrap `reader`, reading the document's offset index. Failing to read
    /// the index is not an error.
    pub fn from_reader(mut reader: MzMLReaderType<R, S>) -> io::Result<Self> {
        reader.reset()?;
        let index = match find_index_list(reader.get_mut()) {
            Ok(index) => index,
            Err(err) => {
                debug!("Failed to read index from the end of the file: {err}");
                IndexList::new()
            }
        };
        reader.reset()?;
        Ok(Self { reader, index })
    }

    /// Read the offset index at the end of an `<indexedmzML>` document again,
    /// replacing the current one, and return the number of spectra it lists.
    pub fn read_index_from_end(&mut self) -> Result<usize, MzMLIndexingError> {
        let current_position = self.reader.stream_position()?;
        let found = find_index_list(self.reader.get_mut());
        self.reader.seek(SeekFrom::Start(current_position))?;
        self.index = found?;
        Ok(self.len())
    }

    /// All the offset indices read from the document
    pub fn index(&self) -> &IndexList {
        &self.index
    }

    pub fn spectrum_index(&self) -> Option<&OffsetIndex> {
        self.index.get(SPECTRUM_INDEX)
    }

    /// The number of spectra in the offset index
    pub fn len(&self) -> usize {
        self.spectrum_index().map(|i| i.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve(&mut self, category: &str, id: &str) -> Result<Record, MzMLParserError> {
        let resolver = Fallback::new(IndexedResolver::new(self.index.get(category)), LinearResolver);
        resolver
            .resolve(&mut self.reader, id)?
            .ok_or_else(|| MzMLParserError::NotFound(id.to_string()))
    }

    /// Retrieve a spectrum by its `id`, seeking directly to it when the
    /// offset index lists it
    pub fn get_by_id(&mut self, id: &str) -> Result<SpectrumRecord, MzMLParserError> {
        self.resolve(SPECTRUM_INDEX, id)
    }

    /// Retrieve a chromatogram by its `id`
    pub fn get_chromatogram_by_id(&mut self, id: &str) -> Result<Record, MzMLParserError> {
        self.resolve(CHROMATOGRAM_INDEX, id)
    }

    /// Retrieve an element by its `id` without consulting the offset index
    pub fn get_by_id_linear(&mut self, id: &str) -> Result<Record, MzMLParserError> {
        self.reader.get_by_id(id)
    }

    pub fn version_info(&mut self) -> Result<Option<String>, MzMLParserError> {
        self.reader.version_info()
    }

    pub fn read_checksum(&mut self) -> io::Result<Option<String>> {
        self.reader.read_checksum()
    }

    pub fn reset(&mut self) -> io::Result<()> {
        self.reader.reset()
    }

    /// See [`MzMLReaderType::iterfind`]
    pub fn iterfind<'a>(&'a mut self, local_name: &str, recursive: Option<bool>) -> ElementIter<'a, R, S> {
        self.reader.iterfind(local_name, recursive)
    }

    /// Iterate over spectra. With a spectrum index, they are visited in order
    /// of ascending offset, otherwise the document is scanned from the start.
    /// A spectrum index without any entries counts as no index, so the
    /// document is still scanned.
    pub fn iter(&mut self) -> IndexedSpectrumIter<'_, R, S> {
        IndexedSpectrumIter::new(self)
    }

    pub fn into_inner(self) -> MzMLReaderType<R, S> {
        self.reader
    }
}

/// Iterates over the spectra of an [`IndexedMzMLReaderType`]
pub struct IndexedSpectrumIter<'a, R: SeekRead, S: SchemaLookup = MzMLSchema> {
    source: &'a mut IndexedMzMLReaderType<R, S>,
    ids: Option<std::vec::IntoIter<String>>,
    started: bool,
    done: bool,
}

impl<'a, R: SeekRead, S: SchemaLookup> IndexedSpectrumIter<'a, R, S> {
    fn new(source: &'a mut IndexedMzMLReaderType<R, S>) -> Self {
        let ids = match source.spectrum_index() {
            Some(index) if !index.is_empty() => Some(
                index
                    .sorted_by_offset()
                    .into_iter()
                    .map(|(id, _)| id.to_string())
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            _ => {
                debug!("No spectrum index, reading spectra in document order");
                None
            }
        };
        Self {
            source,
            ids,
            started: false,
            done: false,
        }
    }

    fn stop_on_fatal(&mut self, err: MzMLParserError) -> Option<Result<SpectrumRecord, MzMLParserError>> {
        if !err.is_recoverable() {
            warn!("Stopping iteration after {err}");
            self.done = true;
        }
        Some(Err(err))
    }
}

impl<R: SeekRead, S: SchemaLookup> Iterator for IndexedSpectrumIter<'_, R, S> {
    type Item = Result<SpectrumRecord, MzMLParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(ids) = self.ids.as_mut() {
            let id = ids.next()?;
            return match self.source.get_by_id(&id) {
                Ok(record) => Some(Ok(record)),
                Err(err) => self.stop_on_fatal(err),
            };
        }
        if !self.started {
            self.started = true;
            if let Err(e) = self.source.reset() {
                return self.stop_on_fatal(MzMLParserError::IOError(MzMLParserState::Start, e));
            }
        }
        let next = self.source.reader.next();
        if next.is_none() {
            self.done = true;
        }
        next
    }
}
