//! Locating and reading the offset index written at the end of an
//! `indexedmzML` document.
//!
//! The `<indexList>` is read as plain text, line by line, rather than as XML,
//! so it is found even when the document around it is not well formed.
use std::io::{self, BufRead, BufReader, SeekFrom};
use std::sync::OnceLock;

use log::{debug, trace, warn};
use quick_xml::escape::unescape;
use regex::Regex;

use crate::io::offset_index::{IndexList, OffsetIndex};
use crate::io::traits::SeekRead;

use super::reading_shared::{Bytes, MzMLIndexingError};

/// How many bytes from the end of the document are searched for the
/// `<indexListOffset>` and `<fileChecksum>` elements
pub const TRAILER_WINDOW: u64 = 1024;

/// `<indexListOffset>` values smaller than this are written by some older
/// converters and never point at a real `<indexList>`
pub const MINIMUM_INDEX_LIST_OFFSET: u64 = 1024;

fn index_list_offset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<indexListOffset>(\d+)</indexListOffset>").unwrap())
}

fn checksum_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<fileChecksum>([0-9a-zA-Z]+)</fileChecksum>").unwrap())
}

fn index_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r#"<index name="(?P<name>\S+)">"#,
            r#"|<offset idRef="(?P<id>[^"]+)">(?P<offset>\d+)</offset>"#,
            r"|(?P<close></index>)",
            r"|(?P<done></indexList>)",
        ))
        .unwrap()
    })
}

/// Read the last [`TRAILER_WINDOW`] bytes of `reader`, or all of it if it is
/// shorter, as text
pub fn read_trailer<R: SeekRead>(reader: &mut R) -> io::Result<String> {
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(end.saturating_sub(TRAILER_WINDOW)))?;
    let mut buf = Bytes::new();
    reader.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Find the `<fileChecksum>` value in the trailer, if there is one
pub fn find_checksum_from_reader<R: SeekRead>(reader: &mut R) -> io::Result<Option<String>> {
    let trailer = read_trailer(reader)?;
    Ok(checksum_pattern()
        .captures(&trailer)
        .and_then(|caps| caps.get(1))
        .map(|hit| hit.as_str().to_string()))
}

/// The states of the `<indexList>` line scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexParserState {
    /// Waiting for an `<index name="...">` opener
    SeekingName,
    /// Inside an `<index>` block, collecting `<offset>` records
    AccumulatingOffsets,
    /// The last `<index>` block was closed and committed
    Closed,
    /// `</indexList>` was reached and nothing more will be read
    Done,
}

/**
Builds an [`IndexList`] from the `<indexList>` blocks an `indexedmzML`
document's trailer points to.

Offsets seen outside of an `<index>` block are ignored, and a block that is
never closed is discarded. When more than one block shares a name, the one
read last replaces the others.
*/
#[derive(Debug)]
pub struct IndexedMzMLIndexExtractor {
    pub state: IndexParserState,
    pub index_list: IndexList,
    current: Option<OffsetIndex>,
}

impl Default for IndexedMzMLIndexExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexedMzMLIndexExtractor {
    pub fn new() -> IndexedMzMLIndexExtractor {
        IndexedMzMLIndexExtractor {
            state: IndexParserState::SeekingName,
            index_list: IndexList::new(),
            current: None,
        }
    }

    /// Every `<indexListOffset>` value found in the trailer, in order
    pub fn find_offsets_from_reader<R: SeekRead>(&self, reader: &mut R) -> io::Result<Vec<u64>> {
        let trailer = read_trailer(reader)?;
        let offsets = index_list_offset_pattern()
            .captures_iter(&trailer)
            .filter_map(|caps| caps.get(1))
            .filter_map(|hit| hit.as_str().parse::<u64>().ok())
            .collect();
        Ok(offsets)
    }

    /// Apply every index token on `line`, in the order they appear
    pub fn feed_line(&mut self, line: &str) -> IndexParserState {
        for caps in index_token_pattern().captures_iter(line) {
            if let Some(name) = caps.name("name") {
                if let Some(unclosed) = self.current.take() {
                    debug!("Discarding unclosed index {}", unclosed.name);
                }
                self.current = Some(OffsetIndex::new(name.as_str().to_string()));
                self.state = IndexParserState::AccumulatingOffsets;
            } else if let (Some(id), Some(offset)) = (caps.name("id"), caps.name("offset")) {
                let Some(index) = self.current.as_mut() else {
                    trace!("Ignoring offset for {} outside of an index", id.as_str());
                    continue;
                };
                match offset.as_str().parse::<u64>() {
                    Ok(offset) => {
                        let id = match unescape(id.as_str()) {
                            Ok(id) => id.into_owned(),
                            Err(_) => id.as_str().to_string(),
                        };
                        index.insert(id, offset);
                    }
                    Err(e) => warn!("Skipping unreadable offset for {}: {e}", id.as_str()),
                }
            } else if caps.name("close").is_some() {
                if let Some(mut index) = self.current.take() {
                    index.init = true;
                    trace!("Read {} entries for index {}", index.len(), index.name);
                    self.index_list.insert(index);
                }
                self.state = IndexParserState::Closed;
            } else if caps.name("done").is_some() {
                if let Some(unclosed) = self.current.take() {
                    debug!("Discarding unclosed index {}", unclosed.name);
                }
                self.state = IndexParserState::Done;
                break;
            }
        }
        self.state
    }

    /// Scan the `<indexList>` starting at `offset` until `</indexList>` or the
    /// end of the stream
    pub fn read_index_list<R: SeekRead>(&mut self, reader: &mut R, offset: u64) -> io::Result<()> {
        self.state = IndexParserState::SeekingName;
        self.current = None;
        reader.seek(SeekFrom::Start(offset))?;
        let mut lines = BufReader::new(reader);
        let mut line = Bytes::new();
        loop {
            line.clear();
            if lines.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if self.feed_line(&String::from_utf8_lossy(&line)) == IndexParserState::Done {
                break;
            }
        }
        if let Some(unclosed) = self.current.take() {
            debug!("Discarding unclosed index {} at end of stream", unclosed.name);
        }
        Ok(())
    }

    pub fn into_index_list(self) -> IndexList {
        self.index_list
    }
}

/**
Read every `<indexList>` the trailer of `reader` points to.

Returns [`MzMLIndexingError::OffsetNotFound`] when the trailer has no
`<indexListOffset>`. An offset that does not lead to any `<index>` block
produces an empty [`IndexList`] rather than an error. The stream is left at
an arbitrary position.
*/
pub fn find_index_list<R: SeekRead>(reader: &mut R) -> Result<IndexList, MzMLIndexingError> {
    let mut extractor = IndexedMzMLIndexExtractor::new();
    let offsets = extractor.find_offsets_from_reader(reader)?;
    if offsets.is_empty() {
        return Err(MzMLIndexingError::OffsetNotFound);
    }
    for offset in offsets {
        if offset < MINIMUM_INDEX_LIST_OFFSET {
            warn!("Ignoring implausible index list offset {offset}");
            continue;
        }
        extractor.read_index_list(reader, offset)?;
    }
    let index_list = extractor.into_index_list();
    if index_list.is_empty() {
        warn!("No index entries could be read from the trailer");
    }
    Ok(index_list)
}
