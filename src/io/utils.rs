/// How much of each record a reader should materialize
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailLevel {
    /// Read and decode every binary data array
    #[default]
    Full,
    /// Skip `<binaryDataArrayList>` subtrees entirely, leaving only metadata
    MetadataOnly,
}

impl DetailLevel {
    /// Whether subtrees holding binary data should be read at all
    pub fn reads_arrays(&self) -> bool {
        matches!(self, Self::Full)
    }
}
