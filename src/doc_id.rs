use std::collections::HashMap;

use crate::chunk::ChunkRecord;

/// Normalize a chat title into the grouping key used for document IDs.
///
/// Spaces become underscores and the result is lowercased.
pub fn normalize_title(title: &str) -> String {
    title.replace(' ', "_").to_lowercase()
}

/// Assigns stable, human-readable document IDs to chunks.
///
/// IDs have the form `<title>_<ordinal>_chunk_<chunkNo>`, where the ordinal
/// counts how many chunks with the same normalized title this assigner has
/// seen so far. The counter is keyed by title only: two different
/// conversations sharing a title are not told apart.
///
/// One assigner is one run. Reusing it across files keeps counting, which
/// keeps IDs unique across a whole corpus.
///
/// # Examples
///
/// ```
/// use chatbert::doc_id::DocIdAssigner;
///
/// let mut assigner = DocIdAssigner::new();
/// assert_eq!(assigner.next_id("Test Chat", 1), "test_chat_1_chunk_1");
/// assert_eq!(assigner.next_id("Test Chat", 3), "test_chat_2_chunk_3");
/// assert_eq!(assigner.next_id("Other", 1), "other_1_chunk_1");
/// ```
#[derive(Debug, Default, Clone)]
pub struct DocIdAssigner {
    counts: HashMap<String, u64>,
}

impl DocIdAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the ID for the next chunk of `chat_title`.
    pub fn next_id(&mut self, chat_title: &str, chunk_no: i64) -> String {
        let key = normalize_title(chat_title);
        let count = self.counts.entry(key.clone()).or_insert(0);
        *count += 1;
        format!("{key}_{count}_chunk_{chunk_no}")
    }

    /// Assign IDs to a sequence of chunks, in order.
    pub fn assign(&mut self, chunks: &[ChunkRecord]) -> Vec<String> {
        chunks
            .iter()
            .map(|c| self.next_id(&c.chat_title, c.chunk_no))
            .collect()
    }
}

/// Assign IDs to `chunks` with a fresh counter.
pub fn assign_document_ids(chunks: &[ChunkRecord]) -> Vec<String> {
    DocIdAssigner::new().assign(chunks)
}
