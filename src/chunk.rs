//! Conversation chunk records as produced by the upstream chunker.

use serde::{Deserialize, Serialize};

/// Free-form metadata attached to an indexed document.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A pre-split fragment of a conversation transcript.
///
/// Field names follow the on-disk JSON (`chatTitle`, `chunkNo`, ...). Unknown
/// keys in the source file are ignored; a missing key fails deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub chat_title: String,
    pub chunk_no: i64,
    pub chunk_text: String,
    pub token_count: i64,
}

impl ChunkRecord {
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            chat_title: self.chat_title.clone(),
            chunk_no: self.chunk_no,
            token_count: self.token_count,
        }
    }
}

/// The metadata stored alongside each chunk in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub chat_title: String,
    pub chunk_no: i64,
    pub token_count: i64,
}

impl ChunkMetadata {
    /// Convert into the generic metadata map the index stores.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatbert::chunk::ChunkMetadata;
    ///
    /// let meta = ChunkMetadata {
    ///     chat_title: "Test Chat".to_string(),
    ///     chunk_no: 3,
    ///     token_count: 120,
    /// }
    /// .into_metadata();
    ///
    /// assert_eq!(meta.len(), 3);
    /// assert_eq!(meta["chatTitle"], "Test Chat");
    /// ```
    pub fn into_metadata(self) -> Metadata {
        let mut map = Metadata::new();
        map.insert("chatTitle".into(), self.chat_title.into());
        map.insert("chunkNo".into(), self.chunk_no.into());
        map.insert("tokenCount".into(), self.token_count.into());
        map
    }
}
