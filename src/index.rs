//! The on-disk late-interaction index.
//!
//! An index lives in its own directory:
//!
//! ```text
//! <root>/<name>/
//!   manifest.json     build settings and counts, written last
//!   embeddings.redb   per-passage token embeddings
//!   passages.redb     passage text, owning document ID, metadata
//!   keyword/          Tantivy BM25 index over passage text
//! ```
//!
//! Passages are numbered from 0 in build order.

use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{
    chunk::Metadata,
    chunking::{self, DEFAULT_MAX_DOCUMENT_LENGTH},
    data_dir::IndexRoot,
    embedding::{self, DEFAULT_BATCH_SIZE},
    embedding_db::EmbeddingDb,
    error::{Error, Result},
    keyword_index::{KeywordIndex, WRITER_MEMORY_BUDGET},
    loader::LoadedChunks,
    model_manager::Encoder,
    passage_store::{PassageRecord, PassageStore},
    reranker::{self, ScoredPassage},
    search::{SearchMode, SearchResult},
};

pub const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: u32 = 1;
const EMBEDDINGS_FILE: &str = "embeddings.redb";
const PASSAGES_FILE: &str = "passages.redb";
const KEYWORD_DIR: &str = "keyword";

/// BM25 candidates handed to the reranker in hybrid mode.
const HYBRID_CANDIDATES: usize = 1000;

/// Build settings and counts recorded with an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub version: u32,
    pub name: String,
    pub model_id: String,
    pub max_document_length: usize,
    pub split_documents: bool,
    pub document_count: usize,
    pub passage_count: usize,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

impl IndexManifest {
    pub fn read(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(MANIFEST_FILE);
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    kind: "index manifest",
                    name: path.display().to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, index_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(index_dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }
}

/// How to build an index.
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    /// Token budget per encoded passage.
    pub max_document_length: usize,
    /// Split long documents into several passages instead of truncating.
    pub split_documents: bool,
    /// Replace an index that already exists under the same name.
    pub overwrite: bool,
    pub batch_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_document_length: DEFAULT_MAX_DOCUMENT_LENGTH,
            split_documents: false,
            overwrite: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Documents to index, as parallel sequences.
#[derive(Debug, Clone, Default)]
pub struct IndexInput {
    pub documents: Vec<String>,
    pub document_ids: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

impl From<LoadedChunks> for IndexInput {
    fn from(chunks: LoadedChunks) -> Self {
        Self {
            documents: chunks.documents,
            document_ids: chunks.document_ids,
            metadatas: chunks
                .metadatas
                .into_iter()
                .map(|m| m.into_metadata())
                .collect(),
        }
    }
}

impl IndexInput {
    fn validate(&self) -> Result<()> {
        if self.documents.is_empty() {
            return Err(Error::Config("no documents to index".to_string()));
        }
        let n = self.documents.len();
        if self.document_ids.len() != n || self.metadatas.len() != n {
            return Err(Error::Config(format!(
                "mismatched input: {n} documents, {} ids, {} metadata entries",
                self.document_ids.len(),
                self.metadatas.len()
            )));
        }
        Ok(())
    }
}

/// A passage about to be written, with the text that gets encoded.
struct PendingPassage {
    record: PassageRecord,
    encode_text: String,
}

fn plan_passages(input: IndexInput, options: &IndexOptions) -> Vec<PendingPassage> {
    let mut pending = Vec::with_capacity(input.documents.len());
    let docs = input
        .documents
        .into_iter()
        .zip(input.document_ids)
        .zip(input.metadatas);

    for ((text, document_id), metadata) in docs {
        if options.split_documents {
            for passage in chunking::split_document(
                &document_id,
                &text,
                options.max_document_length,
            ) {
                pending.push(PendingPassage {
                    encode_text: passage.content.clone(),
                    record: PassageRecord {
                        document_id: passage.document_id,
                        content: passage.content,
                        metadata: metadata.clone(),
                    },
                });
            }
        } else {
            let encode_text =
                chunking::truncate_to_tokens(&text, options.max_document_length)
                    .to_string();
            pending.push(PendingPassage {
                encode_text,
                record: PassageRecord {
                    document_id,
                    content: text,
                    metadata,
                },
            });
        }
    }
    pending
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A persisted ColBERT index plus the encoder used to query it.
pub struct ColbertIndex<E: Encoder> {
    path: PathBuf,
    manifest: IndexManifest,
    encoder: E,
    embeddings: EmbeddingDb,
    passages: PassageStore,
    keyword: KeywordIndex,
}

impl<E: Encoder> ColbertIndex<E> {
    /// Build a new index named `name` under `root`.
    ///
    /// Fails if the index directory already exists, unless
    /// `options.overwrite` is set. A failed build removes what it wrote.
    pub fn build(
        root: &IndexRoot,
        name: &str,
        encoder: E,
        input: IndexInput,
        options: IndexOptions,
    ) -> Result<Self> {
        input.validate()?;

        let path = root.index_path(name);
        if path.exists() {
            if !options.overwrite {
                return Err(Error::Config(format!(
                    "index '{name}' already exists at {}",
                    path.display()
                )));
            }
            tracing::info!(path = %path.display(), "removing existing index");
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;

        match Self::build_in(&path, name, encoder, input, options) {
            Ok(index) => Ok(index),
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&path) {
                    tracing::warn!(
                        path = %path.display(),
                        "could not remove partial index: {cleanup}"
                    );
                }
                Err(e)
            }
        }
    }

    fn build_in(
        path: &Path,
        name: &str,
        mut encoder: E,
        input: IndexInput,
        options: IndexOptions,
    ) -> Result<Self> {
        let document_count = input.documents.len();
        let pending = plan_passages(input, &options);
        tracing::info!(
            documents = document_count,
            passages = pending.len(),
            "building index '{name}'"
        );

        let keyword = KeywordIndex::open(&path.join(KEYWORD_DIR))?;
        let mut writer = keyword.writer(WRITER_MEMORY_BUDGET)?;
        for (id, p) in pending.iter().enumerate() {
            keyword.add_passage(&writer, id as u64, &p.record.content)?;
        }
        writer.commit()?;

        let passages = PassageStore::open(&path.join(PASSAGES_FILE))?;
        let mut to_encode = Vec::with_capacity(pending.len());
        let mut records = Vec::with_capacity(pending.len());
        for (id, p) in pending.into_iter().enumerate() {
            to_encode.push((id as u64, p.encode_text));
            records.push((id as u64, p.record));
        }
        passages.batch_put(&records)?;

        let embeddings = EmbeddingDb::open(&path.join(EMBEDDINGS_FILE))?;
        let stored = embedding::embed_and_store(
            &mut encoder,
            &embeddings,
            &to_encode,
            options.batch_size,
        )?;

        let manifest = IndexManifest {
            version: MANIFEST_VERSION,
            name: name.to_string(),
            model_id: encoder.model_id().to_string(),
            max_document_length: options.max_document_length,
            split_documents: options.split_documents,
            document_count,
            passage_count: stored,
            created_at: unix_now(),
        };
        manifest.write(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            manifest,
            encoder,
            embeddings,
            passages,
            keyword,
        })
    }

    /// Reopen a previously built index from its directory. Every store must
    /// already be present; nothing is created.
    pub fn open(path: &Path, encoder: E) -> Result<Self> {
        if !path.is_dir() {
            return Err(Error::NotFound {
                kind: "index",
                name: path.display().to_string(),
            });
        }

        let manifest = IndexManifest::read(path)?;
        if manifest.model_id != encoder.model_id() {
            tracing::warn!(
                index_model = %manifest.model_id,
                query_model = %encoder.model_id(),
                "querying with a different model than the index was built with"
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            embeddings: EmbeddingDb::open_existing(&path.join(EMBEDDINGS_FILE))?,
            passages: PassageStore::open_existing(&path.join(PASSAGES_FILE))?,
            keyword: KeywordIndex::open_existing(&path.join(KEYWORD_DIR))?,
            manifest,
            encoder,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Top `k` passages for `query`, ranked from 1.
    pub fn search(
        &mut self,
        query: &str,
        k: usize,
        mode: SearchMode,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let scored = match mode {
            SearchMode::Semantic => {
                let ids = self.embeddings.list_ids()?;
                let q = self.encoder.encode_query(query)?;
                reranker::score_passages(&q, &ids, &self.embeddings)?
            }
            SearchMode::Hybrid => {
                let ids: Vec<u64> = self
                    .keyword
                    .search(query, HYBRID_CANDIDATES, true)?
                    .into_iter()
                    .map(|hit| hit.passage_id)
                    .collect();
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                let q = self.encoder.encode_query(query)?;
                reranker::score_passages(&q, &ids, &self.embeddings)?
            }
            SearchMode::Keyword => self
                .keyword
                .search(query, k, true)?
                .into_iter()
                .map(|hit| ScoredPassage {
                    passage_id: hit.passage_id,
                    score: hit.score,
                })
                .collect(),
        };

        tracing::debug!(query, candidates = scored.len(), ?mode, "scored");
        self.to_results(scored, k)
    }

    /// Run several queries; one result list per query, in order.
    pub fn search_batch(
        &mut self,
        queries: &[String],
        k: usize,
        mode: SearchMode,
    ) -> Result<Vec<Vec<SearchResult>>> {
        queries.iter().map(|q| self.search(q, k, mode)).collect()
    }

    fn to_results(
        &self,
        scored: Vec<ScoredPassage>,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let mut results = Vec::with_capacity(k.min(scored.len()));
        for ScoredPassage { passage_id, score } in scored.into_iter().take(k) {
            let Some(record) = self.passages.get(passage_id)? else {
                tracing::warn!(passage_id, "scored passage has no record");
                continue;
            };
            results.push(SearchResult {
                rank: results.len() + 1,
                score,
                document_id: record.document_id,
                document_metadata: record.metadata,
                content: record.content,
            });
        }
        Ok(results)
    }
}

impl<E: Encoder> std::fmt::Debug for ColbertIndex<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColbertIndex")
            .field("path", &self.path)
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}
