//! chatbert - semantic signal mining over chunked conversation transcripts.
//!
//! Conversation exports that were already split into chunks are loaded,
//! given stable document IDs, and indexed with
//! [ColBERT](https://github.com/stanford-futuredata/ColBERT) late-interaction
//! embeddings. A [Tantivy](https://github.com/quickwit-oss/tantivy) BM25
//! index sits alongside for keyword and hybrid search. Batteries of
//! exploratory queries are then run against the index and filtered by
//! score.
//!
//! # Quick start
//!
//! ```no_run
//! use chatbert::{ColbertIndex, IndexRoot, ModelManager, loader};
//! use chatbert::index::IndexOptions;
//! use chatbert::search::{SearchMode, filter_by_score};
//!
//! let root = IndexRoot::resolve(None);
//! let chunks = loader::load_chunks("data/conversation_001.chunked.json".as_ref())
//!     .unwrap();
//!
//! let mut index = ColbertIndex::build(
//!     &root,
//!     "Me",
//!     ModelManager::new(),
//!     chunks.into(),
//!     IndexOptions::default(),
//! )
//! .unwrap();
//!
//! let results = index
//!     .search("Complaints about inefficient tools", 20, SearchMode::Semantic)
//!     .unwrap();
//! for r in filter_by_score(results, 15.0) {
//!     println!("{} {:.2} {}", r.rank, r.score, r.document_id);
//! }
//! ```

pub mod chunk;
pub mod chunking;
pub mod data_dir;
pub mod doc_id;
pub mod embedding;
pub mod embedding_db;
pub mod error;
pub mod index;
pub mod interactive;
pub mod keyword_index;
pub mod loader;
pub mod mining;
pub mod model_manager;
pub mod passage_store;
pub mod prompt;
pub mod reranker;
pub mod search;
pub mod wikipedia;

pub use data_dir::IndexRoot;
pub use doc_id::DocIdAssigner;
pub use embedding_db::EmbeddingDb;
pub use error::{Error, Result};
pub use index::ColbertIndex;
pub use model_manager::{Encoder, ModelManager};
