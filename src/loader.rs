use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use kdam::{BarExt, tqdm};

use crate::{
    chunk::{ChunkMetadata, ChunkRecord},
    doc_id::DocIdAssigner,
    error::{Error, Result},
};

/// Default file name pattern for chunked conversation exports.
pub const DEFAULT_CHUNK_PATTERN: &str = "conversation_*.chunked.json";

/// Chunks loaded from disk as parallel sequences.
///
/// `documents[i]`, `document_ids[i]` and `metadatas[i]` all describe the
/// same chunk.
#[derive(Debug, Default, Clone)]
pub struct LoadedChunks {
    pub documents: Vec<String>,
    pub document_ids: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
}

impl LoadedChunks {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn extend(&mut self, other: LoadedChunks) {
        self.documents.extend(other.documents);
        self.document_ids.extend(other.document_ids);
        self.metadatas.extend(other.metadatas);
    }
}

/// Read a JSON array of chunk records.
pub fn read_chunk_file(path: &Path) -> Result<Vec<ChunkRecord>> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|source| Error::InvalidChunkFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Load one chunk file, assigning IDs through `assigner`.
pub fn load_chunks_with(
    path: &Path,
    assigner: &mut DocIdAssigner,
) -> Result<LoadedChunks> {
    let records = read_chunk_file(path)?;
    let document_ids = assigner.assign(&records);
    let metadatas = records.iter().map(ChunkRecord::metadata).collect();
    let documents = records.into_iter().map(|r| r.chunk_text).collect();

    Ok(LoadedChunks {
        documents,
        document_ids,
        metadatas,
    })
}

/// Load one chunk file with a fresh ID counter.
pub fn load_chunks(path: &Path) -> Result<LoadedChunks> {
    load_chunks_with(path, &mut DocIdAssigner::new())
}

/// Find chunk files in `dir` whose names match `pattern`, sorted by name.
pub fn discover_chunk_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = globset::Glob::new(pattern)
        .map_err(|e| Error::Config(format!("invalid glob pattern: {e}")))?
        .compile_matcher();

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if matcher.is_match(entry.file_name()) {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load every file into one corpus, sharing a single ID assigner so IDs
/// stay unique across files.
pub fn load_corpus(paths: &[PathBuf]) -> Result<LoadedChunks> {
    let mut assigner = DocIdAssigner::new();
    let mut corpus = LoadedChunks::default();

    let mut pb = tqdm!(total = paths.len(), desc = "Loading chunks");
    let start = Instant::now();

    for (i, path) in paths.iter().enumerate() {
        let loaded = load_chunks_with(path, &mut assigner)?;
        tracing::debug!(
            file = %path.display(),
            chunks = loaded.len(),
            "loaded chunk file"
        );
        corpus.extend(loaded);

        let eta = eta_seconds(start.elapsed(), i + 1, paths.len());
        tracing::debug!("ETA: {eta:.1}s remaining");
        let _ = pb.update(1);
    }
    let _ = pb.refresh();
    eprintln!();

    Ok(corpus)
}

/// Remaining time, assuming the files left take as long as the average so far.
fn eta_seconds(elapsed: Duration, done: usize, total: usize) -> f64 {
    if done == 0 {
        return 0.0;
    }
    let per_file = elapsed.as_secs_f64() / done as f64;
    per_file * total.saturating_sub(done) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_chunks(dir: &Path, name: &str, records: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, records).unwrap();
        path
    }

    const TWO_CHUNKS: &str = r#"[
        {"chatTitle": "Test Chat", "chunkNo": 1, "chunkText": "first", "tokenCount": 1},
        {"chatTitle": "Test Chat", "chunkNo": 2, "chunkText": "second", "tokenCount": 1}
    ]"#;

    #[test]
    fn loads_parallel_sequences() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_chunks(tmp.path(), "c.json", TWO_CHUNKS);

        let loaded = load_chunks(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.documents, vec!["first", "second"]);
        assert_eq!(
            loaded.document_ids,
            vec!["test_chat_1_chunk_1", "test_chat_2_chunk_2"]
        );
        assert_eq!(loaded.metadatas[1].chunk_no, 2);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_chunks(tmp.path(), "bad.json", "[{");
        let err = load_chunks(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidChunkFile { .. }));
    }

    #[test]
    fn missing_field_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_chunks(
            tmp.path(),
            "missing.json",
            r#"[{"chatTitle": "a", "chunkNo": 1, "chunkText": "x"}]"#,
        );
        let err = load_chunks(&path).unwrap_err();
        assert!(err.to_string().contains("tokenCount"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_chunks(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn discovers_sorted_matching_files() {
        let tmp = tempfile::tempdir().unwrap();
        write_chunks(tmp.path(), "conversation_002.chunked.json", "[]");
        write_chunks(tmp.path(), "conversation_001.chunked.json", "[]");
        write_chunks(tmp.path(), "conversation_003.json", "[]");
        write_chunks(tmp.path(), "notes.chunked.json", "[]");

        let paths =
            discover_chunk_files(tmp.path(), DEFAULT_CHUNK_PATTERN).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "conversation_001.chunked.json",
                "conversation_002.chunked.json"
            ]
        );
    }

    #[test]
    fn corpus_ids_unique_across_files() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_chunks(tmp.path(), "a.json", TWO_CHUNKS);
        let b = write_chunks(tmp.path(), "b.json", TWO_CHUNKS);

        let corpus = load_corpus(&[a, b]).unwrap();
        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus.document_ids[2], "test_chat_3_chunk_1");
        assert_eq!(corpus.document_ids[3], "test_chat_4_chunk_2");
    }

    #[test]
    fn eta_extrapolates_average_file_time() {
        let elapsed = Duration::from_secs(6);
        assert!((eta_seconds(elapsed, 2, 5) - 9.0).abs() < 1e-9);
        assert_eq!(eta_seconds(elapsed, 5, 5), 0.0);
        assert_eq!(eta_seconds(Duration::ZERO, 0, 5), 0.0);
    }
}
