use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::error::{Error, Result};

const EMBEDDINGS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("passage_embeddings");

/// 4 bytes token count + 4 bytes dimension.
const HEADER_SIZE: usize = 8;

/// Per-token ColBERT embedding matrices keyed by passage ID.
///
/// Entry layout: token count `T` (u32 LE), dimension `D` (u32 LE), then
/// `T * D` f32 LE values in row-major order.
pub struct EmbeddingDb {
    db: Database,
}

/// One passage's embedding, as handed to [`EmbeddingDb::store_batch`].
#[derive(Debug, Clone)]
pub struct EmbeddingEntry {
    pub passage_id: u64,
    pub num_tokens: u32,
    pub dimension: u32,
    pub data: Vec<f32>,
}

impl EmbeddingDb {
    /// Open or create an embeddings database at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use chatbert::EmbeddingDb;
    ///
    /// let db = EmbeddingDb::open(&tmp.path().join("embeddings.redb")).unwrap();
    /// assert!(db.list_ids().unwrap().is_empty());
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(EMBEDDINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Open an embeddings database that must already exist. Nothing is
    /// created on disk.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound {
                kind: "embeddings database",
                name: path.display().to_string(),
            });
        }
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    /// Store a single passage embedding.
    pub fn store(
        &self,
        passage_id: u64,
        num_tokens: u32,
        dimension: u32,
        data: &[f32],
    ) -> Result<()> {
        self.store_batch(&[EmbeddingEntry {
            passage_id,
            num_tokens,
            dimension,
            data: data.to_vec(),
        }])
    }

    /// Store many passage embeddings in one transaction.
    pub fn store_batch(&self, entries: &[EmbeddingEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(EMBEDDINGS)?;
            for entry in entries {
                let expected =
                    entry.num_tokens as usize * entry.dimension as usize;
                if entry.data.len() != expected {
                    return Err(Error::Config(format!(
                        "embedding for passage {} has {} values, expected {expected}",
                        entry.passage_id,
                        entry.data.len()
                    )));
                }

                let byte_len =
                    HEADER_SIZE + std::mem::size_of_val(entry.data.as_slice());
                let mut guard =
                    table.insert_reserve(entry.passage_id, byte_len)?;
                let dest = guard.as_mut();
                dest[0..4].copy_from_slice(&entry.num_tokens.to_le_bytes());
                dest[4..8].copy_from_slice(&entry.dimension.to_le_bytes());
                dest[HEADER_SIZE..]
                    .copy_from_slice(bytemuck::cast_slice(entry.data.as_slice()));
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Retrieve a passage's embedding matrix, or `None` when absent or
    /// malformed.
    pub fn load(&self, passage_id: u64) -> Result<Option<EmbeddingMatrix>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;
        Ok(table
            .get(passage_id)?
            .and_then(|guard| decode_matrix(guard.value())))
    }

    /// Load many matrices in one read transaction, preserving input order.
    pub fn batch_load(
        &self,
        passage_ids: &[u64],
    ) -> Result<Vec<(u64, Option<EmbeddingMatrix>)>> {
        if passage_ids.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;

        let mut results = Vec::with_capacity(passage_ids.len());
        for &id in passage_ids {
            let matrix = table.get(id)?.and_then(|g| decode_matrix(g.value()));
            results.push((id, matrix));
        }
        Ok(results)
    }

    /// All stored passage IDs, ascending.
    pub fn list_ids(&self) -> Result<Vec<u64>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;
        let mut ids = Vec::new();
        for entry in table.iter()? {
            let (k, _) = entry?;
            ids.push(k.value());
        }
        Ok(ids)
    }
}

impl std::fmt::Debug for EmbeddingDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingDb").finish_non_exhaustive()
    }
}

fn decode_matrix(bytes: &[u8]) -> Option<EmbeddingMatrix> {
    let header: [u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
    let num_tokens = u32::from_le_bytes(header[0..4].try_into().ok()?);
    let dimension = u32::from_le_bytes(header[4..8].try_into().ok()?);

    let body = &bytes[HEADER_SIZE..];
    if body.len() != num_tokens as usize * dimension as usize * 4 {
        return None;
    }

    // The value slice is not guaranteed to be 4-byte aligned.
    let data = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Some(EmbeddingMatrix {
        num_tokens,
        dimension,
        data,
    })
}

/// A retrieved ColBERT embedding matrix.
#[derive(Debug, Clone)]
pub struct EmbeddingMatrix {
    pub num_tokens: u32,
    pub dimension: u32,
    /// Row-major: `data[token_idx * dimension + dim_idx]`.
    pub data: Vec<f32>,
}
