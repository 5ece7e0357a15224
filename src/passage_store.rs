use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::{
    chunk::Metadata,
    error::{Error, Result},
};

const PASSAGES: TableDefinition<u64, &[u8]> = TableDefinition::new("passages");

/// What the index knows about one stored passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageRecord {
    pub document_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Passage text and metadata keyed by passage ID, stored as JSON values.
pub struct PassageStore {
    db: Database,
}

impl PassageStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(PASSAGES)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Open a passage store that must already exist.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound {
                kind: "passage store",
                name: path.display().to_string(),
            });
        }
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    /// Insert or replace many passages in one transaction.
    pub fn batch_put(&self, records: &[(u64, PassageRecord)]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PASSAGES)?;
            for (id, record) in records {
                let bytes = serde_json::to_vec(record)?;
                table.insert(*id, bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get(&self, passage_id: u64) -> Result<Option<PassageRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PASSAGES)?;
        match table.get(passage_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for PassageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassageStore").finish_non_exhaustive()
    }
}
