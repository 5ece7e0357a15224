use std::path::{Path, PathBuf};

use crate::{error::Result, index::MANIFEST_FILE};

pub const INDEX_ROOT_ENV_VAR: &str = "CHATBERT_INDEX_ROOT";
pub const DEFAULT_INDEX_ROOT: &str = ".chatbert/colbert/indexes";

/// Directory holding one subdirectory per named index.
#[derive(Debug, Clone)]
pub struct IndexRoot {
    root: PathBuf,
}

impl IndexRoot {
    /// Resolve the index root from, in order of priority:
    /// 1. An explicit path (from --index-root)
    /// 2. The CHATBERT_INDEX_ROOT environment variable
    /// 3. `.chatbert/colbert/indexes` under the working directory
    ///
    /// Nothing is created on disk.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var(INDEX_ROOT_ENV_VAR) {
            PathBuf::from(val)
        } else {
            PathBuf::from(DEFAULT_INDEX_ROOT)
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// The existence guard: an index counts as present when its directory
    /// exists. Contents are not checked.
    pub fn index_exists(&self, name: &str) -> bool {
        self.index_path(name).is_dir()
    }

    /// Names of subdirectories that carry an index manifest, sorted.
    pub fn list_indexes(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().join(MANIFEST_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}
