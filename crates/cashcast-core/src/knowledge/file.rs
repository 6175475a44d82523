//! File-backed knowledge store (JSON lines)

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{KnowledgeRecord, KnowledgeStore, KnowledgeUpdate};
use crate::error::{Error, Result};

const FILE_NAME: &str = "knowledge.jsonl";

/// Appends each update as one JSON line under a directory
pub struct FileKnowledgeStore {
    dir: PathBuf,
}

impl FileKnowledgeStore {
    /// Create a store rooted at `dir`
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Update(format!(
                    "Failed to create knowledge directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            info!("Created knowledge directory: {}", dir.display());
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(FILE_NAME)
    }

    /// Read back every stored record, oldest first
    pub fn records(&self) -> Result<Vec<KnowledgeRecord>> {
        let path = self.path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

impl KnowledgeStore for FileKnowledgeStore {
    fn name(&self) -> &str {
        "file"
    }

    fn update(&self, update: KnowledgeUpdate) -> Result<()> {
        let record = KnowledgeRecord::new(update)?;
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.path();
        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(line.as_bytes())?;
            file.sync_data()
        };
        write().map_err(|e| {
            Error::Update(format!("Failed to write {}: {}", path.display(), e))
        })?;

        debug!(digest = %record.digest, path = %path.display(), "Knowledge record stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_creates_directory_and_appends() {
        let temp = tempfile::tempdir().unwrap();
        let store = FileKnowledgeStore::new(temp.path().join("nested").join("kb")).unwrap();
        assert!(store.dir().exists());
        assert!(store.records().unwrap().is_empty());

        for i in 0..2 {
            let mut update = KnowledgeUpdate::new();
            update.insert("run".to_string(), json!(i));
            store.update(update).unwrap();
        }

        let records = store.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].entries["run"], json!(1));
        assert_ne!(records[0].digest, records[1].digest);
    }

    #[test]
    fn test_unwritable_path_is_update_error() {
        let temp = tempfile::tempdir().unwrap();
        let store = FileKnowledgeStore::new(temp.path()).unwrap();
        // A directory where the file should be
        fs::create_dir(store.path()).unwrap();

        let err = store.update(KnowledgeUpdate::new()).unwrap_err();
        assert!(matches!(err, Error::Update(_)));
    }
}
