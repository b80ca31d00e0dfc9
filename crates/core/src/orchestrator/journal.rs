//! Resume journal: one JSON line per finished record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::record::Resolution;

/// Errors reading or writing the journal.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode journal entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub id: String,
    pub resolution: Resolution,
}

impl JournalEntry {
    /// Whether a later run may reuse this outcome instead of looking it up again.
    pub fn is_final(&self) -> bool {
        matches!(
            self.resolution,
            Resolution::Resolved { .. } | Resolution::Ambiguous { .. } | Resolution::Unresolved { .. }
        )
    }
}

/// Load reusable outcomes from a journal.
///
/// A missing file yields an empty map. Lines that fail to parse are skipped,
/// as are `Failed` and `Pending` entries. Later lines win over earlier ones.
pub async fn load_journal(path: &Path) -> Result<HashMap<String, Resolution>, JournalError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No journal at {}, starting fresh", path.display());
            return Ok(HashMap::new());
        }
        Err(source) => {
            return Err(JournalError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut entries = HashMap::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(entry) if entry.is_final() => {
                entries.insert(entry.id, entry.resolution);
            }
            Ok(entry) => {
                // A retryable outcome replaces any earlier final one.
                entries.remove(&entry.id);
            }
            Err(e) => {
                warn!(
                    "Skipping corrupt journal line {} in {}: {}",
                    line_no + 1,
                    path.display(),
                    e
                );
            }
        }
    }

    Ok(entries)
}

/// Append-only journal writer.
pub struct ResolutionJournal {
    path: PathBuf,
    file: File,
}

impl ResolutionJournal {
    /// Open a journal for appending, creating it if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;

        // Terminate a partial line left by an interrupted write.
        let len = file
            .metadata()
            .await
            .map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?
            .len();
        if len > 0 {
            let content = tokio::fs::read(&path).await.map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;
            if content.last() != Some(&b'\n') {
                file.write_all(b"\n")
                    .await
                    .map_err(|source| JournalError::Io {
                        path: path.clone(),
                        source,
                    })?;
            }
        }

        Ok(Self { path, file })
    }

    /// Append one finished record and flush it to disk.
    pub async fn append(&mut self, id: &str, resolution: &Resolution) -> Result<(), JournalError> {
        let entry = JournalEntry {
            id: id.to_string(),
            resolution: resolution.clone(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .await
            .map_err(|source| JournalError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.file.flush().await.map_err(|source| JournalError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Candidate, MatchType};
    use crate::selector::QueryStrategy;
    use tempfile::TempDir;

    fn resolved() -> Resolution {
        Resolution::resolved(
            QueryStrategy::Isbn,
            Candidate::new(Some("823.8"), Some("PR4588"), 1.0, MatchType::Identifier),
            None,
        )
    }

    #[tokio::test]
    async fn test_missing_journal_is_empty() {
        let dir = TempDir::new().unwrap();
        let entries = load_journal(&dir.path().join("missing.jsonl")).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_append_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");

        let mut journal = ResolutionJournal::open(&path).await.unwrap();
        journal.append("0", &resolved()).await.unwrap();
        journal
            .append("1", &Resolution::unresolved("all strategies exhausted"))
            .await
            .unwrap();
        journal
            .append("2", &Resolution::failed("lookup failed"))
            .await
            .unwrap();

        let entries = load_journal(&path).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.get("0"), Some(&resolved()));
        assert!(entries.contains_key("1"));
        assert!(!entries.contains_key("2"));
    }

    #[tokio::test]
    async fn test_corrupt_trailing_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");

        let mut journal = ResolutionJournal::open(&path).await.unwrap();
        journal.append("0", &resolved()).await.unwrap();
        drop(journal);

        let mut content = tokio::fs::read_to_string(&path).await.unwrap();
        content.push_str("{\"id\":\"1\",\"resolu");
        tokio::fs::write(&path, content).await.unwrap();

        let entries = load_journal(&path).await.unwrap();
        assert_eq!(entries.len(), 1);

        // Reopening starts a fresh line after the partial one
        let mut journal = ResolutionJournal::open(&path).await.unwrap();
        journal.append("1", &resolved()).await.unwrap();
        let entries = load_journal(&path).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_later_failure_replaces_earlier_outcome() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");

        let mut journal = ResolutionJournal::open(&path).await.unwrap();
        journal.append("0", &resolved()).await.unwrap();
        journal.append("0", &Resolution::failed("cancelled")).await.unwrap();

        let entries = load_journal(&path).await.unwrap();
        assert!(entries.is_empty());
    }
}
