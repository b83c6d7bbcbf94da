use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use crate::error::StudyError;
use crate::pace::model::{normalize_subject, PaceRounding, PaceTable};

/// Keyed pace-factor store.
///
/// Every read-modify-write, including the write to disk, happens while the
/// table lock is held, so two updates for the same (owner, subject) can
/// never interleave and drop one another's contribution.
pub struct PaceStore {
    path: Option<PathBuf>,
    rounding: PaceRounding,
    table: Mutex<PaceTable>,
}

impl PaceStore {
    /// Store that lives only as long as the process.
    pub fn in_memory(rounding: PaceRounding) -> Self {
        PaceStore {
            path: None,
            rounding,
            table: Mutex::new(PaceTable::new()),
        }
    }

    /// Open the store backed by `path`. A missing file is an empty store;
    /// a file that exists but cannot be parsed is an error.
    pub async fn open<P: Into<PathBuf>>(path: P, rounding: PaceRounding) -> Result<Self, StudyError> {
        let path = path.into();
        let table = match tokio::fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str::<PaceTable>(&data)
                .map_err(|e| StudyError::new(
                    format!("Failed to parse pace store: {}", e),
                    "json_parse"
                ).with_context(format!("path: {:?}", path)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = ?path, "No pace store on disk yet, starting empty");
                PaceTable::new()
            }
            Err(e) => {
                return Err(StudyError::new(
                    format!("Failed to read pace store: {}", e),
                    "io"
                ).with_context(format!("path: {:?}", path)));
            }
        };

        tracing::info!(path = ?path, entries = table.len(), "Pace store opened");
        Ok(PaceStore {
            path: Some(path),
            rounding,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn rounding(&self) -> PaceRounding {
        self.rounding
    }

    /// Current pace factor, creating the entry at 1.0 on first reference.
    pub async fn get(&self, owner: &str, subject: &str) -> Result<f64, StudyError> {
        let subject = normalize_subject(subject)?;
        let mut table = self.table.lock().await;

        let (value, created) = {
            let (entry, created) = table.get_or_create(owner, &subject);
            (entry.pace_factor, created)
        };
        if created {
            tracing::debug!(owner = owner, subject = %subject, "Pace entry created");
            if let Err(e) = self.persist(&table).await {
                if let Some(subjects) = table.entries.get_mut(owner) {
                    subjects.remove(&subject);
                }
                return Err(e.with_subject(subject));
            }
        }
        Ok(value)
    }

    /// Smooth the stored factor toward `observed_ratio` and persist it.
    /// Returns the new factor rounded to 2 decimals.
    pub async fn update(
        &self,
        owner: &str,
        subject: &str,
        observed_ratio: f64,
        alpha: f64,
    ) -> Result<f64, StudyError> {
        let subject = normalize_subject(subject)?;
        let mut table = self.table.lock().await;

        let previous = table.get(owner, &subject).cloned();
        let value = table
            .apply(owner, &subject, observed_ratio, alpha, self.rounding)
            .map_err(|e| StudyError::from(e).with_subject(subject.clone()))?;

        if let Err(e) = self.persist(&table).await {
            // keep memory in line with what is on disk
            if let Some(subjects) = table.entries.get_mut(owner) {
                match previous {
                    Some(entry) => {
                        subjects.insert(subject.clone(), entry);
                    }
                    None => {
                        subjects.remove(&subject);
                    }
                }
            }
            return Err(e.with_subject(subject));
        }

        tracing::info!(
            owner = owner,
            subject = %subject,
            ratio = observed_ratio,
            alpha = alpha,
            pace_factor = value,
            "Pace factor updated"
        );
        Ok(value)
    }

    /// Copy of one owner's factors. Does not create entries.
    pub async fn snapshot(&self, owner: &str) -> HashMap<String, f64> {
        self.table.lock().await.snapshot(owner)
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Write the table next to its final location, then rename over it.
    async fn persist(&self, table: &PaceTable) -> Result<(), StudyError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StudyError::new(
                        format!("Failed to create directory: {}", e),
                        "io"
                    ).with_context(format!("path: {:?}", parent)))?;
            }
        }

        let json = serde_json::to_string_pretty(table)
            .map_err(|e| StudyError::new(
                format!("Failed to serialize pace store: {}", e),
                "json_serialize"
            ))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StudyError::new(
                format!("Failed to write pace store: {}", e),
                "io"
            ).with_context(format!("path: {:?}", tmp)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StudyError::new(
                format!("Failed to replace pace store: {}", e),
                "io"
            ).with_context(format!("path: {:?}", path)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn get_materialises_default() {
        let store = PaceStore::in_memory(PaceRounding::OutputOnly);
        assert!(store.is_empty().await);
        assert_eq!(store.get("u1", "physics").await.unwrap(), 1.0);
        assert_eq!(store.len().await, 1);
        // idempotent
        assert_eq!(store.get("u1", " physics ").await.unwrap(), 1.0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_then_get() {
        let store = PaceStore::in_memory(PaceRounding::OutputOnly);
        assert_eq!(store.update("u1", "physics", 1.5, 0.2).await.unwrap(), 1.10);
        let v = store.get("u1", "physics").await.unwrap();
        assert!((v - 1.1).abs() < 1e-12);
    }

    #[tokio::test]
    async fn rejected_update_leaves_store_untouched() {
        let store = PaceStore::in_memory(PaceRounding::OutputOnly);
        let err = store.update("u1", "physics", -2.0, 0.2).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.subject.as_deref(), Some("physics"));
        assert!(store.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_serialised() {
        let store = Arc::new(PaceStore::in_memory(PaceRounding::OutputOnly));
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.update("u1", "physics", 0.0, 0.1).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        // every update applied exactly once: 0.9^50
        let v = store.get("u1", "physics").await.unwrap();
        assert!((v - 0.9_f64.powi(50)).abs() < 1e-9);
    }
}
