//! Contract file listing
//!
//! The consumer phase writes pact-style JSON contracts into one directory.
//! The report includes a line per file: name, size, interaction count and
//! modification time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::ArtifactSource;
use shared::{ArtifactInfo, Component, component_debug, component_warn};

/// Lists `*.json` contracts in a directory
pub struct ContractDirectory {
    dir: PathBuf,
}

impl ContractDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_error(path: &Path, e: impl std::fmt::Display) -> OrchestratorError {
        OrchestratorError::ArtifactError {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }

    async fn describe(&self, path: &Path) -> OrchestratorResult<ArtifactInfo> {
        let metadata = fs::metadata(path).await.map_err(|e| Self::artifact_error(path, e))?;
        let generated_at: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .map_err(|e| Self::artifact_error(path, e))?;

        let contents = fs::read_to_string(path).await.map_err(|e| Self::artifact_error(path, e))?;

        Ok(ArtifactInfo {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: metadata.len(),
            interaction_count: count_interactions(path, &contents),
            generated_at,
        })
    }
}

/// Length of the top-level `interactions` array; 0 when absent or unparseable
fn count_interactions(path: &Path, contents: &str) -> usize {
    match serde_json::from_str::<serde_json::Value>(contents) {
        Ok(value) => value
            .get("interactions")
            .and_then(|i| i.as_array())
            .map(Vec::len)
            .unwrap_or(0),
        Err(e) => {
            component_warn!(Component::Artifacts, "⚠️ {} is not valid JSON: {}", path.display(), e);
            0
        }
    }
}

#[async_trait]
impl ArtifactSource for ContractDirectory {
    async fn list_artifacts(&self) -> OrchestratorResult<Vec<ArtifactInfo>> {
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            component_debug!(Component::Artifacts, "No contract directory at {}", self.dir.display());
            return Ok(vec![]);
        }

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| Self::artifact_error(&self.dir, e))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::artifact_error(&self.dir, e))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut artifacts = Vec::with_capacity(paths.len());
        for path in paths {
            artifacts.push(self.describe(&path).await?);
        }

        component_debug!(Component::Artifacts, "Found {} contract file(s)", artifacts.len());
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = ContractDirectory::new(dir.path().join("pacts"));

        assert!(source.list_artifacts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lists_json_contracts_with_interaction_counts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("web-api.json"),
            r#"{"consumer":{"name":"web"},"provider":{"name":"api"},"interactions":[{},{},{}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("empty.json"), r#"{"interactions":[]}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a contract").unwrap();

        let artifacts = ContractDirectory::new(dir.path()).list_artifacts().await.unwrap();

        let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["empty.json", "web-api.json"]);
        assert_eq!(artifacts[0].interaction_count, 0);
        assert_eq!(artifacts[1].interaction_count, 3);
        assert!(artifacts[1].size_bytes > 0);
    }

    #[tokio::test]
    async fn test_unparseable_contract_counts_zero() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let artifacts = ContractDirectory::new(dir.path()).list_artifacts().await.unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].interaction_count, 0);
    }
}
