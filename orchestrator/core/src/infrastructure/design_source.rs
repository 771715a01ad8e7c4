// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// File-backed design import.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::tooling::{DesignSource, DesignSourceError};

/// Reads design exports from disk. References are paths, resolved against
/// `root` when relative.
#[derive(Debug, Clone, Default)]
pub struct FileDesignSource {
    root: Option<PathBuf>,
}

impl FileDesignSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        let path = PathBuf::from(reference);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }
}

#[async_trait]
impl DesignSource for FileDesignSource {
    async fn fetch(&self, reference: &str) -> Result<serde_json::Value, DesignSourceError> {
        let path = self.resolve(reference);
        debug!(path = %path.display(), "Reading design export");

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DesignSourceError::NotFound(reference.to_string())
            } else {
                DesignSourceError::Io {
                    reference: reference.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|e| DesignSourceError::Malformed {
            reference: reference.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("home.json"), r#"{"name":"Home","document":{}}"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        let source = FileDesignSource::with_root(dir.path());
        let value = source.fetch("home.json").await.unwrap();
        assert_eq!(value["name"], "Home");

        assert!(matches!(
            source.fetch("missing.json").await,
            Err(DesignSourceError::NotFound(r)) if r == "missing.json"
        ));
        assert!(matches!(
            source.fetch("broken.json").await,
            Err(DesignSourceError::Malformed { .. })
        ));
    }
}
