//! JSON file pattern store

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::PatternStore;
use crate::cache::AccessPattern;
use crate::error::{Error, Result};

/// Pattern store backed by a single JSON file.
///
/// Writes go to a sibling temp file that is then renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFilePatternStore {
    path: PathBuf,
}

impl JsonFilePatternStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "patterns".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PatternStore for JsonFilePatternStore {
    async fn load(&self) -> Result<Option<HashMap<String, AccessPattern>>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let patterns: HashMap<String, AccessPattern> = serde_json::from_slice(&raw)
            .map_err(|e| {
                Error::Persistence(format!("{} is not a pattern table: {}", self.path.display(), e))
            })?;
        debug!(path = %self.path.display(), patterns = patterns.len(), "Loaded pattern file");
        Ok(Some(patterns))
    }

    async fn save(&self, patterns: &HashMap<String, AccessPattern>) -> Result<()> {
        let json = serde_json::to_vec_pretty(patterns)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), patterns = patterns.len(), "Saved pattern file");
        Ok(())
    }
}
