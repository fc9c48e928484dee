// Pagekeep - Desktop Comic Reader Core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Downloader configuration
//!
//! Stored as JSON next to the host application's settings. Missing fields
//! fall back to their defaults so older config files keep loading.

use crate::error::{PagekeepError, Result};
use crate::file::paths::get_default_downloads_path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Download configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DownloaderConfig {
    /// Root of the downloaded chapter tree
    pub downloads_dir: PathBuf,

    /// Per-page fetch timeout in seconds (None = wait forever)
    pub page_timeout_secs: Option<u64>,

    /// Write a completion marker after a chapter's last page
    pub write_completion_marker: bool,

    /// Reader ignores downloads whose marker is missing or disagrees with the pages on disk
    pub verify_downloads: bool,

    /// Minimum zero padding of page file stems
    pub page_filename_padding: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            downloads_dir: get_default_downloads_path(),
            page_timeout_secs: Some(120),
            write_completion_marker: true,
            verify_downloads: false,
            page_filename_padding: 3,
        }
    }
}

impl DownloaderConfig {
    /// Defaults with a specific downloads directory
    pub fn with_downloads_dir(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
            ..Default::default()
        }
    }

    pub fn page_timeout(&self) -> Option<Duration> {
        self.page_timeout_secs.map(Duration::from_secs)
    }

    /// Reject settings the downloader can't work with
    pub fn validate(&self) -> Result<()> {
        if self.downloads_dir.as_os_str().is_empty() {
            return Err(PagekeepError::ConfigurationError(
                "downloadsDir must not be empty".to_string(),
            ));
        }
        if self.page_timeout_secs == Some(0) {
            return Err(PagekeepError::ConfigurationError(
                "pageTimeoutSecs must be greater than zero (omit it to disable)".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            PagekeepError::ConfigurationError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file, or defaults when it doesn't exist yet
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save to a JSON file
    pub async fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = DownloaderConfig::default();
        assert_eq!(config.page_timeout(), Some(Duration::from_secs(120)));
        assert!(config.write_completion_marker);
        assert!(!config.verify_downloads);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = DownloaderConfig {
            page_timeout_secs: Some(0),
            ..DownloaderConfig::with_downloads_dir("/tmp/d")
        };
        assert!(config.validate().is_err());

        let config = DownloaderConfig::with_downloads_dir("");
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings").join("downloader.json");

        let config = DownloaderConfig {
            page_timeout_secs: None,
            verify_downloads: true,
            ..DownloaderConfig::with_downloads_dir(temp_dir.path().join("downloads"))
        };
        config.save(&path).await.unwrap();

        let loaded = DownloaderConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("downloader.json");
        tokio::fs::write(&path, r#"{ "downloadsDir": "/srv/comics" }"#).await.unwrap();

        let loaded = DownloaderConfig::load(&path).await.unwrap();
        assert_eq!(loaded.downloads_dir, PathBuf::from("/srv/comics"));
        assert_eq!(loaded.page_filename_padding, 3);

        let missing = DownloaderConfig::load_or_default(&temp_dir.path().join("none.json")).await.unwrap();
        assert_eq!(missing.page_timeout_secs, Some(120));
    }
}
