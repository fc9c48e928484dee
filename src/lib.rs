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


//! Pagekeep core: chapter download queue, download store and reader loading
//!
//! The host application constructs one [`DownloadManager`] at startup,
//! subscribes to its state, and hands [`ChapterLoader`] the same
//! [`SourceRegistry`] so the reader and the downloader agree on sources.

pub mod config;
pub mod download;
pub mod error;
pub mod file;
pub mod models;
pub mod reader;
pub mod source;

pub use config::DownloaderConfig;
pub use download::{DownloadManager, DownloadTask, QueueSnapshot, TaskKey};
pub use error::{PagekeepError, Result};
pub use file::DownloadStore;
pub use models::{Chapter, ImageData, PageRequesterData, Series};
pub use reader::{ChapterLoader, ReaderSession};
pub use source::{ContentSource, FilesystemSource, SourceRegistry};

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, or `default_directive`
/// when it is unset
///
/// Returns false if a global subscriber was already installed.
pub fn init_logging(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_once() {
        init_logging("pagekeep_core=debug");
        // A subscriber is installed now either way
        assert!(!init_logging("info"));
    }
}
