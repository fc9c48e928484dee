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


//! Chapter downloads
//!
//! This module handles the download queue, page fetching and the progress
//! state published to observers.

pub mod control;
pub mod fetch;
pub mod manager;
pub mod progress;

// Re-export commonly used types
pub use manager::DownloadManager;
pub use progress::{DownloadErrorEntry, DownloadTask, QueueCallback, QueueSnapshot, TaskKey, TaskStatus};
