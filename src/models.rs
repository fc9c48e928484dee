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


//! Library entities shared by content sources, the downloader and the reader
//!
//! # Identity
//! - `Series.id` / `Chapter.id` are library ids (chapter ids are UUID-shaped
//!   and get embedded in download directory names)
//! - `source_id` fields are whatever the content source uses to address the item
//! - `Series.extension_id` selects the content source in the registry

use serde::{Deserialize, Serialize};

/// A comic/manga title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    /// Library id
    pub id: String,

    /// Content source that provides this series
    pub extension_id: String,

    /// Id of the series within its content source
    pub source_id: String,

    /// Display title
    pub title: String,
}

impl Series {
    pub fn new(
        id: impl Into<String>,
        extension_id: impl Into<String>,
        source_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            extension_id: extension_id.into(),
            source_id: source_id.into(),
            title: title.into(),
        }
    }
}

/// One releasable unit of a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Library id (UUID)
    pub id: String,

    /// Id of the chapter within its content source
    pub source_id: String,

    /// Chapter number as published ("12", "12.5", "")
    pub chapter_number: String,

    /// Language of the release
    #[serde(default)]
    pub language_key: String,

    /// Scanlation group, if any
    #[serde(default)]
    pub group_name: String,

    #[serde(default)]
    pub title: String,
}

impl Chapter {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        chapter_number: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            chapter_number: chapter_number.into(),
            language_key: String::new(),
            group_name: String::new(),
            title: String::new(),
        }
    }

    /// Chapter number as a float for ordering (unparseable numbers sort last)
    pub fn number_value(&self) -> f64 {
        self.chapter_number.trim().parse::<f64>().unwrap_or(f64::MAX)
    }
}

/// Opaque data a content source needs to resolve a chapter's page urls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequesterData {
    pub server: String,
    pub hash: String,
    pub num_pages: usize,
    pub page_filenames: Vec<String>,
}

/// Result of resolving one page image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    /// Raw image bytes
    Bytes(Vec<u8>),

    /// Url the image must be fetched from
    Url(String),
}
