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


//! Content sources ("extensions")
//!
//! A content source resolves series, chapters and pages for one website or
//! for the local filesystem. The downloader and reader only ever talk to
//! sources through the [`ContentSource`] trait; which implementation serves a
//! series is decided by [`SourceRegistry`] using `Series::extension_id`.

pub mod filesystem;
pub mod registry;

use crate::error::Result;
use crate::models::{Chapter, ImageData, PageRequesterData, Series};
use futures_util::future::BoxFuture;

// Re-export commonly used types
pub use filesystem::FilesystemSource;
pub use registry::SourceRegistry;

/// Async contract every content source implements
///
/// Every call may fail independently; callers treat a failure as scoped to
/// the one series/chapter/page it was made for.
pub trait ContentSource: Send + Sync {
    /// Extension id this source registers under
    fn id(&self) -> &str;

    /// Fetch a series by its source id
    fn get_series<'a>(&'a self, source_id: &'a str) -> BoxFuture<'a, Result<Series>>;

    /// List the chapters of a series (by series source id)
    fn get_chapters<'a>(&'a self, series_source_id: &'a str) -> BoxFuture<'a, Result<Vec<Chapter>>>;

    /// Resolve the data needed to list a chapter's pages
    fn get_page_requester_data<'a>(
        &'a self,
        series_source_id: &'a str,
        chapter_source_id: &'a str,
    ) -> BoxFuture<'a, Result<PageRequesterData>>;

    /// Ordered page urls, one per page
    fn get_page_urls<'a>(&'a self, data: &'a PageRequesterData) -> BoxFuture<'a, Result<Vec<String>>>;

    /// Resolve one page to raw bytes or a url to fetch
    fn get_image<'a>(&'a self, series: &'a Series, url: &'a str) -> BoxFuture<'a, Result<ImageData>>;
}

/// Resolve the ordered page url list of a chapter (requester data, then urls)
pub async fn resolve_page_urls(
    source: &dyn ContentSource,
    series: &Series,
    chapter: &Chapter,
) -> Result<Vec<String>> {
    let data = source
        .get_page_requester_data(&series.source_id, &chapter.source_id)
        .await?;
    source.get_page_urls(&data).await
}
