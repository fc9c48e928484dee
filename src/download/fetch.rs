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


//! Fetching one page and writing it into a chapter directory
//!
//! A source hands back either the image bytes or a url to fetch. Bytes are
//! written atomically through the store; urls are streamed into a hidden
//! temp file and renamed into place once the body is complete, so a page
//! file on disk is always whole.

use crate::error::{PagekeepError, Result};
use crate::file::paths::{extension_from_url, page_file_name, sniff_image_extension};
use crate::file::DownloadStore;
use crate::models::{ImageData, Series};
use crate::source::ContentSource;
use futures_util::StreamExt;
use reqwest::Client;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const DEFAULT_EXTENSION: &str = "jpg";

/// Where and how a page should be written
#[derive(Debug, Clone)]
pub struct PageTarget<'a> {
    pub chapter_dir: &'a Path,
    /// 1-based page index
    pub index: usize,
    pub total: usize,
    pub padding: usize,
}

impl PageTarget<'_> {
    pub fn file_name(&self, extension: &str) -> String {
        page_file_name(self.index, self.total, self.padding, extension)
    }
}

/// Run `fut`, failing with [`PagekeepError::Timeout`] after `limit`
pub async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| PagekeepError::Timeout(limit.as_secs()))?,
        None => fut.await,
    }
}

/// Resolve one page through its source and write it to disk
pub async fn download_page(
    client: &Client,
    store: &DownloadStore,
    source: &dyn ContentSource,
    series: &Series,
    page_url: &str,
    target: &PageTarget<'_>,
) -> Result<PathBuf> {
    match source.get_image(series, page_url).await? {
        ImageData::Bytes(data) => {
            if data.is_empty() {
                return Err(PagekeepError::InvalidPageData(format!(
                    "Empty image for page {}",
                    target.index
                )));
            }
            let extension = extension_from_url(page_url)
                .or_else(|| sniff_image_extension(&data).map(str::to_string))
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
            store
                .write_page(target.chapter_dir, &target.file_name(&extension), &data)
                .await
        }
        ImageData::Url(remote) => {
            let hint = extension_from_url(page_url);
            fetch_remote_page(client, store, &remote, hint, target).await
        }
    }
}

/// Stream a remote image into the chapter directory
pub async fn fetch_remote_page(
    client: &Client,
    store: &DownloadStore,
    url: &str,
    extension_hint: Option<String>,
    target: &PageTarget<'_>,
) -> Result<PathBuf> {
    let parsed = url::Url::parse(url)?;
    let response = client.get(parsed).send().await.map_err(|e| {
        PagekeepError::network_error(format!("Request failed: {}", e), true)
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PagekeepError::UnexpectedStatusCode {
            status_code: status.as_u16(),
            url: url.to_string(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let extension = extension_from_url(url)
        .or(extension_hint)
        .or_else(|| content_type.as_deref().and_then(extension_from_content_type).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    store.ensure_directory_exists(target.chapter_dir).await?;
    let path = target.chapter_dir.join(target.file_name(&extension));
    let temp_path = DownloadStore::temp_path_for(&path);

    if let Err(e) = stream_to_file(response, &temp_path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    store.commit_temp(&temp_path, &path).await?;
    Ok(path)
}

async fn stream_to_file(response: reqwest::Response, temp_path: &Path) -> Result<u64> {
    let mut file = fs::File::create(temp_path).await.map_err(|e| {
        PagekeepError::FileIoError(format!("Failed to create {}: {}", temp_path.display(), e))
    })?;

    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PagekeepError::NetworkError {
            message: format!("Stream error: {}", e),
            is_transient: true,
        })?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;

    if written == 0 {
        return Err(PagekeepError::InvalidPageData("Empty response body".to_string()));
    }
    Ok(written)
}

/// File extension for an image mime type
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match mime.as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/avif" => Some("avif"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}
