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


//! Download path naming
//!
//! # Layout
//! ```text
//! <downloads>/<series title or series id>/Chapter <number> - <chapter id>/<pages>
//! ```
//! - Series directories are keyed by the sanitized title; older downloads may
//!   be keyed by the series id instead, so lookups check both
//! - Chapter directory names always embed the chapter id; that substring is
//!   the only link between a directory and a chapter
//! - Page files are named by index and sorted naturally

use crate::models::{Chapter, Series};
use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

// Platform-specific component limit (bytes, UTF-8)
const MAX_COMPONENT_LENGTH: usize = 255;

/// Name of the completion marker written inside a finished chapter directory
pub const COMPLETION_MARKER: &str = ".pagekeep.json";

/// Extensions recognized as page images
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp"];

lazy_static! {
    static ref CHAPTER_ID_REGEX: Regex = Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}"
    )
    .expect("chapter id pattern is valid");
    static ref CHAPTER_NUMBER_REGEX: Regex =
        Regex::new(r"(\d+(?:\.\d+)?)").expect("chapter number pattern is valid");
}

/// Series directory keyed by title (falls back to the id when the title
/// sanitizes to nothing)
pub fn series_title_dir_name(series: &Series) -> String {
    let sanitized = sanitize_path_component(&series.title);
    if sanitized.is_empty() {
        series_id_dir_name(series)
    } else {
        truncate_component(&sanitized, MAX_COMPONENT_LENGTH)
    }
}

/// Series directory keyed by id (historical naming)
pub fn series_id_dir_name(series: &Series) -> String {
    truncate_component(&sanitize_path_component(&series.id), MAX_COMPONENT_LENGTH)
}

/// Candidate series directories under the downloads root, title-keyed first
pub fn series_dir_candidates(series: &Series, downloads_dir: &Path) -> Vec<PathBuf> {
    let title_dir = downloads_dir.join(series_title_dir_name(series));
    let id_dir = downloads_dir.join(series_id_dir_name(series));
    if title_dir == id_dir {
        vec![title_dir]
    } else {
        vec![title_dir, id_dir]
    }
}

/// Fresh chapter directory name: `Chapter {number} - {id}`
///
/// The id is appended after truncation so it always survives intact.
pub fn chapter_dir_name(chapter: &Chapter) -> String {
    let number = sanitize_path_component(chapter.chapter_number.trim());
    let number = if number.is_empty() { "？".to_string() } else { number };
    let id = sanitize_path_component(&chapter.id);
    let suffix = format!(" - {}", id);
    let prefix = truncate_component(
        &format!("Chapter {}", number),
        MAX_COMPONENT_LENGTH.saturating_sub(suffix.len()),
    );
    format!("{}{}", prefix, suffix)
}

/// Whether a chapter directory name embeds this chapter's id
///
/// The id is compared in its sanitized form (as written by
/// [`chapter_dir_name`]) and must stand alone, so `c1` doesn't match `c10`.
pub fn dir_name_matches_chapter(dir_name: &str, chapter: &Chapter) -> bool {
    let id = sanitize_path_component(&chapter.id).to_lowercase();
    if id.is_empty() {
        return false;
    }

    let name = dir_name.to_lowercase();
    name.match_indices(id.as_str()).any(|(start, matched)| {
        let before = name[..start].chars().next_back();
        let after = name[start + matched.len()..].chars().next();
        !before.map_or(false, is_id_char) && !after.map_or(false, is_id_char)
    })
}

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Extract the embedded chapter id from a chapter directory name
pub fn extract_chapter_id(dir_name: &str) -> Option<String> {
    CHAPTER_ID_REGEX
        .find_iter(dir_name)
        .last()
        .map(|m| m.as_str().to_lowercase())
}

/// First number in a directory/file name (used for chapter numbers of local folders)
pub fn parse_chapter_number(name: &str) -> Option<String> {
    CHAPTER_NUMBER_REGEX
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| {
            let raw = m.as_str();
            // "007" -> "7", "07.5" -> "7.5"
            let trimmed = raw.trim_start_matches('0');
            if trimmed.is_empty() || trimmed.starts_with('.') {
                format!("0{}", trimmed)
            } else {
                trimmed.to_string()
            }
        })
}

/// Page file name for a 1-based index, zero padded to at least `padding`
/// digits (and to the width of `total`)
pub fn page_file_name(index: usize, total: usize, padding: usize, extension: &str) -> String {
    let width = padding.max(total.to_string().len());
    format!("{:0>width$}.{}", index, extension, width = width)
}

/// File extension from a page url path, if it is a known image extension
pub fn extension_from_url(page_url: &str) -> Option<String> {
    let path = match url::Url::parse(page_url) {
        Ok(parsed) => parsed.path().to_string(),
        // Relative or filesystem paths
        Err(_) => page_url.split(['?', '#']).next().unwrap_or("").to_string(),
    };

    Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

/// Image extension from magic bytes
pub fn sniff_image_extension(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("png")
    } else if data.starts_with(b"GIF8") {
        Some("gif")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("webp")
    } else if data.len() >= 12 && &data[4..8] == b"ftyp" && (&data[8..12] == b"avif" || &data[8..12] == b"avis") {
        Some("avif")
    } else if data.starts_with(b"BM") {
        Some("bmp")
    } else {
        None
    }
}

/// Whether a file name looks like a page image
pub fn is_page_file(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Natural ordering: digit runs compare numerically ("2.jpg" < "10.jpg")
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let mut na = String::new();
                while let Some(c) = a_chars.peek().copied().filter(|c| c.is_ascii_digit()) {
                    na.push(c);
                    a_chars.next();
                }
                let mut nb = String::new();
                while let Some(c) = b_chars.peek().copied().filter(|c| c.is_ascii_digit()) {
                    nb.push(c);
                    b_chars.next();
                }
                let ta = na.trim_start_matches('0');
                let tb = nb.trim_start_matches('0');
                let ord = ta.len().cmp(&tb.len()).then_with(|| ta.cmp(tb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.to_lowercase().cmp(cb.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a_chars.next();
                b_chars.next();
            }
        }
    }
}

/// Get default downloads path for the platform
pub fn get_default_downloads_path() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let mut path = PathBuf::from(home);
            path.push("Library");
            path.push("Application Support");
            path.push("Pagekeep");
            path.push("Downloads");
            return path;
        }
        return PathBuf::from("./downloads");
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let mut path = PathBuf::from(home);
            path.push(".local");
            path.push("share");
            path.push("pagekeep");
            path.push("downloads");
            return path;
        }
        return PathBuf::from("./downloads");
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            let mut path = PathBuf::from(appdata);
            path.push("Pagekeep");
            path.push("Downloads");
            return path;
        }
        return PathBuf::from("./downloads");
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("./downloads")
    }
}

/// Sanitize path component (directory name)
///
/// Slashes are dropped, characters illegal on common filesystems replaced.
pub fn sanitize_path_component(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == '/' || c == '\\' {
            continue;
        }
        let prev_char = if i > 0 { Some(chars[i - 1]) } else { None };
        let next_char = chars.get(i + 1).copied();
        result.push(replace_char(c, prev_char, next_char));
    }

    // Trim leading/trailing whitespace and dots
    result = result.trim().trim_end_matches('.').trim().to_string();

    if cfg!(target_os = "windows") {
        result = handle_windows_reserved_names(&result);
    }

    result
}

/// Replace invalid character with safe alternative
fn replace_char(c: char, prev_char: Option<char>, next_char: Option<char>) -> char {
    if c == '"' {
        // Opening quote: at start or after non-alphanumeric
        if prev_char.is_none()
            || prev_char.map_or(false, |p| !p.is_alphanumeric() && next_char.map_or(false, |n| n.is_alphanumeric()))
        {
            return '\u{201C}';
        } else if next_char.is_none()
            || next_char.map_or(false, |n| !n.is_alphanumeric() && prev_char.map_or(false, |p| p.is_alphanumeric()))
        {
            return '\u{201D}';
        }
        return '＂';
    }

    match c {
        '<' => '＜',
        '>' => '＞',
        ':' => '_',
        '|' => '⏐',
        '?' => '？',
        '*' => '✱',
        '\0' => '_',
        c if c.is_control() => '_',
        c => c,
    }
}

/// Handle Windows reserved filenames
fn handle_windows_reserved_names(name: &str) -> String {
    let upper = name.to_uppercase();
    let reserved = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    for reserved_name in &reserved {
        if upper == *reserved_name || upper.starts_with(&format!("{}.", reserved_name)) {
            return format!("_{}", name);
        }
    }

    name.to_string()
}

/// Truncate path component to fit within byte limit
pub fn truncate_component(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut index = max_bytes;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }

    text[..index].trim_end().to_string()
}
