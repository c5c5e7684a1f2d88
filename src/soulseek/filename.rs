use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Leading track numbers like "01 - ", "1.", "03) ", "12] ".
static TRACK_NUMBER_SEPARATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s*[-–—.)\]]\s*").expect("valid track number regex"));
/// Leading track numbers followed only by whitespace, "01 Title".
static TRACK_NUMBER_SPACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s+").expect("valid track number regex"));

const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces characters that are unsafe in a local file name with `-`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if INVALID_FILE_NAME_CHARS.contains(&c) {
                '-'
            } else {
                c
            }
        })
        .collect()
}

/// `{root}/{artist}/{album}` when organizing, `{root}` otherwise.
pub fn destination_directory(root: &Path, artist: &str, album: &str, organize: bool) -> PathBuf {
    if !organize {
        return root.to_path_buf();
    }
    let mut dir = root.to_path_buf();
    for part in [artist, album] {
        let part = sanitize_file_name(part.trim());
        if !part.is_empty() {
            dir.push(part);
        }
    }
    dir
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => &file_name[..dot_pos],
        _ => file_name,
    }
}

/// Strips a leading track number prefix. Returns the input when there is none.
pub fn strip_track_number(name: &str) -> &str {
    if let Some(m) = TRACK_NUMBER_SEPARATED.find(name) {
        return &name[m.end()..];
    }
    if let Some(m) = TRACK_NUMBER_SPACED.find(name) {
        return &name[m.end()..];
    }
    name
}

pub fn has_track_number_prefix(file_name: &str) -> bool {
    let stem = strip_extension(file_name);
    strip_track_number(stem).len() < stem.len()
}

/// File name with extension and track number removed, for comparing against a title.
pub fn title_stem(file_name: &str) -> &str {
    strip_track_number(strip_extension(file_name)).trim()
}

/// Human title for a downloaded album track.
///
/// Falls back to the expected track name, then the raw file name.
pub fn extract_track_title(file_name: &str, expected_name: Option<&str>) -> String {
    let without_ext = strip_extension(file_name);
    let mut cleaned = strip_track_number(without_ext).trim();
    if cleaned.chars().count() < 3 && without_ext.len() > cleaned.len() {
        cleaned = without_ext.trim();
    }
    if !cleaned.is_empty() {
        return cleaned.to_string();
    }
    match expected_name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => file_name.to_string(),
    }
}
