//! Desirability scores for peer folders.
//!
//! Transfer quality dominates: an open slot and link speed can add up to 150
//! points, while every metadata and format term together stays below 45. A
//! fast peer with a free slot therefore always beats a slow or busy one; among
//! comparable peers the folder/file name match decides, then the container.

use std::collections::BTreeSet;

use crate::soulseek::candidate::ListingGroup;
use crate::soulseek::filename::title_stem;
use crate::soulseek::listing::NormalizedListing;
use crate::soulseek::types::PreferredFormat;

/// Single-track weights.
pub mod track_weights {
    pub const FOLDER_HAS_ARTIST: i32 = 1;
    pub const FOLDER_HAS_ALBUM: i32 = 1;
    pub const EVERYTHING_MATCHES: i32 = 20;
    pub const TITLE_EXACT: i32 = 15;
    pub const TITLE_PARTIAL: i32 = 5;
    pub const PREFERRED_FORMAT: i32 = 4;
    pub const FLAC: i32 = 3;
    pub const WAV: i32 = 2;
    pub const MP3_320: i32 = 2;
    pub const MP3_256: i32 = 1;
    pub const LARGE_FOLDER: i32 = 2;
    pub const LARGE_FOLDER_MIN_FILES: usize = 6;
    pub const OPEN_SLOT: i32 = 100;
    pub const MAX_SPEED_BONUS: i32 = 50;
    pub const NO_SLOT_PENALTY: i32 = -30;
    pub const SLOW_LINK_PENALTY: i32 = -10;
    pub const SLOW_LINK_KBPS: f64 = 100.0;
}

/// Album weights.
pub mod album_weights {
    pub const FOLDER_HAS_ARTIST: i32 = 10;
    pub const FOLDER_HAS_ALBUM: i32 = 15;
    pub const TRACK_COUNT_CLOSE: i32 = 15;
    pub const TRACK_COUNT_CLOSE_DIFF: usize = 2;
    pub const TRACK_COUNT_NEAR: i32 = 8;
    pub const TRACK_COUNT_NEAR_DIFF: usize = 5;
    pub const PREFERRED_FORMAT: i32 = 20;
    pub const CONSISTENT_FORMAT: i32 = 2;
    pub const FLAC: i32 = 8;
    pub const WAV: i32 = 5;
    pub const MIXED_FORMATS: i32 = -5;
    pub const MAX_SPEED_BONUS: i32 = 10;
    pub const OPEN_SLOT: i32 = 5;
}

/// +1 per 1000 kbps, capped.
fn speed_bonus(speed_kbps: f64, cap: i32) -> i32 {
    let bonus = (speed_kbps / 1000.0).floor();
    if bonus <= 0.0 {
        0
    } else {
        (bonus as i32).min(cap)
    }
}

fn contains_term(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.contains(needle)
}

/// What a single-track request asks for, lowercased for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackCriteria {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub preferred_format: PreferredFormat,
}

impl TrackCriteria {
    pub fn new(artist: &str, title: &str, album: &str, preferred_format: PreferredFormat) -> Self {
        Self {
            artist: artist.trim().to_lowercase(),
            title: title.trim().to_lowercase(),
            album: album.trim().to_lowercase(),
            preferred_format,
        }
    }
}

/// What an album request asks for, lowercased for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumCriteria {
    pub artist: String,
    pub album: String,
    pub expected_track_count: usize,
    pub preferred_format: PreferredFormat,
}

impl AlbumCriteria {
    pub fn new(
        artist: &str,
        album: &str,
        expected_track_count: usize,
        preferred_format: PreferredFormat,
    ) -> Self {
        Self {
            artist: artist.trim().to_lowercase(),
            album: album.trim().to_lowercase(),
            expected_track_count,
            preferred_format,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackCandidate {
    pub peer_id: String,
    pub folder_name: String,
    pub listings: Vec<NormalizedListing>,
    pub score: i32,
    pub best_match: NormalizedListing,
    pub has_open_slot: bool,
    pub link_speed_kbps: Option<f64>,
    pub queue_length: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumCandidate {
    pub peer_id: String,
    pub folder_name: String,
    pub score: i32,
    /// Audio files only, sorted by file name. The order is a guess.
    pub tracks: Vec<NormalizedListing>,
    pub file_extensions_seen: BTreeSet<String>,
    pub has_open_slot: bool,
    pub link_speed_kbps: Option<f64>,
    /// Shortest upload queue advertised for any track.
    pub queue_length: u32,
}

/// Picks the listing in a folder most likely to be the requested track.
///
/// The first listing whose name contains the title wins; otherwise the one
/// ranked first by format match, open slot, then speed.
pub fn pick_best_match<'a>(
    audio: &[&'a NormalizedListing],
    criteria: &TrackCriteria,
) -> Option<&'a NormalizedListing> {
    if let Some(hit) = audio
        .iter()
        .copied()
        .find(|l| contains_term(&l.file_name, &criteria.title))
    {
        return Some(hit);
    }

    let wanted_ext = criteria.preferred_format.extension();
    audio.iter().copied().min_by(|a, b| {
        let a_format = wanted_ext == Some(a.extension.as_str());
        let b_format = wanted_ext == Some(b.extension.as_str());
        b_format
            .cmp(&a_format)
            .then_with(|| b.listing.has_open_slot.cmp(&a.listing.has_open_slot))
            .then_with(|| {
                b.listing
                    .link_speed_kbps
                    .unwrap_or(0)
                    .cmp(&a.listing.link_speed_kbps.unwrap_or(0))
            })
    })
}

fn quality_bonus(listing: &NormalizedListing) -> i32 {
    match listing.extension.as_str() {
        "flac" => track_weights::FLAC,
        "wav" => track_weights::WAV,
        "mp3" => match listing.listing.bitrate_kbps {
            Some(bitrate) if bitrate >= 320 => track_weights::MP3_320,
            Some(bitrate) if bitrate >= 256 => track_weights::MP3_256,
            _ => 0,
        },
        _ => 0,
    }
}

/// Scores one peer folder for a single-track request.
///
/// Returns `None` when the folder holds no audio file at all.
pub fn score_track_candidate(group: ListingGroup, criteria: &TrackCriteria) -> Option<TrackCandidate> {
    let audio: Vec<&NormalizedListing> = group.audio_listings().collect();
    let best_match = pick_best_match(&audio, criteria)?.clone();

    let has_open_slot = group.has_open_slot();
    let link_speed_kbps = group.average_speed_kbps();
    let folder = group.folder_name.as_str();

    let mut score = 0;

    // --- Transfer quality ---
    if has_open_slot {
        score += track_weights::OPEN_SLOT;
    } else {
        score += track_weights::NO_SLOT_PENALTY;
    }
    if let Some(speed) = link_speed_kbps {
        score += speed_bonus(speed, track_weights::MAX_SPEED_BONUS);
        if speed < track_weights::SLOW_LINK_KBPS {
            score += track_weights::SLOW_LINK_PENALTY;
        }
    }

    // --- Metadata ---
    let artist_in_folder = contains_term(folder, &criteria.artist);
    let album_in_folder = contains_term(folder, &criteria.album);
    let title_in_file = contains_term(&best_match.file_name, &criteria.title);

    if artist_in_folder {
        score += track_weights::FOLDER_HAS_ARTIST;
    }
    if album_in_folder {
        score += track_weights::FOLDER_HAS_ALBUM;
    }
    if artist_in_folder && album_in_folder && title_in_file {
        score += track_weights::EVERYTHING_MATCHES;
    }
    if !criteria.title.is_empty() && title_stem(&best_match.file_name) == criteria.title {
        score += track_weights::TITLE_EXACT;
    } else if title_in_file {
        score += track_weights::TITLE_PARTIAL;
    }

    // --- Format ---
    match criteria.preferred_format.extension() {
        Some(ext) if best_match.extension == ext => score += track_weights::PREFERRED_FORMAT,
        Some(_) => {}
        None => score += quality_bonus(&best_match),
    }
    if group.listings.len() >= track_weights::LARGE_FOLDER_MIN_FILES {
        score += track_weights::LARGE_FOLDER;
    }

    Some(TrackCandidate {
        peer_id: group.peer_id,
        folder_name: group.folder_name,
        listings: group.listings,
        score,
        queue_length: best_match.listing.queue_length,
        best_match,
        has_open_slot,
        link_speed_kbps,
    })
}

/// Scores one peer folder as a whole-album source.
///
/// Returns `None` for disqualified folders: fewer than half the expected
/// tracks, no audio at all, or a non-positive score.
pub fn score_album_candidate(group: ListingGroup, criteria: &AlbumCriteria) -> Option<AlbumCandidate> {
    let expected = criteria.expected_track_count;

    if group.listings.len() * 2 < expected {
        log::trace!(
            "Skipping '{}': {} files for {} expected tracks",
            group.key(),
            group.listings.len(),
            expected
        );
        return None;
    }

    let mut tracks: Vec<NormalizedListing> = group.audio_listings().cloned().collect();
    if tracks.is_empty() || tracks.len() * 2 < expected {
        log::trace!(
            "Disqualified '{}': {} audio files for {} expected tracks",
            group.key(),
            tracks.len(),
            expected
        );
        return None;
    }
    tracks.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let file_extensions_seen: BTreeSet<String> = group
        .listings
        .iter()
        .filter(|l| !l.extension.is_empty())
        .map(|l| l.extension.clone())
        .collect();
    let audio_extensions: BTreeSet<&str> = tracks.iter().map(|t| t.extension.as_str()).collect();

    let has_open_slot = group.has_open_slot();
    let link_speed_kbps = group.average_speed_kbps();
    let folder = group.folder_name.as_str();

    let mut score = 0;

    if contains_term(folder, &criteria.artist) {
        score += album_weights::FOLDER_HAS_ARTIST;
    }
    if contains_term(folder, &criteria.album) {
        score += album_weights::FOLDER_HAS_ALBUM;
    }

    let count_diff = tracks.len().abs_diff(expected);
    if count_diff <= album_weights::TRACK_COUNT_CLOSE_DIFF {
        score += album_weights::TRACK_COUNT_CLOSE;
    } else if count_diff <= album_weights::TRACK_COUNT_NEAR_DIFF {
        score += album_weights::TRACK_COUNT_NEAR;
    }

    let mut extensions = audio_extensions.iter();
    match (extensions.next(), extensions.next()) {
        (Some(&only), None) => {
            if criteria.preferred_format.extension() == Some(only) {
                score += album_weights::PREFERRED_FORMAT;
            } else {
                score += album_weights::CONSISTENT_FORMAT;
                if criteria.preferred_format.is_any() {
                    score += match only {
                        "flac" => album_weights::FLAC,
                        "wav" => album_weights::WAV,
                        _ => 0,
                    };
                }
            }
        }
        (Some(_), Some(_)) => score += album_weights::MIXED_FORMATS,
        _ => {}
    }

    if let Some(speed) = link_speed_kbps {
        score += speed_bonus(speed, album_weights::MAX_SPEED_BONUS);
    }
    if has_open_slot {
        score += album_weights::OPEN_SLOT;
    }

    if score <= 0 {
        log::trace!("Disqualified '{}': score {}", group.key(), score);
        return None;
    }

    let queue_length = tracks
        .iter()
        .map(|t| t.listing.queue_length)
        .min()
        .unwrap_or_default();

    Some(AlbumCandidate {
        peer_id: group.peer_id,
        folder_name: group.folder_name,
        score,
        queue_length,
        tracks,
        file_extensions_seen,
        has_open_slot,
        link_speed_kbps,
    })
}
