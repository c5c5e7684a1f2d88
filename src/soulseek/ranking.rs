use std::cmp::Ordering;
use std::collections::HashSet;

use crate::soulseek::candidate::group_listings;
use crate::soulseek::listing::{NormalizedListing, normalize_listing};
use crate::soulseek::scoring::{
    AlbumCandidate, AlbumCriteria, TrackCandidate, TrackCriteria, score_album_candidate,
    score_track_candidate,
};
use crate::soulseek::types::FileListing;

// ============================================================================
// Ordering
// ============================================================================

/// Score desc, speed desc, open slot first, shorter queue, then peer and
/// folder ascending so equal candidates always come out in the same order.
fn compare_candidates(
    a: (i32, Option<f64>, bool, u32, &str, &str),
    b: (i32, Option<f64>, bool, u32, &str, &str),
) -> Ordering {
    b.0.cmp(&a.0)
        .then_with(|| b.1.unwrap_or(0.0).total_cmp(&a.1.unwrap_or(0.0)))
        .then_with(|| b.2.cmp(&a.2))
        .then_with(|| a.3.cmp(&b.3))
        .then_with(|| a.4.cmp(b.4))
        .then_with(|| a.5.cmp(b.5))
}

fn track_sort_key(c: &TrackCandidate) -> (i32, Option<f64>, bool, u32, &str, &str) {
    (
        c.score,
        c.link_speed_kbps,
        c.has_open_slot,
        c.queue_length,
        &c.peer_id,
        &c.folder_name,
    )
}

fn album_sort_key(c: &AlbumCandidate) -> (i32, Option<f64>, bool, u32, &str, &str) {
    (
        c.score,
        c.link_speed_kbps,
        c.has_open_slot,
        c.queue_length,
        &c.peer_id,
        &c.folder_name,
    )
}

/// Drops non-positive candidates and orders the rest best first.
pub fn rank_track_candidates(mut candidates: Vec<TrackCandidate>) -> Vec<TrackCandidate> {
    candidates.retain(|c| c.score > 0);
    candidates.sort_by(|a, b| compare_candidates(track_sort_key(a), track_sort_key(b)));
    candidates
}

/// Drops non-positive candidates and orders the rest best first.
pub fn rank_album_candidates(mut candidates: Vec<AlbumCandidate>) -> Vec<AlbumCandidate> {
    candidates.retain(|c| c.score > 0);
    candidates.sort_by(|a, b| compare_candidates(album_sort_key(a), album_sort_key(b)));
    candidates
}

// ============================================================================
// Selection pipeline
// ============================================================================

/// Normalizes listings, dropping repeats of the same file from the same peer.
fn unique_normalized(listings: &[FileListing]) -> Vec<NormalizedListing> {
    let mut seen: HashSet<String> = HashSet::new();
    listings
        .iter()
        .filter(|l| seen.insert(format!("{}::{}", l.peer_id, l.remote_path)))
        .map(normalize_listing)
        .collect()
}

/// Raw listings to ranked single-track candidates.
pub fn select_track_candidates(
    listings: &[FileListing],
    criteria: &TrackCriteria,
) -> Vec<TrackCandidate> {
    let groups = group_listings(unique_normalized(listings));
    let scored: Vec<TrackCandidate> = groups
        .into_iter()
        .filter_map(|g| score_track_candidate(g, criteria))
        .collect();
    let ranked = rank_track_candidates(scored);

    for (i, c) in ranked.iter().take(3).enumerate() {
        log::debug!(
            "Track candidate #{}: {}::{} score={} file='{}'",
            i + 1,
            c.peer_id,
            c.folder_name,
            c.score,
            c.best_match.file_name
        );
    }
    ranked
}

/// Raw listings to ranked album candidates.
pub fn select_album_candidates(
    listings: &[FileListing],
    criteria: &AlbumCriteria,
) -> Vec<AlbumCandidate> {
    let groups = group_listings(unique_normalized(listings));
    let scored: Vec<AlbumCandidate> = groups
        .into_iter()
        .filter_map(|g| score_album_candidate(g, criteria))
        .collect();
    let ranked = rank_album_candidates(scored);

    for (i, c) in ranked.iter().take(3).enumerate() {
        log::debug!(
            "Album candidate #{}: {}::{} score={} tracks={}",
            i + 1,
            c.peer_id,
            c.folder_name,
            c.score,
            c.tracks.len()
        );
    }
    ranked
}
