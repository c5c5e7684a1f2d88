use std::path::{Path, PathBuf};

use crate::ports::soulseek::{SearchTransport, TransferPrimitive};
use crate::services::fetch::{FetchError, FetchService, ProgressSink};
use crate::soulseek::filename::{
    destination_directory, extract_track_title, has_track_number_prefix, sanitize_file_name,
};
use crate::soulseek::ranking::select_album_candidates;
use crate::soulseek::scoring::{AlbumCandidate, AlbumCriteria};
use crate::soulseek::types::PreferredFormat;

/// Progress reserved for searching and ranking; tracks share the rest.
const ALBUM_BASE_PERCENT: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedTrack {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumRequest {
    pub artist: String,
    pub album: String,
    /// In album order. Only the count and names are used.
    pub expected_tracks: Vec<ExpectedTrack>,
    pub preferred_format: PreferredFormat,
    pub download_dir: PathBuf,
    pub organize: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedTrack {
    pub title: String,
    pub path: PathBuf,
    /// Position in the source folder, sorted by file name.
    pub track_index: usize,
}

/// How much the order of `AlbumDownload::tracks` can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOrdering {
    /// Every file name started with a track number.
    NumberedFileNames,
    /// Plain file name order.
    Unverified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumDownload {
    pub directory: PathBuf,
    pub tracks: Vec<DownloadedTrack>,
    pub source_candidate: AlbumCandidate,
    pub succeeded: usize,
    pub total: usize,
    pub ordering: TrackOrdering,
}

/// At least 80% of the source's tracks made it.
fn meets_threshold(succeeded: usize, total: usize) -> bool {
    total > 0 && 5 * succeeded >= 4 * total
}

fn track_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return ALBUM_BASE_PERCENT as u8;
    }
    (ALBUM_BASE_PERCENT + (100 - ALBUM_BASE_PERCENT) * done / total) as u8
}

/// Files written by one album attempt, kept so a rejected attempt can be undone.
#[derive(Debug, Default)]
struct AttemptOutcome {
    tracks: Vec<DownloadedTrack>,
    /// Only files that did not exist before the attempt.
    written: Vec<PathBuf>,
}

impl AttemptOutcome {
    async fn discard(self) {
        for path in self.written {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                log::warn!("Failed to remove partial download {}: {}", path.display(), e);
            }
        }
    }
}

impl<S: SearchTransport, T: TransferPrimitive> FetchService<S, T> {
    /// Finds a peer folder holding the album and downloads every track from it.
    ///
    /// A source is accepted once 80% of its tracks transferred. Otherwise the
    /// files it wrote are removed and the next ranked folder is tried.
    pub async fn find_and_download_album(
        &self,
        request: &AlbumRequest,
        progress: &ProgressSink,
    ) -> Result<AlbumDownload, FetchError> {
        log::info!(
            "Fetching album '{}' by '{}' ({} expected tracks, format: {})",
            request.album,
            request.artist,
            request.expected_tracks.len(),
            request.preferred_format
        );
        progress.emit(0, "Searching...");

        let queries = self.queries.album_queries(&request.artist, &request.album);
        let listings = self
            .search_levels(&queries, self.options.album_search_timeout)
            .await?;

        let criteria = AlbumCriteria::new(
            &request.artist,
            &request.album,
            request.expected_tracks.len(),
            request.preferred_format.clone(),
        );
        let candidates = select_album_candidates(&listings, &criteria);
        if candidates.is_empty() {
            log::warn!("{} listings, but no usable album folders", listings.len());
            return Err(FetchError::NoScoredCandidates);
        }
        progress.emit(10, "Found album sources...");

        let directory = destination_directory(
            &request.download_dir,
            &request.artist,
            &request.album,
            request.organize,
        );
        tokio::fs::create_dir_all(&directory).await?;

        let attempts = candidates.len().min(self.options.max_album_attempts);
        for (attempt, candidate) in candidates.into_iter().take(attempts).enumerate() {
            log::info!(
                "Album attempt {}/{}: '{}' from '{}' ({} tracks, score {})",
                attempt + 1,
                attempts,
                candidate.folder_name,
                candidate.peer_id,
                candidate.tracks.len(),
                candidate.score
            );
            progress.emit(
                ALBUM_BASE_PERCENT as u8,
                format!("Downloading album from {}...", candidate.peer_id),
            );

            let outcome = self
                .download_album_tracks(&candidate, request, &directory, progress)
                .await?;
            let succeeded = outcome.tracks.len();
            let total = candidate.tracks.len();

            if meets_threshold(succeeded, total) {
                let ordering = if outcome.tracks.iter().all(|t| {
                    has_track_number_prefix(candidate.tracks[t.track_index].original_file_name())
                }) {
                    TrackOrdering::NumberedFileNames
                } else {
                    TrackOrdering::Unverified
                };
                log::info!(
                    "Album complete: {}/{} tracks from '{}'",
                    succeeded,
                    total,
                    candidate.peer_id
                );
                progress.emit(100, format!("Downloaded {}/{} tracks", succeeded, total));
                return Ok(AlbumDownload {
                    directory,
                    tracks: outcome.tracks,
                    source_candidate: candidate,
                    succeeded,
                    total,
                    ordering,
                });
            }

            log::warn!(
                "Only {}/{} tracks from '{}', trying the next source",
                succeeded,
                total,
                candidate.peer_id
            );
            outcome.discard().await;
            self.backoff(attempt, attempts).await;
        }

        log::error!("No album source met the threshold after {} attempts", attempts);
        Err(FetchError::AlbumThresholdNotMet { attempts })
    }

    /// Transfers every track of one candidate in order, skipping failures.
    async fn download_album_tracks(
        &self,
        candidate: &AlbumCandidate,
        request: &AlbumRequest,
        directory: &Path,
        progress: &ProgressSink,
    ) -> Result<AttemptOutcome, FetchError> {
        let mut outcome = AttemptOutcome::default();
        let total = candidate.tracks.len();

        // Checked before any transfer, so an error here leaves nothing to undo
        let mut preexisting = Vec::with_capacity(total);
        for track in &candidate.tracks {
            let destination = directory.join(sanitize_file_name(track.original_file_name()));
            preexisting.push(tokio::fs::try_exists(&destination).await?);
        }

        for (index, track) in candidate.tracks.iter().enumerate() {
            let original_name = track.original_file_name();
            let destination = directory.join(sanitize_file_name(original_name));
            let existed = preexisting[index];
            let title = extract_track_title(
                original_name,
                request.expected_tracks.get(index).map(|t| t.name.as_str()),
            );
            let percent = track_percent(index, total);
            progress.emit(percent, format!("Track {}/{}: {}", index + 1, total, title));

            let downloaded = DownloadedTrack {
                title,
                path: destination.clone(),
                track_index: index,
            };

            if existed && !self.options.overwrite_existing {
                log::info!("Already downloaded: {}", destination.display());
                outcome.tracks.push(downloaded);
                continue;
            }

            let result = self
                .transfer_with_progress(&track.listing, &destination, |state| {
                    progress.emit(
                        percent,
                        format!("Track {}/{}: {}", index + 1, total, state.label()),
                    );
                })
                .await;
            match result {
                Ok(bytes) => {
                    log::debug!("Saved {} ({} bytes)", destination.display(), bytes);
                    if !existed {
                        outcome.written.push(destination);
                    }
                    outcome.tracks.push(downloaded);
                }
                Err(e) => {
                    log::warn!("Track {}/{} failed: {}", index + 1, total, e);
                }
            }
        }

        Ok(outcome)
    }
}
