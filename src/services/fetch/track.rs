use std::path::PathBuf;

use crate::ports::soulseek::{SearchTransport, TransferPrimitive};
use crate::services::fetch::{FetchError, FetchService, ProgressSink};
use crate::soulseek::filename::{destination_directory, sanitize_file_name};
use crate::soulseek::ranking::select_track_candidates;
use crate::soulseek::scoring::{TrackCandidate, TrackCriteria};
use crate::soulseek::types::PreferredFormat;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackRequest {
    pub artist: String,
    pub title: String,
    /// May be empty; the search then relies on artist and title alone.
    pub album: String,
    pub preferred_format: PreferredFormat,
    pub download_dir: PathBuf,
    /// Place the file under `{artist}/{album}` inside `download_dir`.
    pub organize: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackDownload {
    pub path: PathBuf,
    pub source_candidate: TrackCandidate,
    /// The file was already on disk and nothing was transferred.
    pub already_present: bool,
}

impl<S: SearchTransport, T: TransferPrimitive> FetchService<S, T> {
    /// Finds the best source for one track and downloads it.
    ///
    /// Candidates are tried in rank order, at most `max_track_attempts` of
    /// them, with `retry_backoff` between failures.
    pub async fn find_and_download_track(
        &self,
        request: &TrackRequest,
        progress: &ProgressSink,
    ) -> Result<TrackDownload, FetchError> {
        log::info!(
            "Fetching track '{}' by '{}' (album: '{}', format: {})",
            request.title,
            request.artist,
            request.album,
            request.preferred_format
        );
        progress.emit(0, "Searching...");

        let queries = self
            .queries
            .track_queries(&request.artist, &request.title, &request.album);
        let listings = self
            .search_levels(&queries, self.options.search_timeout)
            .await?;
        progress.emit(0, "Found sources...");

        let criteria = TrackCriteria::new(
            &request.artist,
            &request.title,
            &request.album,
            request.preferred_format.clone(),
        );
        let candidates = select_track_candidates(&listings, &criteria);
        if candidates.is_empty() {
            log::warn!("{} listings, but no usable candidates", listings.len());
            return Err(FetchError::NoScoredCandidates);
        }

        let dir = destination_directory(
            &request.download_dir,
            &request.artist,
            &request.album,
            request.organize,
        );
        tokio::fs::create_dir_all(&dir).await?;

        let attempts = candidates.len().min(self.options.max_track_attempts);
        for (attempt, candidate) in candidates.into_iter().take(attempts).enumerate() {
            let file_name = sanitize_file_name(candidate.best_match.original_file_name());
            let destination = dir.join(&file_name);

            if !self.options.overwrite_existing && tokio::fs::try_exists(&destination).await? {
                log::info!("Already downloaded: {}", destination.display());
                progress.emit(100, "Already downloaded");
                return Ok(TrackDownload {
                    path: destination,
                    source_candidate: candidate,
                    already_present: true,
                });
            }

            log::info!(
                "Attempt {}/{}: '{}' from '{}' (score {})",
                attempt + 1,
                attempts,
                candidate.best_match.listing.remote_path,
                candidate.peer_id,
                candidate.score
            );
            progress.emit(0, format!("Downloading from {}...", candidate.peer_id));

            // Failed and aborted states carry no percent; keep the last one
            let mut last_percent = 0;
            let result = self
                .transfer_with_progress(&candidate.best_match.listing, &destination, |state| {
                    if let Some(percent) = state.percent() {
                        last_percent = percent;
                    }
                    progress.emit(last_percent, state.label());
                })
                .await;

            match result {
                Ok(bytes) => {
                    log::info!("Saved {} ({} bytes)", destination.display(), bytes);
                    progress.emit(100, "Completed");
                    return Ok(TrackDownload {
                        path: destination,
                        source_candidate: candidate,
                        already_present: false,
                    });
                }
                Err(e) => {
                    log::warn!("Download attempt {} failed: {}", attempt + 1, e);
                    self.backoff(attempt, attempts).await;
                }
            }
        }

        log::error!("All {} download attempts failed", attempts);
        Err(FetchError::AllDownloadAttemptsFailed { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::soulseek::{MockSearchTransport, MockTransferPrimitive, TransportError};
    use crate::services::fetch::FetchOptions;
    use crate::soulseek::types::TransferState;
    use crate::test_utils::{
        complete_transfer, drain_progress, failed_transfer, peer_listing, test_options,
    };

    fn request(dir: &std::path::Path) -> TrackRequest {
        TrackRequest {
            artist: "Artist A".to_string(),
            title: "Song X".to_string(),
            album: "Album Y".to_string(),
            preferred_format: PreferredFormat::Flac,
            download_dir: dir.to_path_buf(),
            organize: false,
        }
    }

    /// Three peers sharing the track, ranked p1 > p2 > p3 by speed.
    fn three_sources() -> Vec<crate::soulseek::types::FileListing> {
        vec![
            peer_listing("@@x\\Artist A - Album Y\\01 - Song X.flac", "p3", 1000, true),
            peer_listing("@@y\\Artist A - Album Y\\01 - Song X.flac", "p1", 9000, true),
            peer_listing("@@z\\Artist A - Album Y\\01 - Song X.flac", "p2", 5000, true),
        ]
    }

    #[tokio::test]
    async fn test_no_results_queries_each_level_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = MockSearchTransport::new();
        search.expect_search().times(3).returning(|_, _| Ok(vec![]));
        let transfer = MockTransferPrimitive::new();

        let service = FetchService::new(search, transfer, test_options());
        let result = service
            .find_and_download_track(&request(dir.path()), &ProgressSink::disabled())
            .await;
        assert!(matches!(result, Err(FetchError::NoResults)));
    }

    #[tokio::test]
    async fn test_falls_back_to_album_query() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = MockSearchTransport::new();
        search
            .expect_search()
            .withf(|q, _| q == "Artist A Album Y Song X")
            .times(1)
            .returning(|_, _| Ok(vec![]));
        search
            .expect_search()
            .withf(|q, _| q == "Album Y")
            .times(1)
            .returning(|_, _| Ok(three_sources()));
        let mut transfer = MockTransferPrimitive::new();
        transfer
            .expect_transfer()
            .times(1)
            .returning(|_, dest, events| complete_transfer(dest, events));

        let service = FetchService::new(search, transfer, test_options());
        let download = service
            .find_and_download_track(&request(dir.path()), &ProgressSink::disabled())
            .await
            .unwrap();
        assert_eq!(download.source_candidate.peer_id, "p1");
        assert_eq!(download.path, dir.path().join("01 - Song X.flac"));
        assert!(download.path.exists());
    }

    #[tokio::test]
    async fn test_transport_error_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = MockSearchTransport::new();
        search
            .expect_search()
            .times(1)
            .returning(|_, _| Err(TransportError::NotConnected));

        let service = FetchService::new(search, MockTransferPrimitive::new(), test_options());
        let result = service
            .find_and_download_track(&request(dir.path()), &ProgressSink::disabled())
            .await;
        assert!(matches!(
            result,
            Err(FetchError::Transport(TransportError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn test_no_scored_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = MockSearchTransport::new();
        search.expect_search().times(1).returning(|_, _| {
            Ok(vec![
                peer_listing("@@x\\Album Y\\cover.jpg", "p1", 9000, true),
                peer_listing("@@x\\Album Y\\rip.log", "p1", 9000, true),
            ])
        });

        let service = FetchService::new(search, MockTransferPrimitive::new(), test_options());
        let result = service
            .find_and_download_track(&request(dir.path()), &ProgressSink::disabled())
            .await;
        assert!(matches!(result, Err(FetchError::NoScoredCandidates)));
    }

    #[tokio::test]
    async fn test_retries_in_rank_order_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = MockSearchTransport::new();
        search
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(three_sources()));

        let mut transfer = MockTransferPrimitive::new();
        let mut seq = mockall::Sequence::new();
        for peer in ["p1", "p2"] {
            transfer
                .expect_transfer()
                .withf(move |l, _, _| l.peer_id == peer)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|l, _, events| failed_transfer(l, events));
        }
        transfer
            .expect_transfer()
            .withf(|l, _, _| l.peer_id == "p3")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, dest, events| complete_transfer(dest, events));

        let service = FetchService::new(search, transfer, test_options());
        let download = service
            .find_and_download_track(&request(dir.path()), &ProgressSink::disabled())
            .await
            .unwrap();
        assert_eq!(download.source_candidate.peer_id, "p3");
        assert!(!download.already_present);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = MockSearchTransport::new();
        search.expect_search().times(1).returning(|_, _| {
            let mut listings = three_sources();
            listings.push(peer_listing(
                "@@w\\Artist A - Album Y\\01 - Song X.flac",
                "p4",
                500,
                true,
            ));
            Ok(listings)
        });
        let mut transfer = MockTransferPrimitive::new();
        transfer
            .expect_transfer()
            .withf(|l, _, _| l.peer_id != "p4")
            .times(3)
            .returning(|l, _, events| failed_transfer(l, events));

        let service = FetchService::new(search, transfer, test_options());
        let result = service
            .find_and_download_track(&request(dir.path()), &ProgressSink::disabled())
            .await;
        assert!(matches!(
            result,
            Err(FetchError::AllDownloadAttemptsFailed { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("01 - Song X.flac"), b"already here").unwrap();

        let mut search = MockSearchTransport::new();
        search
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(three_sources()));

        let service = FetchService::new(search, MockTransferPrimitive::new(), test_options());
        let download = service
            .find_and_download_track(&request(dir.path()), &ProgressSink::disabled())
            .await
            .unwrap();
        assert!(download.already_present);
        assert_eq!(
            std::fs::read(&download.path).unwrap(),
            b"already here".to_vec()
        );
    }

    #[tokio::test]
    async fn test_overwrite_existing_transfers_anyway() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("01 - Song X.flac"), b"stale").unwrap();

        let mut search = MockSearchTransport::new();
        search
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(three_sources()));
        let mut transfer = MockTransferPrimitive::new();
        transfer
            .expect_transfer()
            .times(1)
            .returning(|_, dest, events| complete_transfer(dest, events));

        let options = FetchOptions {
            overwrite_existing: true,
            ..test_options()
        };
        let service = FetchService::new(search, transfer, options);
        let download = service
            .find_and_download_track(&request(dir.path()), &ProgressSink::disabled())
            .await
            .unwrap();
        assert!(!download.already_present);
        assert_eq!(std::fs::read(&download.path).unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn test_organize_and_sanitize_destination() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = MockSearchTransport::new();
        search.expect_search().times(1).returning(|_, _| {
            Ok(vec![peer_listing(
                "@@x\\AC-DC - Back in Black\\06 - Back in Black?.mp3",
                "p1",
                3000,
                true,
            )])
        });
        let mut transfer = MockTransferPrimitive::new();
        transfer
            .expect_transfer()
            .times(1)
            .returning(|_, dest, events| complete_transfer(dest, events));

        let request = TrackRequest {
            artist: "AC/DC".to_string(),
            title: "Back in Black".to_string(),
            album: "Back in Black".to_string(),
            preferred_format: PreferredFormat::Any,
            download_dir: dir.path().to_path_buf(),
            organize: true,
        };
        let service = FetchService::new(search, transfer, test_options());
        let download = service
            .find_and_download_track(&request, &ProgressSink::disabled())
            .await
            .unwrap();
        assert_eq!(
            download.path,
            dir.path()
                .join("AC-DC")
                .join("Back in Black")
                .join("06 - Back in Black-.mp3")
        );
    }

    #[tokio::test]
    async fn test_progress_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = MockSearchTransport::new();
        search
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(three_sources()));
        let mut transfer = MockTransferPrimitive::new();
        transfer
            .expect_transfer()
            .times(1)
            .returning(|_, dest, events| complete_transfer(dest, events));

        let (sink, mut rx) = ProgressSink::channel();
        let service = FetchService::new(search, transfer, test_options());
        service
            .find_and_download_track(&request(dir.path()), &sink)
            .await
            .unwrap();

        let events = drain_progress(&mut rx);
        let labels: Vec<&str> = events.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels[0], "Searching...");
        assert_eq!(labels[1], "Found sources...");
        assert_eq!(labels[2], "Downloading from p1...");
        assert!(events.iter().any(|e| e.percent == 50));
        assert_eq!(events.last().map(|e| e.percent), Some(100));
        assert!(events.windows(2).skip(2).all(|w| w[0].percent <= w[1].percent));
    }

    #[tokio::test]
    async fn test_failed_transfer_keeps_last_percent() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = MockSearchTransport::new();
        search
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(three_sources()));
        let mut transfer = MockTransferPrimitive::new();
        let mut seq = mockall::Sequence::new();
        transfer
            .expect_transfer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|l, _, events| {
                let _ = events.send(TransferState::Transferring {
                    transferred: 512,
                    total: 1024,
                });
                failed_transfer(l, events)
            });
        transfer
            .expect_transfer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, dest, events| complete_transfer(dest, events));

        let (sink, mut rx) = ProgressSink::channel();
        let service = FetchService::new(search, transfer, test_options());
        service
            .find_and_download_track(&request(dir.path()), &sink)
            .await
            .unwrap();

        let events = drain_progress(&mut rx);
        let failed = events.iter().find(|e| e.label == "Failed").unwrap();
        assert_eq!(failed.percent, 50);
    }

    #[tokio::test]
    async fn test_flac_with_slot_in_album_folder_beats_misc_mp3() {
        let dir = tempfile::tempdir().unwrap();
        let mut search = MockSearchTransport::new();
        search.expect_search().times(1).returning(|_, _| {
            Ok(vec![
                peer_listing("@@q\\misc\\Song X.mp3", "P2", 2000, false),
                peer_listing(
                    "@@p\\Artist A - Album Y\\01 - Song X.flac",
                    "P1",
                    2000,
                    true,
                ),
            ])
        });
        let mut transfer = MockTransferPrimitive::new();
        transfer
            .expect_transfer()
            .withf(|l, _, _| l.peer_id == "P1")
            .times(1)
            .returning(|_, dest, events| complete_transfer(dest, events));

        let service = FetchService::new(search, transfer, test_options());
        let download = service
            .find_and_download_track(&request(dir.path()), &ProgressSink::disabled())
            .await
            .unwrap();

        assert_eq!(download.source_candidate.peer_id, "P1");
        assert_eq!(download.source_candidate.folder_name, "artist a - album y");
        assert_eq!(
            download.source_candidate.best_match.listing.remote_path,
            "@@p\\Artist A - Album Y\\01 - Song X.flac"
        );
        assert_eq!(download.path, dir.path().join("01 - Song X.flac"));
        assert!(download.path.exists());
    }
}
