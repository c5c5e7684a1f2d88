//! Search, pick and download orchestration.
//!
//! `FetchService` runs one request end to end: it walks the query levels until
//! the network returns something, ranks the resulting peer folders and then
//! attempts transfers in rank order until one source is good enough. It is
//! generic over the two transport ports so tests drive it with mocks.

pub mod album;
pub mod error;
pub mod progress;
pub mod track;

use std::path::Path;
use std::time::Duration;

pub use album::{AlbumDownload, AlbumRequest, DownloadedTrack, ExpectedTrack, TrackOrdering};
pub use error::FetchError;
pub use progress::{ProgressEvent, ProgressSink};
pub use track::{TrackDownload, TrackRequest};

use crate::ports::soulseek::{SearchTransport, TransferPrimitive, TransportError};
use crate::soulseek::query::QueryComposer;
use crate::soulseek::types::{FileListing, TransferState};

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Ranked single-track candidates tried before giving up.
    pub max_track_attempts: usize,
    /// Ranked album candidates tried before giving up.
    pub max_album_attempts: usize,
    /// Pause between a failed candidate and the next one.
    pub retry_backoff: Duration,
    pub search_timeout: Duration,
    pub album_search_timeout: Duration,
    /// Replace files already present at the destination instead of keeping them.
    pub overwrite_existing: bool,
    pub remove_special_chars: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_track_attempts: 3,
            max_album_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            search_timeout: Duration::from_secs(10),
            album_search_timeout: Duration::from_secs(15),
            overwrite_existing: false,
            remove_special_chars: false,
        }
    }
}

pub struct FetchService<S: SearchTransport, T: TransferPrimitive> {
    search: S,
    transfer: T,
    options: FetchOptions,
    queries: QueryComposer,
}

impl<S: SearchTransport, T: TransferPrimitive> FetchService<S, T> {
    pub fn new(search: S, transfer: T, options: FetchOptions) -> Self {
        let queries = QueryComposer::new(options.remove_special_chars);
        Self {
            search,
            transfer,
            options,
            queries,
        }
    }

    // ---- Shared helpers ----

    /// Runs queries in order and returns the listings of the first one that
    /// finds anything. Transport errors end the walk immediately.
    async fn search_levels(
        &self,
        queries: &[String],
        timeout: Duration,
    ) -> Result<Vec<FileListing>, FetchError> {
        for (level, query) in queries.iter().enumerate() {
            log::info!("Searching (level {}): '{}'", level, query);
            let listings = self.search.search(query, timeout).await?;
            if !listings.is_empty() {
                log::debug!("Query '{}' returned {} listings", query, listings.len());
                return Ok(listings);
            }
            log::debug!("Query '{}' returned nothing", query);
        }
        log::warn!("No results for any of {} queries", queries.len());
        Err(FetchError::NoResults)
    }

    /// Runs one transfer, handing each state to `on_state` as it arrives.
    async fn transfer_with_progress<F>(
        &self,
        listing: &FileListing,
        destination: &Path,
        mut on_state: F,
    ) -> Result<u64, TransportError>
    where
        F: FnMut(TransferState),
    {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let transfer = self.transfer.transfer(listing, destination, tx);
        let forward = async {
            while let Some(state) = rx.recv().await {
                on_state(state);
            }
        };
        let (result, ()) = tokio::join!(transfer, forward);
        result
    }

    async fn backoff(&self, attempt: usize, attempts: usize) {
        if attempt + 1 < attempts && !self.options.retry_backoff.is_zero() {
            log::debug!(
                "Waiting {} before the next candidate",
                humantime::format_duration(self.options.retry_backoff)
            );
            tokio::time::sleep(self.options.retry_backoff).await;
        }
    }
}
