use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::{Result, eyre::eyre};
use futures::TryStreamExt;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use soulseek_rs::client::Client as SoulseekClient;
use tokio::fs::DirEntry;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio_stream::wrappers::ReadDirStream;

use crate::ports::soulseek::{SearchTransport, TransferPrimitive, TransportError};
use crate::soulseek::types::{FileListing, TransferState};

/// Attribute key the network uses for bitrate.
const BITRATE_ATTRIBUTE: u32 = 0;

// ============================================================================
// Session configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub username: String,
    pub password: String,
    pub searches_per_time: u32,
    pub renew_time: Duration,
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

fn build_rate_limiter(searches_per_time: u32, renew_time: Duration) -> Result<DirectRateLimiter> {
    let burst = NonZeroU32::new(searches_per_time)
        .ok_or_else(|| eyre!("searches_per_time must be greater than 0"))?;
    let quota = Quota::with_period(renew_time)
        .ok_or_else(|| eyre!("Invalid rate limit period"))?
        .allow_burst(burst);
    Ok(RateLimiter::direct(quota))
}

// ============================================================================
// Search result conversion
// ============================================================================

/// One peer's answer to a search, detached from the network types.
#[derive(Debug, Clone)]
struct PeerResponse {
    username: String,
    slots_free: bool,
    speed: u32,
    files: Vec<PeerFile>,
}

#[derive(Debug, Clone)]
struct PeerFile {
    name: String,
    size: u64,
    attribs: HashMap<u32, u32>,
}

fn flatten_peer_response(response: &PeerResponse) -> Vec<FileListing> {
    // Peers that report 0 have simply not measured their upload yet
    let link_speed_kbps = (response.speed > 0).then_some(response.speed);

    response
        .files
        .iter()
        .map(|file| FileListing {
            remote_path: file.name.clone(),
            peer_id: response.username.clone(),
            link_speed_kbps,
            has_open_slot: response.slots_free,
            bitrate_kbps: file.attribs.get(&BITRATE_ATTRIBUTE).copied(),
            size_bytes: file.size,
            // Not carried in search results
            queue_length: 0,
        })
        .collect()
}

// ============================================================================
// Transfer status conversion
// ============================================================================

fn to_transfer_state(status: soulseek_rs::DownloadStatus) -> TransferState {
    match status {
        soulseek_rs::DownloadStatus::Queued => TransferState::Queued { position: None },
        soulseek_rs::DownloadStatus::InProgress {
            bytes_downloaded,
            total_bytes,
            speed_bytes_per_sec: _,
        } => TransferState::Transferring {
            transferred: bytes_downloaded as u64,
            total: total_bytes as u64,
        },
        soulseek_rs::DownloadStatus::Completed => TransferState::Completed,
        soulseek_rs::DownloadStatus::Failed => TransferState::Failed,
        soulseek_rs::DownloadStatus::TimedOut => TransferState::Aborted,
    }
}

// ============================================================================
// Session
// ============================================================================

/// A logged-in connection to the network.
///
/// Cheap to clone; clones share the connection and the search rate limit.
#[derive(Clone)]
pub struct SoulseekSession {
    client: Arc<Mutex<SoulseekClient>>,
    rate_limiter: Arc<DirectRateLimiter>,
}

impl SoulseekSession {
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        log::debug!("Logging in to SoulSeek as user: {}", config.username);

        let rate_limiter = build_rate_limiter(config.searches_per_time, config.renew_time)?;
        log::debug!(
            "Rate limiter configured: {} searches per {}",
            config.searches_per_time,
            humantime::format_duration(config.renew_time)
        );

        soulseek_rs::utils::logger::enable_buffering();

        let username = config.username.clone();
        let password = config.password.clone();
        let client = tokio::task::spawn_blocking(move || -> Result<SoulseekClient> {
            let mut client = SoulseekClient::new(&username, &password);
            client.connect();
            client.login()?;
            Ok(client)
        })
        .await??;

        log::info!("Successfully logged in to SoulSeek");
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            rate_limiter: Arc::new(rate_limiter),
        })
    }
}

#[async_trait::async_trait]
impl SearchTransport for SoulseekSession {
    async fn search(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<FileListing>, TransportError> {
        self.rate_limiter.until_ready().await;
        log::debug!("Executing search query: '{}'", query);

        let client = self.client.clone();
        let owned_query = query.to_string();
        let responses = tokio::task::spawn_blocking(move || -> Result<Vec<PeerResponse>, String> {
            let client = client.blocking_lock();
            let results = client
                .search(&owned_query, timeout)
                .map_err(|e| e.to_string())?;
            Ok(results
                .iter()
                .map(|r| PeerResponse {
                    username: r.username.clone(),
                    slots_free: r.slots > 0,
                    speed: r.speed as u32,
                    files: r
                        .files
                        .iter()
                        .map(|f| PeerFile {
                            name: f.name.clone(),
                            size: f.size,
                            attribs: f.attribs.clone(),
                        })
                        .collect(),
                })
                .collect())
        })
        .await
        .map_err(|e| TransportError::Search {
            query: query.to_string(),
            reason: e.to_string(),
        })?
        .map_err(|reason| TransportError::Search {
            query: query.to_string(),
            reason,
        })?;

        let listings: Vec<FileListing> = responses.iter().flat_map(flatten_peer_response).collect();
        log::debug!(
            "Search query '{}' returned {} responses, {} files",
            query,
            responses.len(),
            listings.len()
        );
        Ok(listings)
    }
}

#[async_trait::async_trait]
impl TransferPrimitive for SoulseekSession {
    /// Downloads into a hidden staging directory next to `destination`, then
    /// renames the single file that arrived into place.
    async fn transfer(
        &self,
        listing: &FileListing,
        destination: &Path,
        events: UnboundedSender<TransferState>,
    ) -> Result<u64, TransportError> {
        let parent = destination
            .parent()
            .ok_or_else(|| TransportError::transfer(listing, "destination has no parent"))?;
        tokio::fs::create_dir_all(parent).await?;
        let staging = tempfile::Builder::new()
            .prefix(".fetch-")
            .tempdir_in(parent)?;
        let staging_path = staging
            .path()
            .to_str()
            .ok_or_else(|| TransportError::transfer(listing, "download path contains invalid UTF-8"))?
            .to_string();

        log::debug!(
            "Starting download: '{}' from user '{}' ({} bytes)",
            listing.remote_path,
            listing.peer_id,
            listing.size_bytes
        );
        let _ = events.send(TransferState::Connecting);

        let client = self.client.clone();
        let file = listing.remote_path.clone();
        let peer = listing.peer_id.clone();
        let size = listing.size_bytes;
        let receiver = tokio::task::spawn_blocking(move || {
            let client = client.blocking_lock();
            client
                .download(file, peer, size, staging_path)
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| TransportError::transfer(listing, e.to_string()))?
        .map_err(|reason| TransportError::transfer(listing, reason))?;
        let _ = events.send(TransferState::Negotiating);

        // The library reports on a std channel; forward onto tokio so we never
        // block the runtime waiting for the next status.
        let (status_tx, mut status_rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || {
            while let Ok(status) = receiver.recv() {
                if status_tx.send(status).is_err() {
                    break;
                }
            }
        });

        let mut outcome = None;
        while let Some(status) = status_rx.recv().await {
            let state = to_transfer_state(status);
            let _ = events.send(state.clone());
            if state.is_terminal() {
                outcome = Some(state);
                break;
            }
        }

        match outcome {
            Some(TransferState::Completed) => {}
            Some(TransferState::Aborted) => {
                return Err(TransportError::transfer(listing, "timed out"));
            }
            Some(_) => return Err(TransportError::transfer(listing, "peer reported failure")),
            None => {
                return Err(TransportError::transfer(
                    listing,
                    "status channel closed before completion",
                ));
            }
        }

        let files: Vec<DirEntry> = ReadDirStream::new(tokio::fs::read_dir(staging.path()).await?)
            .try_collect()
            .await?;
        if files.len() != 1 {
            return Err(TransportError::transfer(
                listing,
                format!("expected 1 file in staging directory, got {}", files.len()),
            ));
        }
        tokio::fs::rename(files[0].path(), destination).await?;
        let bytes = tokio::fs::metadata(destination).await?.len();

        log::info!(
            "Download completed: '{}' from '{}' ({} bytes)",
            listing.remote_path,
            listing.peer_id,
            bytes
        );
        Ok(bytes)
    }
}
