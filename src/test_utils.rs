use std::path::Path;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::ports::soulseek::TransportError;
use crate::services::fetch::{FetchOptions, ProgressEvent};
use crate::soulseek::types::{FileListing, TransferState};

/// Defaults with no pause between candidates.
pub fn test_options() -> FetchOptions {
    FetchOptions {
        retry_backoff: std::time::Duration::ZERO,
        ..FetchOptions::default()
    }
}

pub fn peer_listing(path: &str, peer: &str, speed: u32, slot: bool) -> FileListing {
    FileListing {
        link_speed_kbps: Some(speed),
        has_open_slot: slot,
        size_bytes: 1024,
        ..FileListing::new(path, peer)
    }
}

/// `count` numbered tracks in one folder shared by `peer`.
pub fn album_listings(
    peer: &str,
    folder: &str,
    count: usize,
    ext: &str,
    speed: u32,
    slot: bool,
) -> Vec<FileListing> {
    (1..=count)
        .map(|i| {
            peer_listing(
                &format!("@@{}\\Music\\{}\\{:02} - Track {}.{}", peer, folder, i, i, ext),
                peer,
                speed,
                slot,
            )
        })
        .collect()
}

/// What a well-behaved transfer does: report progress, write the file.
pub fn complete_transfer(
    destination: &Path,
    events: tokio::sync::mpsc::UnboundedSender<TransferState>,
) -> Result<u64, TransportError> {
    let _ = events.send(TransferState::Connecting);
    let _ = events.send(TransferState::Transferring {
        transferred: 512,
        total: 1024,
    });
    std::fs::write(destination, vec![0u8; 1024])?;
    let _ = events.send(TransferState::Completed);
    Ok(1024)
}

pub fn failed_transfer(
    listing: &FileListing,
    events: tokio::sync::mpsc::UnboundedSender<TransferState>,
) -> Result<u64, TransportError> {
    let _ = events.send(TransferState::Failed);
    Err(TransportError::transfer(listing, "peer rejected the upload"))
}

pub fn drain_progress(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
