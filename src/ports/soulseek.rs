use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::soulseek::types::{FileListing, TransferState};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected to SoulSeek")]
    NotConnected,
    #[error("Search for '{query}' failed: {reason}")]
    Search { query: String, reason: String },
    #[error("Transfer of '{file}' from peer '{peer}' failed: {reason}")]
    Transfer {
        peer: String,
        file: String,
        reason: String,
    },
    #[error("I/O error during transfer: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn transfer(listing: &FileListing, reason: impl Into<String>) -> Self {
        TransportError::Transfer {
            peer: listing.peer_id.clone(),
            file: listing.remote_path.clone(),
            reason: reason.into(),
        }
    }
}

/// Port trait for the network search the selection engine runs queries through.
///
/// Implementations live in `soulseek::client` (production) or test mocks.
/// An empty result is `Ok(vec![])`, never an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SearchTransport: Send + Sync {
    async fn search(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<FileListing>, TransportError>;
}

/// Port trait for moving one listed file to a local path.
///
/// State changes are pushed through `events` as they happen. Returns the number
/// of bytes written to `destination`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TransferPrimitive: Send + Sync {
    async fn transfer(
        &self,
        listing: &FileListing,
        destination: &Path,
        events: UnboundedSender<TransferState>,
    ) -> Result<u64, TransportError>;
}
