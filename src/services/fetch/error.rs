use crate::ports::soulseek::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Every query level came back empty.
    #[error("No search results for any query")]
    NoResults,
    /// Results existed but no candidate survived scoring.
    #[error("Search results found, but none were usable sources")]
    NoScoredCandidates,
    #[error("All {attempts} download attempts failed")]
    AllDownloadAttemptsFailed { attempts: usize },
    #[error("No album source delivered enough tracks after {attempts} attempts")]
    AlbumThresholdNotMet { attempts: usize },
    #[error("Search transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Failed to prepare download directory: {0}")]
    Io(#[from] std::io::Error),
}
