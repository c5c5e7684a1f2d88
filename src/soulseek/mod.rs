pub mod candidate;
pub mod client;
pub mod filename;
pub mod listing;
pub mod query;
pub mod ranking;
pub mod scoring;
pub mod types;

// Re-export public API
pub use client::{SessionConfig, SoulseekSession};
pub use query::QueryComposer;
pub use ranking::{select_album_candidates, select_track_candidates};
pub use scoring::{AlbumCandidate, AlbumCriteria, TrackCandidate, TrackCriteria};
pub use types::*;
