use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One file advertised by a peer in response to a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListing {
    /// Full remote path as the peer shared it (`@@user\Music\Artist\Album\01 - Song.flac`)
    pub remote_path: String,
    pub peer_id: String,
    pub link_speed_kbps: Option<u32>,
    pub has_open_slot: bool,
    pub bitrate_kbps: Option<u32>,
    pub size_bytes: u64,
    pub queue_length: u32,
}

impl FileListing {
    pub fn new(remote_path: impl Into<String>, peer_id: impl Into<String>) -> Self {
        Self {
            remote_path: remote_path.into(),
            peer_id: peer_id.into(),
            link_speed_kbps: None,
            has_open_slot: false,
            bitrate_kbps: None,
            size_bytes: 0,
            queue_length: 0,
        }
    }
}

/// A state reported by the transfer primitive while moving one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    Connecting,
    Negotiating,
    Queued { position: Option<u32> },
    Transferring { transferred: u64, total: u64 },
    Aborted,
    Completed,
    Failed,
}

impl TransferState {
    /// Percentage of the file moved so far, if the state implies one.
    pub fn percent(&self) -> Option<u8> {
        match self {
            TransferState::Connecting | TransferState::Negotiating | TransferState::Queued { .. } => {
                Some(0)
            }
            TransferState::Transferring { transferred, total } => {
                if *total == 0 {
                    return Some(0);
                }
                let pct = transferred.saturating_mul(100) / total;
                Some(pct.min(100) as u8)
            }
            TransferState::Completed => Some(100),
            TransferState::Aborted | TransferState::Failed => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            TransferState::Connecting => "Connecting...".to_string(),
            TransferState::Negotiating => "Negotiating...".to_string(),
            TransferState::Queued {
                position: Some(position),
            } => format!("Queued ({})", position),
            TransferState::Queued { position: None } => "Queued".to_string(),
            TransferState::Transferring { .. } => "Downloading...".to_string(),
            TransferState::Aborted => "Aborted".to_string(),
            TransferState::Completed => "Completed".to_string(),
            TransferState::Failed => "Failed".to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Aborted | TransferState::Completed | TransferState::Failed
        )
    }
}

/// Container the caller would like to end up with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PreferredFormat {
    #[default]
    Any,
    Flac,
    Mp3,
    Wav,
    Other(String),
}

impl PreferredFormat {
    /// Lowercase extension this preference asks for, `None` for `Any`.
    pub fn extension(&self) -> Option<&str> {
        match self {
            PreferredFormat::Any => None,
            PreferredFormat::Flac => Some("flac"),
            PreferredFormat::Mp3 => Some("mp3"),
            PreferredFormat::Wav => Some("wav"),
            PreferredFormat::Other(ext) => Some(ext.as_str()),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, PreferredFormat::Any)
    }
}

impl FromStr for PreferredFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_lowercase();
        match normalized.as_str() {
            "" | "any" => Ok(PreferredFormat::Any),
            "flac" => Ok(PreferredFormat::Flac),
            "mp3" => Ok(PreferredFormat::Mp3),
            "wav" => Ok(PreferredFormat::Wav),
            other if other.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Ok(PreferredFormat::Other(other.to_string()))
            }
            other => Err(format!("`{}` is not a valid file format", other)),
        }
    }
}

impl TryFrom<String> for PreferredFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PreferredFormat> for String {
    fn from(value: PreferredFormat) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PreferredFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension().unwrap_or("any"))
    }
}
