use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use reqwest::Client;
use serde::Deserialize;

const API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";
const REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, thiserror::Error)]
pub enum LastFmError {
    #[error("Last.fm request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Last.fm API error {code}: {message}")]
    Api { code: u32, message: String },
    #[error("Unexpected Last.fm response: {0}")]
    Parse(#[from] serde_json::Error),
}

// ============================================================================
// Response shapes
// ============================================================================

/// Last.fm collapses one-element lists into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: u32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AlbumInfoResponse {
    album: AlbumInfo,
}

#[derive(Debug, Deserialize)]
struct AlbumInfo {
    #[serde(default)]
    tracks: Option<AlbumTracks>,
}

#[derive(Debug, Deserialize)]
struct AlbumTracks {
    #[serde(default)]
    track: Option<OneOrMany<AlbumTrack>>,
}

#[derive(Debug, Deserialize)]
struct AlbumTrack {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TrackInfoResponse {
    track: TrackInfo,
}

#[derive(Debug, Deserialize)]
struct TrackInfo {
    #[serde(default)]
    album: Option<TrackAlbum>,
}

#[derive(Debug, Deserialize)]
struct TrackAlbum {
    title: String,
}

/// Fails with `LastFmError::Api` when the body is an error object.
fn parse_response<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, LastFmError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if value.get("error").is_some() {
        let err: ApiError = serde_json::from_value(value)?;
        return Err(LastFmError::Api {
            code: err.error,
            message: err.message,
        });
    }
    Ok(serde_json::from_value(value)?)
}

fn parse_album_tracks(body: &str) -> Result<Vec<String>, LastFmError> {
    let response: AlbumInfoResponse = parse_response(body)?;
    Ok(response
        .album
        .tracks
        .and_then(|t| t.track)
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.name)
        .collect())
}

fn parse_track_album(body: &str) -> Result<Option<String>, LastFmError> {
    let response: TrackInfoResponse = parse_response(body)?;
    Ok(response
        .track
        .album
        .map(|a| a.title)
        .filter(|title| !title.trim().is_empty()))
}

// ============================================================================
// Client
// ============================================================================

/// Minimal Last.fm metadata client.
#[derive(Clone)]
pub struct LastFmClient {
    http: Client,
    api_key: String,
    rate_limiter: Arc<DirectRateLimiter>,
}

impl LastFmClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND))),
        }
    }

    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<String, LastFmError> {
        log::debug!("Waiting for Last.fm rate limiter");
        self.rate_limiter.until_ready().await;

        let mut query: Vec<(&str, &str)> = vec![
            ("method", method),
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
            ("autocorrect", "1"),
        ];
        query.extend_from_slice(params);

        log::debug!("Making Last.fm API request: {} {:?}", method, params);
        let body = self
            .http
            .get(API_ROOT)
            .query(&query)
            .send()
            .await?
            .text()
            .await?;
        Ok(body)
    }

    /// Track names of an album, in album order. Empty when Last.fm has no listing.
    pub async fn album_tracks(&self, artist: &str, album: &str) -> Result<Vec<String>, LastFmError> {
        let body = self
            .call("album.getInfo", &[("artist", artist), ("album", album)])
            .await?;
        let tracks = parse_album_tracks(&body)?;
        log::info!(
            "Last.fm lists {} tracks for '{}' by '{}'",
            tracks.len(),
            album,
            artist
        );
        Ok(tracks)
    }

    /// Title of the album a track appears on, if Last.fm knows one.
    pub async fn track_album(&self, artist: &str, title: &str) -> Result<Option<String>, LastFmError> {
        let body = self
            .call("track.getInfo", &[("artist", artist), ("track", title)])
            .await?;
        parse_track_album(&body)
    }
}
