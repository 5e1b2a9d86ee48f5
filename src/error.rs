//! Error types for the seams between the player and its collaborators.
//!
//! None of these ever reach a player command's caller: the player logs them
//! and degrades (skips the track, keeps defaults, ...).

use std::path::PathBuf;

use thiserror::Error;

/// Failures building or driving a playback pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No audio output device could be opened.
    #[error("audio output unavailable: {0}")]
    Output(String),

    /// Fetching the stream failed (network, HTTP status, local file).
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The fetched bytes could not be decoded.
    #[error("failed to decode stream: {0}")]
    Decode(String),
}

/// Failures resolving a track id into a stream location.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no server address configured")]
    NoAddress,

    #[error("invalid server address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid track id {0:?}")]
    InvalidId(String),
}

/// Failures reading or writing the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed store contents: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reading a playlist file.
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a JSON array of tracks: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
