// src/error.rs

use thiserror::Error;

/// Failures the player core can report.
///
/// `Network` and `Decode` only ever mean "no waveform"; playback carries on
/// without one. `PlaybackBlocked` is worth showing to the user.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The raw bytes for a locator could not be fetched.
    #[error("failed to fetch `{locator}`: {source}")]
    Network {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    /// The bytes were fetched but are not decodable audio.
    #[error("failed to decode audio: {0}")]
    Decode(String),

    /// The transport refused to start playing.
    #[error("playback was blocked: {0}")]
    PlaybackBlocked(String),

    /// A caller broke an argument contract (zero bar count, bad rate).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<symphonia::core::errors::Error> for PlayerError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        PlayerError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
