use thiserror::Error;

/// Everything the playback core can fail with.
#[derive(Debug, Error)]
pub enum Error {
    /// Structural validation failure: a track is missing or not an array.
    #[error("invalid arrangement: {0}")]
    InvalidArrangement(String),

    /// An operation that needs a loaded arrangement ran without one.
    #[error("no arrangement loaded")]
    NoArrangement,

    /// The audio device is missing, blocked or refused our stream.
    #[error("audio output unavailable: {0}")]
    AudioInit(String),

    /// A voice spec the synthesis backend cannot build.
    #[error("cannot build voice: {0}")]
    InvalidVoice(String),

    /// The offline render aborted; no partial buffer is returned.
    #[error("render failed: {0}")]
    Render(String),

    #[error("bad config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
