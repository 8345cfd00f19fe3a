use thiserror::Error;

#[derive(Error, Debug)]
pub enum CircosError {
    #[error("genome has no chromosomes, cannot lay out a circle")]
    EmptyGenome,

    #[error("invalid band configuration: {0}")]
    InvalidBandConfig(String),

    #[error("data unavailable for track '{track}': {reason}")]
    DataUnavailable { track: String, reason: String },

    #[error("data request was dropped before it resolved")]
    RequestDropped,

    #[error("unknown chromosome: {0}")]
    UnknownChromosome(String),

    #[error("unknown track id: {0}")]
    UnknownTrack(u64),

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("parse error at line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, CircosError>;
