//! Error types for image resolution.

use thiserror::Error;

/// Result type alias for image operations.
pub type ImageResult<T> = Result<T, ImageError>;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("empty image reference")]
    Empty,

    #[error("invalid image reference \"{reference}\": {reason}")]
    Invalid { reference: String, reason: String },

    #[error("image reference \"{reference}\" has no {field} and no default {field} is configured")]
    MissingDefault { reference: String, field: &'static str },

    #[error("wildcards in the {field} of \"{reference}\" are not supported")]
    UnsupportedWildcard { reference: String, field: &'static str },

    #[error("wildcard listing is only supported on {supported}, not {registry}")]
    UnsupportedRegistry { registry: String, supported: String },

    #[error("listing packages requires a token in ${env}")]
    MissingCredentials { env: String },

    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("no image matches \"{0}\"")]
    NoMatch(String),

    #[error("inspecting {image} failed: {message}")]
    Inspect { image: String, message: String },
}
