//! Error types for artifact generation.

use std::path::PathBuf;

use shipyard_core::{CoreError, ResolutionError};
use shipyard_image::ImageError;
use shipyard_proxy::{PortError, RouteConflict};
use shipyard_template::TemplateError;
use thiserror::Error;

/// Result type alias for generation.
pub type GenerateResult<T> = Result<T, GenerateError>;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("service \"{service}\": {source}")]
    Image {
        service: String,
        #[source]
        source: ImageError,
    },

    #[error("service \"{service}\", image {image}: {source}")]
    Port {
        service: String,
        image: String,
        #[source]
        source: PortError,
    },

    #[error("{what}: {source}")]
    Template {
        what: String,
        #[source]
        source: TemplateError,
    },

    #[error("{}", volume_ownership_message(.unclaimed, .shared))]
    VolumeOwnership {
        unclaimed: Vec<String>,
        /// Volume name and every server claiming it.
        shared: Vec<(String, Vec<String>)>,
    },

    #[error("server \"{server}\": host port {port} is claimed by {}", .images.join(", "))]
    PortConflict {
        server: String,
        port: String,
        images: Vec<String>,
    },

    #[error("server \"{server}\": image name {name} is produced by more than one image ({})", .references.join(", "))]
    DuplicateImage {
        server: String,
        name: String,
        references: Vec<String>,
    },

    #[error(transparent)]
    RouteConflict(#[from] RouteConflict),

    #[error("server \"{server}\" mounts volumes but none of its ssh keys has a private key")]
    NoConnectableKey { server: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {message}")]
    Serialize { what: String, message: String },
}

impl GenerateError {
    pub(crate) fn template(what: impl Into<String>, source: TemplateError) -> Self {
        GenerateError::Template {
            what: what.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenerateError::Io {
            path: path.into(),
            source,
        }
    }
}

fn volume_ownership_message(unclaimed: &[String], shared: &[(String, Vec<String>)]) -> String {
    let mut parts = Vec::new();
    if !unclaimed.is_empty() {
        parts.push(format!("unclaimed volumes: {}", unclaimed.join(", ")));
    }
    for (volume, servers) in shared {
        parts.push(format!(
            "volume \"{volume}\" claimed by several servers: {}",
            servers.join(", ")
        ));
    }
    format!("every volume needs exactly one server; {}", parts.join("; "))
}
