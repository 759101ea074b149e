//! Error types for the resource model.

use std::fmt;

use shipyard_template::TemplateError;
use thiserror::Error;

/// Result type alias for resource model operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The four user-authored entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Server,
    Service,
    SshKey,
    Volume,
}

impl EntityKind {
    /// Top-level document key holding entities of this kind.
    pub fn section(&self) -> &'static str {
        match self {
            EntityKind::Server => "servers",
            EntityKind::Service => "services",
            EntityKind::SshKey => "ssh_keys",
            EntityKind::Volume => "volumes",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Server => "server",
            EntityKind::Service => "service",
            EntityKind::SshKey => "ssh key",
            EntityKind::Volume => "volume",
        })
    }
}

/// A field failed validation while an entity was being built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} \"{name}\": field \"{field}\" expected {expected}, received {received}")]
pub struct ValidationError {
    pub kind: EntityKind,
    pub name: String,
    pub field: String,
    pub expected: String,
    pub received: String,
}

/// A cross-reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("{kind} \"{name}\": field \"{field}\" references unknown {target_kind} \"{target}\"")]
    UnknownReference {
        kind: EntityKind,
        name: String,
        field: String,
        target_kind: EntityKind,
        target: String,
    },

    #[error("server \"{0}\" has no provisioning state; provision it before generating manifests")]
    MissingState(String),
}

/// Errors that can occur while loading a cluster document.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("invalid document: {0}")]
    Document(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("{kind} \"{name}\": {source}")]
    Render {
        kind: EntityKind,
        name: String,
        #[source]
        source: TemplateError,
    },

    #[error("invalid provisioning state: {0}")]
    State(String),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
