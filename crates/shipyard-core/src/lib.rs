//! shipyard-core: the validated resource graph.
//!
//! A cluster document has four sections (`servers`, `services`, `ssh_keys`,
//! `volumes`), each mapping an entity name to its options. Loading a document
//! renders its template strings, validates every field and produces an
//! immutable [`Registry`] that the generators read from.
//!
//! Late-bound data about provisioned machines (addresses from the
//! provisioning tool's state file) lives in [`ProvisioningState`], next to the
//! registry rather than inside it.

pub mod bindings;
pub mod error;
pub mod model;
pub mod naming;
pub mod registry;
pub mod settings;
pub mod state;

pub use error::{CoreError, CoreResult, EntityKind, ResolutionError, ValidationError};
pub use model::{Server, Service, SshKey, Volume};
pub use registry::Registry;
pub use settings::ShipyardSettings;
pub use state::{ProvisioningState, ServerDetails};
