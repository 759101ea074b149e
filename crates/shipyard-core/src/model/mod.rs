//! Entity types of the cluster document.
//!
//! Each entity is built in one step by a validating constructor and is
//! immutable afterwards.

mod fields;
pub mod server;
pub mod service;
pub mod ssh_key;
pub mod volume;

pub use server::Server;
pub use service::Service;
pub use ssh_key::SshKey;
pub use volume::Volume;
