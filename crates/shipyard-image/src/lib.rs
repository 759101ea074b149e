//! shipyard-image: container image references.
//!
//! A service lists compact references such as `org/api:v1`, `api:*` or just
//! `latest`. [`ImageRef::parse`] fills in the defaults, [`Resolver`] expands
//! wildcards against a [`PackageRegistry`] and [`ImageInspector`] reports the
//! ports an image exposes when a service declares none.

pub mod error;
pub mod glob;
pub mod image;
pub mod inspect;
pub mod reference;
pub mod registry;
pub mod resolver;

pub use error::{ImageError, ImageResult};
pub use image::Image;
pub use inspect::{DockerInspector, ImageInspector};
pub use reference::{DEFAULT_REGISTRY, Defaults, ImageRef};
pub use registry::{GithubPackages, PackageRegistry};
pub use resolver::Resolver;
