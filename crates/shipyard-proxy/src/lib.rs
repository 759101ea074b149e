//! shipyard-proxy: port exposure and reverse-proxy routing.
//!
//! # Components
//!
//! - **`port`**: `proxy[:host]:container` port shorthand
//! - **`route`**: `[strategy://]domain[:ports][/path]` proxy shorthand
//! - **`merge`**: combining declared ports, proxies and inspected ports
//! - **`upstream`**: grouping backends across servers into upstreams
//! - **`nginx`**: rendering one server's reverse-proxy configuration

pub mod error;
pub mod merge;
pub mod nginx;
pub mod port;
pub mod route;
pub mod upstream;

pub use error::{PortError, PortResult, RouteConflict};
pub use merge::{needs_inspection, resolve_ports};
pub use nginx::render_config;
pub use port::PortDescriptor;
pub use route::{ProxyRoute, Route, Strategy};
pub use upstream::{Backend, Listener, Location, Placement, ServerProxy, Upstream, plan_server};
