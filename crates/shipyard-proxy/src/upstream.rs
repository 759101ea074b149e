//! Upstream grouping.
//!
//! Every proxied `(image, container port)` pair becomes one upstream named
//! `sanitize(image + "-" + container)`. A server's reverse proxy carries the
//! upstreams of the images it runs. Ports bound on the host are balanced
//! across every server running the image; unbound ports are reached through
//! the local container only.

use std::collections::BTreeMap;

use shipyard_core::naming::sanitize;
use tracing::{debug, warn};

use crate::error::RouteConflict;
use crate::port::PortDescriptor;
use crate::route::Strategy;

/// Server name used for routes that declare no domain.
pub const DEFAULT_DOMAIN: &str = "_";

/// One image placed on one server, with its resolved ports.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub server: &'a str,
    /// Public address of the server, once provisioned.
    pub address: Option<&'a str>,
    pub image: &'a str,
    pub ports: &'a [PortDescriptor],
}

impl Placement<'_> {
    fn host_address(&self) -> &str {
        self.address.unwrap_or(self.server)
    }
}

/// A backend endpoint that can serve traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub address: String,
    pub port: String,
}

impl Backend {
    /// Full address string.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// A named, load-balanced pool of backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub name: String,
    pub strategy: Strategy,
    pub backends: Vec<Backend>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub upstream: String,
}

/// One `listen port; server_name domain;` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub domain: String,
    pub port: String,
    pub locations: Vec<Location>,
}

/// The reverse-proxy plan of one server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerProxy {
    pub server: String,
    pub upstreams: Vec<Upstream>,
    pub listeners: Vec<Listener>,
}

impl ServerProxy {
    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }

    /// Ports the reverse proxy listens on, ascending.
    pub fn listen_ports(&self) -> Vec<&str> {
        let mut ports: Vec<&str> = self.listeners.iter().map(|l| l.port.as_str()).collect();
        ports.sort_by_key(|p| p.parse::<u16>().unwrap_or(0));
        ports.dedup();
        ports
    }

    pub fn upstream(&self, name: &str) -> Option<&Upstream> {
        self.upstreams.iter().find(|u| u.name == name)
    }
}

struct Draft {
    name: String,
    strategy: Option<Strategy>,
    backends: Vec<Backend>,
}

/// Plan the reverse proxy of `server` from every placement in the cluster.
///
/// Duplicate `domain:port/path` routes fail with [`RouteConflict`]; with
/// `allow_override` the later route is dropped with a warning instead.
pub fn plan_server(
    server: &str,
    placements: &[Placement<'_>],
    default_strategy: Strategy,
    allow_override: bool,
) -> Result<ServerProxy, RouteConflict> {
    let mut drafts: Vec<Draft> = Vec::new();
    let mut listeners: Vec<Listener> = Vec::new();
    // (domain, port, path) -> claiming image
    let mut claimed: BTreeMap<(String, String, String), (String, String)> = BTreeMap::new();

    let local = placements.iter().filter(|p| p.server == server);
    for placement in local {
        for port in placement.ports.iter().filter(|d| d.is_proxied()) {
            let Some(proxy_port) = port.proxy_port.as_deref() else {
                continue;
            };
            let name = sanitize(&format!("{}-{}", placement.image, port.container));

            let index = match drafts.iter().position(|d| d.name == name) {
                Some(i) => i,
                None => {
                    drafts.push(Draft {
                        name: name.clone(),
                        strategy: None,
                        backends: Vec::new(),
                    });
                    drafts.len() - 1
                }
            };
            let draft = &mut drafts[index];
            if draft.strategy.is_none() {
                draft.strategy = port.routes.iter().find_map(|r| r.strategy);
            }
            for backend in backends(placement, port, placements) {
                if !draft.backends.contains(&backend) {
                    draft.backends.push(backend);
                }
            }

            let routes: Vec<(&str, &str)> = if port.routes.is_empty() {
                vec![(DEFAULT_DOMAIN, "/")]
            } else {
                port.routes
                    .iter()
                    .map(|r| (r.domain.as_str(), r.path.as_str()))
                    .collect()
            };

            for (domain, path) in routes {
                let key = (domain.to_string(), proxy_port.to_string(), path.to_string());
                if let Some((owner, owner_upstream)) = claimed.get(&key) {
                    if *owner_upstream == name {
                        continue;
                    }
                    let conflict = RouteConflict {
                        server: server.to_string(),
                        route: format!("{domain}:{proxy_port}{path}"),
                        first: owner.clone(),
                        second: placement.image.to_string(),
                    };
                    if !allow_override {
                        return Err(conflict);
                    }
                    warn!(
                        server,
                        route = %conflict.route,
                        kept = %conflict.first,
                        dropped = %conflict.second,
                        "route conflict overridden"
                    );
                    continue;
                }
                claimed.insert(key, (placement.image.to_string(), name.clone()));
                add_location(&mut listeners, domain, proxy_port, path, &name);
            }
        }
    }

    // Upstreams whose every route was dropped are left out.
    let routed = |name: &str| {
        listeners
            .iter()
            .any(|l| l.locations.iter().any(|loc| loc.upstream == name))
    };
    let upstreams: Vec<Upstream> = drafts
        .into_iter()
        .filter(|d| routed(&d.name))
        .map(|d| Upstream {
            name: d.name,
            strategy: d.strategy.unwrap_or(default_strategy),
            backends: d.backends,
        })
        .collect();

    debug!(
        server,
        upstreams = upstreams.len(),
        listeners = listeners.len(),
        "reverse proxy planned"
    );
    Ok(ServerProxy {
        server: server.to_string(),
        upstreams,
        listeners,
    })
}

fn backends(placement: &Placement<'_>, port: &PortDescriptor, all: &[Placement<'_>]) -> Vec<Backend> {
    let Some(host) = port.host.as_deref() else {
        return vec![Backend {
            address: placement.image.to_string(),
            port: port.container.clone(),
        }];
    };
    all.iter()
        .filter(|p| p.image == placement.image)
        .map(|p| {
            if p.address.is_none() {
                debug!(server = p.server, "no address yet, using server name");
            }
            Backend {
                address: p.host_address().to_string(),
                port: host.to_string(),
            }
        })
        .collect()
}

fn add_location(listeners: &mut Vec<Listener>, domain: &str, port: &str, path: &str, upstream: &str) {
    let location = Location {
        path: path.to_string(),
        upstream: upstream.to_string(),
    };
    match listeners.iter_mut().find(|l| l.domain == domain && l.port == port) {
        Some(listener) => listener.locations.push(location),
        None => listeners.push(Listener {
            domain: domain.to_string(),
            port: port.to_string(),
            locations: vec![location],
        }),
    }
}
