//! Combining declared ports, proxies and inspected ports of one image.

use tracing::debug;

use crate::error::{PortError, PortResult};
use crate::port::PortDescriptor;
use crate::route::ProxyRoute;

/// Whether the image has to be inspected to learn its ports.
pub fn needs_inspection(ports: &[String], proxies: &[String]) -> bool {
    ports.is_empty() && proxies.is_empty()
}

/// Resolve the port descriptors of image `image`.
///
/// Declared ports come first. Each proxy attaches its route to the declared
/// descriptor with the same container port, or adds a descriptor of its own.
/// Only when nothing is declared are the `exposed` ports used, each proxied
/// on its own number. Descriptors with the same `(proxy, host, container)`
/// are merged.
pub fn resolve_ports(
    image: &str,
    ports: &[String],
    proxies: &[String],
    exposed: &[String],
) -> PortResult<Vec<PortDescriptor>> {
    let mut out: Vec<PortDescriptor> = Vec::new();

    for port in ports {
        push_unique(&mut out, PortDescriptor::parse(port)?);
    }

    for value in proxies {
        let proxy = ProxyRoute::parse(value)?;
        match out.iter_mut().find(|d| d.container == proxy.port.container) {
            Some(existing) if agrees(existing, &proxy.port) => existing.routes.push(proxy.route),
            Some(existing) => {
                return Err(PortError::InvalidProxy {
                    value: value.clone(),
                    reason: format!(
                        "container port {} is already declared as {existing}, which the proxy would change to {}",
                        existing.container, proxy.port
                    ),
                });
            }
            None => push_unique(&mut out, proxy.into_descriptor()),
        }
    }

    if needs_inspection(ports, proxies) {
        for port in exposed {
            push_unique(&mut out, PortDescriptor::parse(port)?);
        }
    }

    if out.is_empty() {
        return Err(PortError::NoPorts {
            image: image.to_string(),
        });
    }
    debug!(image, ports = out.len(), "ports resolved");
    Ok(out)
}

/// A proxy may omit the host port of the declaration it attaches to, but may
/// not contradict it.
fn agrees(declared: &PortDescriptor, proxied: &PortDescriptor) -> bool {
    declared.proxy_port == proxied.proxy_port
        && declared.direct == proxied.direct
        && (proxied.host.is_none() || proxied.host == declared.host)
}

fn push_unique(out: &mut Vec<PortDescriptor>, descriptor: PortDescriptor) {
    match out.iter_mut().find(|d| d.key() == descriptor.key()) {
        Some(existing) => {
            for route in descriptor.routes {
                if !existing.routes.contains(&route) {
                    existing.routes.push(route);
                }
            }
        }
        None => out.push(descriptor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn declared_ports_come_first_and_deduplicate() {
        let out = resolve_ports("img", &strings(&["80:8080", "80:8080", "9000"]), &[], &strings(&["1234"]))
            .unwrap();
        let keys: Vec<_> = out.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec![(Some("80"), None, "8080"), (Some("9000"), None, "9000")]);
    }

    #[test]
    fn proxy_attaches_to_matching_container_port() {
        let out = resolve_ports(
            "img",
            &strings(&["80:8080"]),
            &strings(&["example.com:80:8080/api", "other.com:443:9090"]),
            &[],
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].routes[0].domain, "example.com");
        assert_eq!(out[0].routes[0].path, "/api");
        assert_eq!(out[1].key(), (Some("443"), None, "9090"));
        assert_eq!(out[1].routes[0].domain, "other.com");
    }

    #[test]
    fn proxy_may_omit_the_declared_host_port() {
        let out = resolve_ports(
            "img",
            &strings(&["443:4000:8080"]),
            &strings(&["example.com:443:8080", "api.example.com:443:4000:8080"]),
            &[],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key(), (Some("443"), Some("4000"), "8080"));
        assert_eq!(out[0].routes.len(), 2);
    }

    #[test]
    fn proxy_contradicting_a_declared_port_is_rejected() {
        let err = resolve_ports("img", &strings(&["80:8080"]), &strings(&["x.com:443:8080"]), &[])
            .unwrap_err();
        match err {
            PortError::InvalidProxy { value, reason } => {
                assert_eq!(value, "x.com:443:8080");
                assert!(reason.contains("80:8080"));
                assert!(reason.contains("443:8080"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = resolve_ports("img", &strings(&["80:4000:8080"]), &strings(&["x.com:80:5000:8080"]), &[]);
        assert!(matches!(err, Err(PortError::InvalidProxy { .. })));
    }

    #[test]
    fn proxies_alone_create_descriptors() {
        let out = resolve_ports("img", &[], &strings(&["a.com", "b.com"]), &strings(&["3000"])).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].routes.len(), 2);
    }

    #[test]
    fn exposed_ports_fill_in_when_nothing_is_declared() {
        let out = resolve_ports("img", &[], &[], &strings(&["8080", "443"])).unwrap();
        let keys: Vec<_> = out.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec![(Some("8080"), None, "8080"), (Some("443"), None, "443")]);
    }

    #[test]
    fn no_ports_at_all_is_an_error() {
        let err = resolve_ports("img", &[], &[], &[]).unwrap_err();
        assert_eq!(err, PortError::NoPorts { image: "img".into() });
    }

    #[test]
    fn invalid_entries_propagate() {
        assert!(resolve_ports("img", &strings(&["x"]), &[], &[]).is_err());
        assert!(resolve_ports("img", &[], &strings(&["bad://x.com"]), &[]).is_err());
    }
}
