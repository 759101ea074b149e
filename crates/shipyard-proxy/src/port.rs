//! Port shorthand.
//!
//! | written          | proxy | host  | container | direct |
//! |------------------|-------|-------|-----------|--------|
//! | `80`             | 80    | -     | 80        | no     |
//! | `80:8080`        | 80    | -     | 8080      | no     |
//! | `80:4000:8080`   | 80    | 4000  | 8080      | no     |
//! | `80:80:8080`     | 80    | -     | 8080      | yes    |

use std::fmt;

use crate::error::{PortError, PortResult};
use crate::route::Route;

/// How one container port is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// Port the reverse proxy listens on; `None` keeps the port private.
    pub proxy_port: Option<String>,
    /// Port bound on the server; `None` lets the runtime pick.
    pub host: Option<String>,
    pub container: String,
    /// Published on the server as `proxy_port` without a proxy hop.
    pub direct: bool,
    pub routes: Vec<Route>,
}

impl PortDescriptor {
    pub fn parse(value: &str) -> PortResult<Self> {
        let invalid = |reason: &str| PortError::Invalid {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let fields = split_fields(value).map_err(|reason| invalid(&reason))?;
        Self::from_fields(&fields).ok_or_else(|| invalid("expected at most three fields"))
    }

    /// Build from one to three validated port fields.
    pub(crate) fn from_fields(fields: &[String]) -> Option<Self> {
        let (proxy, host, container) = match fields {
            [port] => (port, None, port),
            [proxy, container] => (proxy, None, container),
            [proxy, host, container] => (proxy, Some(host), container),
            _ => return None,
        };
        let direct = host.is_some_and(|h| h == proxy);
        Some(Self {
            proxy_port: Some(proxy.clone()),
            host: host.filter(|_| !direct).cloned(),
            container: container.clone(),
            direct,
            routes: Vec::new(),
        })
    }

    /// A port reachable only from inside the server.
    pub fn private(container: impl Into<String>) -> Self {
        Self {
            proxy_port: None,
            host: None,
            container: container.into(),
            direct: false,
            routes: Vec::new(),
        }
    }

    /// Port claimed on the server itself, if any.
    pub fn bound_port(&self) -> Option<&str> {
        if self.direct {
            self.proxy_port.as_deref()
        } else {
            self.host.as_deref()
        }
    }

    /// Whether the reverse proxy fronts this port.
    pub fn is_proxied(&self) -> bool {
        self.proxy_port.is_some() && !self.direct
    }

    /// Identity used for de-duplication.
    pub fn key(&self) -> (Option<&str>, Option<&str>, &str) {
        (self.proxy_port.as_deref(), self.host.as_deref(), &self.container)
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let proxy = self.proxy_port.as_deref().unwrap_or("-");
        match (&self.host, self.direct) {
            (_, true) => write!(f, "{proxy}:{proxy}:{}", self.container),
            (Some(host), _) => write!(f, "{proxy}:{host}:{}", self.container),
            (None, _) => write!(f, "{proxy}:{}", self.container),
        }
    }
}

/// Split `a[:b[:c]]` into numeric port fields.
pub(crate) fn split_fields(value: &str) -> Result<Vec<String>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("empty".to_string());
    }
    value
        .split(':')
        .map(|field| match field.parse::<u16>() {
            Ok(n) if n > 0 => Ok(n.to_string()),
            _ => Err(format!("\"{field}\" is not a port number")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> PortDescriptor {
        PortDescriptor::parse(s).unwrap()
    }

    #[test]
    fn single_field() {
        let p = parse("80");
        assert_eq!(p.proxy_port.as_deref(), Some("80"));
        assert_eq!(p.host, None);
        assert_eq!(p.container, "80");
        assert!(!p.direct);
        assert!(p.is_proxied());
    }

    #[test]
    fn proxy_and_container() {
        let p = parse("80:8080");
        assert_eq!(p.key(), (Some("80"), None, "8080"));
    }

    #[test]
    fn explicit_host_port() {
        let p = parse("80:4000:8080");
        assert_eq!(p.key(), (Some("80"), Some("4000"), "8080"));
        assert_eq!(p.bound_port(), Some("4000"));
    }

    #[test]
    fn proxy_equal_to_host_is_direct() {
        let p = parse("80:80:8080");
        assert_eq!(p.host, None);
        assert!(p.direct);
        assert!(!p.is_proxied());
        assert_eq!(p.bound_port(), Some("80"));
        assert_eq!(p.to_string(), "80:80:8080");
    }

    #[test]
    fn rejects_bad_shapes() {
        for bad in ["", "http", "80:", "1:2:3:4", "0", "70000", "80:-1"] {
            assert!(
                matches!(PortDescriptor::parse(bad), Err(PortError::Invalid { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn leading_zeros_normalize() {
        assert_eq!(parse("080").container, "80");
    }
}
