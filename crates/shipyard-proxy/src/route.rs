//! Proxy shorthand: `[strategy://]domain[:ports][/path]`.
//!
//! `ports` follows the port shorthand and defaults to `80`; `path` defaults
//! to `/`. For example `least_conn://example.com:80:4000:8080/api` routes
//! `example.com:80/api` to container port 8080 bound on host port 4000.

use std::fmt;
use std::str::FromStr;

use crate::error::{PortError, PortResult};
use crate::port::{PortDescriptor, split_fields};

/// Load-balancing strategy of an upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    RoundRobin,
    LeastConn,
    IpHash,
    Random,
}

impl Strategy {
    /// The nginx `upstream` directive selecting this strategy, if any.
    pub fn directive(&self) -> Option<&'static str> {
        match self {
            Strategy::RoundRobin => None,
            Strategy::LeastConn => Some("least_conn"),
            Strategy::IpHash => Some("ip_hash"),
            Strategy::Random => Some("random"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Strategy::RoundRobin),
            "least_conn" => Ok(Strategy::LeastConn),
            "ip_hash" => Ok(Strategy::IpHash),
            "random" => Ok(Strategy::Random),
            other => Err(format!(
                "unknown strategy \"{other}\"; expected round_robin, least_conn, ip_hash or random"
            )),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::RoundRobin => "round_robin",
            Strategy::LeastConn => "least_conn",
            Strategy::IpHash => "ip_hash",
            Strategy::Random => "random",
        })
    }
}

/// Where a proxied port answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub domain: String,
    pub path: String,
    pub strategy: Option<Strategy>,
}

/// A parsed proxy declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub route: Route,
    pub port: PortDescriptor,
}

impl ProxyRoute {
    pub fn parse(value: &str) -> PortResult<Self> {
        let invalid = |reason: String| PortError::InvalidProxy {
            value: value.to_string(),
            reason,
        };

        let trimmed = value.trim();
        let (strategy, rest) = match trimmed.split_once("://") {
            Some((scheme, rest)) => (Some(scheme.parse::<Strategy>().map_err(invalid)?), rest),
            None => (None, trimmed),
        };

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        let (domain, ports) = match authority.split_once(':') {
            Some((domain, ports)) => (domain, ports),
            None => (authority, "80"),
        };

        if domain.is_empty() {
            return Err(invalid("missing domain".to_string()));
        }
        if !domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '*' | '_'))
        {
            return Err(invalid(format!("\"{domain}\" is not a domain name")));
        }
        if path.chars().any(char::is_whitespace) {
            return Err(invalid("path contains whitespace".to_string()));
        }

        let fields = split_fields(ports).map_err(invalid)?;
        let port = PortDescriptor::from_fields(&fields)
            .ok_or_else(|| invalid("expected at most three port fields".to_string()))?;

        Ok(Self {
            route: Route {
                domain: domain.to_ascii_lowercase(),
                path: path.to_string(),
                strategy,
            },
            port,
        })
    }

    /// The port descriptor with this route attached.
    pub fn into_descriptor(self) -> PortDescriptor {
        let mut port = self.port;
        port.routes.push(self.route);
        port
    }
}
