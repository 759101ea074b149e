//! Compact image reference parsing.

use std::fmt;

use crate::error::{ImageError, ImageResult};
use crate::glob::is_wildcard;

/// Registry assumed when a reference names none.
pub const DEFAULT_REGISTRY: &str = "ghcr.io";

/// Values filled in for the parts a reference leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub url: String,
    pub org: Option<String>,
    pub repo: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY.to_string(),
            org: None,
            repo: None,
        }
    }
}

impl Defaults {
    pub fn new(org: Option<String>, repo: Option<String>) -> Self {
        Self {
            org,
            repo,
            ..Self::default()
        }
    }

    /// Defaults from an `owner/repo` slug such as `GITHUB_REPOSITORY`.
    pub fn from_slug(slug: &str) -> Self {
        match slug.split_once('/') {
            Some((org, repo)) if !org.is_empty() && !repo.is_empty() => {
                Self::new(Some(org.to_lowercase()), Some(repo.to_lowercase()))
            }
            _ => Self::default(),
        }
    }

    /// Fill unset parts from `other`.
    pub fn or(self, other: Defaults) -> Self {
        Self {
            url: self.url,
            org: self.org.or(other.org),
            repo: self.repo.or(other.repo),
        }
    }
}

/// A fully qualified image reference. Any part except `url` may hold `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub url: String,
    pub org: String,
    pub repo: String,
    pub tag: String,
}

impl ImageRef {
    /// Parse `[url/]org/repo:tag`, `org/repo:tag`, `repo:tag` or a bare `tag`.
    ///
    /// A reference with a path but no tag gets `latest`. Three or more path
    /// segments start with the registry host; anything after the
    /// organization is the repository.
    pub fn parse(reference: &str, defaults: &Defaults) -> ImageResult<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ImageError::Empty);
        }

        let invalid = |reason: &str| ImageError::Invalid {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        let last_slash = reference.rfind('/');
        let (path, tag) = match reference.rfind(':') {
            Some(colon) if last_slash.is_none_or(|s| colon > s) => {
                (&reference[..colon], &reference[colon + 1..])
            }
            _ if last_slash.is_none() => ("", reference),
            _ => (reference, "latest"),
        };
        if tag.is_empty() {
            return Err(invalid("empty tag"));
        }

        let segments: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').collect()
        };
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        let missing = |field: &'static str| ImageError::MissingDefault {
            reference: reference.to_string(),
            field,
        };
        let default_org = || defaults.org.clone().ok_or_else(|| missing("organization"));

        let (url, org, repo) = match segments.as_slice() {
            [] => (
                defaults.url.clone(),
                default_org()?,
                defaults.repo.clone().ok_or_else(|| missing("repository"))?,
            ),
            [repo] => (defaults.url.clone(), default_org()?, repo.to_string()),
            [org, repo] => (defaults.url.clone(), org.to_string(), repo.to_string()),
            [url, org, rest @ ..] => (url.to_string(), org.to_string(), rest.join("/")),
        };

        if is_wildcard(&url) {
            return Err(ImageError::UnsupportedWildcard {
                reference: reference.to_string(),
                field: "registry",
            });
        }

        Ok(Self { url, org, repo, tag: tag.to_string() })
    }

    pub fn has_wildcard(&self) -> bool {
        is_wildcard(&self.org) || is_wildcard(&self.repo) || is_wildcard(&self.tag)
    }

    /// The same reference with a concrete repository and tag.
    pub fn with(&self, repo: &str, tag: &str) -> Self {
        Self {
            url: self.url.clone(),
            org: self.org.clone(),
            repo: repo.to_string(),
            tag: tag.to_string(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}:{}", self.url, self.org, self.repo, self.tag)
    }
}
