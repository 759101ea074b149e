//! Wildcard expansion of image references.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::error::{ImageError, ImageResult};
use crate::glob::{self, is_wildcard};
use crate::image::Image;
use crate::reference::{DEFAULT_REGISTRY, Defaults, ImageRef};
use crate::registry::PackageRegistry;

/// Expands references into concrete images.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<dyn PackageRegistry>,
    host: String,
}

impl Resolver {
    pub fn new(registry: Arc<dyn PackageRegistry>) -> Self {
        Self {
            registry,
            host: DEFAULT_REGISTRY.to_string(),
        }
    }

    /// Registry host whose packages `registry` lists.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Expand `reference` into concrete references.
    ///
    /// A reference without wildcards comes back unchanged and never touches
    /// the registry. A wildcard repository lists the organization's packages;
    /// a wildcard tag lists the tags of each matching repository.
    pub async fn resolve(&self, reference: &ImageRef) -> ImageResult<Vec<ImageRef>> {
        if !reference.has_wildcard() {
            return Ok(vec![reference.clone()]);
        }
        if is_wildcard(&reference.org) {
            return Err(ImageError::UnsupportedWildcard {
                reference: reference.to_string(),
                field: "organization",
            });
        }
        if reference.url != self.host {
            return Err(ImageError::UnsupportedRegistry {
                registry: reference.url.clone(),
                supported: self.host.clone(),
            });
        }

        let repos = if is_wildcard(&reference.repo) {
            let packages = self.registry.list_packages(&reference.org).await?;
            glob::filter(&reference.repo, packages)
        } else {
            vec![reference.repo.clone()]
        };

        let tags = try_join_all(repos.iter().map(|repo| async move {
            if is_wildcard(&reference.tag) {
                let tags = self.registry.list_tags(&reference.org, repo).await?;
                Ok::<_, ImageError>(glob::filter(&reference.tag, tags))
            } else {
                Ok(vec![reference.tag.clone()])
            }
        }))
        .await?;

        let resolved: Vec<ImageRef> = repos
            .iter()
            .zip(tags)
            .flat_map(|(repo, tags)| tags.into_iter().map(move |tag| reference.with(repo, &tag)))
            .collect();

        if resolved.is_empty() {
            return Err(ImageError::NoMatch(reference.to_string()));
        }
        debug!(reference = %reference, images = resolved.len(), "wildcard expanded");
        Ok(resolved)
    }

    /// Parse and expand every reference of `service`, in the order listed,
    /// dropping duplicates.
    pub async fn resolve_service(
        &self,
        service: &str,
        references: &[String],
        defaults: &Defaults,
    ) -> ImageResult<Vec<Image>> {
        let parsed = references
            .iter()
            .map(|r| ImageRef::parse(r, defaults))
            .collect::<ImageResult<Vec<_>>>()?;
        let expanded = try_join_all(parsed.iter().map(|r| self.resolve(r))).await?;

        let mut images: Vec<Image> = Vec::new();
        for reference in expanded.into_iter().flatten() {
            if images.iter().any(|i| i.reference() == &reference) {
                warn!(service, image = %reference, "image listed twice, keeping the first");
                continue;
            }
            images.push(Image::new(service, reference));
        }
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use shipyard_template::BoxFuture;

    use super::*;

    #[derive(Default)]
    struct FakeRegistry {
        packages: Vec<String>,
        tags: BTreeMap<String, Vec<String>>,
        calls: AtomicUsize,
    }

    impl PackageRegistry for FakeRegistry {
        fn list_packages<'a>(&'a self, _org: &'a str) -> BoxFuture<'a, ImageResult<Vec<String>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(self.packages.clone()) })
        }

        fn list_tags<'a>(
            &'a self,
            _org: &'a str,
            package: &'a str,
        ) -> BoxFuture<'a, ImageResult<Vec<String>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(self.tags.get(package).cloned().unwrap_or_default()) })
        }
    }

    fn fake() -> Arc<FakeRegistry> {
        Arc::new(FakeRegistry {
            packages: vec!["api".into(), "worker".into(), "web".into()],
            tags: BTreeMap::from([
                ("api".into(), vec!["v1".into(), "v2".into(), "latest".into()]),
                ("worker".into(), vec!["v1".into()]),
            ]),
            calls: AtomicUsize::new(0),
        })
    }

    fn parse(s: &str) -> ImageRef {
        ImageRef::parse(s, &Defaults::new(Some("org".into()), Some("shop".into()))).unwrap()
    }

    #[tokio::test]
    async fn concrete_reference_skips_the_registry() {
        let registry = fake();
        let resolver = Resolver::new(registry.clone());
        let out = resolver.resolve(&parse("org/test:v1")).await.unwrap();
        assert_eq!(out, vec![parse("org/test:v1")]);
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wildcard_repo_lists_packages() {
        let registry = fake();
        let resolver = Resolver::new(registry.clone());
        let out = resolver.resolve(&parse("org/*:v1")).await.unwrap();
        let repos: Vec<_> = out.iter().map(|r| r.repo.as_str()).collect();
        assert_eq!(repos, vec!["api", "worker", "web"]);
        assert!(out.iter().all(|r| r.tag == "v1"));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wildcard_tag_lists_versions_per_repo() {
        let resolver = Resolver::new(fake());
        let out = resolver.resolve(&parse("org/a*:v*")).await.unwrap();
        let tags: Vec<_> = out.iter().map(|r| format!("{}:{}", r.repo, r.tag)).collect();
        assert_eq!(tags, vec!["api:v1", "api:v2"]);
    }

    #[tokio::test]
    async fn unsupported_wildcards() {
        let resolver = Resolver::new(fake());
        assert!(matches!(
            resolver.resolve(&parse("*/api:v1")).await,
            Err(ImageError::UnsupportedWildcard { field: "organization", .. })
        ));
        assert!(matches!(
            resolver.resolve(&parse("docker.io/org/*:v1")).await,
            Err(ImageError::UnsupportedRegistry { .. })
        ));
        assert!(matches!(
            resolver.resolve(&parse("org/nothing-*:v1")).await,
            Err(ImageError::NoMatch(_))
        ));
    }

    #[tokio::test]
    async fn service_images_are_named_and_deduplicated() {
        let resolver = Resolver::new(fake());
        let defaults = Defaults::new(Some("org".into()), Some("shop".into()));
        let refs = vec!["api:v1".to_string(), "org/api:v1".to_string(), "latest".to_string()];
        let images = resolver.resolve_service("front", &refs, &defaults).await.unwrap();
        let names: Vec<_> = images.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["front-org-api-v1", "front-org-shop-latest"]);
    }
}
