//! Package listings used to expand wildcard references.

use std::future::Future;

use reqwest::Client;
use serde::Deserialize;
use shipyard_template::BoxFuture;
use tracing::debug;

use crate::error::{ImageError, ImageResult};

/// GitHub's page size for package listings.
pub const PAGE_SIZE: usize = 30;

/// Lists container packages and their tags.
///
/// Injected into the resolver so tests can run without a network.
pub trait PackageRegistry: Send + Sync {
    /// Names of every container package owned by `org`.
    fn list_packages<'a>(&'a self, org: &'a str) -> BoxFuture<'a, ImageResult<Vec<String>>>;

    /// Every tag of every version of `org/package`.
    fn list_tags<'a>(
        &'a self,
        org: &'a str,
        package: &'a str,
    ) -> BoxFuture<'a, ImageResult<Vec<String>>>;
}

/// The GitHub Packages REST API.
#[derive(Debug, Clone)]
pub struct GithubPackages {
    client: Client,
    api_url: String,
    token: Option<String>,
    token_env: String,
}

#[derive(Deserialize)]
struct Package {
    name: String,
}

#[derive(Deserialize)]
struct PackageVersion {
    #[serde(default)]
    metadata: Option<VersionMetadata>,
}

#[derive(Deserialize)]
struct VersionMetadata {
    #[serde(default)]
    container: Option<ContainerMetadata>,
}

#[derive(Deserialize)]
struct ContainerMetadata {
    #[serde(default)]
    tags: Vec<String>,
}

impl GithubPackages {
    /// `token` is read from the `token_env` variable by the caller; the name
    /// is only kept for error messages.
    pub fn new(api_url: &str, token: Option<String>, token_env: &str) -> ImageResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("shipyard/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            token_env: token_env.to_string(),
        })
    }

    fn token(&self) -> ImageResult<&str> {
        self.token.as_deref().ok_or_else(|| ImageError::MissingCredentials {
            env: self.token_env.clone(),
        })
    }

    async fn get_page<T: for<'de> Deserialize<'de>>(&self, url: &str, page: u32) -> ImageResult<Vec<T>> {
        let token = self.token()?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .query(&[("page", page.to_string()), ("per_page", PAGE_SIZE.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        debug!(url, page, "registry page fetched");
        Ok(response.json::<Vec<T>>().await?)
    }
}

impl PackageRegistry for GithubPackages {
    fn list_packages<'a>(&'a self, org: &'a str) -> BoxFuture<'a, ImageResult<Vec<String>>> {
        Box::pin(async move {
            let url = format!("{}/orgs/{org}/packages?package_type=container", self.api_url);
            let url = url.as_str();
            let packages: Vec<Package> = collect_pages(move |page| self.get_page(url, page)).await?;
            Ok(packages.into_iter().map(|p| p.name).collect())
        })
    }

    fn list_tags<'a>(
        &'a self,
        org: &'a str,
        package: &'a str,
    ) -> BoxFuture<'a, ImageResult<Vec<String>>> {
        Box::pin(async move {
            let url = format!(
                "{}/orgs/{org}/packages/container/{}/versions",
                self.api_url,
                package.replace('/', "%2F")
            );
            let url = url.as_str();
            let versions: Vec<PackageVersion> =
                collect_pages(move |page| self.get_page(url, page)).await?;
            Ok(versions
                .into_iter()
                .filter_map(|v| v.metadata.and_then(|m| m.container))
                .flat_map(|c| c.tags)
                .collect())
        })
    }
}

/// Fetch pages starting at 1 until one comes back shorter than [`PAGE_SIZE`].
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> ImageResult<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ImageResult<Vec<T>>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let batch = fetch(page).await?;
        let last = batch.len() < PAGE_SIZE;
        items.extend(batch);
        if last {
            return Ok(items);
        }
        page += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pagination_stops_at_short_page() {
        let mut requested = Vec::new();
        let items = collect_pages(|page| {
            requested.push(page);
            let len = if page < 3 { PAGE_SIZE } else { 4 };
            async move { Ok((0..len).map(|i| format!("{page}-{i}")).collect::<Vec<_>>()) }
        })
        .await
        .unwrap();
        assert_eq!(requested, vec![1, 2, 3]);
        assert_eq!(items.len(), 2 * PAGE_SIZE + 4);
        assert_eq!(items[0], "1-0");
    }

    #[tokio::test]
    async fn exact_multiple_fetches_one_empty_page() {
        let mut calls = 0;
        let items = collect_pages(|page| {
            calls += 1;
            let len = if page == 1 { PAGE_SIZE } else { 0 };
            async move { Ok(vec![(); len]) }
        })
        .await
        .unwrap();
        assert_eq!(calls, 2);
        assert_eq!(items.len(), PAGE_SIZE);
    }

    #[tokio::test]
    async fn listing_without_token_fails_before_any_request() {
        let registry = GithubPackages::new("https://api.github.com", None, "GITHUB_TOKEN").unwrap();
        let err = registry.list_packages("acme").await.unwrap_err();
        assert!(matches!(err, ImageError::MissingCredentials { ref env } if env == "GITHUB_TOKEN"));
    }

    #[test]
    fn version_payload_yields_tags() {
        let json = r#"[{"id":1,"metadata":{"package_type":"container","container":{"tags":["v1","latest"]}}},{"id":2,"metadata":{"container":{"tags":[]}}}]"#;
        let versions: Vec<PackageVersion> = serde_json::from_str(json).unwrap();
        let tags: Vec<String> = versions
            .into_iter()
            .filter_map(|v| v.metadata.and_then(|m| m.container))
            .flat_map(|c| c.tags)
            .collect();
        assert_eq!(tags, vec!["v1", "latest"]);
    }
}
