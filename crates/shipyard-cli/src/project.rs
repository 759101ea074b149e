//! Everything a command needs: settings, the loaded cluster document and the
//! image resolution services.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow};
use shipyard_core::bindings::global_context;
use shipyard_core::{ProvisioningState, Registry, ShipyardSettings};
use shipyard_generate::{Layout, Planner, ProxyOptions};
use shipyard_image::{Defaults, DockerInspector, GithubPackages, Resolver};
use shipyard_proxy::Strategy;
use shipyard_template::{Context, Engine};
use tracing::{debug, info};

use crate::ProjectArgs;

/// `owner/repo` of the repository the tool runs for, set by CI.
const REPOSITORY_ENV: &str = "GITHUB_REPOSITORY";

pub struct Project {
    pub settings: ShipyardSettings,
    pub layout: Layout,
    pub registry: Registry,
    pub globals: Context,
    pub defaults: Defaults,
    pub resolver: Resolver,
    pub inspector: DockerInspector,
    pub options: ProxyOptions,
}

impl Project {
    pub async fn load(args: &ProjectArgs) -> Result<Self> {
        let settings = load_settings(&args.settings)?;
        let layout = Layout::new(output_dir(args.output.as_deref(), &settings));

        let yaml = tokio::fs::read_to_string(&args.config)
            .await
            .with_context(|| format!("failed to read {}", args.config.display()))?;
        let base_dir = args
            .config
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let globals = global_context(base_dir)?;
        let registry = Registry::load(&yaml, &Engine::new(), &globals)
            .await
            .with_context(|| format!("invalid cluster document {}", args.config.display()))?;
        info!(
            servers = registry.servers().len(),
            services = registry.services().len(),
            ssh_keys = registry.ssh_keys().len(),
            volumes = registry.volumes().len(),
            "cluster document loaded"
        );

        let defaults = image_defaults(&settings, std::env::var(REPOSITORY_ENV).ok().as_deref());
        debug!(org = ?defaults.org, repo = ?defaults.repo, "image defaults");

        let token = std::env::var(&settings.registry.token_env).ok();
        let packages = GithubPackages::new(
            &settings.registry.api_url,
            token,
            &settings.registry.token_env,
        )?;
        let resolver = Resolver::new(Arc::new(packages)).with_host(settings.registry.host.clone());
        let options = proxy_options(&settings, args.allow_override)?;

        Ok(Self {
            settings,
            layout,
            registry,
            globals,
            defaults,
            resolver,
            inspector: DockerInspector::default(),
            options,
        })
    }

    /// Read the provisioning state left by the last `terraform apply`.
    pub async fn state(&self) -> Result<ProvisioningState> {
        let path = self.layout.state_file();
        let state = ProvisioningState::load(&path)
            .await
            .with_context(|| format!("failed to read provisioning state {}", path.display()))?;
        debug!(servers = state.len(), "provisioning state loaded");
        Ok(state)
    }

    pub fn planner<'a>(&'a self, state: &'a ProvisioningState) -> Planner<'a> {
        Planner {
            registry: &self.registry,
            state,
            resolver: &self.resolver,
            inspector: &self.inspector,
            defaults: &self.defaults,
            globals: &self.globals,
            engine: Engine::new(),
        }
    }
}

pub fn load_settings(path: &Path) -> Result<ShipyardSettings> {
    ShipyardSettings::load_or_default(path)
        .with_context(|| format!("failed to load settings {}", path.display()))
}

/// The `--output` flag wins over the settings file.
pub fn output_dir(flag: Option<&Path>, settings: &ShipyardSettings) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| settings.output_dir.clone())
}

/// Settings first, then the CI repository slug.
fn image_defaults(settings: &ShipyardSettings, slug: Option<&str>) -> Defaults {
    let configured = Defaults::new(settings.registry.org.clone(), settings.registry.repo.clone());
    match slug {
        Some(slug) => configured.or(Defaults::from_slug(slug)),
        None => configured,
    }
}

fn proxy_options(settings: &ShipyardSettings, allow_override: bool) -> Result<ProxyOptions> {
    let default_strategy = Strategy::from_str(&settings.proxy.default_strategy)
        .map_err(|e| anyhow!("proxy.default_strategy: {e}"))?;
    Ok(ProxyOptions {
        allow_override: allow_override || settings.proxy.allow_override,
        default_strategy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults_win_over_slug() {
        let mut settings = ShipyardSettings::default();
        settings.registry.org = Some("acme".into());
        let defaults = image_defaults(&settings, Some("Other/Shop"));
        assert_eq!(defaults.org.as_deref(), Some("acme"));
        assert_eq!(defaults.repo.as_deref(), Some("shop"));
    }

    #[test]
    fn output_flag_overrides_settings() {
        let settings = ShipyardSettings::default();
        assert_eq!(output_dir(None, &settings), PathBuf::from(".shipyard"));
        assert_eq!(
            output_dir(Some(Path::new("out")), &settings),
            PathBuf::from("out")
        );
    }

    #[test]
    fn proxy_options_merge_flag_and_settings() {
        let mut settings = ShipyardSettings::default();
        let options = proxy_options(&settings, false).unwrap();
        assert!(!options.allow_override);
        assert_eq!(options.default_strategy, Strategy::LeastConn);

        settings.proxy.allow_override = true;
        settings.proxy.default_strategy = "ip_hash".into();
        let options = proxy_options(&settings, false).unwrap();
        assert!(options.allow_override);
        assert_eq!(options.default_strategy, Strategy::IpHash);

        settings.proxy.default_strategy = "fastest".into();
        assert!(proxy_options(&settings, true).is_err());
    }
}
