//! Per-server resolution of services into concrete images and ports.
//!
//! Service strings are rendered here, once per (server, image), with the
//! `server` and `image` bindings added to the global context.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use shipyard_core::bindings::server_value;
use shipyard_core::{ProvisioningState, Registry, Server, Service};
use shipyard_image::{Defaults, Image, ImageInspector, Resolver};
use shipyard_proxy::{PortDescriptor, needs_inspection, resolve_ports};
use shipyard_template::{Context, Engine};
use tracing::{debug, info};

use crate::error::{GenerateError, GenerateResult};

/// One image as it runs on one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedImage {
    pub image: Image,
    pub ports: Vec<PortDescriptor>,
    /// Server environment overridden by the service environment.
    pub environment: BTreeMap<String, String>,
    /// Mounts with volume names replaced by their mount points.
    pub volumes: Vec<String>,
}

/// Everything that runs on one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDeployment {
    pub server: String,
    pub address: Option<String>,
    pub images: Vec<DeployedImage>,
}

/// Inputs needed to resolve deployments.
pub struct Planner<'a> {
    pub registry: &'a Registry,
    pub state: &'a ProvisioningState,
    pub resolver: &'a Resolver,
    pub inspector: &'a dyn ImageInspector,
    pub defaults: &'a Defaults,
    pub globals: &'a Context,
    pub engine: Engine,
}

impl Planner<'_> {
    /// Resolve every server, concurrently.
    pub async fn resolve_all(&self) -> GenerateResult<Vec<ServerDeployment>> {
        self.registry.check_references()?;
        try_join_all(self.registry.servers().iter().map(|s| self.resolve_server(s))).await
    }

    /// Resolve the services of `server` and check its host ports.
    pub async fn resolve_server(&self, server: &Server) -> GenerateResult<ServerDeployment> {
        let services: Vec<&Service> = self.registry.services_of(server).collect();
        let per_service = try_join_all(services.iter().map(|service| async move {
            let images = self
                .resolver
                .resolve_service(service.name(), service.images(), self.defaults)
                .await
                .map_err(|source| GenerateError::Image {
                    service: service.name().to_string(),
                    source,
                })?;
            try_join_all(
                images
                    .into_iter()
                    .map(|image| self.deploy_image(server, service, image)),
            )
            .await
        }))
        .await?;

        let deployment = ServerDeployment {
            server: server.name().to_string(),
            address: self.state.server(server.name()).map(|d| d.address.clone()),
            images: per_service.into_iter().flatten().collect(),
        };
        check_image_names(&deployment)?;
        check_host_ports(&deployment)?;

        info!(
            server = %deployment.server,
            images = deployment.images.len(),
            "server resolved"
        );
        Ok(deployment)
    }

    async fn deploy_image(
        &self,
        server: &Server,
        service: &Service,
        image: Image,
    ) -> GenerateResult<DeployedImage> {
        let mut ctx = self.globals.clone();
        let bind = |e| GenerateError::template(format!("service \"{}\"", service.name()), e);
        ctx.insert("server", server_value(server, self.state.server(server.name())))
            .map_err(bind)?;
        ctx.insert("image", image.to_value()).map_err(bind)?;

        let what = |field: &str| format!("service \"{}\" {field} for {}", service.name(), image.name());
        let (ports, proxies, volumes) = futures::try_join!(
            self.render_all(service.ports(), &ctx, what("ports")),
            self.render_all(service.proxies(), &ctx, what("proxies")),
            self.render_all(service.volumes(), &ctx, what("volumes")),
        )?;
        let env_keys: Vec<&String> = service.environment().keys().collect();
        let env_values: Vec<String> = service.environment().values().cloned().collect();
        let env_values = self.render_all(&env_values, &ctx, what("environment")).await?;

        let exposed = if needs_inspection(&ports, &proxies) {
            self.inspector
                .exposed_ports(&image.qualified())
                .await
                .map_err(|source| GenerateError::Image {
                    service: service.name().to_string(),
                    source,
                })?
        } else {
            Vec::new()
        };

        let ports = resolve_ports(image.name(), &ports, &proxies, &exposed).map_err(|source| {
            GenerateError::Port {
                service: service.name().to_string(),
                image: image.name().to_string(),
                source,
            }
        })?;

        let mut environment = server.environment().clone();
        environment.extend(env_keys.into_iter().cloned().zip(env_values));

        let volumes = volumes
            .iter()
            .map(|mount| self.resolve_mount(server, mount))
            .collect();

        debug!(
            server = server.name(),
            image = image.name(),
            ports = ports.len(),
            "image deployed"
        );
        Ok(DeployedImage {
            image,
            ports,
            environment,
            volumes,
        })
    }

    async fn render_all(
        &self,
        templates: &[String],
        ctx: &Context,
        what: String,
    ) -> GenerateResult<Vec<String>> {
        try_join_all(templates.iter().map(|t| self.engine.render(t, ctx)))
            .await
            .map_err(|e| GenerateError::template(what, e))
    }

    /// `volume:/target[:mode]` with `volume` claimed by `server` mounts the
    /// volume's path; any other source is passed through.
    fn resolve_mount(&self, server: &Server, mount: &str) -> String {
        let Some((source, rest)) = mount.split_once(':') else {
            return mount.to_string();
        };
        match self.registry.volume(source) {
            Some(volume) if server.claims(source) => format!("{}:{rest}", volume.path()),
            _ => mount.to_string(),
        }
    }
}

/// Fail when two images of one server share a name: compose services and
/// upstreams are keyed by it.
pub fn check_image_names(deployment: &ServerDeployment) -> GenerateResult<()> {
    let mut by_name: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for deployed in &deployment.images {
        by_name
            .entry(deployed.image.name())
            .or_default()
            .push(deployed.image.qualified());
    }

    match by_name.into_iter().find(|(_, refs)| refs.len() > 1) {
        Some((name, references)) => Err(GenerateError::DuplicateImage {
            server: deployment.server.clone(),
            name: name.to_string(),
            references,
        }),
        None => Ok(()),
    }
}

/// Fail when two images (or two ports of one image) bind the same host port.
pub fn check_host_ports(deployment: &ServerDeployment) -> GenerateResult<()> {
    let mut bound: BTreeMap<u16, Vec<String>> = BTreeMap::new();
    for deployed in &deployment.images {
        for port in &deployed.ports {
            if let Some(p) = port.bound_port().and_then(|p| p.parse().ok()) {
                bound.entry(p).or_default().push(deployed.image.name().to_string());
            }
        }
    }

    match bound.into_iter().find(|(_, images)| images.len() > 1) {
        Some((port, images)) => Err(GenerateError::PortConflict {
            server: deployment.server.clone(),
            port: port.to_string(),
            images,
        }),
        None => Ok(()),
    }
}
