//! The registry: every entity of a cluster document, by type, in document order.

use futures::future::try_join_all;
use serde_yaml_ng::{Mapping, Value as YamlValue};
use shipyard_template::{Context, Engine};
use tracing::debug;

use crate::error::{CoreError, CoreResult, EntityKind, ResolutionError, ValidationError};
use crate::model::{Server, Service, SshKey, Volume};

const SECTIONS: [EntityKind; 4] = [
    EntityKind::SshKey,
    EntityKind::Volume,
    EntityKind::Server,
    EntityKind::Service,
];

/// Named collections of validated entities.
///
/// Built once from a document and passed by reference afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    servers: Vec<Server>,
    services: Vec<Service>,
    ssh_keys: Vec<SshKey>,
    volumes: Vec<Volume>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a document without rendering template strings.
    pub fn parse(yaml: &str) -> CoreResult<Self> {
        let sections = split_sections(yaml)?;
        Self::from_sections(&sections)
    }

    /// Parse a document, render its template strings and validate it.
    ///
    /// Strings in `servers`, `ssh_keys` and `volumes` are rendered against
    /// `ctx`, all entities concurrently. Service strings stay raw; they are
    /// rendered later per server and image.
    pub async fn load(yaml: &str, engine: &Engine, ctx: &Context) -> CoreResult<Self> {
        let mut sections = split_sections(yaml)?;

        for (kind, entries) in sections.iter_mut() {
            if *kind == EntityKind::Service {
                continue;
            }
            let kind = *kind;
            try_join_all(entries.iter_mut().map(|(name, options)| async move {
                render_strings(options, engine, ctx)
                    .await
                    .map_err(|source| CoreError::Render {
                        kind,
                        name: name.clone(),
                        source,
                    })
            }))
            .await?;
        }

        Self::from_sections(&sections)
    }

    fn from_sections(sections: &[(EntityKind, Vec<(String, YamlValue)>)]) -> CoreResult<Self> {
        let mut registry = Registry::new();
        for (kind, entries) in sections {
            for (name, options) in entries {
                match kind {
                    EntityKind::SshKey => registry.insert_ssh_key(SshKey::build(name, options)?)?,
                    EntityKind::Volume => registry.insert_volume(Volume::build(name, options)?)?,
                    EntityKind::Server => registry.insert_server(Server::build(name, options)?)?,
                    EntityKind::Service => registry.insert_service(Service::build(name, options)?)?,
                }
            }
        }

        debug!(
            servers = registry.servers.len(),
            services = registry.services.len(),
            ssh_keys = registry.ssh_keys.len(),
            volumes = registry.volumes.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    pub fn insert_server(&mut self, server: Server) -> Result<(), ValidationError> {
        unique(EntityKind::Server, server.name(), self.server(server.name()).is_some())?;
        self.servers.push(server);
        Ok(())
    }

    pub fn insert_service(&mut self, service: Service) -> Result<(), ValidationError> {
        unique(EntityKind::Service, service.name(), self.service(service.name()).is_some())?;
        self.services.push(service);
        Ok(())
    }

    pub fn insert_ssh_key(&mut self, key: SshKey) -> Result<(), ValidationError> {
        unique(EntityKind::SshKey, key.name(), self.ssh_key(key.name()).is_some())?;
        self.ssh_keys.push(key);
        Ok(())
    }

    pub fn insert_volume(&mut self, volume: Volume) -> Result<(), ValidationError> {
        unique(EntityKind::Volume, volume.name(), self.volume(volume.name()).is_some())?;
        self.volumes.push(volume);
        Ok(())
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn ssh_keys(&self) -> &[SshKey] {
        &self.ssh_keys
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn server(&self, name: &str) -> Option<&Server> {
        self.servers.iter().find(|s| s.name() == name)
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name() == name)
    }

    pub fn ssh_key(&self, name: &str) -> Option<&SshKey> {
        self.ssh_keys.iter().find(|k| k.name() == name)
    }

    pub fn volume(&self, name: &str) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.name() == name)
    }

    pub fn filter_servers<'a>(
        &'a self,
        pred: impl Fn(&Server) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Server> + 'a {
        self.servers.iter().filter(move |s| pred(s))
    }

    /// Servers that run `service`, in document order.
    pub fn servers_running<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a Server> + 'a {
        self.filter_servers(move |s| s.runs(service))
    }

    /// Servers that claim `volume`.
    pub fn servers_claiming<'a>(&'a self, volume: &'a str) -> impl Iterator<Item = &'a Server> + 'a {
        self.filter_servers(move |s| s.claims(volume))
    }

    /// Every ssh key of `server` that resolves, in the order listed.
    pub fn keys_of<'a>(&'a self, server: &'a Server) -> impl Iterator<Item = &'a SshKey> + 'a {
        server.ssh_keys().iter().filter_map(|k| self.ssh_key(k))
    }

    /// The services placed on `server`, in the order listed.
    pub fn services_of<'a>(&'a self, server: &'a Server) -> impl Iterator<Item = &'a Service> + 'a {
        server.services().iter().filter_map(|s| self.service(s))
    }

    /// Check that every `ssh_keys`, `services` and `volumes` reference names
    /// an existing entity.
    pub fn check_references(&self) -> Result<(), ResolutionError> {
        for server in &self.servers {
            let refs = [
                ("ssh_keys", EntityKind::SshKey, server.ssh_keys()),
                ("services", EntityKind::Service, server.services()),
                ("volumes", EntityKind::Volume, server.volumes()),
            ];
            for (field, target_kind, targets) in refs {
                for target in targets {
                    let exists = match target_kind {
                        EntityKind::SshKey => self.ssh_key(target).is_some(),
                        EntityKind::Service => self.service(target).is_some(),
                        EntityKind::Volume => self.volume(target).is_some(),
                        EntityKind::Server => self.server(target).is_some(),
                    };
                    if !exists {
                        return Err(ResolutionError::UnknownReference {
                            kind: EntityKind::Server,
                            name: server.name().to_string(),
                            field: field.to_string(),
                            target_kind,
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn unique(kind: EntityKind, name: &str, exists: bool) -> Result<(), ValidationError> {
    if exists {
        return Err(ValidationError {
            kind,
            name: name.to_string(),
            field: "name".to_string(),
            expected: format!("a name unique among {}", kind.section()),
            received: "a duplicate".to_string(),
        });
    }
    Ok(())
}

type Sections = Vec<(EntityKind, Vec<(String, YamlValue)>)>;

/// Split a document into its four sections of `(name, options)` entries.
fn split_sections(yaml: &str) -> CoreResult<Sections> {
    let doc: YamlValue = serde_yaml_ng::from_str(yaml)?;
    let root = match doc {
        YamlValue::Mapping(m) => m,
        YamlValue::Null => Mapping::new(),
        _ => return Err(CoreError::Document("top level must be a mapping".to_string())),
    };

    for key in root.keys() {
        let known = key
            .as_str()
            .is_some_and(|k| SECTIONS.iter().any(|s| s.section() == k));
        if !known {
            return Err(CoreError::Document(format!(
                "unknown top-level key {key:?}; expected servers, services, ssh_keys or volumes"
            )));
        }
    }

    SECTIONS
        .iter()
        .map(|kind| {
            let entries = match root.get(kind.section()) {
                None | Some(YamlValue::Null) => Vec::new(),
                Some(YamlValue::Mapping(m)) => m
                    .iter()
                    .map(|(k, v)| {
                        let name = k.as_str().ok_or_else(|| {
                            CoreError::Document(format!(
                                "{} keys must be strings, found {k:?}",
                                kind.section()
                            ))
                        })?;
                        Ok((name.to_string(), v.clone()))
                    })
                    .collect::<CoreResult<Vec<_>>>()?,
                Some(_) => {
                    return Err(CoreError::Document(format!(
                        "`{}` must map names to options",
                        kind.section()
                    )));
                }
            };
            Ok((*kind, entries))
        })
        .collect()
}

/// Render every string leaf of `value` (mapping keys excluded) in place.
async fn render_strings(
    value: &mut YamlValue,
    engine: &Engine,
    ctx: &Context,
) -> shipyard_template::TemplateResult<()> {
    let mut leaves = Vec::new();
    collect_strings(value, &mut leaves);
    let rendered = try_join_all(leaves.iter().map(|s| engine.render(s, ctx))).await?;
    for (slot, text) in leaves.into_iter().zip(rendered) {
        *slot = text;
    }
    Ok(())
}

fn collect_strings<'a>(value: &'a mut YamlValue, out: &mut Vec<&'a mut String>) {
    match value {
        YamlValue::String(s) => out.push(s),
        YamlValue::Sequence(items) => {
            for item in items.iter_mut() {
                collect_strings(item, out);
            }
        }
        YamlValue::Mapping(map) => {
            for item in map.values_mut() {
                collect_strings(item, out);
            }
        }
        YamlValue::Tagged(tagged) => collect_strings(&mut tagged.value, out),
        YamlValue::Null | YamlValue::Bool(_) | YamlValue::Number(_) => {}
    }
}
