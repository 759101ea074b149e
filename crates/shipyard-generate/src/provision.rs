//! Terraform JSON for the Hetzner Cloud provider.
//!
//! One file per server, ssh key, volume and volume attachment plus a shared
//! provider file. Attachments mount their volume over SSH, so they are only
//! written once every server, key and volume file exists.

use futures::future::try_join_all;
use serde_json::{Value as JsonValue, json};
use shipyard_core::naming::identifier;
use shipyard_core::{Registry, Server, SshKey, Volume};
use shipyard_template::{Context, Engine, Pipeline, Value};
use tracing::{debug, info};

use crate::error::{GenerateError, GenerateResult};
use crate::layout::{Layout, write};

/// Base image of every server; ships with docker and compose installed.
pub const SERVER_IMAGE: &str = "docker-ce";

/// Firewall ports opened on every server.
pub const BASE_PORTS: [u16; 3] = [22, 80, 443];

/// Mount script of a volume attachment. `${...}` is filled from the
/// configuration; `\${path}` survives that pass and receives the mount point.
const MOUNT_SCRIPT: [&str; 3] = [
    r"mkdir -p \${path}",
    r"mountpoint -q \${path} || mount -o discard,defaults ${device} \${path}",
    r"grep -qs '${device} ' /etc/fstab || echo '${device} \${path} ext4 discard,nofail,defaults 0 0' >> /etc/fstab",
];

/// Check that every volume is claimed by exactly one server.
pub fn check_volume_ownership(registry: &Registry) -> GenerateResult<()> {
    let mut unclaimed = Vec::new();
    let mut shared = Vec::new();
    for volume in registry.volumes() {
        let owners: Vec<String> = registry
            .servers_claiming(volume.name())
            .map(|s| s.name().to_string())
            .collect();
        match owners.len() {
            0 => unclaimed.push(volume.name().to_string()),
            1 => {}
            _ => shared.push((volume.name().to_string(), owners)),
        }
    }
    if unclaimed.is_empty() && shared.is_empty() {
        Ok(())
    } else {
        Err(GenerateError::VolumeOwnership { unclaimed, shared })
    }
}

/// Write every provisioning file below `layout`.
pub async fn write_provisioning(registry: &Registry, layout: &Layout) -> GenerateResult<()> {
    registry.check_references()?;
    check_volume_ownership(registry)?;
    let dir = layout.terraform_dir();

    let keys = registry.ssh_keys().iter().filter(|k| k.public_key().is_some());
    let key_files = keys.map(|key| {
        let path = dir.join(format!("ssh_key_{}.tf.json", identifier(key.name())));
        async move { write_json(&path, &ssh_key_resource(key)).await }
    });
    let server_files = registry.servers().iter().map(|server| {
        let path = dir.join(format!("server_{}.tf.json", identifier(server.name())));
        async move { write_json(&path, &server_resource(registry, server)).await }
    });
    let volume_files = registry.volumes().iter().map(|volume| {
        let path = dir.join(format!("volume_{}.tf.json", identifier(volume.name())));
        async move { write_json(&path, &volume_resource(registry, volume)).await }
    });

    let provider = dir.join("provider.tf.json");
    let provider_json = provider_config();
    futures::try_join!(
        write_json(&provider, &provider_json),
        try_join_all(key_files),
        try_join_all(server_files),
        try_join_all(volume_files),
    )?;

    let pairs: Vec<(&Server, &Volume)> = registry
        .servers()
        .iter()
        .flat_map(|s| s.volumes().iter().filter_map(move |v| Some((s, registry.volume(v)?))))
        .collect();
    try_join_all(pairs.iter().map(|(server, volume)| {
        let path = dir.join(format!(
            "volume_attachment_{}_{}.tf.json",
            identifier(server.name()),
            identifier(volume.name())
        ));
        async move {
            let resource = attachment_resource(registry, server, volume).await?;
            write_json(&path, &resource).await
        }
    }))
    .await?;

    info!(
        servers = registry.servers().len(),
        volumes = registry.volumes().len(),
        attachments = pairs.len(),
        "provisioning files written"
    );
    Ok(())
}

pub fn provider_config() -> JsonValue {
    json!({
        "terraform": {
            "required_providers": {
                "hcloud": { "source": "hetznercloud/hcloud", "version": "~> 1.45" }
            }
        },
        "variable": {
            "hcloud_token": { "type": "string", "sensitive": true }
        },
        "provider": {
            "hcloud": { "token": "${var.hcloud_token}" }
        }
    })
}

pub fn ssh_key_resource(key: &SshKey) -> JsonValue {
    json!({
        "resource": {
            "hcloud_ssh_key": {
                identifier(key.name()): {
                    "name": key.name(),
                    "public_key": key.public_key(),
                }
            }
        }
    })
}

pub fn server_resource(registry: &Registry, server: &Server) -> JsonValue {
    let id = identifier(server.name());
    let ssh_keys: Vec<String> = registry
        .keys_of(server)
        .filter(|k| k.public_key().is_some())
        .map(|k| format!("${{hcloud_ssh_key.{}.id}}", identifier(k.name())))
        .collect();

    let mut ports: Vec<u16> = BASE_PORTS.iter().chain(server.ports()).copied().collect();
    ports.sort_unstable();
    ports.dedup();
    let rules: Vec<JsonValue> = ports
        .iter()
        .map(|port| {
            json!({
                "direction": "in",
                "protocol": "tcp",
                "port": port.to_string(),
                "source_ips": ["0.0.0.0/0", "::/0"],
            })
        })
        .collect();

    let mut instance = json!({
        "name": server.name(),
        "server_type": server.server_type(),
        "image": SERVER_IMAGE,
        "ssh_keys": ssh_keys,
        "firewall_ids": [format!("${{hcloud_firewall.{id}.id}}")],
        "labels": { "managed-by": "shipyard" },
    });
    if let Some(location) = server.location() {
        instance["location"] = json!(location);
    }

    json!({
        "resource": {
            "hcloud_firewall": {
                id.clone(): { "name": format!("{}-firewall", server.name()), "rule": rules }
            },
            "hcloud_server": { id: instance }
        }
    })
}

pub fn volume_resource(registry: &Registry, volume: &Volume) -> JsonValue {
    let owner = registry.servers_claiming(volume.name()).next();
    let mut instance = json!({
        "name": volume.name(),
        "size": volume.size().ceil() as u64,
        "format": "ext4",
    });
    if let Some(owner) = owner {
        instance["location"] = json!(format!(
            "${{hcloud_server.{}.location}}",
            identifier(owner.name())
        ));
    }
    json!({ "resource": { "hcloud_volume": { identifier(volume.name()): instance } } })
}

/// The attachment of `volume` to `server`, mounting it over SSH with the
/// server's first key that has a private half.
pub async fn attachment_resource(
    registry: &Registry,
    server: &Server,
    volume: &Volume,
) -> GenerateResult<JsonValue> {
    let key = registry
        .keys_of(server)
        .find(|k| k.can_connect())
        .ok_or_else(|| GenerateError::NoConnectableKey {
            server: server.name().to_string(),
        })?;
    let server_id = identifier(server.name());
    let volume_id = identifier(volume.name());

    let script = mount_script(volume, &volume_id).await?;
    debug!(server = server.name(), volume = volume.name(), "mount script rendered");

    Ok(json!({
        "resource": {
            "hcloud_volume_attachment": {
                format!("{server_id}_{volume_id}"): {
                    "volume_id": format!("${{hcloud_volume.{volume_id}.id}}"),
                    "server_id": format!("${{hcloud_server.{server_id}.id}}"),
                    "automount": false,
                    "connection": {
                        "type": "ssh",
                        "host": format!("${{hcloud_server.{server_id}.ipv4_address}}"),
                        "user": key.user(),
                        "private_key": format!("${{file(\"../ssh/{}\")}}", key.name()),
                    },
                    "provisioner": [ { "remote-exec": { "inline": script } } ],
                }
            }
        }
    }))
}

async fn mount_script(volume: &Volume, volume_id: &str) -> GenerateResult<Vec<String>> {
    let what = || format!("mount script of volume \"{}\"", volume.name());
    let config = Context::new()
        .with("volume", volume.name())
        .and_then(|c| c.with("device", format!(r"\${{hcloud_volume.{volume_id}.linux_device}}")))
        .map_err(|e| GenerateError::template(what(), e))?;
    let macros = Context::new()
        .with("path", Value::from(volume.path()))
        .map_err(|e| GenerateError::template(what(), e))?;

    let pipeline = Pipeline::new(Engine::new(), &config);
    try_join_all(MOUNT_SCRIPT.iter().map(|line| pipeline.render(line, &macros)))
        .await
        .map_err(|e| GenerateError::template(what(), e))
}

async fn write_json(path: &std::path::Path, value: &JsonValue) -> GenerateResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| GenerateError::Serialize {
        what: path.display().to_string(),
        message: e.to_string(),
    })?;
    write(path, &(text + "\n")).await
}
