//! End-to-end generation against in-memory registry and inspector fakes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_yaml_ng::Value as YamlValue;
use shipyard_core::bindings::global_context_with_env;
use shipyard_core::{ProvisioningState, Registry, ServerDetails};
use shipyard_generate::{
    GenerateError, Layout, Planner, ProxyOptions, generate_all, generate_manifests,
    write_provisioning,
};
use shipyard_image::{Defaults, ImageInspector, ImageResult, PackageRegistry, Resolver};
use shipyard_template::{BoxFuture, Context, Engine};

#[derive(Default)]
struct FakePackages {
    packages: Vec<String>,
    tags: BTreeMap<String, Vec<String>>,
    calls: AtomicUsize,
}

impl PackageRegistry for FakePackages {
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

#[derive(Default)]
struct FakeInspector {
    exposed: BTreeMap<String, Vec<String>>,
    calls: AtomicUsize,
}

impl ImageInspector for FakeInspector {
    fn exposed_ports<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, ImageResult<Vec<String>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(self.exposed.get(reference).cloned().unwrap_or_default()) })
    }
}

struct Fixture {
    registry: Registry,
    state: ProvisioningState,
    resolver: Resolver,
    packages: Arc<FakePackages>,
    inspector: FakeInspector,
    defaults: Defaults,
    globals: Context,
}

impl Fixture {
    async fn new(doc: &str) -> Self {
        let globals = global_context_with_env(
            Path::new("."),
            [("STAGE".to_string(), "prod".to_string())],
        )
        .unwrap();
        let registry = Registry::load(doc, &Engine::new(), &globals).await.unwrap();
        let packages = Arc::new(FakePackages {
            packages: vec!["api".into(), "worker".into()],
            tags: BTreeMap::new(),
            calls: AtomicUsize::new(0),
        });
        Self {
            registry,
            state: ProvisioningState::new(),
            resolver: Resolver::new(packages.clone()),
            packages,
            inspector: FakeInspector::default(),
            defaults: Defaults::new(Some("acme".into()), Some("shop".into())),
            globals,
        }
    }

    fn expose(mut self, reference: &str, ports: &[&str]) -> Self {
        self.inspector
            .exposed
            .insert(reference.to_string(), ports.iter().map(|p| p.to_string()).collect());
        self
    }

    fn provisioned(mut self, server: &str, address: &str) -> Self {
        self.state.insert(
            server,
            ServerDetails {
                address: address.to_string(),
                attributes: serde_json::json!({ "name": server }),
            },
        );
        self
    }

    fn planner(&self) -> Planner<'_> {
        Planner {
            registry: &self.registry,
            state: &self.state,
            resolver: &self.resolver,
            inspector: &self.inspector,
            defaults: &self.defaults,
            globals: &self.globals,
            engine: Engine::new(),
        }
    }
}

const SINGLE: &str = r#"
ssh_keys:
  deploy:
    public_key: ssh-ed25519 AAAA
    private_key: PRIVATE
servers:
  web-1:
    server_type: cx22
    ssh_keys: [deploy]
    services: [shop]
    environment:
      STAGE: "${env.STAGE}"
services:
  shop:
    images: [latest]
    environment:
      PUBLIC_URL: "http://${server.address}"
      IMAGE: "${image.repo}:${image.tag}"
"#;

fn read_yaml(path: &Path) -> YamlValue {
    serde_yaml_ng::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn single_server_with_inspected_port() {
    let fx = Fixture::new(SINGLE)
        .await
        .expose("ghcr.io/acme/shop:latest", &["8080"])
        .provisioned("web-1", "203.0.113.10");
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());

    let deployments = generate_all(&fx.planner(), &layout, ProxyOptions::default())
        .await
        .unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].images.len(), 1);
    assert_eq!(fx.inspector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.packages.calls.load(Ordering::SeqCst), 0);

    let compose = read_yaml(&layout.compose_file("web-1"));
    let services = compose["services"].as_mapping().unwrap();
    assert_eq!(services.len(), 2);
    let shop = &compose["services"]["shop-acme-shop-latest"];
    assert_eq!(shop["image"], "ghcr.io/acme/shop:latest");
    assert_eq!(shop["expose"][0], "8080");
    assert_eq!(shop["environment"]["STAGE"], "prod");
    assert_eq!(shop["environment"]["PUBLIC_URL"], "http://203.0.113.10");
    assert_eq!(shop["environment"]["IMAGE"], "shop:latest");
    assert_eq!(compose["services"]["nginx"]["ports"][0], "8080:8080");

    let nginx = std::fs::read_to_string(layout.nginx_file("web-1")).unwrap();
    assert_eq!(nginx.matches("upstream ").count(), 1);
    assert!(nginx.contains("upstream shop-acme-shop-latest-8080 {\n        least_conn;\n        server shop-acme-shop-latest:8080;"));
    assert!(nginx.contains("listen 8080;"));

    assert!(layout.terraform_dir().join("server_web_1.tf.json").exists());
    assert!(layout.private_key("deploy").exists());
}

#[tokio::test]
async fn private_only_ports_produce_no_upstream_and_remove_stale_config() {
    let doc = SINGLE.replace("images: [latest]", "images: [latest]\n    ports: ['80:80:8080']");
    let fx = Fixture::new(&doc).await;
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    std::fs::create_dir_all(layout.server_dir("web-1")).unwrap();
    std::fs::write(layout.nginx_file("web-1"), "stale").unwrap();

    generate_manifests(&fx.planner(), &layout, ProxyOptions::default())
        .await
        .unwrap();

    assert!(!layout.nginx_file("web-1").exists());
    let compose = read_yaml(&layout.compose_file("web-1"));
    assert!(compose["services"].get("nginx").is_none());
    assert_eq!(compose["services"]["shop-acme-shop-latest"]["ports"][0], "80:8080");
    assert_eq!(fx.inspector.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unprovisioned_address_renders_null() {
    let fx = Fixture::new(SINGLE).await.expose("ghcr.io/acme/shop:latest", &["8080"]);
    let deployments = fx.planner().resolve_all().await.unwrap();
    assert_eq!(deployments[0].address, None);
    assert_eq!(
        deployments[0].images[0].environment["PUBLIC_URL"],
        "http://null"
    );
}

#[tokio::test]
async fn image_without_any_port_fails() {
    let fx = Fixture::new(SINGLE).await;
    let err = fx.planner().resolve_all().await.unwrap_err();
    assert!(matches!(err, GenerateError::Port { ref service, .. } if service == "shop"));
}

#[tokio::test]
async fn wildcard_images_expand_per_package() {
    let doc = SINGLE.replace("images: [latest]", "images: ['acme/*:v1']\n    ports: [8080]");
    let fx = Fixture::new(&doc).await;
    let deployments = fx.planner().resolve_all().await.unwrap();
    let names: Vec<_> = deployments[0].images.iter().map(|d| d.image.name()).collect();
    assert_eq!(names, vec!["shop-acme-api-v1", "shop-acme-worker-v1"]);
    assert_eq!(fx.packages.calls.load(Ordering::SeqCst), 1);
}

const TWO_SERVICES: &str = r#"
ssh_keys:
  deploy:
    public_key: ssh-ed25519 AAAA
servers:
  web-1:
    server_type: cx22
    ssh_keys: [deploy]
    services: [api, web]
services:
  api:
    images: [acme/api:v1]
    ports: ["80:4000:8080"]
  web:
    images: [acme/web:v1]
    ports: ["81:4000:3000"]
"#;

#[tokio::test]
async fn host_port_conflict_names_both_images() {
    let fx = Fixture::new(TWO_SERVICES).await;
    let err = fx.planner().resolve_all().await.unwrap_err();
    match err {
        GenerateError::PortConflict { server, port, images } => {
            assert_eq!(server, "web-1");
            assert_eq!(port, "4000");
            assert_eq!(images, vec!["api-acme-api-v1", "web-acme-web-v1"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn route_conflict_respects_override() {
    let doc = TWO_SERVICES
        .replace(r#"ports: ["80:4000:8080"]"#, "proxies: ['example.com:80:8080']")
        .replace(r#"ports: ["81:4000:3000"]"#, "proxies: ['example.com:80:3000']");
    let fx = Fixture::new(&doc).await;
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());

    let err = generate_manifests(&fx.planner(), &layout, ProxyOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerateError::RouteConflict(_)));

    let options = ProxyOptions {
        allow_override: true,
        ..ProxyOptions::default()
    };
    generate_manifests(&fx.planner(), &layout, options).await.unwrap();
    let nginx = std::fs::read_to_string(layout.nginx_file("web-1")).unwrap();
    assert!(nginx.contains("upstream api-acme-api-v1-8080"));
    assert!(!nginx.contains("upstream web-acme-web-v1-3000"));
}

#[tokio::test]
async fn host_bound_upstreams_span_servers() {
    let doc = r#"
ssh_keys:
  deploy:
    public_key: ssh-ed25519 AAAA
servers:
  web-1:
    server_type: cx22
    ssh_keys: [deploy]
    services: [api]
  web-2:
    server_type: cx22
    ssh_keys: [deploy]
    services: [api]
services:
  api:
    images: [acme/api:v1]
    proxies: ["ip_hash://api.example.com:443:4000:8080/v1"]
"#;
    let fx = Fixture::new(doc)
        .await
        .provisioned("web-1", "10.0.0.1")
        .provisioned("web-2", "10.0.0.2");
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    generate_manifests(&fx.planner(), &layout, ProxyOptions::default())
        .await
        .unwrap();

    for server in ["web-1", "web-2"] {
        let nginx = std::fs::read_to_string(layout.nginx_file(server)).unwrap();
        assert!(nginx.contains(
            "upstream api-acme-api-v1-8080 {\n        ip_hash;\n        server 10.0.0.1:4000;\n        server 10.0.0.2:4000;\n    }"
        ));
        assert!(nginx.contains("server_name api.example.com;"));
        assert!(nginx.contains("location /v1 {"));
    }
}

#[tokio::test]
async fn unclaimed_volume_aborts_provisioning() {
    let doc = format!("{SINGLE}volumes:\n  data:\n    size: 10\n    path: /mnt/data\n");
    let fx = Fixture::new(&doc).await;
    let dir = tempfile::tempdir().unwrap();
    let err = write_provisioning(&fx.registry, &Layout::new(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerateError::VolumeOwnership { ref unclaimed, .. } if unclaimed == &["data"]));
}

#[tokio::test]
async fn service_volumes_map_to_mount_points() {
    let doc = SINGLE
        .replace("services: [shop]", "services: [shop]\n    volumes: [data]")
        .replace(
            "images: [latest]",
            "images: [latest]\n    ports: [8080]\n    volumes: ['data:/var/lib/shop', 'cache:/tmp/cache']",
        );
    let doc = format!("{doc}volumes:\n  data:\n    size: 10\n    path: /mnt/data\n");
    let fx = Fixture::new(&doc).await;
    let deployments = fx.planner().resolve_all().await.unwrap();
    assert_eq!(
        deployments[0].images[0].volumes,
        vec!["/mnt/data:/var/lib/shop", "cache:/tmp/cache"]
    );
}

#[tokio::test]
async fn same_repo_from_two_orgs_keeps_both_images() {
    let doc = TWO_SERVICES
        .replace("services: [api, web]", "services: [api]")
        .replace("images: [acme/api:v1]", "images: [org1/api:v1, org2/api:v1]")
        .replace(r#"ports: ["80:4000:8080"]"#, "ports: ['8080']");
    let fx = Fixture::new(&doc).await;
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    // Both images claim the default route on 8080; the second one is dropped.
    let options = ProxyOptions {
        allow_override: true,
        ..ProxyOptions::default()
    };
    generate_manifests(&fx.planner(), &layout, options).await.unwrap();

    let compose = read_yaml(&layout.compose_file("web-1"));
    let services = compose["services"].as_mapping().unwrap();
    assert_eq!(services.len(), 3);
    assert_eq!(compose["services"]["api-org1-api-v1"]["image"], "ghcr.io/org1/api:v1");
    assert_eq!(compose["services"]["api-org2-api-v1"]["image"], "ghcr.io/org2/api:v1");
}

#[tokio::test]
async fn colliding_image_names_fail() {
    let doc = TWO_SERVICES
        .replace("services: [api, web]", "services: [a, a-acme]")
        .replace("  api:\n    images: [acme/api:v1]", "  a:\n    images: [acme/b-c:v1]")
        .replace("  web:\n    images: [acme/web:v1]", "  a-acme:\n    images: [b/c:v1]")
        .replace(r#"ports: ["80:4000:8080"]"#, "ports: ['8080']")
        .replace(r#"ports: ["81:4000:3000"]"#, "ports: ['3000']");
    let fx = Fixture::new(&doc).await;
    match fx.planner().resolve_all().await.unwrap_err() {
        GenerateError::DuplicateImage { server, name, references } => {
            assert_eq!(server, "web-1");
            assert_eq!(name, "a-acme-b-c-v1");
            assert_eq!(references, vec!["ghcr.io/acme/b-c:v1", "ghcr.io/b/c:v1"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn direct_port_clashing_with_proxy_listener_fails() {
    let doc = TWO_SERVICES
        .replace(r#"ports: ["80:4000:8080"]"#, "ports: ['80:80:8080']")
        .replace(r#"ports: ["81:4000:3000"]"#, "ports: ['80:3000']");
    let fx = Fixture::new(&doc).await;
    let dir = tempfile::tempdir().unwrap();
    let err = generate_manifests(&fx.planner(), &Layout::new(dir.path()), ProxyOptions::default())
        .await
        .unwrap_err();
    match err {
        GenerateError::PortConflict { port, images, .. } => {
            assert_eq!(port, "80");
            assert_eq!(images, vec!["api-acme-api-v1", "nginx"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}
