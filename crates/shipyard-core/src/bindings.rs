//! Template bindings available to cluster documents.
//!
//! Global bindings are `env`, `file(name)` and `hostname(name)`. Service
//! strings additionally see `server` (built here) and `image` (built by the
//! image resolver).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shipyard_template::{Context, TemplateError, TemplateResult, Value};

use crate::model::Server;
use crate::naming::sanitize;
use crate::state::ServerDetails;

/// Global bindings with the current process environment.
pub fn global_context(base_dir: &Path) -> TemplateResult<Context> {
    global_context_with_env(base_dir, std::env::vars())
}

/// Global bindings with an explicit environment.
///
/// `file(name)` resolves `name` against `base_dir`, normally the directory of
/// the cluster document.
pub fn global_context_with_env(
    base_dir: &Path,
    env: impl IntoIterator<Item = (String, String)>,
) -> TemplateResult<Context> {
    let mut ctx = Context::new();
    ctx.insert(
        "env",
        Value::object(env.into_iter().map(|(k, v)| (k, Value::String(v)))),
    )?;

    let base: Arc<PathBuf> = Arc::new(base_dir.to_path_buf());
    ctx.insert_fn("file", move |args: Vec<Value>| {
        let base = base.clone();
        async move {
            let name = string_arg("file", &args)?;
            let path = base.join(&name);
            tokio::fs::read_to_string(&path)
                .await
                .map(Value::String)
                .map_err(|e| TemplateError::function("file", format!("{}: {e}", path.display())))
        }
    })?;

    ctx.insert_fn("hostname", |args: Vec<Value>| async move {
        let name = string_arg("hostname", &args)?;
        Ok(Value::String(sanitize(&name)))
    })?;

    Ok(ctx)
}

/// The `server` binding for service strings.
///
/// `address` and `details` are `null` until the server has been provisioned.
pub fn server_value(server: &Server, details: Option<&ServerDetails>) -> Value {
    Value::object([
        ("name", Value::from(server.name())),
        ("server_type", Value::from(server.server_type())),
        ("location", Value::from(server.location())),
        ("address", Value::from(details.map(|d| d.address.as_str()))),
        (
            "details",
            details.map_or(Value::Null, |d| Value::from(&d.attributes)),
        ),
    ])
}

fn string_arg(func: &str, args: &[Value]) -> TemplateResult<String> {
    match args.first() {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(TemplateError::function(
            func,
            format!("expected a string argument, got {}", other.type_name()),
        )),
        None => Err(TemplateError::function(func, "expected one argument")),
    }
}

#[cfg(test)]
mod tests {
    use shipyard_template::render;

    use super::*;

    fn ctx(dir: &Path) -> Context {
        global_context_with_env(dir, [("STAGE".to_string(), "prod".to_string())]).unwrap()
    }

    #[tokio::test]
    async fn env_and_hostname() {
        let ctx = ctx(Path::new("."));
        assert_eq!(render("${env.STAGE}", &ctx).await.unwrap(), "prod");
        assert_eq!(render("${hostname('My Web_1')}", &ctx).await.unwrap(), "my-web-1");
        assert!(render("${env.MISSING}", &ctx).await.is_err());
    }

    #[tokio::test]
    async fn file_reads_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("id.pub"), "ssh-ed25519 AAAA").unwrap();
        let ctx = ctx(dir.path());
        assert_eq!(render("${file('id.pub')}", &ctx).await.unwrap(), "ssh-ed25519 AAAA");

        let err = render("${file('missing')}", &ctx).await.unwrap_err();
        assert!(matches!(err, TemplateError::Function { ref name, .. } if name == "file"));
    }

    #[tokio::test]
    async fn server_binding_exposes_details() {
        let opts = serde_yaml_ng::from_str("server_type: cx22\nssh_keys: [k]\nservices: [s]").unwrap();
        let server = Server::build("web-1", &opts).unwrap();
        let details = ServerDetails {
            address: "203.0.113.10".to_string(),
            attributes: serde_json::json!({"datacenter": "fsn1-dc14"}),
        };
        let ctx = Context::new()
            .with("server", server_value(&server, Some(&details)))
            .unwrap();
        assert_eq!(
            render("${server.name}@${server.address} ${server.details.datacenter}", &ctx)
                .await
                .unwrap(),
            "web-1@203.0.113.10 fsn1-dc14"
        );

        let pending = Context::new().with("server", server_value(&server, None)).unwrap();
        assert_eq!(render("${server.address ?? 'pending'}", &pending).await.unwrap(), "pending");
    }
}
