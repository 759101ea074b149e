//! nginx configuration for one server's reverse proxy.

use futures::future::try_join_all;
use shipyard_template::{Context, Engine, TemplateResult, Value};

use crate::upstream::{Listener, ServerProxy, Upstream};

const CONFIG: &str = r"# Generated by shipyard for ${server}. Do not edit.
events {
    worker_connections 1024;
}

http {
    client_max_body_size 64m;

${upstreams}
${listeners}}
";

const UPSTREAM: &str = r"    upstream ${name} {
${directive}${backends}    }
";

const BACKEND: &str = "        server ${endpoint};\n";

const LISTENER: &str = r"    server {
        listen ${port};
        server_name ${domain};

${locations}    }
";

const LOCATION: &str = r#"        location ${path} {
            proxy_pass http://${upstream};
            proxy_http_version 1.1;
            proxy_set_header Host $host;
            proxy_set_header X-Real-IP $remote_addr;
            proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
            proxy_set_header X-Forwarded-Proto $scheme;
            proxy_set_header Upgrade $http_upgrade;
            proxy_set_header Connection "upgrade";
        }
"#;

/// Render the nginx configuration of `plan`.
pub async fn render_config(plan: &ServerProxy) -> TemplateResult<String> {
    let engine = Engine::new();
    let upstreams = try_join_all(plan.upstreams.iter().map(|u| upstream(&engine, u))).await?;
    let listeners = try_join_all(plan.listeners.iter().map(|l| listener(&engine, l))).await?;

    fill(
        &engine,
        CONFIG,
        [
            ("server", plan.server.clone()),
            ("upstreams", upstreams.join("\n")),
            ("listeners", listeners.join("\n")),
        ],
    )
    .await
}

async fn upstream(engine: &Engine, upstream: &Upstream) -> TemplateResult<String> {
    let backends = try_join_all(
        upstream
            .backends
            .iter()
            .map(|b| fill(engine, BACKEND, [("endpoint", b.endpoint())])),
    )
    .await?;
    let directive = upstream
        .strategy
        .directive()
        .map(|d| format!("        {d};\n"))
        .unwrap_or_default();

    fill(
        engine,
        UPSTREAM,
        [
            ("name", upstream.name.clone()),
            ("directive", directive),
            ("backends", backends.concat()),
        ],
    )
    .await
}

async fn listener(engine: &Engine, listener: &Listener) -> TemplateResult<String> {
    let locations = try_join_all(listener.locations.iter().map(|l| {
        fill(
            engine,
            LOCATION,
            [("path", l.path.clone()), ("upstream", l.upstream.clone())],
        )
    }))
    .await?;

    fill(
        engine,
        LISTENER,
        [
            ("port", listener.port.clone()),
            ("domain", listener.domain.clone()),
            ("locations", locations.join("\n")),
        ],
    )
    .await
}

async fn fill<const N: usize>(
    engine: &Engine,
    template: &str,
    bindings: [(&str, String); N],
) -> TemplateResult<String> {
    let mut ctx = Context::new();
    for (name, value) in bindings {
        ctx.insert(name, Value::String(value))?;
    }
    engine.render(template, &ctx).await
}
