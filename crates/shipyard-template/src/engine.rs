//! Template rendering: lex, parse, evaluate concurrently, join.

use futures::future::try_join_all;
use tracing::trace;

use crate::context::Context;
use crate::error::{TemplateError, TemplateResult};
use crate::eval::evaluate;
use crate::expr::{Expr, parse};
use crate::lexer::{Segment, lex};

/// Rendering switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Render `undefined` results instead of failing.
    pub allow_undefined: bool,
}

/// Renders templates against a context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Engine {
    options: RenderOptions,
}

enum Piece {
    Text(String),
    Expr { source: String, expr: Expr },
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    /// Render `template` against `ctx`.
    ///
    /// All expressions are parsed before any is evaluated, so a syntax error
    /// anywhere fails the render without running bound functions. Evaluation
    /// of the expressions then runs concurrently and the output keeps the
    /// original segment order.
    pub async fn render(&self, template: &str, ctx: &Context) -> TemplateResult<String> {
        if !template.contains("${") {
            return Ok(template.to_string());
        }

        let pieces = lex(template)?
            .into_iter()
            .map(|segment| match segment {
                Segment::Static(text) => Ok(Piece::Text(text)),
                Segment::Dynamic(source) => {
                    let expr = parse(&source)?;
                    Ok(Piece::Expr { source, expr })
                }
            })
            .collect::<TemplateResult<Vec<_>>>()?;

        let rendered = try_join_all(pieces.iter().map(|piece| async move {
            match piece {
                Piece::Text(text) => Ok(text.clone()),
                Piece::Expr { source, expr } => {
                    let value = evaluate(expr, ctx).await?;
                    let out = value.to_string();
                    if out == "undefined" && !self.options.allow_undefined {
                        return Err(TemplateError::Undefined {
                            expression: source.trim().to_string(),
                        });
                    }
                    Ok(out)
                }
            }
        }))
        .await?;

        trace!(segments = rendered.len(), "template rendered");
        Ok(rendered.concat())
    }
}

/// Render `template` with default options.
pub async fn render(template: &str, ctx: &Context) -> TemplateResult<String> {
    Engine::new().render(template, ctx).await
}

/// The two rendering passes used by the artifact generators.
///
/// The first pass resolves configuration bindings. Placeholders meant for the
/// second pass are written escaped (`\${path}`) so they survive it as
/// `${path}`; the second pass then fills them from the macro context. There
/// are exactly two passes.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    engine: Engine,
    config: &'a Context,
}

impl<'a> Pipeline<'a> {
    pub fn new(engine: Engine, config: &'a Context) -> Self {
        Self { engine, config }
    }

    pub async fn render_config(&self, template: &str) -> TemplateResult<String> {
        self.engine.render(template, self.config).await
    }

    pub async fn render_macros(&self, text: &str, macros: &Context) -> TemplateResult<String> {
        self.engine.render(text, macros).await
    }

    /// Both passes in order.
    pub async fn render(&self, template: &str, macros: &Context) -> TemplateResult<String> {
        let first = self.render_config(template).await?;
        self.render_macros(&first, macros).await
    }
}
