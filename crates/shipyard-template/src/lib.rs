//! shipyard-template: the `${...}` interpolation engine.
//!
//! Templates are plain strings with embedded expressions. The engine splits a
//! template into static and dynamic segments, evaluates every dynamic segment
//! against a [`Context`] and joins the results back in order.
//!
//! # Architecture
//!
//! ```text
//! template ──lex──▶ [Static | Dynamic]* ──parse──▶ Expr ──eval (concurrent)──▶ Value
//!                                                                    └──display──▶ String
//! ```
//!
//! Expressions are interpreted by a small, restricted evaluator: literals,
//! member access, arithmetic, comparisons and calls to functions that the
//! caller placed into the context. Nothing outside the context is reachable.
//!
//! Rendering that needs a second pass (caller-injected macros that must
//! survive the first pass) goes through [`Pipeline`].

pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod expr;
pub mod lexer;
pub mod value;

pub use context::{Context, RESERVED_KEY};
pub use engine::{Engine, Pipeline, RenderOptions, render};
pub use error::{TemplateError, TemplateResult};
pub use lexer::{Segment, lex};
pub use value::{BoxFuture, Function, Value};
