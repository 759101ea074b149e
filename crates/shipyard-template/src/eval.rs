//! Asynchronous expression evaluation.

use futures::future::try_join_all;

use crate::context::{Context, RESERVED_KEY};
use crate::error::{TemplateError, TemplateResult};
use crate::expr::{BinaryOp, Expr, Literal, UnaryOp};
use crate::value::{BoxFuture, Value};

/// Evaluate `expr` against `ctx`.
///
/// Function calls may suspend; call arguments and array/object elements are
/// evaluated concurrently.
pub fn evaluate<'a>(expr: &'a Expr, ctx: &'a Context) -> BoxFuture<'a, TemplateResult<Value>> {
    Box::pin(async move {
        match expr {
            Expr::Literal(lit) => Ok(literal(lit)),
            Expr::Ident(name) => lookup(name, ctx),
            Expr::Array(items) => {
                let values = try_join_all(items.iter().map(|e| evaluate(e, ctx))).await?;
                Ok(Value::Array(values))
            }
            Expr::Object(props) => {
                let values = try_join_all(props.iter().map(|(_, e)| evaluate(e, ctx))).await?;
                Ok(Value::object(
                    props.iter().map(|(k, _)| k.clone()).zip(values),
                ))
            }
            Expr::Member(target, name) => {
                let target = evaluate(target, ctx).await?;
                member(&target, name)
            }
            Expr::Index(target, index) => {
                let target = evaluate(target, ctx).await?;
                let index = evaluate(index, ctx).await?;
                match (&target, &index) {
                    (Value::Array(items), Value::Number(n)) => {
                        Ok(array_get(items, *n).cloned().unwrap_or_default())
                    }
                    (Value::String(s), Value::Number(n)) => Ok(s
                        .chars()
                        .nth(*n as usize)
                        .filter(|_| n.fract() == 0.0 && *n >= 0.0)
                        .map(|c| Value::String(c.to_string()))
                        .unwrap_or_default()),
                    (_, key) => member(&target, &key.to_string()),
                }
            }
            Expr::Call(callee, args) => {
                let callee = evaluate(callee, ctx).await?;
                let Value::Function(func) = callee else {
                    return Err(TemplateError::Type(format!(
                        "{} is not a function",
                        callee.type_name()
                    )));
                };
                let args = try_join_all(args.iter().map(|e| evaluate(e, ctx))).await?;
                func.call(args).await
            }
            Expr::Unary(op, operand) => {
                let v = evaluate(operand, ctx).await?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
                    UnaryOp::Neg => Ok(Value::Number(-number(&v, "-")?)),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = evaluate(lhs, ctx).await?;
                // Short-circuit operators only evaluate the right side on demand.
                match op {
                    BinaryOp::And if !l.is_truthy() => return Ok(l),
                    BinaryOp::Or if l.is_truthy() => return Ok(l),
                    BinaryOp::Nullish if !l.is_nullish() => return Ok(l),
                    BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => {
                        return evaluate(rhs, ctx).await;
                    }
                    _ => {}
                }
                let r = evaluate(rhs, ctx).await?;
                binary(*op, l, r)
            }
            Expr::Conditional(cond, then, otherwise) => {
                if evaluate(cond, ctx).await?.is_truthy() {
                    evaluate(then, ctx).await
                } else {
                    evaluate(otherwise, ctx).await
                }
            }
        }
    })
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::Undefined => Value::Undefined,
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn lookup(name: &str, ctx: &Context) -> TemplateResult<Value> {
    if name == RESERVED_KEY {
        return Ok(ctx.to_value());
    }
    ctx.get(name)
        .cloned()
        .ok_or_else(|| TemplateError::UnknownIdentifier(name.to_string()))
}

fn member(target: &Value, name: &str) -> TemplateResult<Value> {
    target.member(name).ok_or_else(|| {
        TemplateError::Type(format!(
            "cannot read property `{name}` of {}",
            target.type_name()
        ))
    })
}

fn array_get(items: &[Value], n: f64) -> Option<&Value> {
    if n.fract() != 0.0 || n < 0.0 {
        return None;
    }
    items.get(n as usize)
}

fn number(v: &Value, op: &str) -> TemplateResult<f64> {
    match v {
        Value::Number(n) => Ok(*n),
        other => Err(TemplateError::Type(format!(
            "operator `{op}` expects a number, got {}",
            other.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> TemplateResult<Value> {
    let arith = |sym: &str, f: fn(f64, f64) -> f64| -> TemplateResult<Value> {
        Ok(Value::Number(f(number(&l, sym)?, number(&r, sym)?)))
    };

    match op {
        BinaryOp::Add => match (&l, &r) {
            (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!("{l}{r}"))),
            _ => arith("+", |a, b| a + b),
        },
        BinaryOp::Sub => arith("-", |a, b| a - b),
        BinaryOp::Mul => arith("*", |a, b| a * b),
        BinaryOp::Div => arith("/", |a, b| a / b),
        BinaryOp::Rem => arith("%", |a, b| a % b),
        BinaryOp::Eq => Ok(Value::Bool(l.loose_eq(&r))),
        BinaryOp::Ne => Ok(Value::Bool(!l.loose_eq(&r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&l, &r) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => number(&l, "<")?.partial_cmp(&number(&r, "<")?),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => {
            unreachable!("short-circuit operators are handled before evaluating the right side")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;

    async fn eval_str(src: &str, ctx: &Context) -> TemplateResult<Value> {
        let expr = parse(src)?;
        evaluate(&expr, ctx).await
    }

    #[tokio::test]
    async fn arithmetic_and_concatenation() {
        let ctx = Context::new();
        assert_eq!(eval_str("1 + 2 * 3", &ctx).await.unwrap().to_string(), "7");
        assert_eq!(eval_str("(1 + 2) * 3", &ctx).await.unwrap().to_string(), "9");
        assert_eq!(eval_str("'v' + 1", &ctx).await.unwrap().to_string(), "v1");
        assert_eq!(eval_str("7 % 4", &ctx).await.unwrap().to_string(), "3");
    }

    #[tokio::test]
    async fn member_index_and_length() {
        let ctx = Context::new()
            .with(
                "server",
                Value::object([
                    ("name", Value::from("web")),
                    ("tags", Value::Array(vec!["a".into(), "b".into()])),
                ]),
            )
            .unwrap();
        assert_eq!(eval_str("server.name", &ctx).await.unwrap().to_string(), "web");
        assert_eq!(eval_str("server['name']", &ctx).await.unwrap().to_string(), "web");
        assert_eq!(eval_str("server.tags[1]", &ctx).await.unwrap().to_string(), "b");
        assert_eq!(eval_str("server.tags.length", &ctx).await.unwrap().to_string(), "2");
        assert!(matches!(
            eval_str("server.missing", &ctx).await.unwrap(),
            Value::Undefined
        ));
    }

    #[tokio::test]
    async fn property_of_undefined_is_a_type_error() {
        let ctx = Context::new().with("a", Value::object([("b", Value::Null)])).unwrap();
        let err = eval_str("a.b.c", &ctx).await.unwrap_err();
        assert!(matches!(err, TemplateError::Type(_)));
    }

    #[tokio::test]
    async fn unknown_identifier_is_reported() {
        let err = eval_str("nope", &Context::new()).await.unwrap_err();
        assert!(matches!(err, TemplateError::UnknownIdentifier(name) if name == "nope"));
    }

    #[tokio::test]
    async fn short_circuit_skips_right_side() {
        // `nope` is unbound: evaluating it would fail.
        let ctx = Context::new();
        assert_eq!(eval_str("false && nope", &ctx).await.unwrap().to_string(), "false");
        assert_eq!(eval_str("'x' || nope", &ctx).await.unwrap().to_string(), "x");
        assert_eq!(eval_str("null ?? 'fallback'", &ctx).await.unwrap().to_string(), "fallback");
        assert_eq!(eval_str("1 > 2 ? nope : 'no'", &ctx).await.unwrap().to_string(), "no");
    }

    #[tokio::test]
    async fn calls_context_functions() {
        let mut ctx = Context::new();
        ctx.insert_fn("upper", |args: Vec<Value>| async move {
            let s = args.first().and_then(Value::as_str).unwrap_or_default();
            Ok(Value::String(s.to_uppercase()))
        })
        .unwrap();
        assert_eq!(eval_str("upper('abc')", &ctx).await.unwrap().to_string(), "ABC");

        let err = eval_str("'abc'()", &ctx).await.unwrap_err();
        assert!(matches!(err, TemplateError::Type(_)));
    }

    #[tokio::test]
    async fn reserved_key_aliases_the_context() {
        let ctx = Context::new().with("odd-key", "v").unwrap();
        assert_eq!(
            eval_str("__context['odd-key']", &ctx).await.unwrap().to_string(),
            "v"
        );
    }
}
