//! Splits a template into static text and `${...}` expressions.
//!
//! A dynamic segment opens at an unescaped `${` and closes at the matching
//! `}`. Braces inside the expression are counted so object literals such as
//! `${ {a: 1}.a }` are captured whole. `\${` is an escaped, literal `${`.

use crate::error::{TemplateError, TemplateResult};

/// One piece of a lexed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied to the output verbatim.
    Static(String),
    /// Raw expression source between `${` and the matching `}`.
    Dynamic(String),
}

/// Lex `input` into alternating static and dynamic segments.
///
/// Empty static segments are not emitted. Hitting the end of input inside an
/// expression fails with [`TemplateError::Unterminated`].
pub fn lex(input: &str) -> TemplateResult<Vec<Segment>> {
    let chars: Vec<char> = input.chars().collect();
    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if depth == 0 {
            match c {
                '\\' if chars.get(i + 1) == Some(&'$') && chars.get(i + 2) == Some(&'{') => {
                    buf.push_str("${");
                    i += 3;
                    continue;
                }
                '$' if chars.get(i + 1) == Some(&'{') => {
                    if !buf.is_empty() {
                        segments.push(Segment::Static(std::mem::take(&mut buf)));
                    }
                    depth = 1;
                    i += 2;
                    continue;
                }
                _ => buf.push(c),
            }
        } else {
            match c {
                '{' => {
                    depth += 1;
                    buf.push(c);
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        segments.push(Segment::Dynamic(std::mem::take(&mut buf)));
                    } else {
                        buf.push(c);
                    }
                }
                _ => buf.push(c),
            }
        }
        i += 1;
    }

    if depth > 0 {
        return Err(TemplateError::Unterminated { missing: depth });
    }
    if !buf.is_empty() {
        segments.push(Segment::Static(buf));
    }

    Ok(segments)
}
