//! Expression syntax: tokenizer and recursive-descent parser.
//!
//! The grammar is a deliberately small JavaScript-like subset:
//!
//! ```text
//! expr        := nullish ( "?" expr ":" expr )?
//! nullish     := or ( "??" or )*
//! or          := and ( "||" and )*
//! and         := equality ( "&&" equality )*
//! equality    := compare ( ( "==" | "!=" ) compare )*
//! compare     := additive ( ( "<" | "<=" | ">" | ">=" ) additive )*
//! additive    := mult ( ( "+" | "-" ) mult )*
//! mult        := unary ( ( "*" | "/" | "%" ) unary )*
//! unary       := ( "-" | "!" ) unary | postfix
//! postfix     := primary ( "." ident | "[" expr "]" | "(" args ")" )*
//! primary     := number | string | ident | "(" expr ")" | array | object
//! ```

use crate::error::{TemplateError, TemplateResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Nullish,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

// Longest operators first so "===" wins over "==" and "=".
const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "(", ")", "[", "]", "{", "}", ",",
    ".", ":", "?", "+", "-", "*", "/", "%", "!", "<", ">",
];

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| format!("invalid number literal `{text}`"))?;
            tokens.push(Token::Number(n));
        } else if c == '"' || c == '\'' {
            let quote = c;
            let mut s = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err("unterminated string literal".to_string()),
                    Some(&ch) if ch == quote => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        let escaped = chars.get(i + 1).ok_or("unterminated string literal")?;
                        s.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => *other,
                        });
                        i += 2;
                    }
                    Some(&ch) => {
                        s.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(s));
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            let punct = PUNCTUATION
                .iter()
                .find(|p| rest.starts_with(**p))
                .ok_or_else(|| format!("unexpected character `{c}`"))?;
            tokens.push(Token::Punct(*punct));
            i += punct.chars().count();
        }
    }

    Ok(tokens)
}

/// Parse expression source into an [`Expr`].
pub fn parse(src: &str) -> TemplateResult<Expr> {
    let syntax = |message: String| TemplateError::Syntax {
        expression: src.trim().to_string(),
        message,
    };

    let tokens = tokenize(src).map_err(syntax)?;
    if tokens.is_empty() {
        return Err(syntax("empty expression".to_string()));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr().map_err(syntax)?;
    if let Some(tok) = parser.peek() {
        return Err(syntax(format!("unexpected trailing token {tok:?}")));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type ParseResult<T> = Result<T, String>;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> ParseResult<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(match self.peek() {
                Some(tok) => format!("expected `{punct}`, found {tok:?}"),
                None => format!("expected `{punct}`, found end of expression"),
            })
        }
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        let cond = self.binary(0)?;
        if self.eat("?") {
            let then = self.expr()?;
            self.expect(":")?;
            let otherwise = self.expr()?;
            return Ok(Expr::Conditional(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    /// Precedence climbing over the binary operator levels, loosest first.
    fn binary(&mut self, level: usize) -> ParseResult<Expr> {
        const LEVELS: &[&[(&str, BinaryOp)]] = &[
            &[("??", BinaryOp::Nullish)],
            &[("||", BinaryOp::Or)],
            &[("&&", BinaryOp::And)],
            &[
                ("===", BinaryOp::Eq),
                ("!==", BinaryOp::Ne),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::Ne),
            ],
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
        ];

        if level == LEVELS.len() {
            return self.unary();
        }

        let mut lhs = self.binary(level + 1)?;
        'outer: loop {
            for (punct, op) in LEVELS[level] {
                if self.eat(punct) {
                    let rhs = self.binary(level + 1)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.eat("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat("!") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(".") {
                match self.next() {
                    Some(Token::Ident(name)) => expr = Expr::Member(Box::new(expr), name),
                    other => return Err(format!("expected property name after `.`, found {other:?}")),
                }
            } else if self.eat("[") {
                let index = self.expr()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat("(") {
                let args = self.list(")")?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to `close`; trailing comma allowed.
    fn list(&mut self, close: &str) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expr()?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Literal::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Literal::String(s))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "null" => Expr::Literal(Literal::Null),
                "undefined" => Expr::Literal(Literal::Undefined),
                _ => Expr::Ident(name),
            }),
            Some(Token::Punct("(")) => {
                let inner = self.expr()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some(Token::Punct("[")) => Ok(Expr::Array(self.list("]")?)),
            Some(Token::Punct("{")) => {
                let mut props = Vec::new();
                while !self.eat("}") {
                    let key = match self.next() {
                        Some(Token::Ident(k)) | Some(Token::Str(k)) => k,
                        Some(Token::Number(n)) => crate::value::Value::Number(n).to_string(),
                        other => return Err(format!("expected object key, found {other:?}")),
                    };
                    self.expect(":")?;
                    props.push((key, self.expr()?));
                    if !self.eat(",") {
                        self.expect("}")?;
                        break;
                    }
                }
                Ok(Expr::Object(props))
            }
            Some(tok) => Err(format!("unexpected token {tok:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}
