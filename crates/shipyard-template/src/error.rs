//! Error types for template lexing, parsing and evaluation.

use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while rendering a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unterminated expression: missing {missing} closing brace(s)")]
    Unterminated { missing: usize },

    #[error("syntax error in `{expression}`: {message}")]
    Syntax { expression: String, message: String },

    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("`{0}` is reserved and cannot be defined in a template context")]
    ReservedKey(String),

    #[error("expression `{expression}` rendered undefined")]
    Undefined { expression: String },

    #[error("{name}(): {message}")]
    Function { name: String, message: String },
}

impl TemplateError {
    /// Build a [`TemplateError::Function`] from inside a bound function.
    pub fn function(name: &str, message: impl Into<String>) -> Self {
        TemplateError::Function {
            name: name.to_string(),
            message: message.into(),
        }
    }
}
