//! Variable context that expressions are evaluated against.

use std::future::Future;

use crate::error::{TemplateError, TemplateResult};
use crate::value::{Function, Value};

/// Identifier that aliases the whole context inside expressions.
///
/// `${__context["odd-key"]}` reaches bindings whose names are not valid
/// identifiers. Defining it explicitly is rejected.
pub const RESERVED_KEY: &str = "__context";

/// An ordered identifier → value mapping.
///
/// Later insertions of an existing name replace the earlier value in place,
/// so a derived context (global bindings + `server` + `image`) keeps the
/// original ordering.
#[derive(Debug, Clone, Default)]
pub struct Context {
    entries: Vec<(String, Value)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> TemplateResult<()> {
        let name = name.into();
        if name == RESERVED_KEY {
            return Err(TemplateError::ReservedKey(name));
        }
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
        Ok(())
    }

    /// Builder form of [`Context::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> TemplateResult<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Bind an async function under `name`.
    pub fn insert_fn<F, Fut>(&mut self, name: &str, f: F) -> TemplateResult<()>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TemplateResult<Value>> + Send + 'static,
    {
        self.insert(name, Function::new(name, f))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Copy every binding of `other` over this context.
    pub fn extend(&mut self, other: &Context) {
        for (name, value) in &other.entries {
            match self.entries.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value.clone(),
                None => self.entries.push((name.clone(), value.clone())),
            }
        }
    }

    /// The context as a single object value (backs [`RESERVED_KEY`]).
    pub fn to_value(&self) -> Value {
        Value::object(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_key_is_rejected() {
        let mut ctx = Context::new();
        let err = ctx.insert(RESERVED_KEY, "x").unwrap_err();
        assert!(matches!(err, TemplateError::ReservedKey(_)));
    }

    #[test]
    fn insert_replaces_in_place() {
        let ctx = Context::new()
            .with("a", 1.0)
            .unwrap()
            .with("b", 2.0)
            .unwrap()
            .with("a", 3.0)
            .unwrap();
        assert_eq!(ctx.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(ctx.get("a").unwrap().to_string(), "3");
    }

    #[test]
    fn extend_overrides_existing_bindings() {
        let mut base = Context::new().with("server", "a").unwrap();
        let overlay = Context::new().with("server", "b").unwrap().with("image", "x").unwrap();
        base.extend(&overlay);
        assert_eq!(base.len(), 2);
        assert_eq!(base.get("server").unwrap().to_string(), "b");
    }
}
