//! Typed field access over an entity's YAML options with precise errors.

use std::collections::BTreeMap;

use serde_yaml_ng::{Mapping, Value as YamlValue};

use crate::error::{EntityKind, ValidationError};

/// Human-readable YAML type name used as the "received" half of errors.
pub(crate) fn type_of(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "boolean",
        YamlValue::Number(_) => "number",
        YamlValue::String(_) => "string",
        YamlValue::Sequence(_) => "list",
        YamlValue::Mapping(_) => "mapping",
        YamlValue::Tagged(_) => "tagged value",
    }
}

/// Reads fields of one entity, tagging every error with its kind and name.
pub(crate) struct Fields<'a> {
    kind: EntityKind,
    name: &'a str,
    map: Mapping,
}

impl<'a> Fields<'a> {
    /// Wrap the options of entity `name`; `null` options read as empty.
    pub fn new(kind: EntityKind, name: &'a str, options: &YamlValue) -> Result<Self, ValidationError> {
        let map = match options {
            YamlValue::Mapping(m) => m.clone(),
            YamlValue::Null => Mapping::new(),
            other => {
                return Err(ValidationError {
                    kind,
                    name: name.to_string(),
                    field: "(options)".to_string(),
                    expected: "a mapping".to_string(),
                    received: type_of(other).to_string(),
                });
            }
        };
        Ok(Self { kind, name, map })
    }

    pub fn error(&self, field: &str, expected: &str, received: impl Into<String>) -> ValidationError {
        ValidationError {
            kind: self.kind,
            name: self.name.to_string(),
            field: field.to_string(),
            expected: expected.to_string(),
            received: received.into(),
        }
    }

    fn get(&self, field: &str) -> Option<&YamlValue> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    /// Fail on keys outside `known`.
    pub fn deny_unknown(&self, known: &[&str]) -> Result<(), ValidationError> {
        for key in self.map.keys() {
            let key_str = key.as_str().unwrap_or_default();
            if !known.contains(&key_str) {
                return Err(self.error(
                    key_str,
                    &format!("one of {}", known.join(", ")),
                    "an unknown field",
                ));
            }
        }
        Ok(())
    }

    pub fn string(&self, field: &str) -> Result<Option<String>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(YamlValue::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.error(field, "a string", type_of(other))),
        }
    }

    pub fn required_string(&self, field: &str) -> Result<String, ValidationError> {
        match self.string(field)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            Some(_) => Err(self.error(field, "a non-empty string", "an empty string")),
            None => Err(self.error(field, "a string", "nothing")),
        }
    }

    pub fn number(&self, field: &str) -> Result<Option<f64>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(YamlValue::Number(n)) => Ok(n.as_f64()),
            Some(other) => Err(self.error(field, "a number", type_of(other))),
        }
    }

    /// A list whose items are strings; numbers are accepted and stringified
    /// when `numbers_as_strings` is set (port shorthand such as `- 80`).
    pub fn string_list(
        &self,
        field: &str,
        numbers_as_strings: bool,
    ) -> Result<Vec<String>, ValidationError> {
        let items = match self.get(field) {
            None => return Ok(Vec::new()),
            Some(YamlValue::Sequence(items)) => items,
            Some(other) => return Err(self.error(field, "a list of strings", type_of(other))),
        };
        items
            .iter()
            .map(|item| match item {
                YamlValue::String(s) => Ok(s.clone()),
                YamlValue::Number(n) if numbers_as_strings => Ok(n.to_string()),
                other => Err(self.error(
                    field,
                    "a list of strings",
                    format!("a list containing {}", type_of(other)),
                )),
            })
            .collect()
    }

    pub fn required_list(
        &self,
        field: &str,
        numbers_as_strings: bool,
    ) -> Result<Vec<String>, ValidationError> {
        if self.get(field).is_none() {
            return Err(self.error(field, "a non-empty list", "nothing"));
        }
        let items = self.string_list(field, numbers_as_strings)?;
        if items.is_empty() {
            return Err(self.error(field, "a non-empty list", "an empty list"));
        }
        Ok(items)
    }

    pub fn port_list(&self, field: &str) -> Result<Vec<u16>, ValidationError> {
        let items = match self.get(field) {
            None => return Ok(Vec::new()),
            Some(YamlValue::Sequence(items)) => items,
            Some(other) => return Err(self.error(field, "a list of ports", type_of(other))),
        };
        items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|n| u16::try_from(n).ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        self.error(field, "a list of ports (1-65535)", format!("{item:?}"))
                    })
            })
            .collect()
    }

    /// A string → string mapping; scalar values are stringified.
    pub fn string_map(&self, field: &str) -> Result<BTreeMap<String, String>, ValidationError> {
        let map = match self.get(field) {
            None => return Ok(BTreeMap::new()),
            Some(YamlValue::Mapping(map)) => map,
            Some(other) => return Err(self.error(field, "a mapping of strings", type_of(other))),
        };
        map.iter()
            .map(|(k, v)| {
                let key = k
                    .as_str()
                    .ok_or_else(|| self.error(field, "string keys", type_of(k)))?;
                let value = match v {
                    YamlValue::String(s) => s.clone(),
                    YamlValue::Number(n) => n.to_string(),
                    YamlValue::Bool(b) => b.to_string(),
                    YamlValue::Null => String::new(),
                    other => {
                        return Err(self.error(
                            &format!("{field}.{key}"),
                            "a string",
                            type_of(other),
                        ));
                    }
                };
                Ok((key.to_string(), value))
            })
            .collect()
    }
}
