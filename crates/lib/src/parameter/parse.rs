//! Parsing of raw parameter definitions.
//!
//! Definitions arrive as `serde_json::Value`s from whatever loader read them.
//! The parsers for each parameter type live in an explicit [`ParserRegistry`]
//! that is handed to the loader, so tests and embedders can register their own
//! parameter types or replace built-in ones.
//!
//! # Definition Shapes
//!
//! - `{"type": "<name>", ...}` - dispatched to the parser registered for `<name>`
//! - `["type", "configId", "property"]` - short-form reference (2 to 4 strings)
//! - anything else - a literal value
//!
//! Built-in types: `value`, `environment`, `list`, `reference`, `compound`.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use thiserror::Error;

use super::reference::{ReferenceError, ReferenceParameter};
use super::{CompoundParameter, EnvironmentParameter, Parameter};
use crate::template::TemplateError;

/// Errors that can occur while parsing a parameter definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("parameter '{parameter}': unknown parameter type '{type_name}'")]
  UnknownType { parameter: String, type_name: String },

  #[error("parameter '{parameter}': missing field '{field}'")]
  MissingField { parameter: String, field: &'static str },

  #[error("parameter '{parameter}': invalid field '{field}': {reason}")]
  InvalidField {
    parameter: String,
    field: &'static str,
    reason: String,
  },

  #[error("parameter '{parameter}': {source}")]
  InvalidReference {
    parameter: String,
    #[source]
    source: ReferenceError,
  },

  #[error("parameter '{parameter}': {source}")]
  Template {
    parameter: String,
    #[source]
    source: TemplateError,
  },
}

/// Context handed to a parser.
pub struct ParseContext<'a> {
  /// The registry, for parsers that contain nested parameters.
  pub registry: &'a ParserRegistry,

  /// Name of the parameter being parsed (used in errors).
  pub name: &'a str,
}

impl ParseContext<'_> {
  fn missing(&self, field: &'static str) -> ParseError {
    ParseError::MissingField {
      parameter: self.name.to_string(),
      field,
    }
  }

  fn invalid(&self, field: &'static str, reason: impl Into<String>) -> ParseError {
    ParseError::InvalidField {
      parameter: self.name.to_string(),
      field,
      reason: reason.into(),
    }
  }

  fn reference_error(&self, source: ReferenceError) -> ParseError {
    ParseError::InvalidReference {
      parameter: self.name.to_string(),
      source,
    }
  }

  fn string_field(&self, raw: &Map<String, Value>, field: &'static str) -> Result<Option<String>, ParseError> {
    match raw.get(field) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::String(s)) => Ok(Some(s.clone())),
      Some(other) => Err(self.invalid(field, format!("expected a string, got {other}"))),
    }
  }
}

/// Parses the fields of a `{"type": ...}` definition into a parameter.
pub type ParserFn = fn(&ParseContext<'_>, &Map<String, Value>) -> Result<Parameter, ParseError>;

/// Maps parameter type names to their parsers.
#[derive(Clone)]
pub struct ParserRegistry {
  parsers: HashMap<String, ParserFn>,
}

impl std::fmt::Debug for ParserRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut names: Vec<_> = self.parsers.keys().collect();
    names.sort();
    f.debug_struct("ParserRegistry").field("types", &names).finish()
  }
}

impl Default for ParserRegistry {
  /// A registry with all built-in parameter types.
  fn default() -> Self {
    let mut registry = Self::empty();
    registry.register("value", parse_value);
    registry.register("environment", parse_environment);
    registry.register("list", parse_list);
    registry.register("reference", parse_reference);
    registry.register("compound", parse_compound);
    registry
  }
}

impl ParserRegistry {
  /// A registry without any parameter types.
  pub fn empty() -> Self {
    Self {
      parsers: HashMap::new(),
    }
  }

  /// Register a parser, returning the one it replaced.
  pub fn register(&mut self, type_name: impl Into<String>, parser: ParserFn) -> Option<ParserFn> {
    self.parsers.insert(type_name.into(), parser)
  }

  pub fn contains(&self, type_name: &str) -> bool {
    self.parsers.contains_key(type_name)
  }

  /// Parse one parameter definition.
  pub fn parse(&self, name: &str, raw: &Value) -> Result<Parameter, ParseError> {
    let ctx = ParseContext { registry: self, name };

    match raw {
      Value::Object(map) => match map.get("type") {
        Some(Value::String(type_name)) => {
          let parser = self.parsers.get(type_name).ok_or_else(|| ParseError::UnknownType {
            parameter: name.to_string(),
            type_name: type_name.clone(),
          })?;
          parser(&ctx, map)
        }
        _ => Ok(Parameter::Value(raw.clone())),
      },
      Value::Array(items) if is_short_form_reference(items) => {
        let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
        ReferenceParameter::from_short_form(&parts)
          .map(Parameter::Reference)
          .map_err(|e| ctx.reference_error(e))
      }
      other => Ok(Parameter::Value(other.clone())),
    }
  }

  /// Parse all parameter definitions of a configuration.
  pub fn parse_all(&self, raw: &Map<String, Value>) -> Result<BTreeMap<String, Parameter>, ParseError> {
    raw
      .iter()
      .map(|(name, value)| Ok((name.clone(), self.parse(name, value)?)))
      .collect()
  }
}

/// Lists of 2 to 4 strings are short-form references.
fn is_short_form_reference(items: &[Value]) -> bool {
  (2..=4).contains(&items.len()) && items.iter().all(Value::is_string)
}

fn parse_value(ctx: &ParseContext<'_>, raw: &Map<String, Value>) -> Result<Parameter, ParseError> {
  raw
    .get("value")
    .cloned()
    .map(Parameter::Value)
    .ok_or_else(|| ctx.missing("value"))
}

fn parse_environment(ctx: &ParseContext<'_>, raw: &Map<String, Value>) -> Result<Parameter, ParseError> {
  let name = ctx.string_field(raw, "name")?.ok_or_else(|| ctx.missing("name"))?;
  if name.is_empty() {
    return Err(ctx.invalid("name", "must not be empty"));
  }

  let default = match raw.get("default") {
    None | Some(Value::Null) => None,
    Some(Value::String(s)) => Some(s.clone()),
    Some(v @ (Value::Number(_) | Value::Bool(_))) => Some(v.to_string()),
    Some(other) => return Err(ctx.invalid("default", format!("expected a scalar, got {other}"))),
  };

  Ok(Parameter::Environment(EnvironmentParameter { name, default }))
}

fn parse_list(ctx: &ParseContext<'_>, raw: &Map<String, Value>) -> Result<Parameter, ParseError> {
  let values = raw.get("values").ok_or_else(|| ctx.missing("values"))?;
  let Value::Array(items) = values else {
    return Err(ctx.invalid("values", "expected a list"));
  };

  items
    .iter()
    .enumerate()
    .map(|(i, item)| ctx.registry.parse(&format!("{}[{}]", ctx.name, i), item))
    .collect::<Result<Vec<_>, _>>()
    .map(Parameter::List)
}

fn parse_reference(ctx: &ParseContext<'_>, raw: &Map<String, Value>) -> Result<Parameter, ParseError> {
  if let Some(short) = raw.get("ref") {
    let Some(items) = short.as_array() else {
      return Err(ctx.invalid("ref", "expected a list of strings"));
    };
    let parts = items
      .iter()
      .map(|v| v.as_str().ok_or_else(|| ctx.invalid("ref", "expected a list of strings")))
      .collect::<Result<Vec<_>, _>>()?;
    return ReferenceParameter::from_short_form(&parts)
      .map(Parameter::Reference)
      .map_err(|e| ctx.reference_error(e));
  }

  let property = ctx.string_field(raw, "property")?.ok_or_else(|| ctx.missing("property"))?;
  ReferenceParameter::new(
    ctx.string_field(raw, "project")?,
    ctx.string_field(raw, "configType")?,
    ctx.string_field(raw, "configId")?,
    property,
  )
  .map(Parameter::Reference)
  .map_err(|e| ctx.reference_error(e))
}

fn parse_compound(ctx: &ParseContext<'_>, raw: &Map<String, Value>) -> Result<Parameter, ParseError> {
  let format = ctx.string_field(raw, "format")?.ok_or_else(|| ctx.missing("format"))?;
  let compound = CompoundParameter::new(format).map_err(|source| ParseError::Template {
    parameter: ctx.name.to_string(),
    source,
  })?;

  // When references are declared, every placeholder must be among them.
  if let Some(declared) = raw.get("references") {
    let Some(declared) = declared.as_array() else {
      return Err(ctx.invalid("references", "expected a list of parameter names"));
    };
    let declared: Vec<&str> = declared.iter().filter_map(Value::as_str).collect();
    if let Some(undeclared) = compound.properties().into_iter().find(|p| !declared.contains(p)) {
      return Err(ctx.invalid(
        "references",
        format!("format uses '{undeclared}' which is not listed"),
      ));
    }
  }

  if compound.properties().contains(ctx.name) {
    return Err(ctx.invalid("format", "a compound parameter cannot reference itself"));
  }

  Ok(Parameter::Compound(compound))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn parse(raw: Value) -> Result<Parameter, ParseError> {
    ParserRegistry::default().parse("param", &raw)
  }

  #[test]
  fn scalars_are_values() {
    assert_eq!(parse(json!("text")).unwrap(), Parameter::value("text"));
    assert_eq!(parse(json!(42)).unwrap(), Parameter::value(42));
    assert_eq!(parse(json!(["only-one"])).unwrap(), Parameter::value(json!(["only-one"])));
    assert_eq!(parse(json!([1, 2])).unwrap(), Parameter::value(json!([1, 2])));
  }

  #[test]
  fn objects_without_type_are_values() {
    assert_eq!(parse(json!({"a": 1})).unwrap(), Parameter::value(json!({"a": 1})));
  }

  #[test]
  fn explicit_value() {
    assert_eq!(
      parse(json!({"type": "value", "value": ["x", "y"]})).unwrap(),
      Parameter::value(json!(["x", "y"]))
    );
    assert!(matches!(
      parse(json!({"type": "value"})),
      Err(ParseError::MissingField { field: "value", .. })
    ));
  }

  #[test]
  fn environment_with_default() {
    assert_eq!(
      parse(json!({"type": "environment", "name": "TOKEN", "default": 5})).unwrap(),
      Parameter::environment("TOKEN", Some("5"))
    );
    assert!(matches!(
      parse(json!({"type": "environment"})),
      Err(ParseError::MissingField { field: "name", .. })
    ));
  }

  #[test]
  fn short_form_reference() {
    match parse(json!(["management-zone", "main", "id"])).unwrap() {
      Parameter::Reference(reference) => {
        assert_eq!(reference.config_type.as_deref(), Some("management-zone"));
        assert_eq!(reference.project, None);
      }
      other => panic!("expected reference, got {other:?}"),
    }
  }

  #[test]
  fn object_reference_with_gap_fails_at_load() {
    let err = parse(json!({
      "type": "reference",
      "project": "infra",
      "configId": "main",
      "property": "id",
    }))
    .unwrap_err();
    assert!(matches!(
      err,
      ParseError::InvalidReference {
        source: ReferenceError::Gap { missing: "type", .. },
        ..
      }
    ));
  }

  #[test]
  fn object_reference_with_ref_list() {
    let param = parse(json!({"type": "reference", "ref": ["apps", "slo", "latency", "id"]})).unwrap();
    assert!(matches!(param, Parameter::Reference(ReferenceParameter { project: Some(_), .. })));
  }

  #[test]
  fn list_parses_nested_definitions() {
    let param = parse(json!({"type": "list", "values": ["a", {"type": "environment", "name": "X"}]})).unwrap();
    assert_eq!(
      param,
      Parameter::List(vec![Parameter::value("a"), Parameter::environment("X", None)])
    );
  }

  #[test]
  fn compound_checks_declared_references() {
    assert!(parse(json!({"type": "compound", "format": "{{ .a }}-{{ .b }}", "references": ["a", "b"]})).is_ok());
    assert!(matches!(
      parse(json!({"type": "compound", "format": "{{ .a }}-{{ .b }}", "references": ["a"]})),
      Err(ParseError::InvalidField { field: "references", .. })
    ));
  }

  #[test]
  fn compound_cannot_reference_itself() {
    assert!(matches!(
      parse(json!({"type": "compound", "format": "{{ .param }}"})),
      Err(ParseError::InvalidField { field: "format", .. })
    ));
  }

  #[test]
  fn unknown_type() {
    assert_eq!(
      parse(json!({"type": "secret", "name": "x"})).unwrap_err(),
      ParseError::UnknownType {
        parameter: "param".to_string(),
        type_name: "secret".to_string(),
      }
    );
  }

  #[test]
  fn registry_overrides_are_local() {
    fn always_42(_: &ParseContext<'_>, _: &Map<String, Value>) -> Result<Parameter, ParseError> {
      Ok(Parameter::value(42))
    }

    let mut registry = ParserRegistry::default();
    assert!(registry.register("environment", always_42).is_some());
    assert_eq!(
      registry.parse("p", &json!({"type": "environment", "name": "X"})).unwrap(),
      Parameter::value(42)
    );

    // The default registry is unaffected.
    assert_eq!(
      ParserRegistry::default()
        .parse("p", &json!({"type": "environment", "name": "X"}))
        .unwrap(),
      Parameter::environment("X", None)
    );
  }

  #[test]
  fn parse_all_keeps_names() {
    let raw = json!({"name": "Overview", "zoneId": ["zone", "main", "id"]});
    let params = ParserRegistry::default().parse_all(raw.as_object().unwrap()).unwrap();
    assert_eq!(params.len(), 2);
    assert_eq!(params["name"], Parameter::value("Overview"));
    assert_eq!(params["zoneId"].kind(), "reference");
  }
}
