//! Lazily resolved configuration parameters.
//!
//! A parameter is a value source that is only evaluated when the configuration
//! owning it is deployed. Nothing is resolved while the dependency graph is
//! built, so a missing environment variable only fails the deployment of the
//! configuration that actually needs it.
//!
//! Only [`Parameter::Reference`] and [`Parameter::Compound`] report
//! references. References to other configurations become dependency graph
//! edges; references to the owning configuration order its own parameters.

pub mod parse;
pub mod reference;
pub mod types;

use std::collections::BTreeSet;

use serde_json::Value;

use crate::identity::Coordinate;
use crate::template::{self, Segment, TemplateError};

pub use parse::{ParseContext, ParseError, ParserFn, ParserRegistry};
pub use reference::{ReferenceError, ReferenceParameter};
pub use types::{NoReferences, ParameterReference, Properties, ReferenceResolver, ResolveContext, ResolveError};

/// A configuration parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
  /// A literal value, including nested maps and lists.
  Value(Value),

  /// The value of an environment variable.
  Environment(EnvironmentParameter),

  /// An ordered list of parameters.
  List(Vec<Parameter>),

  /// A property of another (or the same) configuration.
  Reference(ReferenceParameter),

  /// A format string over sibling parameters of the same configuration.
  Compound(CompoundParameter),
}

/// An environment variable lookup with an optional default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentParameter {
  pub name: String,
  pub default: Option<String>,
}

/// A format string whose placeholders name sibling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundParameter {
  format: String,
  segments: Vec<Segment>,
}

impl CompoundParameter {
  pub fn new(format: impl Into<String>) -> Result<Self, TemplateError> {
    let format = format.into();
    let segments = template::parse(&format)?;
    Ok(Self { format, segments })
  }

  pub fn format(&self) -> &str {
    &self.format
  }

  /// Names of the sibling parameters used by the format, sorted and unique.
  pub fn properties(&self) -> BTreeSet<&str> {
    template::property_names(&self.segments).into_iter().collect()
  }
}

impl Parameter {
  pub fn value(value: impl Into<Value>) -> Self {
    Parameter::Value(value.into())
  }

  pub fn environment(name: impl Into<String>, default: Option<&str>) -> Self {
    Parameter::Environment(EnvironmentParameter {
      name: name.into(),
      default: default.map(str::to_string),
    })
  }

  /// Short name of the parameter kind, as used in definitions.
  pub fn kind(&self) -> &'static str {
    match self {
      Parameter::Value(_) => "value",
      Parameter::Environment(_) => "environment",
      Parameter::List(_) => "list",
      Parameter::Reference(_) => "reference",
      Parameter::Compound(_) => "compound",
    }
  }

  /// All properties this parameter reads, with partial coordinates filled in
  /// from `owner`.
  ///
  /// # Errors
  ///
  /// Returns [`ReferenceError`] for malformed references.
  pub fn references(&self, owner: &Coordinate) -> Result<Vec<ParameterReference>, ReferenceError> {
    let mut refs = Vec::new();
    self.collect_references(owner, &mut refs)?;
    Ok(refs)
  }

  fn collect_references(&self, owner: &Coordinate, refs: &mut Vec<ParameterReference>) -> Result<(), ReferenceError> {
    match self {
      Parameter::Value(_) | Parameter::Environment(_) => {}
      Parameter::Reference(reference) => {
        refs.push(ParameterReference::new(reference.target(owner)?, &reference.property));
      }
      Parameter::Compound(compound) => {
        for name in compound.properties() {
          refs.push(ParameterReference::new(owner.clone(), name));
        }
      }
      Parameter::List(items) => {
        for item in items {
          item.collect_references(owner, refs)?;
        }
      }
    }
    Ok(())
  }

  /// Resolve the parameter to its final value.
  pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Value, ResolveError> {
    match self {
      Parameter::Value(value) => Ok(value.clone()),
      Parameter::Environment(env) => env.resolve(),
      Parameter::List(items) => items
        .iter()
        .enumerate()
        .map(|(index, item)| {
          item.resolve(ctx).map_err(|e| ResolveError::ListElement {
            index,
            source: Box::new(e),
          })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array),
      Parameter::Reference(reference) => {
        let target = reference.target(ctx.owner)?;
        if &target == ctx.owner {
          ctx
            .properties
            .get(&reference.property)
            .cloned()
            .ok_or_else(|| ResolveError::PropertyNotFound {
              target,
              property: reference.property.clone(),
            })
        } else {
          ctx.references.resolve_reference(&target, &reference.property)
        }
      }
      Parameter::Compound(compound) => {
        let rendered = template::render_segments(&compound.format, &compound.segments, ctx.properties)?;
        Ok(Value::String(rendered))
      }
    }
  }
}

impl EnvironmentParameter {
  fn resolve(&self) -> Result<Value, ResolveError> {
    match std::env::var(&self.name) {
      Ok(value) => Ok(Value::String(value)),
      Err(std::env::VarError::NotPresent) => match &self.default {
        Some(default) => Ok(Value::String(default.clone())),
        None => Err(ResolveError::MissingEnvironmentVariable {
          name: self.name.clone(),
        }),
      },
      Err(std::env::VarError::NotUnicode(_)) => Err(ResolveError::NonUnicodeEnvironmentVariable {
        name: self.name.clone(),
      }),
    }
  }
}
