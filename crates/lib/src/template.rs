//! Template parsing and property substitution.
//!
//! Templates are the request bodies of configurations with `{{ .name }}`
//! placeholders. Each placeholder names a resolved property of the owning
//! configuration. The same syntax is used by compound parameters.
//!
//! # Placeholder Format
//!
//! - `{{ .name }}` or `{{.name}}` - value of property `name`
//!
//! String properties are substituted verbatim. Any other JSON value is
//! substituted as its compact JSON text.
//!
//! # Escaping
//!
//! Use `{{{{` to produce a literal `{{`.
//!
//! # Example
//!
//! ```
//! use cfgdeploy_lib::template::{parse, Segment};
//!
//! let segments = parse("zone: {{ .zoneId }}").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("zone: ".to_string()),
//!     Segment::Property("zoneId".to_string()),
//! ]);
//! ```

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::parameter::Properties;

/// A segment of parsed template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A property to be substituted
  Property(String),
}

/// Errors that can occur during template parsing or rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("malformed placeholder '{0}': expected '{{{{ .name }}}}'")]
  Malformed(String),

  #[error("template '{template}' references unknown property '{property}'")]
  MissingProperty { template: String, property: String },

  #[error("template '{template}' did not render valid JSON: {message}")]
  InvalidJson { template: String, message: String },
}

/// Renders a configuration's request body from its resolved properties.
pub trait Template: Send + Sync + fmt::Debug {
  /// Identifier used in error messages (usually the template file name).
  fn id(&self) -> &str;

  /// Render the template with the given properties.
  fn render(&self, properties: &Properties) -> Result<String, TemplateError>;
}

/// A template held in memory and parsed once at construction.
#[derive(Debug, Clone)]
pub struct TextTemplate {
  id: String,
  segments: Vec<Segment>,
}

impl TextTemplate {
  pub fn new(id: impl Into<String>, content: &str) -> Result<Self, TemplateError> {
    Ok(Self {
      id: id.into(),
      segments: parse(content)?,
    })
  }

  /// Names of all properties the template substitutes, in order of appearance.
  pub fn properties(&self) -> Vec<&str> {
    property_names(&self.segments)
  }
}

impl Template for TextTemplate {
  fn id(&self) -> &str {
    &self.id
  }

  fn render(&self, properties: &Properties) -> Result<String, TemplateError> {
    render_segments(&self.id, &self.segments, properties)
  }
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error if a placeholder is unclosed or does not have the
/// `{{ .name }}` shape.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;
  let mut offset = 0;

  while let Some(start) = rest.find("{{") {
    literal.push_str(&rest[..start]);
    let after_open = &rest[start + 2..];

    // Escaped: {{{{ -> {{ (literal)
    if let Some(after_escape) = after_open.strip_prefix("{{") {
      literal.push_str("{{");
      offset += start + 4;
      rest = after_escape;
      continue;
    }

    let Some(end) = after_open.find("}}") else {
      return Err(TemplateError::Unclosed(offset + start));
    };

    let content = &after_open[..end];
    let name = parse_placeholder_content(content)?;

    if !literal.is_empty() {
      segments.push(Segment::Literal(std::mem::take(&mut literal)));
    }
    segments.push(Segment::Property(name));

    offset += start + 2 + end + 2;
    rest = &after_open[end + 2..];
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the content between `{{` and `}}`.
fn parse_placeholder_content(content: &str) -> Result<String, TemplateError> {
  let trimmed = content.trim();
  let name = trimmed
    .strip_prefix('.')
    .ok_or_else(|| TemplateError::Malformed(content.to_string()))?;

  let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-');
  if !valid {
    return Err(TemplateError::Malformed(content.to_string()));
  }

  Ok(name.to_string())
}

/// Names of all properties referenced by the segments, in order of appearance.
pub fn property_names(segments: &[Segment]) -> Vec<&str> {
  segments
    .iter()
    .filter_map(|s| match s {
      Segment::Property(name) => Some(name.as_str()),
      Segment::Literal(_) => None,
    })
    .collect()
}

/// Substitute properties into parsed segments.
pub fn render_segments(template: &str, segments: &[Segment], properties: &Properties) -> Result<String, TemplateError> {
  let mut out = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(text) => out.push_str(text),
      Segment::Property(name) => {
        let value = properties.get(name).ok_or_else(|| TemplateError::MissingProperty {
          template: template.to_string(),
          property: name.clone(),
        })?;
        match value {
          Value::String(s) => out.push_str(s),
          other => out.push_str(&other.to_string()),
        }
      }
    }
  }

  Ok(out)
}

/// Check that a rendered body is valid JSON and return the parsed value.
pub fn validate_json(template: &str, rendered: &str) -> Result<Value, TemplateError> {
  serde_json::from_str(rendered).map_err(|e| TemplateError::InvalidJson {
    template: template.to_string(),
    message: e.to_string(),
  })
}
