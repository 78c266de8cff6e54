//! Reference parameters and partial-coordinate fill-in.
//!
//! A reference names a property of another configuration. Leading coordinate
//! fields may be omitted and are then taken from the referencing configuration:
//!
//! | short form                             | target                          |
//! |----------------------------------------|---------------------------------|
//! | `[property]`                           | the referencing configuration   |
//! | `[configId, property]`                 | same project, same type         |
//! | `[type, configId, property]`           | same project                    |
//! | `[project, type, configId, property]`  | fully specified                 |
//!
//! Only leading fields may be omitted. A reference that names the project but
//! omits the type (a gap in the middle) is rejected when it is parsed.

use std::fmt;

use thiserror::Error;

use crate::identity::Coordinate;

/// Errors for malformed references. These are load-time errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
  #[error("reference {reference} omits the {missing} but specifies a field before it; only leading fields may be omitted")]
  Gap { reference: String, missing: &'static str },

  #[error("reference short form needs 1 to 4 elements, got {0}")]
  Length(usize),

  #[error("reference {reference} has an empty {field}")]
  Empty { reference: String, field: &'static str },
}

/// A reference to a property of a (possibly partially specified) configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceParameter {
  pub project: Option<String>,
  pub config_type: Option<String>,
  pub config_id: Option<String>,
  pub property: String,
}

impl ReferenceParameter {
  /// Create a reference from individually specified fields.
  ///
  /// # Errors
  ///
  /// Returns [`ReferenceError::Gap`] if a field is omitted after a field that
  /// was given, and [`ReferenceError::Empty`] for empty fields.
  pub fn new(
    project: Option<String>,
    config_type: Option<String>,
    config_id: Option<String>,
    property: impl Into<String>,
  ) -> Result<Self, ReferenceError> {
    let reference = Self {
      project,
      config_type,
      config_id,
      property: property.into(),
    };
    reference.validate()?;
    Ok(reference)
  }

  /// Create a reference from its list short form.
  pub fn from_short_form<S: AsRef<str>>(parts: &[S]) -> Result<Self, ReferenceError> {
    let owned = |i: usize| Some(parts[i].as_ref().to_string());
    match parts.len() {
      1 => Self::new(None, None, None, parts[0].as_ref()),
      2 => Self::new(None, None, owned(0), parts[1].as_ref()),
      3 => Self::new(None, owned(0), owned(1), parts[2].as_ref()),
      4 => Self::new(owned(0), owned(1), owned(2), parts[3].as_ref()),
      n => Err(ReferenceError::Length(n)),
    }
  }

  /// Reference to a property of the configuration at `coordinate`.
  pub fn to_coordinate(coordinate: &Coordinate, property: impl Into<String>) -> Self {
    Self {
      project: Some(coordinate.project.clone()),
      config_type: Some(coordinate.config_type.clone()),
      config_id: Some(coordinate.config_id.clone()),
      property: property.into(),
    }
  }

  /// Check that only leading fields are omitted and no field is empty.
  pub fn validate(&self) -> Result<(), ReferenceError> {
    let fields = [
      ("project", &self.project),
      ("type", &self.config_type),
      ("config id", &self.config_id),
    ];

    for (field, value) in fields {
      if value.as_deref() == Some("") {
        return Err(ReferenceError::Empty {
          reference: self.to_string(),
          field,
        });
      }
    }
    if self.property.is_empty() {
      return Err(ReferenceError::Empty {
        reference: self.to_string(),
        field: "property",
      });
    }

    if let Some((missing, _)) = fields
      .iter()
      .skip_while(|(_, value)| value.is_none())
      .find(|(_, value)| value.is_none())
    {
      return Err(ReferenceError::Gap {
        reference: self.to_string(),
        missing: *missing,
      });
    }

    Ok(())
  }

  /// The coordinate this reference points to, with omitted leading fields
  /// taken from `owner`.
  pub fn target(&self, owner: &Coordinate) -> Result<Coordinate, ReferenceError> {
    self.validate()?;
    let pick = |given: &Option<String>, fallback: &String| given.clone().unwrap_or_else(|| fallback.clone());
    Ok(Coordinate {
      project: pick(&self.project, &owner.project),
      config_type: pick(&self.config_type, &owner.config_type),
      config_id: pick(&self.config_id, &owner.config_id),
    })
  }
}

impl fmt::Display for ReferenceParameter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "_".to_string());
    write!(
      f,
      "[{}, {}, {}, {}]",
      show(&self.project),
      show(&self.config_type),
      show(&self.config_id),
      self.property
    )
  }
}
