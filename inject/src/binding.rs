//! Binding of raw request inputs to declared parameters.
//!
//! Extraction of raw values (path segments, query strings, headers, bodies) happens
//! elsewhere. This module only coerces an already-extracted value to its declared
//! [`InputKind`] and applies the additional [`Constraint`]s attached to the parameter.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::error::{BindingError, Violation};

/// The raw, already-extracted inputs available to one resolution.
///
/// Values are kept as JSON so that query strings (`"100"`), repeated keys
/// (`["a", "b"]`) and structured bodies can share one representation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInputs {
  values: HashMap<String, Value>,
}

impl RawInputs {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds or replaces a raw value, returning `self` for chaining.
  pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.insert(name, value);
    self
  }

  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
    self.values.insert(name.into(), value.into());
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.values.get(name)
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawInputs {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self {
      values: iter
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    }
  }
}

/// The declared type of a raw input parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
  String,
  Integer,
  Float,
  Boolean,
  /// A repeated parameter. A single scalar is accepted as a one-element list.
  List(Box<InputKind>),
  /// Passed through untouched, e.g. a structured body.
  Any,
}

impl InputKind {
  pub fn list_of(kind: InputKind) -> Self {
    InputKind::List(Box::new(kind))
  }

  /// Coerces a raw value to this kind, or `None` if it cannot be represented.
  pub(crate) fn coerce(&self, raw: &Value) -> Option<Value> {
    match self {
      InputKind::Any => Some(raw.clone()),
      InputKind::String => match raw {
        Value::String(_) => Some(raw.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
      },
      InputKind::Integer => match raw {
        Value::Number(n) => n.as_i64().map(Value::from),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
      },
      InputKind::Float => match raw {
        Value::Number(n) => n.as_f64().map(Value::from),
        Value::String(s) => s
          .trim()
          .parse::<f64>()
          .ok()
          .filter(|f| f.is_finite())
          .map(Value::from),
        _ => None,
      },
      InputKind::Boolean => match raw {
        Value::Bool(_) => Some(raw.clone()),
        Value::Number(n) => match n.as_i64() {
          Some(0) => Some(Value::Bool(false)),
          Some(1) => Some(Value::Bool(true)),
          _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
          "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
          "false" | "0" | "no" | "off" => Some(Value::Bool(false)),
          _ => None,
        },
        _ => None,
      },
      InputKind::List(inner) => match raw {
        Value::Array(items) => items
          .iter()
          .map(|item| inner.coerce(item))
          .collect::<Option<Vec<_>>>()
          .map(Value::Array),
        Value::Null => None,
        scalar => inner.coerce(scalar).map(|v| Value::Array(vec![v])),
      },
    }
  }
}

impl fmt::Display for InputKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InputKind::String => f.write_str("string"),
      InputKind::Integer => f.write_str("integer"),
      InputKind::Float => f.write_str("float"),
      InputKind::Boolean => f.write_str("boolean"),
      InputKind::List(inner) => write!(f, "list of {}", inner),
      InputKind::Any => f.write_str("value"),
    }
  }
}

/// An additional check applied to a bound value.
#[derive(Debug, Clone)]
pub enum Constraint {
  /// Minimum number of characters (strings) or elements (lists).
  MinLength(usize),
  MaxLength(usize),
  /// Strings must match the regex. Applied to every element of a list.
  Pattern(Regex),
  /// Membership in a fixed set of values, compared by their string form.
  OneOf(Vec<String>),
  Ge(f64),
  Gt(f64),
  Le(f64),
  Lt(f64),
}

impl Constraint {
  pub fn name(&self) -> &'static str {
    match self {
      Constraint::MinLength(_) => "min_length",
      Constraint::MaxLength(_) => "max_length",
      Constraint::Pattern(_) => "pattern",
      Constraint::OneOf(_) => "one_of",
      Constraint::Ge(_) => "ge",
      Constraint::Gt(_) => "gt",
      Constraint::Le(_) => "le",
      Constraint::Lt(_) => "lt",
    }
  }

  /// Whether this constraint can ever hold or fail for values of `kind`.
  pub fn applies_to(&self, kind: &InputKind) -> bool {
    match (self, kind) {
      (_, InputKind::Any) | (Constraint::OneOf(_), _) => true,
      (Constraint::MinLength(_) | Constraint::MaxLength(_), k) => {
        matches!(k, InputKind::String | InputKind::List(_))
      }
      (_, InputKind::List(inner)) => self.applies_to(inner),
      (Constraint::Pattern(_), k) => *k == InputKind::String,
      (_, k) => matches!(k, InputKind::Integer | InputKind::Float),
    }
  }

  fn check(&self, value: &Value) -> Result<(), Violation> {
    match self {
      Constraint::MinLength(min) => match length_of(value) {
        Some(actual) if actual < *min => Err(Violation::MinLength { min: *min, actual }),
        _ => Ok(()),
      },
      Constraint::MaxLength(max) => match length_of(value) {
        Some(actual) if actual > *max => Err(Violation::MaxLength { max: *max, actual }),
        _ => Ok(()),
      },
      Constraint::Pattern(re) => each_scalar(value, |v| match v {
        Value::String(s) if !re.is_match(s) => Err(Violation::Pattern {
          pattern: re.as_str().to_owned(),
        }),
        _ => Ok(()),
      }),
      Constraint::OneOf(allowed) => each_scalar(value, |v| {
        let text = match v {
          Value::String(s) => s.clone(),
          other => other.to_string(),
        };
        if allowed.iter().any(|a| *a == text) {
          Ok(())
        } else {
          Err(Violation::NotOneOf {
            allowed: allowed.clone(),
          })
        }
      }),
      Constraint::Ge(bound) => numeric_bound(value, |n| n >= *bound, || format!(">= {}", bound)),
      Constraint::Gt(bound) => numeric_bound(value, |n| n > *bound, || format!("> {}", bound)),
      Constraint::Le(bound) => numeric_bound(value, |n| n <= *bound, || format!("<= {}", bound)),
      Constraint::Lt(bound) => numeric_bound(value, |n| n < *bound, || format!("< {}", bound)),
    }
  }
}

fn length_of(value: &Value) -> Option<usize> {
  match value {
    Value::String(s) => Some(s.chars().count()),
    Value::Array(items) => Some(items.len()),
    _ => None,
  }
}

fn each_scalar(
  value: &Value,
  mut f: impl FnMut(&Value) -> Result<(), Violation>,
) -> Result<(), Violation> {
  match value {
    Value::Array(items) => items.iter().try_for_each(f),
    other => f(other),
  }
}

fn numeric_bound(
  value: &Value,
  holds: impl Fn(f64) -> bool,
  describe: impl Fn() -> String,
) -> Result<(), Violation> {
  each_scalar(value, |v| match v.as_f64() {
    Some(n) if !holds(n) => Err(Violation::OutOfRange { bound: describe() }),
    _ => Ok(()),
  })
}

/// A declared raw input parameter of a dependency.
#[derive(Debug, Clone)]
pub struct Input {
  name: String,
  alias: Option<String>,
  kind: InputKind,
  default: Option<Value>,
  required: bool,
  constraints: Vec<Constraint>,
}

impl Input {
  /// An input that must be present in the raw inputs.
  pub fn required(name: impl Into<String>, kind: InputKind) -> Self {
    Self::new(name, kind, None, true)
  }

  /// An input that binds to `null` when absent.
  pub fn optional(name: impl Into<String>, kind: InputKind) -> Self {
    Self::new(name, kind, None, false)
  }

  /// An input that falls back to `default` when absent.
  pub fn with_default(name: impl Into<String>, kind: InputKind, default: impl Into<Value>) -> Self {
    Self::new(name, kind, Some(default.into()), false)
  }

  fn new(name: impl Into<String>, kind: InputKind, default: Option<Value>, required: bool) -> Self {
    Self {
      name: name.into(),
      alias: None,
      kind,
      default,
      required,
      constraints: Vec::new(),
    }
  }

  /// Looks the value up under `alias` instead of the parameter name.
  pub fn alias(mut self, alias: impl Into<String>) -> Self {
    self.alias = Some(alias.into());
    self
  }

  /// Attaches a constraint. One that cannot apply to this input's kind, such as
  /// `max_length` on an integer, makes every binding of the input fail.
  pub fn constraint(mut self, constraint: Constraint) -> Self {
    if !constraint.applies_to(&self.kind) {
      tracing::warn!(
        input = %self.name,
        constraint = constraint.name(),
        kind = %self.kind,
        "Constraint does not apply to the input kind"
      );
    }
    self.constraints.push(constraint);
    self
  }

  pub fn min_length(self, min: usize) -> Self {
    self.constraint(Constraint::MinLength(min))
  }

  pub fn max_length(self, max: usize) -> Self {
    self.constraint(Constraint::MaxLength(max))
  }

  pub fn pattern(self, re: Regex) -> Self {
    self.constraint(Constraint::Pattern(re))
  }

  pub fn one_of<I, S>(self, allowed: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.constraint(Constraint::OneOf(allowed.into_iter().map(Into::into).collect()))
  }

  pub fn ge(self, bound: f64) -> Self {
    self.constraint(Constraint::Ge(bound))
  }

  pub fn gt(self, bound: f64) -> Self {
    self.constraint(Constraint::Gt(bound))
  }

  pub fn le(self, bound: f64) -> Self {
    self.constraint(Constraint::Le(bound))
  }

  pub fn lt(self, bound: f64) -> Self {
    self.constraint(Constraint::Lt(bound))
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> &InputKind {
    &self.kind
  }

  /// The key this input is read from in [`RawInputs`].
  pub fn key(&self) -> &str {
    self.alias.as_deref().unwrap_or(&self.name)
  }

  /// Binds this input from `raw`, naming `dependency` in any error.
  pub(crate) fn bind(&self, dependency: &str, raw: &RawInputs) -> Result<Value, BindingError> {
    let fail = |violation| BindingError {
      dependency: dependency.to_owned(),
      parameter: self.name.clone(),
      violation,
    };

    if let Some(c) = self.constraints.iter().find(|c| !c.applies_to(&self.kind)) {
      return Err(fail(Violation::Inapplicable {
        constraint: c.name().to_owned(),
        kind: self.kind.to_string(),
      }));
    }

    let source = match raw.get(self.key()).filter(|v| !v.is_null()) {
      Some(v) => v,
      None => match &self.default {
        Some(default) => default,
        None if self.required => return Err(fail(Violation::Missing)),
        None => return Ok(Value::Null),
      },
    };

    if source.is_null() {
      return Ok(Value::Null);
    }

    let value = self.kind.coerce(source).ok_or_else(|| {
      fail(Violation::Malformed {
        expected: self.kind.to_string(),
      })
    })?;

    for constraint in &self.constraints {
      constraint.check(&value).map_err(fail)?;
    }
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn raw(pairs: &[(&str, Value)]) -> RawInputs {
    pairs.iter().cloned().collect()
  }

  #[test]
  fn test_integer_is_parsed_from_query_string() {
    let input = Input::with_default("skip", InputKind::Integer, 0);
    let bound = input.bind("common", &raw(&[("skip", json!("100"))])).unwrap();
    assert_eq!(bound, json!(100));
  }

  #[test]
  fn test_default_is_used_when_absent() {
    let input = Input::with_default("limit", InputKind::Integer, 100);
    assert_eq!(input.bind("common", &RawInputs::new()).unwrap(), json!(100));
  }

  #[test]
  fn test_optional_binds_null_when_absent() {
    let input = Input::optional("q", InputKind::String).min_length(3);
    assert_eq!(input.bind("common", &RawInputs::new()).unwrap(), Value::Null);
  }

  #[test]
  fn test_missing_required_names_the_parameter() {
    let input = Input::required("needy", InputKind::String);
    let err = input.bind("read_item", &RawInputs::new()).unwrap_err();
    assert_eq!(err.parameter, "needy");
    assert_eq!(err.violation, Violation::Missing);
    assert!(err.to_string().contains("needy"));
  }

  #[test]
  fn test_malformed_integer() {
    let input = Input::required("item_id", InputKind::Integer);
    let err = input
      .bind("read_item", &raw(&[("item_id", json!("foo"))]))
      .unwrap_err();
    assert_eq!(
      err.violation,
      Violation::Malformed {
        expected: "integer".to_string()
      }
    );
  }

  #[test]
  fn test_length_constraints() {
    let input = Input::optional("q", InputKind::String)
      .min_length(3)
      .max_length(5);

    let short = input.bind("items", &raw(&[("q", json!("ab"))])).unwrap_err();
    assert_eq!(short.violation, Violation::MinLength { min: 3, actual: 2 });

    let long = input
      .bind("items", &raw(&[("q", json!("abcdef"))]))
      .unwrap_err();
    assert_eq!(long.violation, Violation::MaxLength { max: 5, actual: 6 });

    assert!(input.bind("items", &raw(&[("q", json!("abcd"))])).is_ok());
  }

  #[test]
  fn test_pattern_constraint() {
    let input = Input::optional("q", InputKind::String).pattern(Regex::new("^fixedquery$").unwrap());
    assert!(input
      .bind("items", &raw(&[("q", json!("fixedquery"))]))
      .is_ok());
    let err = input
      .bind("items", &raw(&[("q", json!("otherquery"))]))
      .unwrap_err();
    assert!(matches!(err.violation, Violation::Pattern { .. }));
  }

  #[test]
  fn test_membership_constraint() {
    let input = Input::required("model_name", InputKind::String).one_of(["alexnet", "resnet", "lenet"]);
    assert!(input
      .bind("model", &raw(&[("model_name", json!("resnet"))]))
      .is_ok());
    let err = input
      .bind("model", &raw(&[("model_name", json!("vgg"))]))
      .unwrap_err();
    assert!(matches!(err.violation, Violation::NotOneOf { .. }));
  }

  #[test]
  fn test_numeric_bounds() {
    let input = Input::required("item_id", InputKind::Integer).ge(1.0).le(1000.0);
    assert!(input.bind("item", &raw(&[("item_id", json!("1"))])).is_ok());
    let err = input.bind("item", &raw(&[("item_id", json!("0"))])).unwrap_err();
    assert_eq!(
      err.violation,
      Violation::OutOfRange {
        bound: ">= 1".to_string()
      }
    );
  }

  #[test]
  fn test_list_accepts_scalar_and_default() {
    let input = Input::with_default(
      "q",
      InputKind::list_of(InputKind::String),
      json!(["foo", "bar"]),
    );
    assert_eq!(
      input.bind("items", &RawInputs::new()).unwrap(),
      json!(["foo", "bar"])
    );
    assert_eq!(
      input.bind("items", &raw(&[("q", json!("baz"))])).unwrap(),
      json!(["baz"])
    );
  }

  #[test]
  fn test_alias_is_used_as_lookup_key() {
    let input = Input::optional("q", InputKind::String).alias("item-query");
    let bound = input
      .bind("items", &raw(&[("item-query", json!("hello")), ("q", json!("ignored"))]))
      .unwrap();
    assert_eq!(bound, json!("hello"));
  }

  #[test]
  fn test_float_is_parsed_and_bounded_exclusively() {
    let input = Input::required("price", InputKind::Float).gt(0.0).lt(100.0);
    assert_eq!(
      input.bind("item", &raw(&[("price", json!("12.5"))])).unwrap(),
      json!(12.5)
    );

    let zero = input.bind("item", &raw(&[("price", json!("0"))])).unwrap_err();
    assert_eq!(
      zero.violation,
      Violation::OutOfRange {
        bound: "> 0".to_string()
      }
    );
    let hundred = input.bind("item", &raw(&[("price", json!(100))])).unwrap_err();
    assert_eq!(
      hundred.violation,
      Violation::OutOfRange {
        bound: "< 100".to_string()
      }
    );

    let nan = input.bind("item", &raw(&[("price", json!("NaN"))])).unwrap_err();
    assert!(matches!(nan.violation, Violation::Malformed { .. }));
  }

  #[test]
  fn test_inapplicable_constraint_is_rejected_even_when_absent() {
    let input = Input::optional("item_id", InputKind::Integer).max_length(3);
    let err = input.bind("item", &RawInputs::new()).unwrap_err();
    assert_eq!(
      err.violation,
      Violation::Inapplicable {
        constraint: "max_length".to_string(),
        kind: "integer".to_string()
      }
    );
  }

  #[test]
  fn test_constraint_applicability() {
    let re = Regex::new("^a").unwrap();
    assert!(Constraint::Pattern(re.clone()).applies_to(&InputKind::list_of(InputKind::String)));
    assert!(!Constraint::Pattern(re).applies_to(&InputKind::Integer));
    assert!(Constraint::Ge(1.0).applies_to(&InputKind::list_of(InputKind::Integer)));
    assert!(!Constraint::Ge(1.0).applies_to(&InputKind::String));
    assert!(Constraint::MinLength(1).applies_to(&InputKind::list_of(InputKind::Integer)));
    assert!(Constraint::OneOf(vec!["1".into()]).applies_to(&InputKind::Integer));
    assert!(Constraint::MaxLength(1).applies_to(&InputKind::Any));
  }

  #[test]
  fn test_boolean_spellings() {
    let input = Input::with_default("short", InputKind::Boolean, false);
    for (text, expected) in [("yes", true), ("On", true), ("0", false), ("false", false)] {
      let bound = input.bind("item", &raw(&[("short", json!(text))])).unwrap();
      assert_eq!(bound, json!(expected), "spelling {}", text);
    }
  }
}
