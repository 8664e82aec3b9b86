//! Error types produced while declaring, overriding and resolving dependencies.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type returned by [`resolve`](crate::resolve).
#[derive(Debug, Error)]
pub enum Error {
  /// A raw input was missing, malformed or violated a declared constraint.
  #[error(transparent)]
  Binding(#[from] BindingError),

  /// A dependency callable failed while being invoked.
  #[error(transparent)]
  Resolution(#[from] ResolutionError),

  /// The caller asked for a different type than the top-level dependency produces.
  #[error("dependency '{dependency}' produces `{found}`, but `{expected}` was requested")]
  OutputType {
    dependency: String,
    expected: &'static str,
    found: &'static str,
  },
}

impl Error {
  /// Returns the binding error, if this is one.
  pub fn as_binding(&self) -> Option<&BindingError> {
    match self {
      Error::Binding(e) => Some(e),
      _ => None,
    }
  }

  /// Returns the failure raised by a callable, if this is a resolution error.
  pub fn as_failure(&self) -> Option<&Failure> {
    match self {
      Error::Resolution(e) => Some(&e.source),
      _ => None,
    }
  }
}

/// A specialized `Result` type for `fibre_inject` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A raw input could not be bound to a declared parameter.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("binding '{parameter}' for dependency '{dependency}' failed: {violation}")]
pub struct BindingError {
  pub dependency: String,
  pub parameter: String,
  pub violation: Violation,
}

/// The reason a [`BindingError`] was raised.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
  /// A required input was not present and has no default.
  Missing,
  /// The input could not be coerced to the declared kind.
  Malformed { expected: String },
  MinLength { min: usize, actual: usize },
  MaxLength { max: usize, actual: usize },
  Pattern { pattern: String },
  NotOneOf { allowed: Vec<String> },
  OutOfRange { bound: String },
  /// The declared constraint can never apply to the declared kind.
  Inapplicable { constraint: String, kind: String },
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Violation::Missing => write!(f, "field required"),
      Violation::Malformed { expected } => write!(f, "value is not a valid {}", expected),
      Violation::MinLength { min, actual } => {
        write!(f, "ensure length is at least {} (got {})", min, actual)
      }
      Violation::MaxLength { max, actual } => {
        write!(f, "ensure length is at most {} (got {})", max, actual)
      }
      Violation::Pattern { pattern } => write!(f, "value does not match pattern \"{}\"", pattern),
      Violation::NotOneOf { allowed } => write!(f, "value is not one of {:?}", allowed),
      Violation::OutOfRange { bound } => write!(f, "ensure value is {}", bound),
      Violation::Inapplicable { constraint, kind } => {
        write!(f, "constraint `{}` does not apply to a {}", constraint, kind)
      }
    }
  }
}

/// A dependency callable raised a [`Failure`].
#[derive(Debug, Error)]
#[error("dependency '{dependency}' failed: {source}")]
pub struct ResolutionError {
  pub dependency: String,
  #[source]
  pub source: Failure,
}

/// The condition a dependency callable signals when it cannot produce a value.
#[derive(Debug, Error)]
pub enum Failure {
  /// The callable explicitly refused the request, e.g. an authentication
  /// check answering "unauthorized". The caller turns this into a client error.
  #[error("rejected with status {status}: {detail}")]
  Rejected {
    status: u16,
    detail: String,
    headers: Vec<(String, String)>,
  },

  /// Anything unexpected. The caller usually treats this as a server error.
  #[error(transparent)]
  Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl Failure {
  pub fn rejected(status: u16, detail: impl Into<String>) -> Self {
    Failure::Rejected {
      status,
      detail: detail.into(),
      headers: Vec::new(),
    }
  }

  /// Appends a response header to a `Rejected` failure. Has no effect on `Internal`.
  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    if let Failure::Rejected { headers, .. } = &mut self {
      headers.push((name.into(), value.into()));
    }
    self
  }

  pub fn internal(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Failure::Internal(err.into())
  }

  /// The status code of a `Rejected` failure.
  pub fn status(&self) -> Option<u16> {
    match self {
      Failure::Rejected { status, .. } => Some(*status),
      Failure::Internal(_) => None,
    }
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    match self {
      Failure::Rejected { headers, .. } => headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str()),
      Failure::Internal(_) => None,
    }
  }
}

/// Misuse detected while wiring dependencies, before anything is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
  #[error("overriding '{original}' with '{replacement}' would create a dependency cycle")]
  CyclicOverride {
    original: String,
    replacement: String,
  },

  #[error("override '{replacement}' produces `{found}` but '{original}' produces `{expected}`")]
  IncompatibleOverride {
    original: String,
    replacement: String,
    expected: &'static str,
    found: &'static str,
  },
}

/// Errors from locating and loading settings files.
#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("settings file not found: {0}")]
  NotFound(String),

  #[error("failed to read settings file {path:?}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse settings file {path:?}: {message}")]
  Parse { path: PathBuf, message: String },
}
