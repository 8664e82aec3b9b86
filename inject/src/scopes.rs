//! The security scope accumulator carried by a resolution.

use std::fmt;

/// The deduplicated set of scopes required anywhere in the dependency tree
/// being resolved, in the order they were first declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityScopes {
  scopes: Vec<String>,
}

impl SecurityScopes {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records `scope`, ignoring duplicates. Returns `true` if it was new.
  pub fn insert(&mut self, scope: &str) -> bool {
    if self.contains(scope) {
      return false;
    }
    self.scopes.push(scope.to_owned());
    true
  }

  pub fn extend<'a>(&mut self, scopes: impl IntoIterator<Item = &'a str>) {
    for scope in scopes {
      self.insert(scope);
    }
  }

  pub fn contains(&self, scope: &str) -> bool {
    self.scopes.iter().any(|s| s == scope)
  }

  pub fn scopes(&self) -> &[String] {
    &self.scopes
  }

  pub fn is_empty(&self) -> bool {
    self.scopes.is_empty()
  }

  /// The scopes joined by single spaces, as used in a `WWW-Authenticate` header.
  pub fn scope_str(&self) -> String {
    self.scopes.join(" ")
  }

  /// Returns the first required scope missing from `granted`, if any.
  pub fn first_missing<'a, S: AsRef<str>>(&'a self, granted: &[S]) -> Option<&'a str> {
    self
      .scopes
      .iter()
      .map(String::as_str)
      .find(|required| !granted.iter().any(|g| g.as_ref() == *required))
  }
}

impl fmt::Display for SecurityScopes {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.scope_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_insert_deduplicates_and_keeps_order() {
    let mut scopes = SecurityScopes::new();
    scopes.extend(["items", "me", "items"]);
    assert_eq!(scopes.scopes(), ["items".to_string(), "me".to_string()]);
    assert_eq!(scopes.scope_str(), "items me");
  }

  #[test]
  fn test_first_missing() {
    let mut scopes = SecurityScopes::new();
    scopes.extend(["me", "items"]);
    assert_eq!(scopes.first_missing(&["me"]), Some("items"));
    assert_eq!(scopes.first_missing(&["items", "me"]), None);
  }
}
