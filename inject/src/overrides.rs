//! The override table and the process-wide instance of it.

use std::collections::HashSet;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::dependency::{effective_params, sub_dependencies, Dependency, DependencyId};
use crate::error::ConstructionError;

// The one and only process-wide override table.
// It is created empty on first access; nothing ever resets it implicitly.
static GLOBAL_OVERRIDES: Lazy<OverrideTable> = Lazy::new(OverrideTable::default);

/// Provides a reference to the process-wide override table.
///
/// Entries stay in effect until they are removed, so tests that set overrides
/// must `clear()` (or drop their [`OverrideGuard`]) in teardown.
///
/// # Examples
///
/// ```
/// use fibre_inject::{overrides, Dependency};
///
/// let get_settings = Dependency::builder("get_settings").value(String::from("production"));
/// let get_settings_override = Dependency::builder("get_settings_override").value(String::from("testing"));
///
/// overrides().set(&get_settings, get_settings_override).unwrap();
/// assert!(overrides().contains(&get_settings));
///
/// overrides().clear();
/// assert!(overrides().is_empty());
/// ```
pub fn overrides() -> &'static OverrideTable {
  &GLOBAL_OVERRIDES
}

/// A mapping from an original dependency to the dependency that replaces its callable.
///
/// Reads are safe from any number of concurrent resolutions. Writes are only
/// meaningful while no resolution is in flight, e.g. between test cases.
#[derive(Default)]
pub struct OverrideTable {
  entries: DashMap<DependencyId, Dependency>,
}

impl OverrideTable {
  /// Creates a new, empty table, independent from the global one.
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes every resolution of `original`, at any depth, use `replacement` instead.
  ///
  /// The replacement must produce the same output type as the original, and its
  /// effective tree must not lead back to the original.
  pub fn set(&self, original: &Dependency, replacement: Dependency) -> Result<(), ConstructionError> {
    if let Err(err) = self.check(original, &replacement) {
      tracing::warn!(
        original = original.name(),
        replacement = replacement.name(),
        error = %err,
        "Rejected dependency override"
      );
      return Err(err);
    }
    tracing::debug!(
      original = original.name(),
      replacement = replacement.name(),
      "Registered dependency override"
    );
    self.entries.insert(original.id(), replacement);
    Ok(())
  }

  /// Like [`set`](Self::set), but the entry is reverted when the guard drops.
  pub fn scoped(
    &self,
    original: &Dependency,
    replacement: Dependency,
  ) -> Result<OverrideGuard<'_>, ConstructionError> {
    let previous = self.get(original);
    self.set(original, replacement)?;
    Ok(OverrideGuard {
      table: self,
      id: original.id(),
      previous,
    })
  }

  /// Removes the override for `original`, returning the replacement if there was one.
  pub fn remove(&self, original: &Dependency) -> Option<Dependency> {
    self.entries.remove(&original.id()).map(|(_, r)| r)
  }

  /// Removes every override.
  pub fn clear(&self) {
    self.entries.clear();
  }

  /// The replacement currently registered for `original`.
  pub fn get(&self, original: &Dependency) -> Option<Dependency> {
    self.entries.get(&original.id()).map(|r| r.value().clone())
  }

  pub fn contains(&self, original: &Dependency) -> bool {
    self.entries.contains_key(&original.id())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  fn check(&self, original: &Dependency, replacement: &Dependency) -> Result<(), ConstructionError> {
    if original.output_type_id() != replacement.output_type_id() {
      return Err(ConstructionError::IncompatibleOverride {
        original: original.name().to_owned(),
        replacement: replacement.name().to_owned(),
        expected: original.output_type_name(),
        found: replacement.output_type_name(),
      });
    }

    // The table was acyclic before this entry, so any new cycle has to pass
    // through the edge original -> replacement.
    let mut visited = HashSet::new();
    let target = original.id();
    let cyclic = sub_dependencies(effective_params(original, Some(replacement)))
      .any(|child| self.reaches(child, target, &mut visited));

    if cyclic {
      return Err(ConstructionError::CyclicOverride {
        original: original.name().to_owned(),
        replacement: replacement.name().to_owned(),
      });
    }
    Ok(())
  }

  // Walks the effective tree from `node` looking for `target`.
  fn reaches(&self, node: &Dependency, target: DependencyId, visited: &mut HashSet<DependencyId>) -> bool {
    if node.id() == target {
      return true;
    }
    if !visited.insert(node.id()) {
      return false;
    }
    let replacement = self.get(node);
    let children = effective_params(node, replacement.as_ref());
    let found = sub_dependencies(children).any(|child| self.reaches(child, target, visited));
    found
  }
}

/// An RAII guard returned by [`OverrideTable::scoped`].
///
/// When dropped it restores whatever override (or lack of one) was in place
/// before the guard was created.
#[must_use = "the override is reverted as soon as the guard is dropped"]
pub struct OverrideGuard<'a> {
  table: &'a OverrideTable,
  id: DependencyId,
  previous: Option<Dependency>,
}

impl Drop for OverrideGuard<'_> {
  fn drop(&mut self) {
    match self.previous.take() {
      Some(previous) => {
        self.table.entries.insert(self.id, previous);
      }
      None => {
        self.table.entries.remove(&self.id);
      }
    }
  }
}
