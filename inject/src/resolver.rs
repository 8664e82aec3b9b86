//! Resolution of a dependency tree into concrete values.

use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::Instrument;

use crate::binding::RawInputs;
use crate::dependency::{effective_params, sub_dependencies, Dependency, DependencyId, Lifetime, Param};
use crate::error::{Error, ResolutionError, Result};
use crate::overrides::{overrides, OverrideTable};
use crate::provider::{Arguments, Instance};
use crate::scopes::SecurityScopes;

/// Resolves `dependency` against `inputs` in a fresh [`ResolutionContext`].
///
/// Sub-dependencies are resolved depth-first, children before their parent and
/// siblings one after another in declaration order. The first failure aborts the
/// whole resolution.
pub async fn resolve<T: Any + Send + Sync>(
  dependency: &Dependency,
  inputs: &RawInputs,
  overrides: &OverrideTable,
) -> Result<Arc<T>> {
  ResolutionContext::new(inputs, overrides)
    .resolve::<T>(dependency)
    .await
    .map(Resolved::into_value)
}

/// A handle that resolves dependencies against one [`OverrideTable`].
#[derive(Clone, Copy)]
pub struct Resolver<'t> {
  overrides: &'t OverrideTable,
}

impl Resolver<'static> {
  /// A resolver reading the process-wide override table.
  pub fn global() -> Self {
    Self::new(overrides())
  }
}

impl<'t> Resolver<'t> {
  pub fn new(overrides: &'t OverrideTable) -> Self {
    Self { overrides }
  }

  pub fn overrides(&self) -> &'t OverrideTable {
    self.overrides
  }

  /// Opens a context for one inbound invocation.
  pub fn context<'a>(&self, inputs: &'a RawInputs) -> ResolutionContext<'a>
  where
    't: 'a,
  {
    ResolutionContext::new(inputs, self.overrides)
  }

  pub async fn resolve<T: Any + Send + Sync>(
    &self,
    dependency: &Dependency,
    inputs: &RawInputs,
  ) -> Result<Arc<T>> {
    resolve(dependency, inputs, self.overrides).await
  }

  /// Resolves on the current thread, blocking until every callable completes.
  ///
  /// Callables that need a specific async runtime (timers, sockets) must not be
  /// resolved this way.
  pub fn resolve_blocking<T: Any + Send + Sync>(
    &self,
    dependency: &Dependency,
    inputs: &RawInputs,
  ) -> Result<Arc<T>> {
    futures_executor::block_on(self.resolve(dependency, inputs))
  }
}

/// The outcome of a successful resolution: the top-level value and the scopes
/// required anywhere in its tree.
#[derive(Debug)]
pub struct Resolved<T> {
  value: Arc<T>,
  scopes: SecurityScopes,
}

impl<T> Resolved<T> {
  pub fn value(&self) -> &Arc<T> {
    &self.value
  }

  pub fn scopes(&self) -> &SecurityScopes {
    &self.scopes
  }

  pub fn into_value(self) -> Arc<T> {
    self.value
  }
}

struct PendingTeardown {
  dependency: String,
  callable: Dependency,
  instance: Instance,
}

/// The per-invocation record used while resolving: memoized values, the
/// accumulated security scopes, pending teardowns and the raw inputs available
/// for binding.
///
/// A context resolves exactly one top-level dependency and is consumed doing so.
pub struct ResolutionContext<'a> {
  inputs: &'a RawInputs,
  overrides: &'a OverrideTable,
  memo: HashMap<DependencyId, Instance>,
  scopes: SecurityScopes,
  teardowns: Vec<PendingTeardown>,
}

impl<'a> ResolutionContext<'a> {
  pub fn new(inputs: &'a RawInputs, overrides: &'a OverrideTable) -> Self {
    Self {
      inputs,
      overrides,
      memo: HashMap::new(),
      scopes: SecurityScopes::new(),
      teardowns: Vec::new(),
    }
  }

  /// Resolves `dependency` and downcasts the result to `T`.
  ///
  /// Teardown hooks registered during the resolution run before this returns,
  /// on success and on failure alike.
  pub async fn resolve<T: Any + Send + Sync>(mut self, dependency: &Dependency) -> Result<Resolved<T>> {
    if TypeId::of::<T>() != dependency.output_type_id() {
      return Err(Error::OutputType {
        dependency: dependency.name().to_owned(),
        expected: type_name::<T>(),
        found: dependency.output_type_name(),
      });
    }

    let span = tracing::debug_span!("resolve", dependency = dependency.name());
    self.seed_scopes(dependency, &mut HashSet::new());

    let result = self.resolve_node(dependency).instrument(span.clone()).await;
    self.run_teardowns().instrument(span).await;

    match result {
      Ok(instance) => {
        tracing::debug!(
          dependency = dependency.name(),
          scopes = %self.scopes,
          "Resolved dependency tree"
        );
        let value = instance.downcast::<T>().map_err(|_| Error::OutputType {
          dependency: dependency.name().to_owned(),
          expected: type_name::<T>(),
          found: dependency.output_type_name(),
        })?;
        Ok(Resolved {
          value,
          scopes: self.scopes,
        })
      }
      Err(err) => {
        tracing::debug!(dependency = dependency.name(), error = %err, "Resolution aborted");
        Err(err)
      }
    }
  }

  // Records the scopes of the whole effective tree before any callable runs, so
  // every node observes the complete set regardless of where it sits.
  fn seed_scopes(&mut self, dependency: &Dependency, visited: &mut HashSet<DependencyId>) {
    if !visited.insert(dependency.id()) {
      return;
    }
    let replacement = self.overrides.get(dependency);
    for child in sub_dependencies(effective_params(dependency, replacement.as_ref())) {
      self.seed_scopes(child, visited);
    }
    self.record_scopes(dependency);
  }

  fn record_scopes(&mut self, dependency: &Dependency) {
    self
      .scopes
      .extend(dependency.scopes().iter().map(String::as_str));
  }

  // Most recently produced values are released first.
  async fn run_teardowns(&mut self) {
    while let Some(pending) = self.teardowns.pop() {
      let Some(teardown) = pending.callable.teardown(pending.instance) else {
        continue;
      };
      tracing::trace!(dependency = %pending.dependency, "Running teardown");
      if let Err(err) = teardown.await {
        tracing::warn!(dependency = %pending.dependency, error = %err, "Teardown failed");
      }
    }
  }

  fn resolve_node<'s>(&'s mut self, dependency: &'s Dependency) -> BoxFuture<'s, Result<Instance>> {
    async move {
      let replacement = self.overrides.get(dependency);
      if let Some(r) = &replacement {
        tracing::debug!(
          dependency = dependency.name(),
          replacement = r.name(),
          "Using dependency override"
        );
      }
      let callable = replacement.as_ref().unwrap_or(dependency);
      let lifetime = callable.lifetime();

      if lifetime != Lifetime::Transient {
        if let Some(instance) = self.memo.get(&dependency.id()) {
          tracing::trace!(dependency = dependency.name(), "Reusing memoized value");
          return Ok(Arc::clone(instance));
        }
      }
      if lifetime == Lifetime::Singleton {
        if let Some(instance) = callable.singleton_cell().get() {
          tracing::trace!(dependency = dependency.name(), "Reusing singleton value");
          let instance = Arc::clone(instance);
          self.memo.insert(dependency.id(), Arc::clone(&instance));
          return Ok(instance);
        }
      }

      let params = effective_params(dependency, replacement.as_ref());

      let mut dependencies = HashMap::new();
      for param in params {
        if let Param::Depends { name, dependency: child } = param {
          let instance = self.resolve_node(child).await?;
          self.record_scopes(child);
          dependencies.insert(name.clone(), instance);
        }
      }

      let mut inputs = HashMap::new();
      for param in params {
        if let Param::Input(input) = param {
          let value = input.bind(dependency.name(), self.inputs)?;
          inputs.insert(input.name().to_owned(), value);
        }
      }
      self.record_scopes(dependency);

      let args = Arguments {
        dependency: dependency.name().to_owned(),
        dependencies,
        inputs,
        scopes: self.scopes.clone(),
      };

      let invoked = if lifetime == Lifetime::Singleton {
        callable
          .singleton_cell()
          .get_or_try_init(|| callable.invoke(&args))
          .await
          .map(Arc::clone)
      } else {
        callable.invoke(&args).await
      };

      let instance = invoked.map_err(|source| ResolutionError {
        dependency: dependency.name().to_owned(),
        source,
      })?;

      if lifetime != Lifetime::Singleton && callable.has_teardown() {
        self.teardowns.push(PendingTeardown {
          dependency: dependency.name().to_owned(),
          callable: callable.clone(),
          instance: Arc::clone(&instance),
        });
      }
      if lifetime != Lifetime::Transient {
        self.memo.insert(dependency.id(), Arc::clone(&instance));
      }
      Ok(instance)
    }
    .boxed()
  }
}
