//! Dependency declarations.
//!
//! A [`Dependency`] is an immutable, cheaply clonable handle. Its sub-dependencies
//! must already exist when it is built, so a declared tree can never contain a cycle.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::binding::Input;
use crate::error::Failure;
use crate::provider::{
  erase_teardown, from_async_fn, from_fn, Arguments, ErasedProvide, Instance, Provide, Teardown,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// The identity of a dependency. Used as the key for memoization and overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(u64);

impl DependencyId {
  fn next() -> Self {
    DependencyId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
  }
}

/// How long a produced value is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
  /// Invoked every time it is needed, even twice within one resolution.
  Transient,
  /// Invoked at most once per resolution; every consumer shares the value.
  #[default]
  Request,
  /// Invoked once per process; the value is reused by every later resolution.
  Singleton,
}

/// One declared requirement of a dependency.
#[derive(Clone)]
pub enum Param {
  /// A sub-dependency, made available to the callable under `name`.
  Depends { name: String, dependency: Dependency },
  /// A raw input bound from the resolution's [`RawInputs`](crate::RawInputs).
  Input(Input),
}

impl fmt::Debug for Param {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Param::Depends { name, dependency } => f
        .debug_struct("Depends")
        .field("name", name)
        .field("dependency", &dependency.name())
        .finish(),
      Param::Input(input) => f.debug_tuple("Input").field(input).finish(),
    }
  }
}

struct Inner {
  id: DependencyId,
  name: String,
  provider: Box<dyn ErasedProvide>,
  teardown: Option<Teardown>,
  params: Vec<Param>,
  declares_params: bool,
  scopes: Vec<String>,
  lifetime: Lifetime,
  output_id: TypeId,
  output_name: &'static str,
  // Only used when `lifetime` is `Singleton`.
  cell: OnceCell<Instance>,
}

/// A declared unit of resolvable logic: a callable plus its parameter requirements.
#[derive(Clone)]
pub struct Dependency {
  inner: Arc<Inner>,
}

impl Dependency {
  /// Starts declaring a dependency called `name`.
  pub fn builder(name: impl Into<String>) -> DependencyBuilder {
    DependencyBuilder {
      name: name.into(),
      params: Vec::new(),
      declares_params: false,
      scopes: Vec::new(),
      lifetime: Lifetime::default(),
    }
  }

  pub fn id(&self) -> DependencyId {
    self.inner.id
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  pub fn params(&self) -> &[Param] {
    &self.inner.params
  }

  /// Whether the builder declared a parameter list, even an empty one.
  ///
  /// An override that declares its own parameters replaces the original's shape;
  /// one that does not inherits it.
  pub fn declares_params(&self) -> bool {
    self.inner.declares_params
  }

  pub fn scopes(&self) -> &[String] {
    &self.inner.scopes
  }

  pub fn lifetime(&self) -> Lifetime {
    self.inner.lifetime
  }

  pub fn output_type_id(&self) -> TypeId {
    self.inner.output_id
  }

  pub fn output_type_name(&self) -> &'static str {
    self.inner.output_name
  }

  /// Whether values produced by this dependency are torn down after the request.
  pub fn has_teardown(&self) -> bool {
    self.inner.teardown.is_some()
  }

  /// Iterates over the declared sub-dependencies.
  pub fn sub_dependencies(&self) -> impl Iterator<Item = &Dependency> {
    sub_dependencies(self.params())
  }

  pub(crate) fn invoke<'a>(&'a self, args: &'a Arguments) -> BoxFuture<'a, Result<Instance, Failure>> {
    self.inner.provider.provide_erased(args)
  }

  pub(crate) fn teardown(&self, instance: Instance) -> Option<BoxFuture<'static, Result<(), Failure>>> {
    self.inner.teardown.as_ref().map(|teardown| teardown(instance))
  }

  pub(crate) fn singleton_cell(&self) -> &OnceCell<Instance> {
    &self.inner.cell
  }
}

impl PartialEq for Dependency {
  fn eq(&self, other: &Self) -> bool {
    self.inner.id == other.inner.id
  }
}

impl Eq for Dependency {}

impl fmt::Debug for Dependency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Dependency")
      .field("id", &self.inner.id)
      .field("name", &self.inner.name)
      .field("params", &self.inner.params)
      .field("scopes", &self.inner.scopes)
      .field("lifetime", &self.inner.lifetime)
      .field("teardown", &self.inner.teardown.is_some())
      .field("output", &self.inner.output_name)
      .finish()
  }
}

pub(crate) fn sub_dependencies(params: &[Param]) -> impl Iterator<Item = &Dependency> {
  params.iter().filter_map(|p| match p {
    Param::Depends { dependency, .. } => Some(dependency),
    Param::Input(_) => None,
  })
}

/// The parameter list actually used when `original` is resolved with `replacement`
/// standing in for its callable.
pub(crate) fn effective_params<'a>(
  original: &'a Dependency,
  replacement: Option<&'a Dependency>,
) -> &'a [Param] {
  match replacement {
    Some(r) if r.declares_params() => r.params(),
    _ => original.params(),
  }
}

/// Builder for [`Dependency`]. Finish it with one of the `provide*` methods.
#[derive(Debug)]
#[must_use = "a dependency is only declared once a provider is supplied"]
pub struct DependencyBuilder {
  name: String,
  params: Vec<Param>,
  declares_params: bool,
  scopes: Vec<String>,
  lifetime: Lifetime,
}

impl DependencyBuilder {
  /// Declares a sub-dependency made available to the callable under `name`.
  pub fn depends(mut self, name: impl Into<String>, dependency: &Dependency) -> Self {
    self.params.push(Param::Depends {
      name: name.into(),
      dependency: dependency.clone(),
    });
    self.declares_params = true;
    self
  }

  /// Declares a raw input parameter.
  pub fn input(mut self, input: Input) -> Self {
    self.params.push(Param::Input(input));
    self.declares_params = true;
    self
  }

  /// Declares an explicitly empty parameter list.
  pub fn no_params(mut self) -> Self {
    self.declares_params = true;
    self
  }

  /// Security scopes this dependency requires. They are contributed to the
  /// accumulator of every resolution whose tree contains this dependency.
  pub fn scopes<I, S>(mut self, scopes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for scope in scopes {
      let scope = scope.into();
      if !self.scopes.contains(&scope) {
        self.scopes.push(scope);
      }
    }
    self
  }

  pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
    self.lifetime = lifetime;
    self
  }

  pub fn singleton(self) -> Self {
    self.lifetime(Lifetime::Singleton)
  }

  pub fn transient(self) -> Self {
    self.lifetime(Lifetime::Transient)
  }

  /// Finishes the declaration with any [`Provide`] implementation.
  pub fn provide<P: Provide>(self, provider: P) -> Dependency {
    self.build(provider, None)
  }

  /// Finishes the declaration with a provider whose values must be released
  /// once the request is over, such as a database session.
  ///
  /// `teardown` runs after the top-level resolution completes, whether it
  /// succeeded or was aborted. Hooks run in reverse resolution order, so a value
  /// is released before the values it was built from. A failing hook is logged
  /// and does not affect the outcome or the remaining hooks.
  ///
  /// `Singleton` values live for the whole process and are never torn down.
  pub fn provide_with_teardown<P, G, Fut>(self, provider: P, teardown: G) -> Dependency
  where
    P: Provide,
    G: Fn(Arc<P::Output>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Failure>> + Send + 'static,
  {
    if self.lifetime == Lifetime::Singleton {
      tracing::warn!(dependency = %self.name, "Teardown on a singleton dependency never runs");
    }
    self.build(provider, Some(erase_teardown::<P::Output, _, _>(teardown)))
  }

  fn build<P: Provide>(self, provider: P, teardown: Option<Teardown>) -> Dependency {
    Dependency {
      inner: Arc::new(Inner {
        id: DependencyId::next(),
        name: self.name,
        provider: Box::new(provider),
        teardown,
        params: self.params,
        declares_params: self.declares_params,
        scopes: self.scopes,
        lifetime: self.lifetime,
        output_id: TypeId::of::<P::Output>(),
        output_name: type_name::<P::Output>(),
        cell: OnceCell::new(),
      }),
    }
  }

  /// Finishes the declaration with a synchronous closure.
  pub fn provide_fn<T, F>(self, f: F) -> Dependency
  where
    F: Fn(&Arguments) -> Result<T, Failure> + Send + Sync + 'static,
    T: Any + Send + Sync,
  {
    self.provide(from_fn(f))
  }

  /// Finishes the declaration with an `async` closure.
  pub fn provide_async<T, F, Fut>(self, f: F) -> Dependency
  where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    T: Any + Send + Sync,
  {
    self.provide(from_async_fn(f))
  }

  /// Finishes the declaration with a fixed value, shared by every resolution.
  pub fn value<T: Any + Send + Sync + Clone>(self, value: T) -> Dependency {
    self.provide_fn(move |_| Ok(value.clone()))
  }
}
