//! The capability a dependency's callable exposes, and the arguments it receives.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Failure;
use crate::scopes::SecurityScopes;

/// A resolved value, shared between every consumer of a dependency.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Anything that can produce a dependency value from bound arguments.
///
/// Plain closures are adapted with [`from_fn`] and [`from_async_fn`]. A struct that
/// carries its own configuration (a "parameterized" dependency) implements this
/// trait directly:
///
/// ```
/// use fibre_inject::{Arguments, Failure, Provide};
/// use futures_util::future::{self, BoxFuture, FutureExt};
///
/// struct FixedContentQueryChecker {
///   fixed_content: String,
/// }
///
/// impl Provide for FixedContentQueryChecker {
///   type Output = bool;
///
///   fn provide<'a>(&'a self, args: &'a Arguments) -> BoxFuture<'a, Result<bool, Failure>> {
///     let found = args
///       .input::<Option<String>>("q")
///       .map(|q| q.map_or(false, |q| q.contains(&self.fixed_content)));
///     future::ready(found).boxed()
///   }
/// }
/// ```
pub trait Provide: Send + Sync + 'static {
  type Output: Send + Sync + 'static;

  fn provide<'a>(&'a self, args: &'a Arguments) -> BoxFuture<'a, Result<Self::Output, Failure>>;
}

// Object-safe view of `Provide` used for storage inside a `Dependency`.
pub(crate) trait ErasedProvide: Send + Sync {
  fn provide_erased<'a>(&'a self, args: &'a Arguments) -> BoxFuture<'a, Result<Instance, Failure>>;
}

impl<P: Provide> ErasedProvide for P {
  fn provide_erased<'a>(&'a self, args: &'a Arguments) -> BoxFuture<'a, Result<Instance, Failure>> {
    self
      .provide(args)
      .map(|result| result.map(|value| Arc::new(value) as Instance))
      .boxed()
  }
}

/// A type-erased teardown hook, called with the value its dependency produced.
pub(crate) type Teardown = Box<dyn Fn(Instance) -> BoxFuture<'static, Result<(), Failure>> + Send + Sync>;

pub(crate) fn erase_teardown<T, G, Fut>(teardown: G) -> Teardown
where
  G: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<(), Failure>> + Send + 'static,
  T: Any + Send + Sync,
{
  Box::new(move |instance: Instance| match instance.downcast::<T>() {
    Ok(value) => teardown(value).boxed(),
    // Unreachable: the hook is only paired with a provider of `T`.
    Err(_) => future::ready(Ok(())).boxed(),
  })
}

/// Adapter returned by [`from_fn`].
pub struct FromFn<F, T> {
  f: F,
  _output: PhantomData<fn() -> T>,
}

/// Adapts a synchronous closure into a [`Provide`] implementation.
pub fn from_fn<T, F>(f: F) -> FromFn<F, T>
where
  F: Fn(&Arguments) -> Result<T, Failure> + Send + Sync + 'static,
  T: Send + Sync + 'static,
{
  FromFn {
    f,
    _output: PhantomData,
  }
}

impl<F, T> Provide for FromFn<F, T>
where
  F: Fn(&Arguments) -> Result<T, Failure> + Send + Sync + 'static,
  T: Send + Sync + 'static,
{
  type Output = T;

  fn provide<'a>(&'a self, args: &'a Arguments) -> BoxFuture<'a, Result<T, Failure>> {
    future::ready((self.f)(args)).boxed()
  }
}

/// Adapter returned by [`from_async_fn`].
pub struct FromAsyncFn<F, T, Fut> {
  f: F,
  _output: PhantomData<fn() -> (T, Fut)>,
}

/// Adapts an `async` closure into a [`Provide`] implementation.
///
/// The closure receives its own copy of the [`Arguments`] so that the returned
/// future does not borrow from the resolver.
pub fn from_async_fn<T, F, Fut>(f: F) -> FromAsyncFn<F, T, Fut>
where
  F: Fn(Arguments) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, Failure>> + Send + 'static,
  T: Send + Sync + 'static,
{
  FromAsyncFn {
    f,
    _output: PhantomData,
  }
}

impl<F, T, Fut> Provide for FromAsyncFn<F, T, Fut>
where
  F: Fn(Arguments) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, Failure>> + Send + 'static,
  T: Send + Sync + 'static,
{
  type Output = T;

  fn provide<'a>(&'a self, args: &'a Arguments) -> BoxFuture<'a, Result<T, Failure>> {
    (self.f)(args.clone()).boxed()
  }
}

/// The bound arguments handed to a dependency's callable for one invocation.
#[derive(Clone)]
pub struct Arguments {
  pub(crate) dependency: String,
  pub(crate) dependencies: HashMap<String, Instance>,
  pub(crate) inputs: HashMap<String, Value>,
  pub(crate) scopes: SecurityScopes,
}

impl Arguments {
  /// The name of the dependency being invoked.
  pub fn dependency_name(&self) -> &str {
    &self.dependency
  }

  /// The value of the sub-dependency declared under `name`.
  pub fn dependency<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, Failure> {
    let instance = self.dependencies.get(name).ok_or_else(|| {
      Failure::internal(format!(
        "'{}' has no sub-dependency named '{}'",
        self.dependency, name
      ))
    })?;
    Arc::clone(instance).downcast::<T>().map_err(|_| {
      Failure::internal(format!(
        "sub-dependency '{}' of '{}' is not a `{}`",
        name,
        self.dependency,
        type_name::<T>()
      ))
    })
  }

  /// The bound raw input declared under `name`, deserialized into `T`.
  ///
  /// Optional inputs that were absent deserialize from `null`, so ask for an
  /// `Option<T>` when reading them.
  pub fn input<T: DeserializeOwned>(&self, name: &str) -> Result<T, Failure> {
    let value = self.inputs.get(name).ok_or_else(|| {
      Failure::internal(format!(
        "'{}' has no input named '{}'",
        self.dependency, name
      ))
    })?;
    serde_json::from_value(value.clone()).map_err(Failure::internal)
  }

  /// The bound raw input declared under `name`, as JSON.
  pub fn raw_input(&self, name: &str) -> Option<&Value> {
    self.inputs.get(name)
  }

  /// Every scope required anywhere in the tree being resolved.
  pub fn security_scopes(&self) -> &SecurityScopes {
    &self.scopes
  }
}
