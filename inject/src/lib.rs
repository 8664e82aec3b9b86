//! # Fibre Inject
//!
//! A request-scoped dependency resolver with security scopes, cached providers and
//! test-time overrides.
//!
//! Endpoints and the helpers they rely on are declared as a tree of [`Dependency`]
//! values. Resolving the tree for one inbound request binds raw inputs (query,
//! path, header values already extracted by the caller), runs every callable once
//! and hands each parent the values of its children.
//!
//! ## Core Concepts
//!
//! - **Dependency**: a callable plus its declared parameters. Parameters are either
//!   sub-dependencies or raw [`Input`]s with optional [`Constraint`]s.
//! - **Resolution**: [`resolve`] walks the tree children-first in a fresh
//!   [`ResolutionContext`]. A dependency reached twice is invoked once and every
//!   consumer shares the value.
//! - **Security scopes**: scopes declared anywhere in the tree are accumulated into
//!   one [`SecurityScopes`] visible to every callable through
//!   [`Arguments::security_scopes`].
//! - **Teardown**: values declared with
//!   [`DependencyBuilder::provide_with_teardown`] are released once the resolution
//!   is over, in reverse order, even when it was aborted.
//! - **Overrides**: the process-wide table returned by [`overrides()`] replaces a
//!   dependency's behavior wherever it appears. It is never reset implicitly.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_inject::{overrides, raw_inputs, Dependency, Input, InputKind, Resolver};
//! use serde_json::{json, Value};
//!
//! let common_parameters = Dependency::builder("common_parameters")
//!   .input(Input::optional("q", InputKind::String))
//!   .input(Input::with_default("skip", InputKind::Integer, 0))
//!   .input(Input::with_default("limit", InputKind::Integer, 100))
//!   .provide_fn(|args| {
//!     Ok(json!({
//!       "q": args.input::<Option<String>>("q")?,
//!       "skip": args.input::<i64>("skip")?,
//!       "limit": args.input::<i64>("limit")?,
//!     }))
//!   });
//!
//! let inputs = raw_inputs! { "q" => "foo", "skip" => "100", "limit" => "200" };
//! let resolver = Resolver::global();
//!
//! let params = resolver.resolve_blocking::<Value>(&common_parameters, &inputs).unwrap();
//! assert_eq!(*params, json!({ "q": "foo", "skip": 100, "limit": 200 }));
//!
//! // The override declares its own parameters, so `skip` and `limit` are no longer bound.
//! let override_dependency = Dependency::builder("override_dependency")
//!   .input(Input::optional("q", InputKind::String))
//!   .provide_fn(|args| {
//!     Ok(json!({ "q": args.input::<Option<String>>("q")?, "skip": 5, "limit": 10 }))
//!   });
//! overrides().set(&common_parameters, override_dependency).unwrap();
//!
//! let params = resolver.resolve_blocking::<Value>(&common_parameters, &inputs).unwrap();
//! assert_eq!(*params, json!({ "q": "foo", "skip": 5, "limit": 10 }));
//!
//! overrides().clear();
//! ```

mod binding;
mod dependency;
mod error;
mod macros;
mod overrides;
mod provider;
mod resolver;
mod scopes;
pub mod settings;

pub use binding::{Constraint, Input, InputKind, RawInputs};
pub use dependency::{Dependency, DependencyBuilder, DependencyId, Lifetime, Param};
pub use error::{
  BindingError, ConstructionError, Error, Failure, ResolutionError, Result, SettingsError, Violation,
};
pub use overrides::{overrides, OverrideGuard, OverrideTable};
pub use provider::{from_async_fn, from_fn, Arguments, FromAsyncFn, FromFn, Instance, Provide};
pub use resolver::{resolve, ResolutionContext, Resolved, Resolver};
pub use scopes::SecurityScopes;

pub use futures_util::future::BoxFuture;
