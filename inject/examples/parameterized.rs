use fibre_inject::{
  raw_inputs, Arguments, BoxFuture, Dependency, Failure, Input, InputKind, Provide, Resolver,
};
use futures_util::future::{self, FutureExt};

// A dependency that carries its own configuration. Each instance is a separate
// dependency with its own identity.
struct FixedContentQueryChecker {
  fixed_content: String,
}

impl FixedContentQueryChecker {
  fn new(fixed_content: &str) -> Self {
    Self {
      fixed_content: fixed_content.to_string(),
    }
  }
}

impl Provide for FixedContentQueryChecker {
  type Output = bool;

  fn provide<'a>(&'a self, args: &'a Arguments) -> BoxFuture<'a, Result<bool, Failure>> {
    let included = args
      .input::<Option<String>>("q")
      .map(|q| q.is_some_and(|q| q.contains(&self.fixed_content)));
    future::ready(included).boxed()
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let checker = Dependency::builder("checker")
    .input(Input::with_default("q", InputKind::String, ""))
    .provide(FixedContentQueryChecker::new("bar"));

  let read_query_check = Dependency::builder("read_query_check")
    .depends("fixed_content_included", &checker)
    .provide_fn(|args| {
      let included = args.dependency::<bool>("fixed_content_included")?;
      Ok(format!("{{\"fixed_content_in_query\": {}}}", included))
    });

  let resolver = Resolver::global();
  for query in ["foobar", "foo", ""] {
    let response = resolver
      .resolve_blocking::<String>(&read_query_check, &raw_inputs! { "q" => query })
      .expect("the checker never fails");
    println!("GET /query-checker/?q={:<8} -> {}", query, response);
  }
}
