use fibre_inject::{overrides, raw_inputs, Dependency, Input, InputKind, Resolver};
use serde_json::{json, Value};

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  // --- Declarations ---
  let common_parameters = Dependency::builder("common_parameters")
    .input(Input::optional("q", InputKind::String))
    .input(Input::with_default("skip", InputKind::Integer, 0))
    .input(Input::with_default("limit", InputKind::Integer, 100))
    .provide_fn(|args| {
      Ok(json!({
        "q": args.input::<Option<String>>("q")?,
        "skip": args.input::<i64>("skip")?,
        "limit": args.input::<i64>("limit")?,
      }))
    });

  let read_items = Dependency::builder("read_items")
    .depends("commons", &common_parameters)
    .provide_fn(|args| {
      let commons = args.dependency::<Value>("commons")?;
      Ok(json!({ "message": "Hello Items!", "params": *commons }))
    });

  let inputs = raw_inputs! { "q" => "foo", "skip" => "100", "limit" => "200" };
  let resolver = Resolver::global();

  // --- Without Override ---
  let response = resolver
    .resolve_blocking::<Value>(&read_items, &inputs)
    .expect("valid inputs");
  println!("original: {}", response);

  // --- With Override ---
  // The override declares only `q`, so `skip` and `limit` are never bound.
  let override_dependency = Dependency::builder("override_dependency")
    .input(Input::optional("q", InputKind::String))
    .provide_fn(|args| {
      Ok(json!({ "q": args.input::<Option<String>>("q")?, "skip": 5, "limit": 10 }))
    });
  overrides()
    .set(&common_parameters, override_dependency)
    .expect("same output type, no cycle");

  let response = resolver
    .resolve_blocking::<Value>(&read_items, &inputs)
    .expect("valid inputs");
  println!("overridden: {}", response);

  // Overrides are never reset implicitly.
  overrides().clear();
}
