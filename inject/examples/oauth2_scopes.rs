use fibre_inject::{raw_inputs, Dependency, Failure, Input, InputKind, Resolver};

// Tokens are opaque here; decoding and verifying them is out of scope.
fn granted_scopes(token: &str) -> Option<(&'static str, Vec<&'static str>)> {
  match token {
    "johndoe-full" => Some(("johndoe", vec!["me", "items"])),
    "johndoe-me" => Some(("johndoe", vec!["me"])),
    _ => None,
  }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let oauth2_scheme = Dependency::builder("oauth2_scheme")
    .input(Input::required("authorization", InputKind::String))
    .provide_fn(|args| {
      let header = args.input::<String>("authorization")?;
      header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| Failure::rejected(401, "Not authenticated").with_header("WWW-Authenticate", "Bearer"))
    });

  // Checks every scope required anywhere in the tree of the current endpoint.
  let get_current_user = Dependency::builder("get_current_user")
    .depends("token", &oauth2_scheme)
    .provide_fn(|args| {
      let scopes = args.security_scopes();
      let authenticate_value = if scopes.is_empty() {
        "Bearer".to_string()
      } else {
        format!("Bearer scope=\"{}\"", scopes)
      };
      let token = args.dependency::<String>("token")?;
      let (username, granted) = granted_scopes(&token).ok_or_else(|| {
        Failure::rejected(401, "Could not validate credentials")
          .with_header("WWW-Authenticate", authenticate_value.clone())
      })?;
      if let Some(missing) = scopes.first_missing(&granted) {
        return Err(
          Failure::rejected(401, format!("Not enough permissions: missing '{}'", missing))
            .with_header("WWW-Authenticate", authenticate_value),
        );
      }
      Ok(username.to_string())
    });

  let get_current_active_user = Dependency::builder("get_current_active_user")
    .depends("current_user", &get_current_user)
    .scopes(["me"])
    .provide_fn(|args| args.dependency::<String>("current_user").map(|u| (*u).clone()));

  let read_own_items = Dependency::builder("read_own_items")
    .depends("current_user", &get_current_active_user)
    .scopes(["items"])
    .provide_fn(|args| {
      let user = args.dependency::<String>("current_user")?;
      Ok(format!("[{{\"item_id\": \"Foo\", \"owner\": \"{}\"}}]", user))
    });

  let resolver = Resolver::global();
  for token in ["johndoe-full", "johndoe-me", "forged"] {
    let inputs = raw_inputs! { "authorization" => format!("Bearer {}", token) };
    match resolver.resolve::<String>(&read_own_items, &inputs).await {
      Ok(body) => println!("{:<13} -> 200 {}", token, body),
      Err(e) => match e.as_failure() {
        Some(failure) => println!(
          "{:<13} -> {} {} (WWW-Authenticate: {})",
          token,
          failure.status().unwrap_or(500),
          failure,
          failure.header("WWW-Authenticate").unwrap_or("-"),
        ),
        None => println!("{:<13} -> 422 {}", token, e),
      },
    }
  }
}
