use fibre_inject::{from_fn, raw_inputs, Dependency, Failure, Input, InputKind, Resolver};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static NEXT_SESSION: AtomicU32 = AtomicU32::new(1);

struct SessionLocal {
  id: u32,
}

impl SessionLocal {
  fn open() -> Self {
    let id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
    println!("session {}: open", id);
    Self { id }
  }

  fn close(&self) {
    println!("session {}: close", self.id);
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  // One session per request, closed once the request is over.
  let get_db = Dependency::builder("get_db").provide_with_teardown(
    from_fn(|_| Ok(SessionLocal::open())),
    |db: Arc<SessionLocal>| async move {
      db.close();
      Ok::<_, Failure>(())
    },
  );

  let read_user = Dependency::builder("read_user")
    .depends("db", &get_db)
    .input(Input::required("user_id", InputKind::Integer).ge(1.0))
    .provide_fn(|args| {
      let db = args.dependency::<SessionLocal>("db")?;
      let user_id = args.input::<i64>("user_id")?;
      if user_id > 100 {
        return Err(Failure::rejected(404, "User not found"));
      }
      Ok(format!("user {} loaded with session {}", user_id, db.id))
    });

  let resolver = Resolver::global();
  for user_id in ["1", "404", "0"] {
    match resolver.resolve_blocking::<String>(&read_user, &raw_inputs! { "user_id" => user_id }) {
      Ok(body) => println!("GET /users/{} -> 200 {}", user_id, body),
      Err(e) => println!("GET /users/{} -> error: {}", user_id, e),
    }
  }
}
