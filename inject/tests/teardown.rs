use fibre_inject::{
  from_fn, raw_inputs, resolve, Dependency, Failure, Input, InputKind, OverrideTable, RawInputs,
};
use std::sync::{Arc, Mutex};

// --- Test Fixtures ---

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
  Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
  log.lock().unwrap().clone()
}

#[derive(Debug)]
struct Session {
  name: String,
}

// A per-request resource that records when it is opened and closed.
fn session(name: &str, log: &Log) -> Dependency {
  let open_log = log.clone();
  let close_log = log.clone();
  let label = name.to_string();
  Dependency::builder(name).provide_with_teardown(
    from_fn(move |_| {
      open_log.lock().unwrap().push(format!("open {}", label));
      Ok(Session {
        name: label.clone(),
      })
    }),
    move |session: Arc<Session>| {
      let log = close_log.clone();
      async move {
        log.lock().unwrap().push(format!("close {}", session.name));
        Ok::<_, Failure>(())
      }
    },
  )
}

// --- Teardown Tests ---

#[tokio::test]
async fn test_teardown_runs_after_the_endpoint_in_reverse_order() {
  // Arrange
  let log = new_log();
  let get_db = session("db", &log);
  let endpoint_log = log.clone();
  let get_user = Dependency::builder("get_user")
    .depends("db", &get_db)
    .provide_with_teardown(
      from_fn(|args| {
        let db = args.dependency::<Session>("db")?;
        Ok(format!("user from {}", db.name))
      }),
      {
        let log = log.clone();
        move |_user: Arc<String>| {
          let log = log.clone();
          async move {
            log.lock().unwrap().push("release user".to_string());
            Ok::<_, Failure>(())
          }
        }
      },
    );
  let read_user = Dependency::builder("read_user")
    .depends("user", &get_user)
    .provide_fn(move |args| {
      let user = args.dependency::<String>("user")?;
      endpoint_log.lock().unwrap().push("endpoint".to_string());
      Ok((*user).clone())
    });

  // Act
  let user = resolve::<String>(&read_user, &RawInputs::new(), &OverrideTable::new())
    .await
    .unwrap();

  // Assert
  assert_eq!(*user, "user from db");
  assert_eq!(
    entries(&log),
    ["open db", "endpoint", "release user", "close db"]
  );
}

#[tokio::test]
async fn test_teardown_runs_when_a_later_sibling_fails() {
  // Arrange
  let log = new_log();
  let get_db = session("db", &log);
  let verify_token = Dependency::builder("verify_token")
    .provide_fn(|_| Err::<(), _>(Failure::rejected(400, "X-Token header invalid")));
  let create_user = Dependency::builder("create_user")
    .depends("db", &get_db)
    .depends("token", &verify_token)
    .provide_fn(|_| Ok(()));

  // Act
  let err = resolve::<()>(&create_user, &RawInputs::new(), &OverrideTable::new())
    .await
    .unwrap_err();

  // Assert
  assert_eq!(err.as_failure().and_then(|f| f.status()), Some(400));
  assert_eq!(entries(&log), ["open db", "close db"]);
}

#[tokio::test]
async fn test_teardown_runs_when_binding_fails() {
  let log = new_log();
  let get_db = session("db", &log);
  let read_item = Dependency::builder("read_item")
    .depends("db", &get_db)
    .input(Input::required("item_id", InputKind::Integer))
    .provide_fn(|args| args.input::<i64>("item_id"));

  let err = resolve::<i64>(&read_item, &raw_inputs! { "item_id" => "foo" }, &OverrideTable::new())
    .await
    .unwrap_err();

  assert!(err.as_binding().is_some());
  assert_eq!(entries(&log), ["open db", "close db"]);
}

#[tokio::test]
async fn test_shared_value_is_torn_down_once() {
  // Arrange
  let log = new_log();
  let get_db = session("db", &log);
  let users = Dependency::builder("users")
    .depends("db", &get_db)
    .provide_fn(|_| Ok(1u32));
  let items = Dependency::builder("items")
    .depends("db", &get_db)
    .provide_fn(|_| Ok(2u32));
  let top = Dependency::builder("dashboard")
    .depends("users", &users)
    .depends("items", &items)
    .provide_fn(|_| Ok(()));

  // Act
  resolve::<()>(&top, &RawInputs::new(), &OverrideTable::new())
    .await
    .unwrap();

  // Assert
  assert_eq!(entries(&log), ["open db", "close db"]);
}

#[tokio::test]
async fn test_failing_teardown_does_not_change_the_outcome() {
  // Arrange
  let log = new_log();
  let get_db = session("db", &log);
  let flaky = Dependency::builder("flaky").provide_with_teardown(from_fn(|_| Ok(7u8)), |_| async {
    Err::<(), _>(Failure::internal("connection already closed"))
  });
  let top = Dependency::builder("top")
    .depends("db", &get_db)
    .depends("flaky", &flaky)
    .provide_fn(|args| args.dependency::<u8>("flaky").map(|v| *v));

  // Act
  let value = resolve::<u8>(&top, &RawInputs::new(), &OverrideTable::new())
    .await
    .unwrap();

  // Assert
  assert_eq!(*value, 7);
  assert_eq!(entries(&log), ["open db", "close db"]);
}

#[tokio::test]
async fn test_override_uses_replacement_teardown() {
  // Arrange
  let log = new_log();
  let get_db = session("db", &log);
  let read_users = Dependency::builder("read_users")
    .depends("db", &get_db)
    .provide_fn(|args| args.dependency::<Session>("db").map(|db| db.name.clone()));
  let table = OverrideTable::new();
  table.set(&get_db, session("test_db", &log)).unwrap();

  // Act
  let name = resolve::<String>(&read_users, &RawInputs::new(), &table)
    .await
    .unwrap();

  // Assert
  assert_eq!(*name, "test_db");
  assert_eq!(entries(&log), ["open test_db", "close test_db"]);
}

#[tokio::test]
async fn test_singleton_is_never_torn_down() {
  let log = new_log();
  let close_log = log.clone();
  let engine = Dependency::builder("engine")
    .singleton()
    .provide_with_teardown(from_fn(|_| Ok(String::from("engine"))), move |_| {
      let log = close_log.clone();
      async move {
        log.lock().unwrap().push("dispose engine".to_string());
        Ok::<_, Failure>(())
      }
    });
  let table = OverrideTable::new();

  for _ in 0..2 {
    resolve::<String>(&engine, &RawInputs::new(), &table)
      .await
      .unwrap();
  }

  assert!(engine.has_teardown());
  assert!(entries(&log).is_empty());
}
