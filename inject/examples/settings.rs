use fibre_inject::settings::{find_settings_file, settings_provider};
use fibre_inject::{Dependency, RawInputs, Resolver};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct Settings {
  #[serde(default = "default_app_name")]
  app_name: String,
  admin_email: String,
  #[serde(default = "default_items_per_user")]
  items_per_user: u32,
}

fn default_app_name() -> String {
  "Awesome API".to_string()
}

fn default_items_per_user() -> u32 {
  50
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  // Looks for `app_settings.<FIBRE_ENV>.yaml`, then `app_settings.yaml`.
  let path = match find_settings_file("app_settings", None) {
    Ok(path) => path,
    Err(e) => {
      eprintln!("{}", e);
      eprintln!("Create app_settings.yaml containing at least `admin_email: ...`.");
      return;
    }
  };

  let get_settings = settings_provider::<Settings>("get_settings", path);
  let info = Dependency::builder("info")
    .depends("settings", &get_settings)
    .provide_fn(|args| {
      let settings = args.dependency::<Settings>("settings")?;
      Ok(json!({
        "app_name": settings.app_name,
        "admin_email": settings.admin_email,
        "items_per_user": settings.items_per_user,
      }))
    });

  let resolver = Resolver::global();
  for request in 1..=3 {
    // The file is read on the first request only.
    match resolver.resolve_blocking::<Value>(&info, &RawInputs::new()) {
      Ok(body) => println!("request {}: {}", request, body),
      Err(e) => println!("request {}: error: {}", request, e),
    }
  }
}
