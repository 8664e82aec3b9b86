//! Settings files and cached settings providers.
//!
//! Reading settings from disk is slow, so the provider built by
//! [`settings_provider`] is a [`Lifetime::Singleton`](crate::Lifetime): the file is
//! read the first time the dependency is resolved and the same instance is reused
//! afterwards. Tests swap it out through the override table instead of editing files.

use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::dependency::Dependency;
use crate::error::{Failure, SettingsError};

const DEFAULT_SETTINGS_EXTENSION: &str = "yaml";

/// Finds `<base_name>.<env>.yaml` or `<base_name>.yaml` in the working directory.
///
/// The environment comes from `environment_suffix`, then `FIBRE_ENV`, then `APP_ENV`.
pub fn find_settings_file(
  base_name: &str,
  environment_suffix: Option<&str>,
) -> Result<PathBuf, SettingsError> {
  find_settings_file_in(Path::new("."), base_name, environment_suffix)
}

/// Same as [`find_settings_file`], searching `dir` instead of the working directory.
pub fn find_settings_file_in(
  dir: &Path,
  base_name: &str,
  environment_suffix: Option<&str>,
) -> Result<PathBuf, SettingsError> {
  let candidates = settings_candidates(base_name, environment(environment_suffix).as_deref());
  candidates
    .iter()
    .map(|file_name| dir.join(file_name))
    .find(|path| path.is_file())
    .ok_or_else(|| {
      SettingsError::NotFound(format!(
        "none of {:?} exists in {:?}; set FIBRE_ENV or APP_ENV to pick another environment",
        candidates, dir
      ))
    })
}

/// The active environment name. An explicit suffix wins over the `FIBRE_ENV` and
/// `APP_ENV` variables. An empty name means no environment.
fn environment(explicit: Option<&str>) -> Option<String> {
  explicit
    .map(str::to_owned)
    .or_else(|| env::var("FIBRE_ENV").ok())
    .or_else(|| env::var("APP_ENV").ok())
    .filter(|name| !name.is_empty())
}

// Most specific first.
fn settings_candidates(base_name: &str, environment: Option<&str>) -> Vec<String> {
  environment
    .map(|env| format!("{base_name}.{env}.{DEFAULT_SETTINGS_EXTENSION}"))
    .into_iter()
    .chain([format!("{base_name}.{DEFAULT_SETTINGS_EXTENSION}")])
    .collect()
}

/// Deserializes a YAML settings file into `S`.
pub fn load_settings<S: DeserializeOwned>(path: &Path) -> Result<S, SettingsError> {
  let file = File::open(path).map_err(|source| SettingsError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  serde_yaml::from_reader(BufReader::new(file)).map_err(|e| SettingsError::Parse {
    path: path.to_path_buf(),
    message: e.to_string(),
  })
}

/// A singleton dependency producing `S` loaded from `path`.
///
/// The produced value is an `Arc<S>`, so overrides must also produce `S`.
pub fn settings_provider<S>(name: &str, path: impl Into<PathBuf>) -> Dependency
where
  S: DeserializeOwned + Send + Sync + 'static,
{
  let path: PathBuf = path.into();
  let path: Arc<Path> = Arc::from(path);
  Dependency::builder(name)
    .no_params()
    .singleton()
    .provide_fn(move |_| {
      tracing::debug!(path = ?path, "Loading settings");
      load_settings::<S>(&path).map_err(Failure::internal)
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use serde::Deserialize;
  use std::fs;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Settings {
    app_name: String,
    admin_email: String,
    #[serde(default = "default_items_per_user")]
    items_per_user: u32,
  }

  fn default_items_per_user() -> u32 {
    50
  }

  #[test]
  fn test_candidates_are_most_specific_first() {
    assert_eq!(
      settings_candidates("app", Some("test")),
      vec!["app.test.yaml".to_string(), "app.yaml".to_string()]
    );
    assert_eq!(settings_candidates("app", None), vec!["app.yaml".to_string()]);
  }

  #[test]
  fn test_explicit_environment_wins() {
    assert_eq!(environment(Some("staging")).as_deref(), Some("staging"));
  }

  #[test]
  fn test_find_prefers_environment_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.yaml"), "app_name: base\n").unwrap();
    fs::write(dir.path().join("app.test.yaml"), "app_name: test\n").unwrap();

    let found = find_settings_file_in(dir.path(), "app", Some("test")).unwrap();
    assert_eq!(found, dir.path().join("app.test.yaml"));
  }

  #[test]
  fn test_find_falls_back_to_base_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.yaml"), "app_name: base\n").unwrap();

    let found = find_settings_file_in(dir.path(), "app", Some("staging")).unwrap();
    assert_eq!(found, dir.path().join("app.yaml"));
  }

  #[test]
  fn test_find_reports_searched_names() {
    let dir = tempfile::tempdir().unwrap();
    let err = find_settings_file_in(dir.path(), "missing", Some("dev")).unwrap_err();
    match err {
      SettingsError::NotFound(message) => {
        assert!(message.contains("missing.dev.yaml"));
        assert!(message.contains("missing.yaml"));
      }
      other => panic!("unexpected error: {:?}", other),
    }
  }

  #[test]
  fn test_load_settings_applies_serde_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.yaml");
    fs::write(
      &path,
      "app_name: Awesome API\nadmin_email: admin@example.com\n",
    )
    .unwrap();

    let settings: Settings = load_settings(&path).unwrap();
    assert_eq!(
      settings,
      Settings {
        app_name: "Awesome API".to_string(),
        admin_email: "admin@example.com".to_string(),
        items_per_user: 50,
      }
    );
  }

  #[test]
  fn test_load_settings_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.yaml");
    fs::write(&path, "app_name: [unclosed\n").unwrap();

    let err = load_settings::<Settings>(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }));
  }
}
