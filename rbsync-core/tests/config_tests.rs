//! Config loading error messages and validation cases.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rbsync_core::{config, ConfigError, StateBackend};
use rstest::rstest;

const VALID: &str = r#"
gitlab:
  base_url: https://gitlab.example.com
  project: "42"
  branch: main
automation:
  subscription_id: sub
  resource_group: rg
  account: aa
  location: westeurope
state:
  backend: automation_variable
  variable: LastCommit
filter:
  extension: .PS1
webhook:
  listen: 0.0.0.0:9000
  secret_token: hook-secret
"#;

fn write_config(home: &assert_fs::TempDir, contents: &str) {
    home.child(".rbsync")
        .child("config.yaml")
        .write_str(contents)
        .expect("write config");
}

#[test]
fn load_missing_config_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_full_config() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_config(&home, VALID);
    home.child(".rbsync/config.yaml")
        .assert(predicate::path::exists());

    let cfg = config::load_at(home.path()).expect("load");
    assert_eq!(cfg.gitlab.project, "42");
    assert_eq!(cfg.gitlab.branch, "main");
    assert_eq!(cfg.state.backend, StateBackend::AutomationVariable);
    assert_eq!(cfg.state.variable, "LastCommit");
    assert_eq!(cfg.filter.extension, ".PS1");
    assert_eq!(cfg.webhook.secret_token.as_deref(), Some("hook-secret"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_config(&home, ": : corrupt : yaml : !!!\n  - broken: [unclosed");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_from_explicit_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("custom.yaml");
    file.write_str(VALID).expect("write");
    let cfg = config::load_from(file.path()).expect("load");
    assert_eq!(cfg.automation.account, "aa");
}

#[rstest]
#[case("empty_project", "project: \"42\"", "project: \"\"", "gitlab.project")]
#[case("empty_account", "account: aa", "account: \" \"", "automation.account")]
#[case("empty_location", "location: westeurope", "location: \"\"", "automation.location")]
#[case("bare_extension", "extension: .PS1", "extension: ps1", "filter.extension")]
fn load_rejects_invalid_fields(
    #[case] label: &str,
    #[case] from: &str,
    #[case] to: &str,
    #[case] field: &str,
) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_config(&home, &VALID.replace(from, to));
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "[{label}] got: {err}");
    assert!(err.to_string().contains(field), "[{label}] got: {err}");
}
