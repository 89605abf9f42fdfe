use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use mockito::{Matcher, Server, ServerGuard};
use predicates::str::contains;
use tempfile::TempDir;

const PROJECT: &str = "/api/v4/projects/42";
const ACCOUNT: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Automation/automationAccounts/aa";

fn rbsync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rbsync"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RBSYNC_GITLAB_TOKEN")
        .env_remove("RBSYNC_AZURE_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(home: &Path, base_url: &str, with_tokens: bool) {
    let tokens = if with_tokens {
        ("  token: glpat-secret\n", "  token: az-token\n")
    } else {
        ("", "")
    };
    let yaml = format!(
        "gitlab:\n  base_url: {base_url}\n  project: \"42\"\n{}\
         automation:\n  base_url: {base_url}\n  subscription_id: sub\n  resource_group: rg\n  account: aa\n  location: westeurope\n{}",
        tokens.0, tokens.1
    );
    let dir = home.join(".rbsync");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.yaml"), yaml).unwrap();
}

fn seed_state(home: &Path, sha: &str) {
    rbsync_cmd(home)
        .args(["state", "set", sha])
        .assert()
        .success();
}

/// GitLab side of a run from `A` to `B` touching one new script, one deleted
/// script and a README.
fn mock_repository(server: &mut ServerGuard) {
    server
        .mock("GET", format!("{PROJECT}/repository/commits/master").as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"id":"B"}"#)
        .create();
    server
        .mock("GET", format!("{PROJECT}/repository/compare").as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("from".into(), "A".into()),
            Matcher::UrlEncoded("to".into(), "B".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"diffs":[
                {"new_path":"runbooks/New.ps1","deleted_file":false},
                {"new_path":"runbooks/Old.ps1","deleted_file":true},
                {"new_path":"README.md","deleted_file":false}
            ]}"#,
        )
        .create();
    server
        .mock(
            "GET",
            format!("{PROJECT}/repository/files/runbooks%2FNew.ps1").as_str(),
        )
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"encoding":"base64","content":"V3JpdGUtT3V0cHV0ICdoZWxsbycK"}"#)
        .create();
    server
        .mock("GET", format!("{ACCOUNT}/runbooks/New").as_str())
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"code":"NotFound"}"#)
        .create();
}

#[test]
fn state_set_then_show() {
    let home = TempDir::new().unwrap();
    write_config(home.path(), "http://127.0.0.1:9", false);

    rbsync_cmd(home.path())
        .args(["state", "show"])
        .assert()
        .success()
        .stdout(contains("no commit stored"));

    seed_state(home.path(), "0123456789abcdef");

    rbsync_cmd(home.path())
        .args(["state", "show"])
        .assert()
        .success()
        .stdout("0123456789abcdef\n");
}

#[test]
fn state_set_rejects_blank_reference() {
    let home = TempDir::new().unwrap();
    write_config(home.path(), "http://127.0.0.1:9", false);

    rbsync_cmd(home.path())
        .args(["state", "set", "  "])
        .assert()
        .failure()
        .stderr(contains("not a commit reference"));
}

#[test]
fn sync_without_config_fails() {
    let home = TempDir::new().unwrap();
    rbsync_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("config not found"));
}

#[test]
fn sync_without_credentials_fails() {
    let home = TempDir::new().unwrap();
    write_config(home.path(), "http://127.0.0.1:9", false);
    rbsync_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("RBSYNC_GITLAB_TOKEN"));
}

#[test]
fn sync_without_checkpoint_is_fatal() {
    let home = TempDir::new().unwrap();
    write_config(home.path(), "http://127.0.0.1:9", true);
    rbsync_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("no synced commit recorded"));
    assert!(!home.path().join(".rbsync/last_report.json").exists());
}

#[test]
fn sync_applies_diff_and_records_head() {
    let home = TempDir::new().unwrap();
    let mut server = Server::new();
    write_config(home.path(), &server.url(), true);
    seed_state(home.path(), "A");
    mock_repository(&mut server);

    let create = server
        .mock("PUT", format!("{ACCOUNT}/runbooks/New").as_str())
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer az-token")
        .with_status(201)
        .with_body("{}")
        .create();
    let content = server
        .mock("PUT", format!("{ACCOUNT}/runbooks/New/draft/content").as_str())
        .match_query(Matcher::Any)
        .match_body("Write-Output 'hello'\n")
        .with_status(202)
        .create();
    let publish = server
        .mock("POST", format!("{ACCOUNT}/runbooks/New/draft/publish").as_str())
        .match_query(Matcher::Any)
        .with_status(202)
        .create();
    let delete = server
        .mock("DELETE", format!("{ACCOUNT}/runbooks/Old").as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .create();

    rbsync_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("runbooks/New.ps1 → New (imported)"))
        .stdout(contains("runbooks/Old.ps1 → Old (deleted)"))
        .stdout(contains("README.md (not a .ps1 script)"));

    create.assert();
    content.assert();
    publish.assert();
    delete.assert();

    rbsync_cmd(home.path())
        .args(["state", "show"])
        .assert()
        .success()
        .stdout("B\n");

    rbsync_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("2 applied, 0 failed, 1 skipped"))
        .stdout(contains("runbooks/New.ps1"));
}

#[test]
fn dry_run_reports_json_and_changes_nothing() {
    let home = TempDir::new().unwrap();
    let mut server = Server::new();
    write_config(home.path(), &server.url(), true);
    seed_state(home.path(), "A");
    mock_repository(&mut server);

    let writes = server
        .mock("PUT", Matcher::Any)
        .match_query(Matcher::Any)
        .expect(0)
        .create();
    let deletes = server
        .mock("DELETE", Matcher::Any)
        .match_query(Matcher::Any)
        .expect(0)
        .create();

    let output = rbsync_cmd(home.path())
        .args(["sync", "--dry-run", "--json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["state_persisted"], false);
    assert_eq!(report["outcomes"][0]["result"], "would_import");
    assert_eq!(report["outcomes"][1]["result"], "would_delete");
    assert_eq!(report["outcomes"][2]["result"], "skipped");

    writes.assert();
    deletes.assert();

    rbsync_cmd(home.path())
        .args(["state", "show"])
        .assert()
        .success()
        .stdout("A\n");
}

#[test]
fn from_override_replaces_stored_commit() {
    let home = TempDir::new().unwrap();
    let mut server = Server::new();
    write_config(home.path(), &server.url(), true);
    mock_repository(&mut server);

    // No stored checkpoint: `--from` alone is enough for a dry run.
    rbsync_cmd(home.path())
        .args(["sync", "--dry-run", "--from", "A"])
        .assert()
        .success()
        .stdout(contains("[dry-run]"))
        .stdout(contains("would delete"));
}

#[test]
fn status_before_any_sync() {
    let home = TempDir::new().unwrap();
    rbsync_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("No sync has run yet"));
}

#[test]
fn per_file_failure_still_exits_cleanly_and_records_head() {
    let home = TempDir::new().unwrap();
    let mut server = Server::new();
    write_config(home.path(), &server.url(), true);
    seed_state(home.path(), "A");
    mock_repository(&mut server);

    server
        .mock("PUT", format!("{ACCOUNT}/runbooks/New").as_str())
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"code":"BadRequest"}"#)
        .create();
    let publish = server
        .mock("POST", Matcher::Any)
        .match_query(Matcher::Any)
        .expect(0)
        .create();
    server
        .mock("DELETE", format!("{ACCOUNT}/runbooks/Old").as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .create();

    rbsync_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("1 applied, 1 failed, 1 skipped"))
        .stdout(contains("runbooks/New.ps1 → New (failed: import failed"));
    publish.assert();

    rbsync_cmd(home.path())
        .args(["state", "show"])
        .assert()
        .success()
        .stdout("B\n");
}

#[test]
fn variable_backend_needs_only_the_azure_token() {
    let home = TempDir::new().unwrap();
    let mut server = Server::new();
    let url = server.url();
    let yaml = format!(
        "gitlab:\n  base_url: {url}\n  project: \"42\"\n\
         automation:\n  base_url: {url}\n  subscription_id: sub\n  resource_group: rg\n  account: aa\n  location: westeurope\n  token: az-token\n\
         state:\n  backend: automation_variable\n"
    );
    let dir = home.path().join(".rbsync");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.yaml"), yaml).unwrap();

    let get = server
        .mock("GET", format!("{ACCOUNT}/variables/GitLabLastSyncedCommit").as_str())
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer az-token")
        .with_status(200)
        .with_body(r#"{"properties":{"value":"\"C\""}}"#)
        .create();

    rbsync_cmd(home.path())
        .args(["state", "show"])
        .assert()
        .success()
        .stdout("C\n");
    get.assert();
}
