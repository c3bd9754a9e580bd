#![allow(deprecated)] // Command::cargo_bin

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn dockerbuild(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dockerbuild").unwrap();
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("DOCKERBUILD_FILE")
        .env_remove("DOCKERBUILD_STATE_DIR");
    cmd
}

/// Dockerfile入りのコンテキストとマニフェストを持つプロジェクト
fn project(manifest: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("app")).unwrap();
    fs::write(dir.path().join("app/Dockerfile"), "FROM alpine\nRUN echo hi\n").unwrap();
    fs::write(dir.path().join("dockerbuild.build.yaml"), manifest).unwrap();
    dir
}

const VALID: &str = r#"
images:
  app:
    context:
      location: app
    tags: ["docker.io/me/app:amd64"]
    platforms: [linux/amd64]
    push: true
indexes:
  app-index:
    tag: docker.io/me/app:latest
    sources: ["docker.io/me/app:amd64"]
"#;

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let dir = tempfile::tempdir().unwrap();
    dockerbuild(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("down"));
}

#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    dockerbuild(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dockerbuild"));
}

#[test]
fn test_up_help_shows_preview() {
    let dir = tempfile::tempdir().unwrap();
    dockerbuild(dir.path())
        .args(["up", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--preview"))
        .stdout(predicate::str::contains("--state-dir"));
}

#[test]
fn test_invalid_command() {
    let dir = tempfile::tempdir().unwrap();
    dockerbuild(dir.path()).arg("invalid-command").assert().failure();
}

/// マニフェストがなければエラー
#[test]
fn test_check_without_manifest() {
    let dir = tempfile::tempdir().unwrap();
    dockerbuild(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("dockerbuild.build.yaml"));
}

#[test]
fn test_check_valid_manifest() {
    let dir = project(VALID);
    dockerbuild(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("image app"))
        .stdout(predicate::str::contains("index app-index"));
}

/// 検証エラーはプロパティのパス付きで表示される
#[test]
fn test_check_reports_failures() {
    let dir = project(
        r#"
images:
  broken:
    context:
      location: missing-dir
    tags: ["Not A Tag"]
indexes:
  broken-index:
    tag: docker.io/me/app:latest
    sources: ["docker.io/UPPER/case:1"]
"#,
    );
    dockerbuild(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("context.location"))
        .stdout(predicate::str::contains("tags[0]"))
        .stdout(predicate::str::contains("sources[0]"));
}

#[test]
fn test_check_with_explicit_file() {
    let dir = project("");
    fs::write(dir.path().join("release.yaml"), VALID).unwrap();
    dockerbuild(dir.path())
        .args(["--file", "release.yaml", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("release.yaml"));
}

#[test]
fn test_hash_context() {
    let dir = project(VALID);
    let first = dockerbuild(dir.path())
        .args(["hash", "app"])
        .assert()
        .success()
        .stdout(predicate::str::is_match("^[0-9a-f]{64}\n$").unwrap())
        .get_output()
        .stdout
        .clone();

    fs::write(dir.path().join("app/main.go"), "package main\n").unwrap();
    let second = dockerbuild(dir.path())
        .args(["hash", "app"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_ne!(first, second);
}

/// .dockerignore で除外したファイルはハッシュに影響しない
#[test]
fn test_hash_honours_dockerignore() {
    let dir = project(VALID);
    fs::write(dir.path().join("app/.dockerignore"), "*.log\n").unwrap();
    let first = dockerbuild(dir.path())
        .args(["hash", "app"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    fs::write(dir.path().join("app/debug.log"), "noise").unwrap();
    let second = dockerbuild(dir.path())
        .args(["hash", "app"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(first, second);
}

#[test]
fn test_hash_manifest_images() {
    let dir = project(VALID);
    dockerbuild(dir.path())
        .arg("hash")
        .assert()
        .success()
        .stdout(predicate::str::is_match("^app [0-9a-f]{64}\n$").unwrap());
}

/// 状態がなければすべて新規作成として表示される
#[test]
fn test_diff_without_state() {
    let dir = project(VALID);
    dockerbuild(dir.path())
        .arg("diff")
        .assert()
        .success()
        .stdout(predicate::str::contains("+ image app"))
        .stdout(predicate::str::contains("+ index app-index"));
}

/// 状態にあってマニフェストにないものは削除として表示される
#[test]
fn test_diff_reports_removed_resources() {
    let dir = project("images: {}\n");
    let state_dir = dir.path().join("state");
    fs::create_dir(&state_dir).unwrap();
    fs::write(
        state_dir.join("dockerbuild.json"),
        r#"{
  "images": {
    "old": {
      "id": "old",
      "state": { "tags": ["docker.io/me/old:v1"], "push": true },
      "updatedAt": "2024-01-01T00:00:00Z"
    }
  }
}"#,
    )
    .unwrap();

    dockerbuild(dir.path())
        .args(["--state-dir", "state", "diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- image old"));
}

/// 状態が空なら Docker に接続せずに終わる
#[test]
fn test_down_with_empty_state() {
    let dir = project(VALID);
    dockerbuild(dir.path())
        .arg("down")
        .assert()
        .success()
        .stdout(predicate::str::contains("削除するリソースはありません"));
}
