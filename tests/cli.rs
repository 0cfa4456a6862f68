//! Binary-level behavior of the command line interface.

use assert_cmd::Command;
use predicates::prelude::*;

fn deploy_release() -> Command {
    let mut cmd = Command::cargo_bin("deploy_release").unwrap();
    cmd.env_remove("DEPLOY_RELEASE_DATA_DIR")
        .env_remove("DEPLOY_RELEASE_CONFIG")
        .env_remove("DEPLOY_RELEASE_SOURCE_URL");
    cmd
}

#[test]
fn empty_repository_exits_1_and_creates_nothing() {
    let data = tempfile::tempdir().unwrap();

    deploy_release()
        .args(["create", "--repository=", "-n", "--data-dir"])
        .arg(data.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("repository validation"));

    assert_eq!(std::fs::read_dir(data.path()).unwrap().count(), 0);
}

#[test]
fn missing_repository_option_exits_1() {
    let data = tempfile::tempdir().unwrap();

    deploy_release()
        .args(["release:create", "--no-interaction", "--data-dir"])
        .arg(data.path())
        .assert()
        .code(1);

    assert_eq!(std::fs::read_dir(data.path()).unwrap().count(), 0);
}

#[test]
fn unsafe_branch_is_rejected() {
    let data = tempfile::tempdir().unwrap();

    deploy_release()
        .args(["create", "--repository", "kis", "--branch", "--upload-pack=touch", "-n"])
        .arg("--data-dir")
        .arg(data.path())
        .assert()
        .code(predicate::ne(0));

    assert!(!data.path().join("kis").exists());
}

#[test]
fn tagging_disabled_in_config_is_unsupported() {
    let data = tempfile::tempdir().unwrap();
    let config = data.path().join("deploy.toml");
    std::fs::write(&config, "allow_tags = false\n").unwrap();

    deploy_release()
        .args(["create", "--repository", "kis", "--create-tag", "-n"])
        .arg("--data-dir")
        .arg(data.path().join("data"))
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Tag creation is not supported"));

    assert!(!data.path().join("data").exists());
}

#[test]
fn repository_records_round_trip_through_the_store() {
    let data = tempfile::tempdir().unwrap();

    deploy_release()
        .args(["repository", "add", "kis", "git@example.com:acme/kis.git", "--data-dir"])
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered repository 'kis' (id 1)"));

    deploy_release()
        .args(["repository", "update", "kis", "--url", "https://example.com/kis.git"])
        .arg("--data-dir")
        .arg(data.path())
        .assert()
        .success();

    deploy_release()
        .args(["repository", "list", "--data-dir"])
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("kis").and(predicate::str::contains(
            "https://example.com/kis.git",
        )));

    deploy_release()
        .args(["repository", "add", "kis", "x", "--data-dir"])
        .arg(data.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    deploy_release()
        .args(["repository", "remove", "kis", "--data-dir"])
        .arg(data.path())
        .assert()
        .success();

    deploy_release()
        .args(["repository", "show", "kis", "--data-dir"])
        .arg(data.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn reserved_names_cannot_be_registered() {
    let data = tempfile::tempdir().unwrap();

    for name in ["vendor", "repositories.json"] {
        deploy_release()
            .args(["repository", "add", name, "git@example.com:acme/x.git", "--data-dir"])
            .arg(data.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("reserved"));
    }

    assert!(!data.path().join("repositories.json").exists());
}
