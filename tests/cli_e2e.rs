//! End-to-end CLI tests for the updater binary.

mod support;

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use support::zip_fixture::{FixtureEntry, write_zip};

/// SHA-256 of "abc".
const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

/// Binary with an isolated config directory so a developer's config cannot leak in.
fn updater(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("updater").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let temp_dir = TempDir::new().unwrap();
    updater(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fetch, verify and unpack"))
        .stdout(predicate::str::contains("update"));
}

#[test]
fn test_binary_version_displays_version() {
    let temp_dir = TempDir::new().unwrap();
    updater(&temp_dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("updater"));
}

#[test]
fn test_binary_without_subcommand_fails() {
    let temp_dir = TempDir::new().unwrap();
    updater(&temp_dir).assert().failure();
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let temp_dir = TempDir::new().unwrap();
    updater(&temp_dir)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_digest_prints_hex() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("abc.txt");
    fs::write(&file, b"abc").unwrap();

    updater(&temp_dir)
        .args(["digest", "--algorithm", "sha256"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{ABC_SHA256}\n")));
}

#[test]
fn test_verify_valid_digest_exits_zero() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("abc.txt");
    fs::write(&file, b"abc").unwrap();

    updater(&temp_dir)
        .arg("verify")
        .arg(&file)
        .arg(ABC_SHA256.to_uppercase())
        .assert()
        .success()
        .stdout(predicate::str::diff("valid\n"));
}

#[test]
fn test_verify_wrong_digest_exits_one() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("abc.txt");
    fs::write(&file, b"abc").unwrap();

    updater(&temp_dir)
        .arg("verify")
        .arg(&file)
        .arg("00".repeat(64))
        .assert()
        .code(1)
        .stdout(predicate::str::diff("invalid\n"));
}

#[test]
fn test_verify_missing_file_is_invalid() {
    let temp_dir = TempDir::new().unwrap();

    updater(&temp_dir)
        .arg("verify")
        .arg(temp_dir.path().join("missing.zip"))
        .arg(ABC_SHA256)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("invalid"));
}

#[test]
fn test_extract_then_remove() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("pkg.zip");
    write_zip(
        &archive,
        &[
            FixtureEntry::File("a.txt", b"hello"),
            FixtureEntry::File("dir/b.txt", b"hello world"),
            FixtureEntry::Dir("dir/"),
        ],
    );
    let dest = temp_dir.path().join("out");

    updater(&temp_dir)
        .arg("extract")
        .arg(&archive)
        .arg(&dest)
        .assert()
        .success()
        .stdout(predicate::str::contains("extracted 2 files, 1 directories, 16 bytes"));
    assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"hello");

    updater(&temp_dir)
        .arg("remove")
        .arg(&dest)
        .assert()
        .success();
    assert!(!dest.exists());
}

#[test]
fn test_extract_list_prints_entries() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("pkg.zip");
    write_zip(&archive, &[FixtureEntry::File("a.txt", b"hello")]);

    updater(&temp_dir)
        .args(["extract", "--list"])
        .arg(&archive)
        .arg(temp_dir.path().join("unused"))
        .assert()
        .success()
        .stdout(predicate::str::contains("a.txt"));
    assert!(!temp_dir.path().join("unused").exists());
}

#[test]
fn test_extract_unsafe_archive_fails() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("evil.zip");
    write_zip(&archive, &[FixtureEntry::File("../evil.txt", b"escaped")]);

    updater(&temp_dir)
        .arg("extract")
        .arg(&archive)
        .arg(temp_dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to extract"));
    assert!(!temp_dir.path().join("evil.txt").exists());
}

#[test]
fn test_update_requires_checksum() {
    let temp_dir = TempDir::new().unwrap();
    updater(&temp_dir)
        .args(["update", "https://example.com/client.zip", "--target"])
        .arg(temp_dir.path().join("client"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--checksum"));
}

#[test]
fn test_invalid_config_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("updater");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "max_retries = 99\n").unwrap();
    let file = temp_dir.path().join("abc.txt");
    fs::write(&file, b"abc").unwrap();

    updater(&temp_dir)
        .arg("digest")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("config"));
}
