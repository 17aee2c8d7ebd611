use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn bin() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pdpkey"));
    cmd.env_remove("PDPKEY_DIR").env_remove("PDPKEY_PASSPHRASE");
    cmd
}

fn keygen(dir: &Path, passphrase: &str) -> assert_cmd::assert::Assert {
    bin()
        .env("PDPKEY_PASSPHRASE", passphrase)
        .arg("--dir")
        .arg(dir)
        .arg("--batch")
        .arg("keygen")
        .arg("--rsa-bits")
        .arg("512")
        .assert()
}

#[test]
fn keygen_creates_both_files() {
    let dir = tempdir().unwrap();

    keygen(dir.path(), "pw")
        .success()
        .stdout(predicate::str::contains("PDP key pair stored"));

    assert!(dir.path().join("pdp.pri").exists());
    assert!(dir.path().join("pdp.pub").exists());
}

#[test]
fn keygen_then_show() {
    let dir = tempdir().unwrap();
    keygen(dir.path(), "pw").success();

    bin()
        .env("PDPKEY_PASSPHRASE", "pw")
        .arg("--dir")
        .arg(dir.path())
        .arg("--batch")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("private:    yes"))
        .stdout(predicate::str::contains("512 bits"))
        .stdout(predicate::str::contains("65537"));
}

#[test]
fn show_with_wrong_passphrase_fails() {
    let dir = tempdir().unwrap();
    keygen(dir.path(), "pw").success();

    bin()
        .env("PDPKEY_PASSPHRASE", "not-pw")
        .arg("--dir")
        .arg(dir.path())
        .arg("--batch")
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::contains("wrong passphrase or corrupted key"));
}

#[test]
fn keygen_refuses_to_overwrite_without_force() {
    let dir = tempdir().unwrap();
    keygen(dir.path(), "pw").success();
    let before = fs::read(dir.path().join("pdp.pub")).unwrap();

    keygen(dir.path(), "other")
        .failure()
        .stderr(predicate::str::contains("operation aborted"));

    assert_eq!(fs::read(dir.path().join("pdp.pub")).unwrap(), before);
}

#[test]
fn keygen_force_overwrites() {
    let dir = tempdir().unwrap();
    keygen(dir.path(), "pw").success();
    let before = fs::read(dir.path().join("pdp.pub")).unwrap();

    bin()
        .env("PDPKEY_PASSPHRASE", "other")
        .arg("--dir")
        .arg(dir.path())
        .arg("--batch")
        .arg("keygen")
        .arg("--rsa-bits")
        .arg("512")
        .arg("--force")
        .assert()
        .success();

    assert_ne!(fs::read(dir.path().join("pdp.pub")).unwrap(), before);
}

#[test]
fn force_without_batch_is_rejected() {
    let dir = tempdir().unwrap();

    bin()
        .arg("--dir")
        .arg(dir.path())
        .arg("keygen")
        .arg("--rsa-bits")
        .arg("512")
        .arg("--force")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force only applies together with --batch"));

    assert!(!dir.path().join("pdp.pri").exists());
}

#[test]
fn pubkey_needs_no_passphrase() {
    let dir = tempdir().unwrap();
    keygen(dir.path(), "pw").success();

    bin()
        .arg("--dir")
        .arg(dir.path())
        .arg("pubkey")
        .assert()
        .success()
        .stdout(predicate::str::contains("private:    no"))
        .stdout(predicate::str::contains("512 bits"));
}

#[test]
fn show_missing_container_fails_in_batch_mode() {
    let dir = tempdir().unwrap();

    bin()
        .env("PDPKEY_PASSPHRASE", "pw")
        .arg("--dir")
        .arg(dir.path())
        .arg("--batch")
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no PDP key pair found"));

    assert!(!dir.path().join("pdp.pri").exists());
}

#[test]
fn batch_mode_requires_passphrase() {
    let dir = tempdir().unwrap();

    bin()
        .arg("--dir")
        .arg(dir.path())
        .arg("--batch")
        .arg("keygen")
        .arg("--rsa-bits")
        .arg("512")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PDPKEY_PASSPHRASE"));

    assert!(!dir.path().join("pdp.pri").exists());
}

#[test]
fn dir_can_come_from_environment() {
    let dir = tempdir().unwrap();

    bin()
        .env("PDPKEY_DIR", dir.path())
        .env("PDPKEY_PASSPHRASE", "pw")
        .arg("--batch")
        .arg("keygen")
        .arg("--rsa-bits")
        .arg("512")
        .assert()
        .success();

    assert!(dir.path().join("pdp.pub").exists());
}

#[test]
fn show_reads_golden_container() {
    let dir = tempdir().unwrap();
    fs::copy("tests/fixtures/golden.pri", dir.path().join("pdp.pri")).unwrap();
    fs::copy("tests/fixtures/golden.pub", dir.path().join("pdp.pub")).unwrap();
    let g = fs::read_to_string("tests/fixtures/golden_g.hex").unwrap();

    bin()
        .env("PDPKEY_PASSPHRASE", "fixture-passphrase")
        .arg("--dir")
        .arg(dir.path())
        .arg("--batch")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("1024 bits"))
        .stdout(predicate::str::contains(g.trim().trim_start_matches('0')));
}

#[test]
fn private_half_alone_is_incomplete() {
    let dir = tempdir().unwrap();
    keygen(dir.path(), "pw").success();
    fs::remove_file(dir.path().join("pdp.pub")).unwrap();

    bin()
        .env("PDPKEY_PASSPHRASE", "pw")
        .arg("--dir")
        .arg(dir.path())
        .arg("--batch")
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PDP public key is missing"));
}
