use std::fs;
use std::path::Path;

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).expect("binary not found")
}

fn write_package(root: &Path, rel: &str, name: &str, version: &str, files: &[(&str, &str)]) {
    let dir = root.join(rel);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("package.json"),
        format!(r#"{{"name":"{name}","version":"{version}"}}"#),
    )
    .unwrap();
    for (path, contents) in files {
        fs::write(dir.join(path), contents).unwrap();
    }
}

#[test]
fn pack_then_unpack_round_trips() -> Result<()> {
    let src_dir = tempdir()?;
    let src = src_dir.path().join("node_modules");
    write_package(&src, "left-pad", "left-pad", "1.3.0", &[("index.js", "module.exports = 1;")]);
    write_package(&src, "@scope/pkg", "@scope/pkg", "2.0.0", &[("index.js", "module.exports = 2;")]);

    let work = tempdir()?;
    let db = work.path().join("node_modules.db");
    let restored = work.path().join("restored");

    cli()
        .arg("pack")
        .arg("-s")
        .arg(&src)
        .arg("-o")
        .arg(&db)
        .assert()
        .success();

    assert!(db.is_file());

    cli()
        .arg("unpack")
        .arg("-i")
        .arg(&db)
        .arg("-o")
        .arg(&restored)
        .assert()
        .success();

    let original = fs::read(src.join("left-pad").join("index.js"))?;
    let round_tripped = fs::read(restored.join("left-pad").join("index.js"))?;
    assert_eq!(original, round_tripped);

    let scoped = fs::read(restored.join("@scope/pkg").join("index.js"))?;
    assert_eq!(scoped, b"module.exports = 2;");

    Ok(())
}

#[test]
fn unpack_without_force_refuses_existing_directory() -> Result<()> {
    let src_dir = tempdir()?;
    let src = src_dir.path().join("node_modules");
    write_package(&src, "a", "a", "1.0.0", &[("index.js", "x")]);

    let work = tempdir()?;
    let db = work.path().join("snap.db");
    let restored = work.path().join("restored");
    fs::create_dir_all(&restored)?;

    cli().arg("pack").arg("-s").arg(&src).arg("-o").arg(&db).assert().success();

    cli()
        .arg("unpack")
        .arg("-i")
        .arg(&db)
        .arg("-o")
        .arg(&restored)
        .assert()
        .failure();

    cli()
        .arg("unpack")
        .arg("-i")
        .arg(&db)
        .arg("-o")
        .arg(&restored)
        .arg("--force")
        .assert()
        .success();

    Ok(())
}

#[test]
fn status_reports_modification_after_pack() -> Result<()> {
    let src_dir = tempdir()?;
    let src = src_dir.path().join("node_modules");
    write_package(&src, "a", "a", "1.0.0", &[("index.js", "original")]);

    let work = tempdir()?;
    let db = work.path().join("snap.db");

    cli().arg("pack").arg("-s").arg(&src).arg("-o").arg(&db).assert().success();

    cli()
        .arg("status")
        .arg("--db")
        .arg(&db)
        .arg("-n")
        .arg(&src)
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));

    fs::write(src.join("a").join("index.js"), "changed")?;

    cli()
        .arg("status")
        .arg("--db")
        .arg(&db)
        .arg("-n")
        .arg(&src)
        .assert()
        .failure()
        .stdout(predicate::str::contains("modified: a/index.js"));

    Ok(())
}

#[test]
fn unpack_fails_when_database_missing() -> Result<()> {
    let work = tempdir()?;
    let db = work.path().join("missing.db");
    let restored = work.path().join("restored");

    cli()
        .arg("unpack")
        .arg("-i")
        .arg(&db)
        .arg("-o")
        .arg(&restored)
        .assert()
        .failure();

    Ok(())
}
