//! Creating images and looking at them

use crate::acb;
use crate::common::layer_archive;
use anyhow::Result;
use std::fs;

#[test]
fn test_new_writes_gzipped_empty_image() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let result = acb!(dir.path(), "new", "-o", "base.aci", "-n", "example.com/base").assert_success()?;
    assert!(result.contains_stdout("base.aci"));

    let raw = fs::read(dir.path().join("base.aci"))?;
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);

    let manifest = acb!(dir.path(), "cat-manifest", "base.aci").assert_success()?.json()?;
    assert_eq!(manifest["acKind"], "ImageManifest");
    assert_eq!(manifest["name"], "example.com/base");
    Ok(())
}

#[test]
fn test_new_respects_existing_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    acb!(dir.path(), "new", "-o", "x.aci", "-n", "x").assert_success()?;

    let result = acb!(dir.path(), "new", "-o", "x.aci", "-n", "x").assert_failure()?;
    assert!(result.contains_stderr("already exists"));

    acb!(dir.path(), "new", "-o", "x.aci", "-n", "x", "--overwrite").assert_success()?;
    Ok(())
}

#[test]
fn test_new_rejects_bad_name() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = acb!(dir.path(), "new", "-o", "x.aci", "-n", "Not Valid").assert_failure()?;
    assert!(result.contains_stderr("invalid image name"));
    assert!(!dir.path().join("x.aci").exists());
    Ok(())
}

#[test]
fn test_add_and_deps() -> Result<()> {
    let dir = tempfile::tempdir()?;
    layer_archive(dir.path(), "libc", &[("lib/libc.so", "libc")])?;
    layer_archive(dir.path(), "tools", &[("bin/sh", "sh")])?;

    acb!(dir.path(), "add", "-o", "base.aci", "-n", "base", "libc.aci").assert_success()?;
    // Stored names work as inputs too.
    acb!(dir.path(), "add", "-o", "app.aci", "-n", "app", "base", "tools").assert_success()?;

    let tree = acb!(dir.path(), "deps", "app.aci", "--format", "json").assert_success()?.json()?;
    assert_eq!(tree["imageName"], "app");
    assert_eq!(tree["children"][0]["imageName"], "base");
    assert_eq!(tree["children"][0]["children"][0]["imageName"], "libc");
    assert_eq!(tree["children"][1]["imageName"], "tools");
    assert!(tree["children"][1]["imageID"].as_str().unwrap().starts_with("blake3-"));

    let text = acb!(dir.path(), "deps", "app").assert_success()?;
    let lines: Vec<_> = text.stdout.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("app"));
    assert!(lines[1].starts_with("├── base"));
    assert!(lines[2].starts_with("│   └── libc"));
    assert!(lines[3].starts_with("└── tools"));
    Ok(())
}

#[test]
fn test_add_unknown_input_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = acb!(dir.path(), "add", "-o", "a.aci", "-n", "a", "nothing-here").assert_failure()?;
    assert!(result.contains_stderr("nothing-here"));
    Ok(())
}

#[test]
fn test_render_layers() -> Result<()> {
    let dir = tempfile::tempdir()?;
    layer_archive(dir.path(), "low", &[("etc/motd", "low"), ("etc/low", "1")])?;
    layer_archive(dir.path(), "high", &[("etc/motd", "high")])?;
    acb!(dir.path(), "add", "-o", "app.aci", "-n", "app", "high.aci", "low.aci").assert_success()?;

    acb!(dir.path(), "render", "-i", "app.aci", "out").assert_success()?;
    assert_eq!(fs::read_to_string(dir.path().join("out/etc/motd"))?, "high");
    assert_eq!(fs::read_to_string(dir.path().join("out/etc/low"))?, "1");

    // A second render into the same directory is refused.
    acb!(dir.path(), "render", "-i", "app.aci", "out").assert_failure()?;
    Ok(())
}

#[test]
fn test_rename() -> Result<()> {
    let dir = tempfile::tempdir()?;
    layer_archive(dir.path(), "old", &[("f", "data")])?;

    acb!(dir.path(), "rename", "-i", "old.aci", "-o", "new.aci", "fresh").assert_success()?;

    let manifest = acb!(dir.path(), "cat-manifest", "new.aci").assert_success()?.json()?;
    assert_eq!(manifest["name"], "fresh");
    acb!(dir.path(), "render", "-i", "fresh", "out").assert_success()?;
    assert_eq!(fs::read_to_string(dir.path().join("out/f"))?, "data");
    Ok(())
}
