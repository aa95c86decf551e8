//! Removing layers through the `rm` command

use crate::acb;
use crate::common::layer_archive;
use anyhow::Result;
use std::path::Path;

/// a -> [b -> [d], c], each layer named after itself
fn build_tree(dir: &Path) -> Result<()> {
    layer_archive(dir, "d", &[("d.txt", "d")])?;
    layer_archive(dir, "c", &[("c.txt", "c")])?;
    acb!(dir, "add", "-o", "b.aci", "-n", "b", "d.aci").assert_success()?;
    acb!(dir, "add", "-o", "a.aci", "-n", "a", "b.aci", "c.aci").assert_success()?;
    Ok(())
}

#[test]
fn test_rm_nested_layer() -> Result<()> {
    let dir = tempfile::tempdir()?;
    build_tree(dir.path())?;
    let before = acb!(dir.path(), "deps", "a.aci", "--format", "json").assert_success()?.json()?;

    let result = acb!(dir.path(), "rm", "-i", "a.aci", "-o", "out.aci", "d").assert_success()?;
    assert!(result.contains_stdout("Removed layer 'd'"));

    let after = acb!(dir.path(), "deps", "out.aci", "--format", "json").assert_success()?.json()?;
    assert!(after["imageName"].as_str().unwrap().starts_with("a-"));
    assert!(after["children"][0]["imageName"].as_str().unwrap().starts_with("b-"));
    assert!(after["children"][0].get("children").is_none());
    assert_ne!(after["children"][0]["imageID"], before["children"][0]["imageID"]);
    assert_eq!(after["children"][1], before["children"][1]);

    acb!(dir.path(), "render", "-i", "out.aci", "rendered").assert_success()?;
    assert!(dir.path().join("rendered/c.txt").is_file());
    assert!(!dir.path().join("rendered/d.txt").exists());
    Ok(())
}

#[test]
fn test_rm_several_and_rename() -> Result<()> {
    let dir = tempfile::tempdir()?;
    build_tree(dir.path())?;

    acb!(dir.path(), "rm", "-i", "a.aci", "-o", "slim.aci", "-n", "slim", "d", "c").assert_success()?;

    let tree = acb!(dir.path(), "deps", "slim.aci", "--format", "json").assert_success()?.json()?;
    assert_eq!(tree["imageName"], "slim");
    let children = tree["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert!(children[0]["imageName"].as_str().unwrap().starts_with("b-"));
    Ok(())
}

#[test]
fn test_rm_missing_layer_warns() -> Result<()> {
    let dir = tempfile::tempdir()?;
    build_tree(dir.path())?;
    let before = acb!(dir.path(), "cat-manifest", "a.aci").assert_success()?.json()?;

    let result = acb!(dir.path(), "rm", "-i", "a.aci", "-o", "same.aci", "zzz").assert_success()?;
    assert!(result.contains_stderr("no layer named 'zzz'"));

    let after = acb!(dir.path(), "cat-manifest", "same.aci").assert_success()?.json()?;
    assert_eq!(after, before);
    Ok(())
}

#[test]
fn test_rm_cannot_remove_root() -> Result<()> {
    let dir = tempfile::tempdir()?;
    build_tree(dir.path())?;

    let result = acb!(dir.path(), "rm", "-i", "a.aci", "-o", "out.aci", "a").assert_success()?;
    assert!(result.contains_stderr("no layer named 'a'"));
    Ok(())
}
