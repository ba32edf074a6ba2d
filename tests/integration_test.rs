use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn treepatch(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_treepatch"))
        .args(args)
        .output()
        .expect("Failed to run treepatch")
}

fn create_dir_tree(root: &Path, files: &[(&str, &[u8])]) {
    fs::create_dir_all(root).unwrap();
    for (rel_path, content) in files {
        let full = root.join(rel_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, content).unwrap();
    }
}

fn collect_dir_tree(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut entries = Vec::new();
    collect_recursive(root, root, &mut entries);
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

fn collect_recursive(root: &Path, current: &Path, entries: &mut Vec<(String, Vec<u8>)>) {
    for entry in fs::read_dir(current).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_recursive(root, &path, entries);
        } else {
            let rel = path.strip_prefix(root).unwrap().to_str().unwrap().replace('\\', "/");
            entries.push((rel, fs::read(&path).unwrap()));
        }
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) {
    fs::create_dir_all(dst).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path);
        } else {
            fs::copy(&src_path, &dst_path).unwrap();
        }
    }
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_end_to_end_full_patch_cycle() {
    let temp = tempfile::tempdir().unwrap();
    let old_dir = temp.path().join("old");
    let new_dir = temp.path().join("new");
    let target_dir = temp.path().join("target");
    let patch_file = temp.path().join("test.patch");

    create_dir_tree(
        &old_dir,
        &[
            ("readme.txt", b"Hello, World! This is version 1."),
            ("config/settings.json", b"{\"version\": 1, \"debug\": false}"),
            ("data/records.bin", &[0xAA; 8192]),
            ("data/old_file.txt", b"This file will be deleted"),
            ("obsolete/remove_me.txt", b"Going away"),
        ],
    );

    let mut modified_bin = vec![0xAA; 4096];
    modified_bin.extend_from_slice(&[0xBB; 4096]);
    create_dir_tree(
        &new_dir,
        &[
            ("readme.txt", b"Hello, World! This is version 2 with new features."),
            ("config/settings.json", b"{\"version\": 2, \"debug\": true, \"newField\": 42}"),
            ("data/records.bin", &modified_bin),
            ("data/new_file.txt", b"Brand new file in version 2"),
            ("extras/bonus.dat", &[0xFF; 1024]),
        ],
    );

    copy_dir_recursive(&old_dir, &target_dir);

    let output = treepatch(&["create", "--old", s(&old_dir), "--new", s(&new_dir), "--output", s(&patch_file)]);
    assert!(
        output.status.success(),
        "treepatch create failed:\nstdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(patch_file.exists(), "Patch file should have been created");

    let output = treepatch(&["apply", "--target", s(&target_dir), "--patch", s(&patch_file)]);
    assert!(
        output.status.success(),
        "treepatch apply failed:\nstdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    assert_eq!(collect_dir_tree(&new_dir), collect_dir_tree(&target_dir));
    assert!(!target_dir.join("data/old_file.txt").exists());
    assert!(!target_dir.join("obsolete").exists());
    assert!(target_dir.join("extras/bonus.dat").exists());

    // Applying the same patch again is a no-op.
    let output = treepatch(&["apply", "--target", s(&target_dir), "--patch", s(&patch_file)]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("nothing to do"));
}

#[test]
fn test_empty_to_full() {
    let temp = tempfile::tempdir().unwrap();
    let old_dir = temp.path().join("old");
    let new_dir = temp.path().join("new");
    let target_dir = temp.path().join("target");
    let patch_file = temp.path().join("test.patch");

    fs::create_dir_all(&old_dir).unwrap();
    fs::create_dir_all(&target_dir).unwrap();
    create_dir_tree(
        &new_dir,
        &[
            ("file1.txt", b"Content of file 1"),
            ("sub/file2.txt", b"Content of file 2"),
        ],
    );

    let output = treepatch(&["create", "--old", s(&old_dir), "--new", s(&new_dir), "--output", s(&patch_file)]);
    assert!(output.status.success(), "create failed: {}", String::from_utf8_lossy(&output.stderr));

    let output = treepatch(&["apply", "--target", s(&target_dir), "--patch", s(&patch_file)]);
    assert!(output.status.success(), "apply failed: {}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(collect_dir_tree(&new_dir), collect_dir_tree(&target_dir));
}

#[test]
fn test_drifted_target_fails_without_changes() {
    let temp = tempfile::tempdir().unwrap();
    let old_dir = temp.path().join("old");
    let new_dir = temp.path().join("new");
    let target_dir = temp.path().join("target");
    let patch_file = temp.path().join("test.patch");

    create_dir_tree(&old_dir, &[("a.txt", b"v1"), ("b.txt", b"same")]);
    create_dir_tree(&new_dir, &[("a.txt", b"v2"), ("b.txt", b"same")]);
    create_dir_tree(&target_dir, &[("a.txt", b"local edit"), ("b.txt", b"same")]);

    let output = treepatch(&["create", "--old", s(&old_dir), "--new", s(&new_dir), "--output", s(&patch_file)]);
    assert!(output.status.success());

    let before = collect_dir_tree(&target_dir);
    let output = treepatch(&["apply", "--target", s(&target_dir), "--patch", s(&patch_file)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("matches neither"));
    assert_eq!(before, collect_dir_tree(&target_dir));
}

#[test]
fn test_state_diff_and_inspect_commands() {
    let temp = tempfile::tempdir().unwrap();
    let old_dir = temp.path().join("old");
    let new_dir = temp.path().join("new");
    let patch_file = temp.path().join("test.patch");

    create_dir_tree(&old_dir, &[("a.txt", b"a"), ("gone.txt", b"g")]);
    create_dir_tree(&new_dir, &[("a.txt", b"A"), ("sub/new.txt", b"n")]);

    let output = treepatch(&["state", s(&old_dir)]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"gone.txt\""));
    assert!(stdout.contains("Fingerprint: "));

    let output = treepatch(&["diff", "--old", s(&old_dir), "--new", s(&new_dir)]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("-  gone.txt"));
    assert!(stdout.contains("+  sub/new.txt"));
    assert!(stdout.contains("*  a.txt"));

    let output = treepatch(&["create", "--old", s(&old_dir), "--new", s(&new_dir), "-o", s(&patch_file)]);
    assert!(output.status.success());

    let output = treepatch(&["inspect", s(&patch_file)]);
    assert!(output.status.success());
    let meta: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(meta["removed"], serde_json::json!(["gone.txt"]));
    assert_eq!(meta["added"], serde_json::json!(["sub/new.txt"]));
    assert_eq!(meta["changed"], serde_json::json!(["a.txt"]));
}

#[test]
fn test_apply_with_missing_patch_fails() {
    let temp = tempfile::tempdir().unwrap();
    let target_dir = temp.path().join("target");
    fs::create_dir_all(&target_dir).unwrap();

    let output = treepatch(&["apply", "--target", s(&target_dir), "--patch", s(&temp.path().join("nope.patch"))]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid patch archive"));
}
