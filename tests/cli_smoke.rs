// Drives the compiled binary against a throwaway table and config so the
// user's real files are never touched.

use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn shizi(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("shizi").unwrap();
    cmd.arg("--store")
        .arg(dir.join("chars.csv"))
        .arg("--config")
        .arg(dir.join("config.json"))
        .env("RUST_LOG", "off");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn init_generate_grade_stats() {
    let dir = tempdir().unwrap();

    let out = stdout_of(shizi(dir.path()).args(["init", "小鸟跑步, 小鸟!"]));
    assert!(out.contains("added 4 characters"));
    let table = fs::read_to_string(dir.path().join("chars.csv")).unwrap();
    assert!(table.starts_with("content,level,appearances,correct,accuracy,last_seen"));
    assert_eq!(table.lines().count(), 5);

    let content = dir.path().join("content.txt");
    fs::write(&content, "小鸟\n跑步\n").unwrap();
    let sheet = stdout_of(shizi(dir.path()).args([
        "generate",
        "--seed",
        "7",
        "--content",
        content.to_str().unwrap(),
    ]));
    assert_eq!(sheet.trim_end(), "小鸟 跑步");

    let transcript = dir.path().join("graded.txt");
    fs::write(&transcript, "小(1)鸟(0)跑(1)步(-1)\n").unwrap();
    let out = stdout_of(shizi(dir.path()).args(["grade", transcript.to_str().unwrap()]));
    assert!(out.contains("updated 3 characters from 1 lines (1 unreadable marks)"));

    let stats = stdout_of(shizi(dir.path()).args(["stats", "-n", "2"]));
    let rows: Vec<&str> = stats.lines().collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].starts_with("char"));
    // never-graded 步 outranks everything that was just graded
    assert!(rows[1].starts_with('步'));
}

#[test]
fn generate_writes_sheet_to_file() {
    let dir = tempdir().unwrap();
    shizi(dir.path()).args(["init", "大天"]).assert().success();

    let content = dir.path().join("content.txt");
    fs::write(&content, "大天\n天大\n").unwrap();
    let sheet = dir.path().join("sheet.txt");
    shizi(dir.path())
        .args(["generate", "--random", "--seed", "1", "--content"])
        .arg(&content)
        .arg("-o")
        .arg(&sheet)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(sheet).unwrap(), "大天 天大\n");
}

#[test]
fn generate_on_empty_table_fails() {
    let dir = tempdir().unwrap();
    let content = dir.path().join("content.txt");
    fs::write(&content, "大天\n").unwrap();
    shizi(dir.path())
        .args(["generate", "--content"])
        .arg(&content)
        .assert()
        .failure();
}

#[test]
fn init_without_text_fails() {
    let dir = tempdir().unwrap();
    shizi(dir.path()).arg("init").assert().failure();
}

#[test]
fn stats_on_empty_table() {
    let dir = tempdir().unwrap();
    let out = stdout_of(shizi(dir.path()).arg("stats"));
    assert_eq!(out.trim(), "the character table is empty");
}
