mod common;

use common::{create, taskward_cmd};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn transition_moves_file_and_rewrites_frontmatter() {
    let temp = TempDir::new().unwrap();
    let source = create(temp.path(), "Fix login bug", &["--priority", "high"]);

    // Backdate last_updated so the rewrite is observable even within the
    // same minute.
    let backdated = fs::read_to_string(&source)
        .unwrap()
        .lines()
        .map(|line| {
            if line.starts_with("last_updated:") {
                "last_updated: \"2001-01-01 00:00\" # YYYY-MM-DD HH:mm".to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(&source, backdated).unwrap();

    let created_line = fs::read_to_string(&source)
        .unwrap()
        .lines()
        .find(|l| l.starts_with("created:"))
        .unwrap()
        .to_string();

    taskward_cmd(temp.path())
        .arg("transition")
        .arg("0001_fix_login_bug")
        .arg("completed")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Moved 0001_fix_login_bug.md to completed",
        ));

    assert!(!source.exists());
    let dest = temp.path().join("completed/0001_fix_login_bug.md");
    assert!(dest.exists());

    let content = fs::read_to_string(&dest).unwrap();
    assert!(content.contains("status: \"completed\""));
    assert!(!content.contains("last_updated: \"2001-01-01 00:00\""));
    assert!(content.contains(&created_line));
}

#[test]
fn transition_of_missing_work_effort_fails() {
    let temp = TempDir::new().unwrap();

    taskward_cmd(temp.path())
        .arg("transition")
        .arg("0001_ghost")
        .arg("completed")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn transition_with_wrong_from_status_fails() {
    let temp = TempDir::new().unwrap();
    create(temp.path(), "Fix login bug", &[]);

    taskward_cmd(temp.path())
        .arg("transition")
        .arg("0001_fix_login_bug")
        .arg("archived")
        .arg("--from")
        .arg("paused")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));

    // Nothing moved.
    assert!(temp.path().join("active/0001_fix_login_bug.md").exists());
}

#[test]
fn transition_to_garbage_status_fails() {
    let temp = TempDir::new().unwrap();
    create(temp.path(), "Fix login bug", &[]);

    taskward_cmd(temp.path())
        .arg("transition")
        .arg("0001_fix_login_bug")
        .arg("someday")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown status"));
}

#[test]
fn transitions_can_revisit_statuses_in_any_order() {
    let temp = TempDir::new().unwrap();
    create(temp.path(), "Wanderer", &[]);

    for to in ["paused", "completed", "active", "archived", "active"] {
        taskward_cmd(temp.path())
            .arg("transition")
            .arg("0001_wanderer")
            .arg(to)
            .assert()
            .success();
    }

    assert!(temp.path().join("active/0001_wanderer.md").exists());
}

#[test]
fn history_records_creation_and_transitions() {
    let temp = TempDir::new().unwrap();
    create(temp.path(), "Fix login bug", &[]);

    taskward_cmd(temp.path())
        .arg("transition")
        .arg("0001_fix_login_bug")
        .arg("completed")
        .assert()
        .success();

    taskward_cmd(temp.path())
        .arg("history")
        .arg("0001_fix_login_bug")
        .assert()
        .success()
        .stdout(predicate::str::contains("created"))
        .stdout(predicate::str::contains("active -> completed"));
}
