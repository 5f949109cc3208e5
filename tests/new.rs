mod common;

use common::{create, taskward_cmd};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn new_creates_file_in_active_with_rendered_frontmatter() {
    let temp = TempDir::new().unwrap();

    let path = create(
        temp.path(),
        "Fix login bug",
        &["--priority", "high", "--due", "2025-12-31"],
    );

    assert_eq!(
        path,
        temp.path().join("active/0001_fix_login_bug.md")
    );

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("status: \"active\""));
    assert!(content.contains("priority: \"high\""));
    assert!(content.contains("due_date: \"2025-12-31\""));
    assert!(content.contains("# Fix login bug"));
}

#[test]
fn new_numbers_sequentially() {
    let temp = TempDir::new().unwrap();

    create(temp.path(), "First", &[]);
    let second = create(temp.path(), "Second", &[]);

    assert!(second.ends_with("active/0002_second.md"));
}

#[test]
fn new_with_empty_title_fails() {
    let temp = TempDir::new().unwrap();

    taskward_cmd(temp.path())
        .arg("new")
        .arg("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid title"));
}

#[test]
fn strict_new_rejects_invalid_priority() {
    let temp = TempDir::new().unwrap();

    taskward_cmd(temp.path())
        .arg("new")
        .arg("Thing")
        .arg("--priority")
        .arg("urgent")
        .arg("--strict")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid priority"));

    assert!(!temp.path().join("active").exists());
}

#[test]
fn lenient_new_defaults_invalid_priority_with_warning() {
    let temp = TempDir::new().unwrap();

    taskward_cmd(temp.path())
        .arg("new")
        .arg("Thing")
        .arg("--priority")
        .arg("urgent")
        .assert()
        .success()
        .stderr(predicate::str::contains("defaulting to medium"));

    let content = fs::read_to_string(temp.path().join("active/0001_thing.md")).unwrap();
    assert!(content.contains("priority: \"medium\""));
}

#[test]
fn new_with_malformed_due_date_fails() {
    let temp = TempDir::new().unwrap();

    taskward_cmd(temp.path())
        .arg("new")
        .arg("Thing")
        .arg("--due")
        .arg("soonish")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid due date"));
}

#[test]
fn new_with_category_nests_under_active() {
    let temp = TempDir::new().unwrap();

    let path = create(temp.path(), "API work", &["--category", "10_development"]);
    assert_eq!(
        path,
        temp.path().join("active/10_development/0001_api_work.md")
    );
}

#[test]
fn show_reports_created_work_effort() {
    let temp = TempDir::new().unwrap();
    create(
        temp.path(),
        "Fix login bug",
        &["--priority", "high", "--tag", "auth"],
    );

    taskward_cmd(temp.path())
        .arg("show")
        .arg("Fix login bug")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status:       active"))
        .stdout(predicate::str::contains("Priority:     high"))
        .stdout(predicate::str::contains("Tags:         auth"))
        .stdout(predicate::str::contains("Tasks:        0/2 complete"));
}
