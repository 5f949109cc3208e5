mod common;

use common::{create, stdout_lines, taskward_cmd};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn append(path: &Path, text: &str) {
    let mut content = fs::read_to_string(path).unwrap();
    content.push_str(text);
    fs::write(path, content).unwrap();
}

/// Insert a frontmatter field just before the closing delimiter.
fn add_field(path: &Path, line: &str) {
    let content = fs::read_to_string(path).unwrap();
    let updated = content.replacen("\ntags:", &format!("\n{}\ntags:", line), 1);
    fs::write(path, updated).unwrap();
}

#[test]
fn mutual_links_terminate_and_exclude_self() {
    let temp = TempDir::new().unwrap();
    let alpha = create(temp.path(), "Alpha task", &[]);
    let beta = create(temp.path(), "Beta task", &[]);

    append(&alpha, "\n## Linked Items\n- [[Beta task]]\n");
    append(&beta, "\n## Linked Items\n- [[Alpha task]]\n");

    let output = taskward_cmd(temp.path())
        .arg("related")
        .arg("Alpha task")
        .arg("--recursive")
        .output()
        .unwrap();
    assert!(output.status.success());

    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1, "expected exactly one related record");
    assert!(lines[0].contains("Beta task"));
}

#[test]
fn related_follows_transitive_links_only_when_recursive() {
    let temp = TempDir::new().unwrap();
    let alpha = create(temp.path(), "Alpha chore", &[]);
    let beta = create(temp.path(), "Beta chore", &[]);
    create(temp.path(), "Gamma chore", &[]);

    append(&alpha, "\n## Linked Items\n- [[Beta chore]]\n");
    append(&beta, "\n## Linked Items\n- [[Gamma chore]]\n");

    let direct = taskward_cmd(temp.path())
        .arg("related")
        .arg("Alpha chore")
        .output()
        .unwrap();
    let direct_lines = stdout_lines(&direct);
    assert_eq!(direct_lines.len(), 1);
    assert!(direct_lines[0].contains("Beta chore"));

    let recursive = taskward_cmd(temp.path())
        .arg("related")
        .arg("Alpha chore")
        .arg("--recursive")
        .output()
        .unwrap();
    let all_lines = stdout_lines(&recursive);
    assert_eq!(all_lines.len(), 2);
    assert!(all_lines.iter().any(|l| l.contains("Gamma chore")));
}

#[test]
fn related_for_missing_work_effort_fails() {
    let temp = TempDir::new().unwrap();
    create(temp.path(), "Alpha task", &[]);

    taskward_cmd(temp.path())
        .arg("related")
        .arg("Nope")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn chain_follows_dependencies() {
    let temp = TempDir::new().unwrap();
    let alpha = create(temp.path(), "Alpha step", &[]);
    let beta = create(temp.path(), "Beta step", &[]);
    create(temp.path(), "Gamma step", &[]);

    add_field(&alpha, "depends_on: \"0002_beta_step\"");
    add_field(&beta, "depends_on: \"0003_gamma_step\"");

    taskward_cmd(temp.path())
        .arg("chain")
        .arg("Alpha step")
        .assert()
        .success()
        .stdout(predicate::str::contains("Alpha step"))
        .stdout(predicate::str::contains("-> Beta step"))
        .stdout(predicate::str::contains("-> Gamma step"));
}

#[test]
fn chain_survives_dependency_cycles() {
    let temp = TempDir::new().unwrap();
    let alpha = create(temp.path(), "Alpha loop", &[]);
    let beta = create(temp.path(), "Beta loop", &[]);

    add_field(&alpha, "depends_on: \"0002_beta_loop\"");
    add_field(&beta, "depends_on: \"0001_alpha_loop\"");

    let output = taskward_cmd(temp.path())
        .arg("chain")
        .arg("Alpha loop")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output).len(), 2);
}
