use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::path::Path;

pub fn taskward_cmd(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("taskward");
    cmd.arg("-C").arg(cwd);
    cmd
}

/// Create a work effort and return the path printed by the CLI.
// Each integration test file is compiled as its own crate; not every crate
// uses every helper here.
#[allow(dead_code)]
pub fn create(cwd: &Path, title: &str, extra_args: &[&str]) -> std::path::PathBuf {
    let output = taskward_cmd(cwd)
        .arg("new")
        .arg(title)
        .args(extra_args)
        .output()
        .expect("failed to run `taskward new`");
    assert!(
        output.status.success(),
        "`taskward new {}` failed: {}",
        title,
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout should be UTF-8");
    let path = stdout
        .lines()
        .find_map(|line| line.strip_prefix("Created "))
        .expect("creation output should name the new file");
    cwd.join(path.trim_start_matches("./"))
}

#[allow(dead_code)]
pub fn stdout_lines(output: &std::process::Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}
