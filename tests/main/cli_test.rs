//! CLI surface smoke tests. These never touch the network or a database;
//! they only exercise argument parsing.

use assert_cmd::Command;

fn inciguard() -> Command {
    Command::cargo_bin("inciguard").expect("binary builds")
}

#[test]
fn help_lists_subcommands() {
    let output = inciguard().arg("--help").output().expect("runs");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["analyze", "ingredient", "health"] {
        assert!(stdout.contains(subcommand), "help should mention {subcommand}");
    }
}

#[test]
fn version_flag_works() {
    inciguard().arg("--version").assert().success();
}

#[test]
fn analyze_without_input_fails() {
    let output = inciguard().arg("analyze").output().expect("runs");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ingredient list"));
}
