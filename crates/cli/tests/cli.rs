use assert_cmd::Command;

#[test]
fn help_lists_operator_commands() {
    let output = Command::cargo_bin("shelf-cli")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("migrate"));
    assert!(stdout.contains("create-user"));
    assert!(stdout.contains("issue-token"));
}

#[test]
fn create_user_requires_a_username() {
    Command::cargo_bin("shelf-cli")
        .unwrap()
        .arg("create-user")
        .assert()
        .failure();
}
