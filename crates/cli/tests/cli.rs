use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("libreria")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("load"));
    assert!(stdout.contains("ping"));
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("libreria")
        .unwrap()
        .arg("reindex")
        .assert()
        .failure();
}
