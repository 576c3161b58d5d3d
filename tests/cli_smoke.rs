use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn sheetsync(root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sheetsync").expect("binary");
    cmd.arg("--root").arg(root.path());
    cmd.env_remove("SHEETSYNC_ACTOR");
    cmd
}

#[test]
fn help_works() {
    Command::cargo_bin("sheetsync")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("shared sheet coordination"));
}

#[test]
fn subcommand_help_works() {
    for cmd in ["new", "show", "row", "cell", "renumber", "actor"] {
        Command::cargo_bin("sheetsync")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn new_show_edit_cycle() {
    let root = TempDir::new().unwrap();

    sheetsync(&root)
        .args(["new", "--sheet", "/doc.csv", "--header", "num;title;status"])
        .assert()
        .success()
        .stdout(contains("Created /doc.csv"));

    sheetsync(&root)
        .args(["row", "insert", "--sheet", "/doc.csv", "--after", "0"])
        .assert()
        .success()
        .stdout(contains("Inserted row 1"));

    sheetsync(&root)
        .args([
            "cell", "set", "--sheet", "/doc.csv", "--row", "1", "--col", "1", "--value", "hello",
        ])
        .assert()
        .success();

    sheetsync(&root)
        .args(["show", "--sheet", "/doc.csv"])
        .assert()
        .success()
        .stdout(contains("1;hello;"));
}

#[test]
fn json_envelope_is_well_formed() {
    let root = TempDir::new().unwrap();

    sheetsync(&root)
        .args(["new", "--sheet", "/doc.csv", "--header", "a;b"])
        .assert()
        .success();

    let output = sheetsync(&root)
        .args(["--json", "row", "insert", "--sheet", "/doc.csv", "--after", "0"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["schema_version"], "sheetsync.v1");
    assert_eq!(parsed["command"], "row insert");
    assert_eq!(parsed["status"], "success");
    assert_eq!(parsed["data"]["row"], 1);
}

#[test]
fn missing_sheet_exits_with_user_error() {
    let root = TempDir::new().unwrap();

    sheetsync(&root)
        .args(["row", "insert", "--sheet", "/nope.csv", "--after", "0"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("Sheet not found"));
}

#[test]
fn deleting_the_fixed_row_is_refused() {
    let root = TempDir::new().unwrap();

    sheetsync(&root)
        .args(["new", "--sheet", "/doc.csv", "--header", "a;b"])
        .assert()
        .success();

    sheetsync(&root)
        .args(["row", "delete", "--sheet", "/doc.csv", "--row", "0"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("fixed top row"));
}

#[test]
fn events_stream_as_jsonl() {
    let root = TempDir::new().unwrap();

    sheetsync(&root)
        .args(["new", "--sheet", "/doc.csv", "--header", "a;b"])
        .assert()
        .success();

    let output = sheetsync(&root)
        .args([
            "--events", "-", "--quiet", "row", "insert", "--sheet", "/doc.csv", "--after", "0",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(lines.len(), 1);

    let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(event["schema_version"], "sheetsync.event.v1");
    assert_eq!(event["kind"], "row_inserted");
    assert_eq!(event["path"], "/doc.csv");
    assert_eq!(event["cursor"], 1);
}

#[test]
fn actor_set_and_show_round_trip() {
    let root = TempDir::new().unwrap();

    sheetsync(&root)
        .args(["actor", "set", "editor9"])
        .assert()
        .success();

    sheetsync(&root)
        .args(["actor", "show"])
        .assert()
        .success()
        .stdout(contains("editor9"));

    // Mutations record the persisted actor in the JSON report.
    sheetsync(&root)
        .args(["new", "--sheet", "/doc.csv", "--header", "a;b"])
        .assert()
        .success();
    let output = sheetsync(&root)
        .args(["--json", "row", "insert", "--sheet", "/doc.csv", "--after", "0"])
        .output()
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["data"]["actor"], "editor9");
}

#[test]
fn config_ttl_is_validated() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join(".sheetsync.toml"), "[locks]\nttl = \"nope\"\n").unwrap();

    sheetsync(&root)
        .args(["show", "--sheet", "/doc.csv"])
        .assert()
        .failure()
        .code(2);
}
