use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "refine-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_closed_form_json_report() {
    let exe = env!("CARGO_BIN_EXE_refine-tester");
    let output_path = temp_path("closed");
    let status = Command::new(exe)
        .args(["--mode", "closed", "--levels", "11,25", "--report", "json", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    let parsed: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let rows = parsed.as_array().expect("array of results");
    assert_eq!(rows.len(), 8);
    assert!(rows.iter().all(|row| row["passed"] == true));
}

#[test]
fn cli_simulation_with_stages_writes_csv() {
    let exe = env!("CARGO_BIN_EXE_refine-tester");
    let output_path = temp_path("csv");
    let status = Command::new(exe)
        .args([
            "--mode",
            "both",
            "--levels",
            "none",
            "--stages",
            "all",
            "--enhanced",
            "--iterations",
            "50",
            "--seeds",
            "1,-2",
            "--report",
            "csv",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    // header + 12 scenarios x 2 seeds
    assert_eq!(content.lines().count(), 25);
    assert!(content.contains("stage 2 enhanced"));
}

#[test]
fn cli_trace_prints_attempts() {
    let exe = env!("CARGO_BIN_EXE_refine-tester");
    let output = Command::new(exe)
        .args(["--mode", "closed", "--levels", "none", "--trace", "20"])
        .env("NO_COLOR", "1")
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Attempt trace: level 20"));
    assert!(stdout.contains("Refine Engine Tester"));
}

#[test]
fn cli_trace_applies_requested_consumables() {
    let exe = env!("CARGO_BIN_EXE_refine-tester");
    let output = Command::new(exe)
        .args([
            "--mode",
            "closed",
            "--levels",
            "none",
            "--trace",
            "11",
            "--trace-combo",
            "both",
            "--catalyst-stacks",
            "10",
        ])
        .env("NO_COLOR", "1")
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Attempt trace: level 11 [both], seed 1337"));
}

#[test]
fn cli_rejects_unknown_level() {
    let exe = env!("CARGO_BIN_EXE_refine-tester");
    let output = Command::new(exe)
        .args(["--mode", "closed", "--levels", "40"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("level 40"));
}

#[test]
fn cli_acceptance_fails_on_impossible_tolerance() {
    let exe = env!("CARGO_BIN_EXE_refine-tester");
    let output_path = temp_path("acceptance");
    let status = Command::new(exe)
        .args([
            "--mode",
            "simulate",
            "--levels",
            "11",
            "--acceptance",
            "--tolerance",
            "0",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert_eq!(status.code(), Some(1));
}
