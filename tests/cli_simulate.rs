use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rhythm_cli"))
}

#[test]
fn levels_lists_presets() {
    let output = cli().arg("levels").output().expect("levels command");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    for name in ["quarter", "eighth", "sixteenth"] {
        assert!(stdout.contains(name), "missing {name} in {stdout}");
    }
}

#[test]
fn schedule_outputs_active_timestamps() {
    let output = cli()
        .args(["schedule", "--level", "quarter"])
        .output()
        .expect("schedule command");
    assert!(output.status.success());

    let payload: Value = serde_json::from_slice(&output.stdout).expect("schedule json");
    assert_eq!(payload["active_beats"], 28);
    assert_eq!(payload["timestamps"].as_array().map(Vec::len), Some(28));
}

#[test]
fn simulate_reports_calibrated_session() {
    let output = cli()
        .args([
            "simulate",
            "--level",
            "quarter",
            "--jitter-ms",
            "0",
            "--offset-ms",
            "40",
        ])
        .output()
        .expect("simulate command");
    assert!(
        output.status.success(),
        "simulate exited with {:?}",
        output.status.code()
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("report json");
    let offset = report["calibration_offset_ms"].as_f64().expect("offset");
    assert!((offset - 40.0).abs() < 1e-6);
    assert_eq!(report["session"]["state"], "complete");
    assert_eq!(report["session"]["score"], 2800);
    assert_eq!(report["stats"]["active_taps"], 28);
}

#[test]
fn simulate_default_jitter_completes_for_many_seeds() {
    for seed in 1..=8 {
        let output = cli()
            .args(["simulate", "--seed", &seed.to_string()])
            .output()
            .expect("simulate command");
        assert!(
            output.status.success(),
            "seed {seed} exited with {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        );

        let report: Value = serde_json::from_slice(&output.stdout).expect("report json");
        assert_eq!(report["calibration"]["tap_count"], 8, "seed {seed}");
        assert_eq!(report["session"]["state"], "complete", "seed {seed}");
        // An early downbeat tap can land in the preceding rest slot
        let active = report["stats"]["active_taps"].as_u64().expect("active taps");
        let rest = report["stats"]["rest_taps"].as_u64().expect("rest taps");
        assert_eq!(active + rest, 28, "seed {seed}");
    }
}

#[test]
fn unknown_level_fails() {
    let output = cli()
        .args(["schedule", "--level", "polka"])
        .output()
        .expect("schedule command");
    assert!(!output.status.success());
}
