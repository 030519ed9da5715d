//! Testes do binário: códigos de saída e ciclo registro → reinício.

#[path = "../../mot_core/tests/common/mod.rs"]
mod common;

use common::FakeService;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

/// Roda o agente e espera até `limit`; mata o processo se passar disso.
fn run_agent(args: &[&str], limit: Duration) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_mot_agent"))
        .args(args)
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + limit;
    while child.try_wait().unwrap().is_none() {
        if Instant::now() > deadline {
            child.kill().unwrap();
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    child.wait_with_output().unwrap()
}

fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn write_config(dir: &Path, base_url: &str, kind: &str) -> PathBuf {
    let reading = dir.join("temp");
    std::fs::write(&reading, "20\n").unwrap();
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        format!(
            r#"
[service]
base_url = "{base_url}"
id = "dm-01"
password = "pw"

[sensors.temp1]
type = "{kind}"
files = ["{}"]
poll_interval = 1

[[sensors.temp1.registration_package.SensorFields]]
ReadingName = "Temperature"
"#,
            reading.display()
        ),
    )
    .unwrap();
    path
}

fn s(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn help_exits_zero() {
    let out = run_agent(&["--help"], Duration::from_secs(10));
    assert_eq!(out.status.code(), Some(0));
    assert!(combined(&out).contains("--register"));
}

#[test]
fn unknown_flag_exits_one() {
    let out = run_agent(&["--nope"], Duration::from_secs(10));
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn missing_config_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("absent.toml");
    let out = run_agent(&["-c", s(&config)], Duration::from_secs(10));
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn unknown_handler_fails_before_contacting_service() {
    let service = FakeService::start(|_| (200, r#""abc123""#.into()));
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &service.base_url(), "serial-port");
    let state = dir.path().join("state.json");

    let out = run_agent(&["-c", s(&config), "-s", s(&state), "-r"], Duration::from_secs(10));
    assert_eq!(out.status.code(), Some(1));
    assert!(combined(&out).contains("serial-port"));
    assert!(service.drain().is_empty());
    assert!(!state.exists());
}

#[test]
fn register_then_restart_never_reregisters() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    let pid = dir.path().join("mot.pid");

    // ── -r: só registro ──
    let first = FakeService::start(|_| (200, r#""abc123""#.into()));
    let config = write_config(dir.path(), &first.base_url(), "file-poll");
    let out = run_agent(
        &["-c", s(&config), "-s", s(&state), "-r", "-p", s(&pid)],
        Duration::from_secs(10),
    );
    assert_eq!(out.status.code(), Some(0), "{}", combined(&out));
    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state).unwrap()).unwrap();
    assert_eq!(on_disk, json!({ "registrations": { "temp1": "abc123" } }));
    assert!(!pid.exists(), "PID file deve ser removido na saída");

    // ── reinício sem -r: servidor recusa tudo ──
    let second = FakeService::start(|_| (500, "db down".into()));
    let config = write_config(dir.path(), &second.base_url(), "file-poll");
    let out = run_agent(&["-c", s(&config), "-s", s(&state)], Duration::from_secs(15));

    assert_eq!(out.status.code(), Some(1), "{}", combined(&out));
    assert!(combined(&out).contains("db down"));

    let requests = second.drain();
    assert!(!requests.is_empty());
    assert!(requests.iter().all(|r| r.function == "PostSensorData"));
    assert_eq!(
        requests[0].body["Package"]["SensorInfo"]["SensorId"],
        json!("abc123")
    );
}

#[test]
fn first_run_without_state_registers_automatically() {
    let service = FakeService::start(|function| match function {
        "RegisterSensor" => (200, r#""abc123""#.into()),
        _ => (500, "rejeitado".into()),
    });
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &service.base_url(), "file-poll");
    let state = dir.path().join("state.json");

    let out = run_agent(&["-c", s(&config), "-s", s(&state)], Duration::from_secs(15));
    assert_eq!(out.status.code(), Some(1));

    let functions: Vec<_> = service.drain().into_iter().map(|r| r.function).collect();
    assert_eq!(functions, vec!["RegisterSensor", "PostSensorData"]);
    assert!(state.exists());
}

#[test]
fn state_missing_a_sensor_is_fatal() {
    let service = FakeService::start(|_| (200, "{}".into()));
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &service.base_url(), "file-poll");
    let state = dir.path().join("state.json");
    std::fs::write(&state, r#"{"registrations":{"other":"x"}}"#).unwrap();

    let out = run_agent(&["-c", s(&config), "-s", s(&state)], Duration::from_secs(10));
    assert_eq!(out.status.code(), Some(1));
    assert!(combined(&out).contains("temp1"));
    assert!(service.drain().is_empty());
}
