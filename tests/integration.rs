use axum::{routing::post, Json, Router};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const SEPARATOR: &str = "***** SEPARATION *****";

fn harvest_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("harvest");
    path
}

fn setup_test_env(endpoint: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let emails = [
        "Harbor Lights Festival on July 4th at Pier 9, 7:30pm.",
        "Weekly newsletter: nothing new this week.",
        "Reminder: the festival is free for everyone.",
        "Something is happening, details to follow.",
    ]
    .join(&format!("\n{}\n", SEPARATOR));
    fs::write(root.join("emails.txt"), emails).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/events.sqlite"

[source]
path = "{root}/emails.txt"

[model]
endpoint = "{endpoint}"
timeout_secs = 5

[logging]
level = "warn"
"#,
        root = root.display(),
        endpoint = endpoint,
    );

    let config_path = config_dir.join("harvest.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_harvest(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = harvest_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("GEMINI_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run harvest binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Fake `generateContent` endpoint. Every call returns one complete event
/// and one nearly empty one.
async fn start_fake_model() -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let reply = serde_json::json!([
        {
            "Date": "2099-07-04",
            "Name": "Harbor Lights Festival",
            "Time": "1930",
            "Location": "Pier 9",
            "Description": "Fireworks over the harbor",
            "Price": "Free"
        },
        {
            "Date": "2099-07-05",
            "Name": "",
            "Time": "",
            "Location": "",
            "Description": "",
            "Price": ""
        }
    ]);
    let text = format!("```json\n{}\n```", reply);

    let app = Router::new().route(
        "/models/{call}",
        post(move || {
            let text = text.clone();
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(serde_json::json!({
                    "candidates": [{ "content": { "parts": [{ "text": text }] } }]
                }))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), calls)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9");

    let (stdout, stderr, success) = run_harvest(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/events.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");

    let (_, _, success1) = run_harvest(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_harvest(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_events_empty_day() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    run_harvest(&config_path, &["init"]);

    let (stdout, stderr, success) = run_harvest(&config_path, &["events", "--date", "2099-07-04"]);
    assert!(success, "events failed: {}", stderr);
    assert!(stdout.contains("Saturday, July 04, 2099"));
    assert!(stdout.contains("(no events)"));
}

#[test]
fn test_events_rejects_bad_date() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    run_harvest(&config_path, &["init"]);

    let (_, stderr, success) = run_harvest(&config_path, &["events", "--date", "July 4"]);
    assert!(!success);
    assert!(stderr.contains("invalid date"));
}

#[test]
fn test_week_lists_seven_days() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    run_harvest(&config_path, &["init"]);

    let (stdout, stderr, success) = run_harvest(&config_path, &["week"]);
    assert!(success, "week failed: {}", stderr);
    assert_eq!(stdout.matches("(no events)").count(), 7);
}

#[test]
fn test_random_on_empty_store() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    run_harvest(&config_path, &["init"]);

    let (stdout, stderr, success) = run_harvest(&config_path, &["random"]);
    assert!(success, "random failed: {}", stderr);
    assert!(stdout.contains("(no events)"));
}

#[test]
fn test_sweep_on_empty_store() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    run_harvest(&config_path, &["init"]);

    let (stdout, stderr, success) = run_harvest(&config_path, &["sweep"]);
    assert!(success, "sweep failed: {}", stderr);
    assert!(stdout.contains("expired removed: 0"));
    assert!(stdout.contains("low-quality removed: 0"));
}

#[test]
fn test_run_requires_api_key() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");

    let (_, stderr, success) = run_harvest(&config_path, &["run"]);
    assert!(!success);
    assert!(stderr.contains("API key"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_harvest(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_extracts_and_sweeps() {
    let (endpoint, calls) = start_fake_model().await;
    let (_tmp, config_path) = setup_test_env(&endpoint);

    let path = config_path.clone();
    let (stdout, stderr, success) = tokio::task::spawn_blocking(move || {
        run_harvest(&path, &["run", "--api-key", "test-key"])
    })
    .await
    .unwrap();
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);

    // 4 emails in batches of 3
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(stdout.contains("emails read: 4"));
    assert!(stdout.contains("batches: 2"));
    assert!(stdout.contains("events inserted: 4"));
    assert!(stdout.contains("low-quality removed: 2"));

    let path = config_path.clone();
    let (stdout, _, success) = tokio::task::spawn_blocking(move || {
        run_harvest(&path, &["events", "--date", "2099-07-04"])
    })
    .await
    .unwrap();
    assert!(success);
    // Two identical rows collapse into one listing
    assert_eq!(stdout.matches("Harbor Lights Festival").count(), 1);
    assert!(stdout.contains("19:30  Harbor Lights Festival"));
    assert!(stdout.contains("where: Pier 9"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_survives_model_outage() {
    // Nothing listens on the discard port
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");

    let path = config_path.clone();
    let (stdout, stderr, success) = tokio::task::spawn_blocking(move || {
        run_harvest(&path, &["run", "--api-key", "test-key"])
    })
    .await
    .unwrap();
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("batches: 2"));
    assert!(stdout.contains("events extracted: 0"));
    assert!(stdout.contains("events inserted: 0"));
}
