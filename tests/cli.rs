use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Nothing listens on the discard port, so any request fails to connect.
const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

fn clean(mut cmd: Command) -> Command {
    cmd.env_remove("OTK_MODEL")
        .env_remove("OTK_TIMEOUT")
        .env_remove("OTK_CONFIG")
        .env_remove("OLLAMA_HOST")
        .env_remove("RUST_LOG");
    cmd
}

fn toolkit_cmd() -> Command {
    clean(Command::new(assert_cmd::cargo::cargo_bin!("ollama-tool")))
}

fn otk_cmd() -> Command {
    clean(Command::new(assert_cmd::cargo::cargo_bin!("otk")))
}

fn unique_temp_path(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("otk-cli-test-{label}-{nanos}"))
}

fn parse_stdout_json(output: &[u8]) -> Value {
    let text = String::from_utf8(output.to_vec()).expect("stdout should be utf-8");
    serde_json::from_str(text.trim()).expect("stdout should contain valid JSON")
}

/// Runs the command on a blocking thread so the mock server keeps serving.
async fn run_blocking(mut cmd: Command) -> assert_cmd::assert::Assert {
    tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .expect("command thread should not panic")
}

#[test]
fn missing_image_fails_before_any_request() {
    let missing = unique_temp_path("missing.png");

    toolkit_cmd()
        .args(["--url", UNREACHABLE_URL, "--chat", "--image"])
        .arg(&missing)
        .arg("describe this")
        .assert()
        .failure()
        .stderr(contains("File not found").and(contains(missing.display().to_string())));
}

#[test]
fn missing_file_fails_before_any_request() {
    let missing = unique_temp_path("missing.txt");

    toolkit_cmd()
        .args(["--url", UNREACHABLE_URL, "--file"])
        .arg(&missing)
        .arg("summarize")
        .assert()
        .failure()
        .stderr(contains("File not found"));
}

#[test]
fn unreachable_server_suggests_checking_it() {
    toolkit_cmd()
        .args(["--url", UNREACHABLE_URL, "hello"])
        .assert()
        .failure()
        .stderr(contains("Is the Ollama server running at http://127.0.0.1:9?"));
}

#[test]
fn invalid_param_is_rejected_by_argument_parsing() {
    toolkit_cmd()
        .args(["--param", "no-equals-sign", "hello"])
        .assert()
        .failure()
        .stderr(contains("Expected KEY=VALUE"));
}

#[test]
fn version_prints_build_metadata() {
    toolkit_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("commit:").and(contains("built:")));

    otk_cmd()
        .args(["ask", "--version"])
        .assert()
        .success()
        .stdout(contains("commit:").and(contains("built:")));
}

#[test]
fn interactive_mode_exits_on_quit() {
    toolkit_cmd()
        .args(["--url", UNREACHABLE_URL, "--model", "qwen3"])
        .write_stdin("exit\n")
        .assert()
        .success()
        .stdout(contains("model: qwen3, URL: http://127.0.0.1:9"));
}

#[test]
fn config_check_accepts_valid_profile() {
    let config_path = unique_temp_path("config-ok");
    fs::write(
        &config_path,
        "[profiles.local]\nmodel = \"qwen3\"\nbase_url = \"http://localhost:11434\"\n\n[profiles.local.params]\nkeep_alive = \"5m\"\n",
    )
    .expect("config should be writable");

    otk_cmd()
        .env("OTK_CONFIG", &config_path)
        .args(["config", "check", "--profile", "local"])
        .assert()
        .success()
        .stdout(contains("config OK:"));
}

#[test]
fn config_check_reports_missing_profile() {
    let config_path = unique_temp_path("config-missing-profile");
    fs::write(&config_path, "[profiles.local]\nmodel = \"qwen3\"\n")
        .expect("config should be writable");

    otk_cmd()
        .env("OTK_CONFIG", &config_path)
        .args(["config", "check", "--profile", "remote"])
        .assert()
        .failure()
        .stderr(contains("Profile 'remote' not found"));
}

#[test]
fn invalid_config_toml_returns_parse_error() {
    let config_path = unique_temp_path("config-invalid");
    fs::write(&config_path, "[profiles.bad\nmodel = \"x\"").expect("config should be writable");

    otk_cmd()
        .env("OTK_CONFIG", &config_path)
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(contains("Failed to parse config file"));
}

#[test]
fn config_show_applies_env_over_profile() {
    let config_path = unique_temp_path("config-show");
    fs::write(
        &config_path,
        "[profiles.gpu]\nmodel = \"profile-model\"\nbase_url = \"gpu-box:11434\"\nstream = false\ntimeout = 120\n",
    )
    .expect("config should be writable");

    let assert = otk_cmd()
        .env("OTK_CONFIG", &config_path)
        .env("OTK_MODEL", "env-model")
        .args(["config", "show", "--profile", "gpu"])
        .assert()
        .success();

    let body = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(body["model"], json!("env-model"));
    assert_eq!(body["base_url"], json!("http://gpu-box:11434"));
    assert_eq!(body["stream"], json!(false));
    assert_eq!(body["timeout_secs"], json!(120));
}

#[test]
fn completion_script_is_generated() {
    otk_cmd()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(contains("otk"));
}

#[tokio::test]
async fn list_models_prints_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3:latest"}, {"name": "llava:7b"}]
        })))
        .mount(&server)
        .await;

    let mut cmd = toolkit_cmd();
    cmd.args(["--url", &server.uri(), "--list-models"]);

    run_blocking(cmd)
        .await
        .success()
        .stdout("Available models:\n- llama3:latest\n- llava:7b\n");
}

#[tokio::test]
async fn prompt_is_streamed_to_stdout() {
    let server = MockServer::start().await;
    let body = [
        json!({"response": "Four", "done": false}).to_string(),
        json!({"response": ".", "done": true}).to_string(),
    ]
    .join("\n");
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "qwen3", "prompt": "2+2?", "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = toolkit_cmd();
    cmd.args(["--url", &server.uri(), "--model", "qwen3", "2+2?"]);

    run_blocking(cmd).await.success().stdout("Four.\n");
}

#[tokio::test]
async fn chat_attaches_only_first_image_to_user_message() {
    let first = unique_temp_path("first.png");
    let second = unique_temp_path("second.png");
    fs::write(&first, b"one").expect("image should be writable");
    fs::write(&second, b"two").expect("image should be writable");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "stream": false,
            "messages": [{"role": "user", "content": "what is this?", "images": ["b25l"]}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "a picture"},
            "done": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = toolkit_cmd();
    cmd.args(["--url", &server.uri(), "--chat", "--no-stream", "--image"])
        .arg(&first)
        .arg("--image")
        .arg(&second)
        .arg("what is this?");

    run_blocking(cmd).await.success().stdout("a picture\n");
}

#[tokio::test]
async fn server_error_prints_body_and_hints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("{\"error\":\"model requires more system memory (resource limitations)\"}"),
        )
        .mount(&server)
        .await;

    let mut cmd = toolkit_cmd();
    cmd.args(["--url", &server.uri(), "hello"]);

    run_blocking(cmd).await.failure().stderr(
        contains("resource limitations")
            .and(contains("500"))
            .and(contains("Try a smaller model")),
    );
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "message": {"role": "assistant", "content": content},
        "done": true,
    }))
}

/// Messages of every `/api/chat` request the server saw, in order.
async fn chat_histories(server: &MockServer) -> Vec<Vec<Value>> {
    server
        .received_requests()
        .await
        .expect("request recording is on by default")
        .iter()
        .filter(|request| request.url.path() == "/api/chat")
        .map(|request| {
            let body: Value = request.body_json().expect("chat body should be JSON");
            body["messages"]
                .as_array()
                .expect("messages should be an array")
                .clone()
        })
        .collect()
}

#[tokio::test]
async fn interactive_chat_accumulates_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply("noted"))
        .expect(2)
        .mount(&server)
        .await;

    let mut cmd = toolkit_cmd();
    cmd.args(["--url", &server.uri(), "--chat", "--no-stream"])
        .write_stdin("q1\nq2\nexit\n");

    run_blocking(cmd).await.success().stdout(contains("noted"));

    let histories = chat_histories(&server).await;
    assert_eq!(histories.len(), 2);
    assert_eq!(histories[0], vec![json!({"role": "user", "content": "q1"})]);
    assert_eq!(
        histories[1],
        vec![
            json!({"role": "user", "content": "q1"}),
            json!({"role": "assistant", "content": "noted"}),
            json!({"role": "user", "content": "q2"}),
        ]
    );
}

#[tokio::test]
async fn interactive_chat_drops_failed_turn_and_continues() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model failed to load"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply("recovered"))
        .mount(&server)
        .await;

    let mut cmd = toolkit_cmd();
    cmd.args(["--url", &server.uri(), "--chat", "--no-stream"])
        .write_stdin("bad\ngood\nexit\n");

    run_blocking(cmd)
        .await
        .success()
        .stdout(contains("recovered"))
        .stderr(contains("model failed to load"));

    let histories = chat_histories(&server).await;
    assert_eq!(histories.len(), 2);
    assert_eq!(histories[1], vec![json!({"role": "user", "content": "good"})]);
}

#[tokio::test]
async fn interactive_attachments_go_with_first_prompt_only() {
    let image = unique_temp_path("interactive.png");
    fs::write(&image, b"one").expect("image should be writable");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply("seen"))
        .mount(&server)
        .await;

    let mut cmd = toolkit_cmd();
    cmd.args(["--url", &server.uri(), "--chat", "--no-stream", "--image"])
        .arg(&image)
        .write_stdin("first\nsecond\nexit\n");

    run_blocking(cmd).await.success();

    let histories = chat_histories(&server).await;
    assert_eq!(histories.len(), 2);
    assert_eq!(
        histories[0],
        vec![json!({"role": "user", "content": "first", "images": ["b25l"]})]
    );
    assert_eq!(histories[1].len(), 3);
    assert_eq!(histories[1][0]["images"], json!(["b25l"]));
    assert!(histories[1][2].get("images").is_none());
}

#[tokio::test]
async fn interactive_models_command_lists_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3:latest"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = toolkit_cmd();
    cmd.args(["--url", &server.uri()]).write_stdin("!models\nquit\n");

    run_blocking(cmd)
        .await
        .success()
        .stdout(contains("Available models:\n- llama3:latest\n"));
}

#[cfg(unix)]
#[test]
fn interrupt_in_interactive_mode_exits_cleanly() {
    use std::io::{BufRead, BufReader, Read};
    use std::process::{Command as StdCommand, Stdio};

    let mut child = StdCommand::new(assert_cmd::cargo::cargo_bin!("ollama-tool"))
        .args(["--url", UNREACHABLE_URL])
        .env_remove("OTK_CONFIG")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("binary should start");

    // Held open so the loop cannot end on EOF before the signal lands.
    let _stdin = child.stdin.take().expect("stdin is piped");
    let mut stderr = child.stderr.take().expect("stderr is piped");
    let mut stdout = BufReader::new(child.stdout.take().expect("stdout is piped"));

    // The banner is printed after the handler is installed.
    let mut banner = String::new();
    stdout
        .read_line(&mut banner)
        .expect("banner should be readable");
    assert!(banner.contains("interactive mode"));

    let status = StdCommand::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("kill should run");
    assert!(status.success());

    let exit = child.wait().expect("child should exit");
    let mut errors = String::new();
    stderr
        .read_to_string(&mut errors)
        .expect("stderr should be readable");
    assert!(exit.success(), "status: {exit:?}");
    assert!(errors.contains("Interrupted"));
}
