use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Run the binary off the async runtime so the mock server keeps serving
async fn run(args: Vec<String>, stdin: Option<&'static str>) -> Output {
    tokio::task::spawn_blocking(move || {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_purlcli"));
        cmd.env_remove("PURLDB_URL")
            .env_remove("PURLDB_API_KEY")
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });

        let mut child = cmd.spawn().unwrap();
        if let Some(input) = stdin {
            child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
        }
        child.wait_with_output().unwrap()
    })
    .await
    .unwrap()
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn mock_purldb() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metadata/"))
        .and(query_param("purl", "pkg:pypi/django@3.2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "django",
            "version": "3.2",
            "license": "BSD-3-Clause"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/metadata/"))
        .and(query_param("purl", "pkg:npm/missing@0.0.1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/versions/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"version": "3.1"},
            {"version": "3.2"}
        ])))
        .mount(&server)
        .await;
    server
}

#[test]
fn test_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_purlcli"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["metadata", "urls", "validate", "versions"] {
        assert!(stdout.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_urls_help_lists_head() {
    let output = Command::new(env!("CARGO_BIN_EXE_purlcli"))
        .args(["urls", "--help"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("--head"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_metadata_mixed_batch_exits_zero() {
    let server = mock_purldb().await;
    let output = run(
        args(&[
            "metadata",
            "--purl",
            "pkg:pypi/django@3.2",
            "--purl",
            "pkg:pypi/NOPE@@",
            "--purl",
            "pkg:npm/missing@0.0.1",
            "--base-url",
            &server.uri(),
            "--log-level",
            "ERROR",
        ]),
        None,
    )
    .await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines: Vec<Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["status"], "succeeded");
    assert_eq!(lines[0]["data"]["license"], "BSD-3-Clause");
    assert_eq!(lines[1]["purl"], "pkg:pypi/NOPE@@");
    assert_eq!(lines[1]["error"]["kind"], "malformed_purl");
    assert_eq!(lines[2]["status"], "remote_failed");
    assert_eq!(lines[2]["error"]["kind"], "client_rejected");
    assert_eq!(lines[2]["error"]["status_code"], 404);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_versions_from_file_to_csv() {
    let server = mock_purldb().await;
    let dir = tempdir().unwrap();
    let input = dir.path().join("purls.txt");
    let report = dir.path().join("versions.csv");
    std::fs::write(&input, "# packages\npkg:pypi/django\n\npkg:gem/rails\n").unwrap();

    let output = run(
        args(&[
            "versions",
            "--file",
            input.to_str().unwrap(),
            "--format",
            "csv",
            "--output",
            report.to_str().unwrap(),
            "--base-url",
            &server.uri(),
            "--skip-probe",
        ]),
        None,
    )
    .await;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let text = std::fs::read_to_string(&report).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "purl,status,error,data.items.0.version,data.items.1.version"
    );
    assert_eq!(lines.next().unwrap(), "pkg:pypi/django,succeeded,,3.1,3.2");
    assert_eq!(lines.next().unwrap(), "pkg:gem/rails,succeeded,,3.1,3.2");
    assert!(lines.next().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reads_stdin_when_no_input_flag() {
    let server = mock_purldb().await;
    let output = run(
        args(&["metadata", "--base-url", &server.uri(), "--format", "table"]),
        Some("pkg:pypi/django@3.2\n"),
    )
    .await;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("PURL"));
    assert!(stdout.contains("succeeded"));
    assert!(stdout.contains("1 total, 1 succeeded"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_json_pretty_document() {
    let server = mock_purldb().await;
    let output = run(
        args(&[
            "metadata",
            "--purl",
            "pkg:pypi/django@3.2",
            "--format",
            "json-pretty",
            "--base-url",
            &server.uri(),
        ]),
        None,
    )
    .await;

    assert!(output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["headers"][0]["tool_name"], "purlcli");
    assert_eq!(doc["headers"][0]["command"], "metadata");
    assert_eq!(doc["headers"][0]["summary"]["succeeded"], 1);
    assert_eq!(doc["packages"][0]["data"]["name"], "django");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_input_is_fatal() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("empty.txt");
    std::fs::write(&input, "\n# nothing here\n\n").unwrap();

    let output = run(
        args(&["metadata", "--file", input.to_str().unwrap(), "--skip-probe"]),
        None,
    )
    .await;

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("input is empty"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unsupported_format_is_fatal() {
    let output = run(
        args(&["metadata", "--purl", "pkg:pypi/django", "--format", "yaml", "--skip-probe"]),
        None,
    )
    .await;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported output format"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_service_is_fatal() {
    let output = run(
        args(&["validate", "--purl", "pkg:pypi/django", "--base-url", "http://127.0.0.1:1/"]),
        None,
    )
    .await;

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("service unreachable"));
}
