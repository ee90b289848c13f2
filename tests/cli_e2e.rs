//! End-to-end CLI tests for the httpdispatch binary.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

use assert_cmd::Command;
use httpdispatch_core::http::{CACHE_SUBDIR, cache_key};
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn socket_available() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn seed_cache_entry(data_dir: &std::path::Path, url: &str, body: &[u8]) {
    let cache_dir = data_dir.join("cache").join(CACHE_SUBDIR);
    std::fs::create_dir_all(&cache_dir).unwrap();
    std::fs::write(cache_dir.join(cache_key(url)), body).unwrap();
}

#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("httpdispatch").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Send one HTTP request"));
}

#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("httpdispatch").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("httpdispatch"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("httpdispatch").unwrap();
    cmd.args(["https://example.com", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_missing_url_returns_error() {
    let mut cmd = Command::cargo_bin("httpdispatch").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("<URL>"));
}

#[test]
fn test_binary_relative_url_fails_without_network() {
    let data_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("httpdispatch").unwrap();
    cmd.args(["not a url", "-q", "--data-dir"])
        .arg(data_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid request"));
}

#[test]
fn test_binary_serves_fresh_cache_entry_offline() {
    let data_dir = TempDir::new().unwrap();
    // Port 9 (discard) is never contacted: the entry must come from disk.
    let url = "http://127.0.0.1:9/catalog.json";
    seed_cache_entry(data_dir.path(), url, b"{\"cached\":true}");

    let mut cmd = Command::cargo_bin("httpdispatch").unwrap();
    cmd.args([url, "-q", "--cache-ttl-secs", "3600", "--data-dir"])
        .arg(data_dir.path())
        .assert()
        .success()
        .stdout("{\"cached\":true}");
}

#[test]
fn test_binary_get_prints_body_and_sends_headers() {
    if !socket_available() {
        return;
    }
    let mock_server = tokio_test::block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .and(header("x-trace", "e2e"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello from mock"))
            .mount(&server)
            .await;
        server
    });

    let data_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("httpdispatch").unwrap();
    cmd.arg(format!("{}/hello", mock_server.uri()))
        .args(["-q", "-H", "X-Trace: e2e", "--data-dir"])
        .arg(data_dir.path())
        .assert()
        .success()
        .stdout("hello from mock");
}

#[test]
fn test_binary_error_status_exits_nonzero() {
    if !socket_available() {
        return;
    }
    let mock_server = tokio_test::block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    });

    let data_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("httpdispatch").unwrap();
    cmd.arg(format!("{}/missing", mock_server.uri()))
        .args(["-q", "--data-dir"])
        .arg(data_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("HTTP 404"));
}

#[test]
fn test_binary_download_prints_temp_file_path() {
    if !socket_available() {
        return;
    }
    let mock_server = tokio_test::block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/archive.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![5u8; 2048]))
            .mount(&server)
            .await;
        server
    });

    let data_dir = TempDir::new().unwrap();
    let output = Command::cargo_bin("httpdispatch")
        .unwrap()
        .arg(format!("{}/archive.bin", mock_server.uri()))
        .args(["-q", "--download", "--data-dir"])
        .arg(data_dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    let printed = String::from_utf8(output.stdout).unwrap();
    let file = std::path::PathBuf::from(printed.trim());
    assert!(file.starts_with(data_dir.path().join("temp")));
    assert_eq!(std::fs::read(&file).unwrap().len(), 2048);
}
