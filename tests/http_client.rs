//! HTTP client behaviour against a mock cluster API.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use pve_content::api::{ApiClient, ApiError, UploadFile};
use pve_content::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use pve_content::{
    ContentType, HttpApiClient, ProxmoxConfig, Storage, StorageContent, StorageError,
};
use rstest::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTH: &str = "PVEAPIToken=automation@pve!ci=s3cr3t";
const UPID: &str = "UPID:pve1:0001F00D:00ABCDEF:66000000:download:ubuntu.iso:automation@pve!ci:";

fn config_for(server: &MockServer) -> ProxmoxConfig {
    ProxmoxConfig {
        api_url: format!("{}/api2/json/", server.uri()),
        token_id: String::from("automation@pve!ci"),
        token_secret: String::from("s3cr3t"),
        node: String::from("pve1"),
        storage: String::from("local"),
        accept_invalid_certs: false,
        request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
    }
}

fn client_for(server: &MockServer) -> HttpApiClient {
    HttpApiClient::new(&config_for(server)).unwrap_or_else(|err| panic!("client: {err}"))
}

fn envelope(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
}

#[tokio::test]
async fn get_unwraps_envelope_and_sends_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/json/cluster/status"))
        .and(header("authorization", AUTH))
        .respond_with(envelope(json!([{ "type": "node", "name": "pve1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let data = client
        .get("/cluster/status")
        .await
        .unwrap_or_else(|err| panic!("get: {err}"));

    assert_eq!(data, json!([{ "type": "node", "name": "pve1" }]));
    assert_eq!(client.base_url(), format!("{}/api2/json", server.uri()));
}

#[rstest]
#[case::forbidden(403, "permission check failed", false)]
#[case::missing(500, "storage 'snippets' does not exist", true)]
#[tokio::test]
async fn error_statuses_carry_body_text(
    #[case] status: u16,
    #[case] body: &str,
    #[case] not_found: bool,
) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/json/storage/snippets"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get("/storage/snippets")
        .await
        .expect_err("non-success status");

    assert_eq!(
        err,
        ApiError::Status {
            method: "GET",
            path: String::from("/storage/snippets"),
            status,
            message: body.to_owned(),
        }
    );
    assert_eq!(err.is_not_found(), not_found);
}

#[tokio::test]
async fn malformed_bodies_are_decode_errors() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api2/json/nodes/pve1/storage/local/content/local:iso/a.iso"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .delete("/nodes/pve1/storage/local/content/local:iso/a.iso")
        .await
        .expect_err("not json");

    assert!(matches!(err, ApiError::Decode { .. }), "{err}");
}

#[tokio::test]
async fn post_sends_json_body() {
    let server = MockServer::start().await;
    let body = json!({ "content": "iso", "filename": "a.iso", "url": "https://x/a.iso" });
    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/storage/local/download-url"))
        .and(body_json(&body))
        .respond_with(envelope(json!(UPID)))
        .expect(1)
        .mount(&server)
        .await;

    let data = client_for(&server)
        .post("/nodes/pve1/storage/local/download-url", &body)
        .await
        .unwrap_or_else(|err| panic!("post: {err}"));

    assert_eq!(data, json!(UPID));
}

#[tokio::test]
async fn upload_streams_multipart_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/storage/local/upload"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(envelope(json!(UPID)))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let local = Utf8PathBuf::from_path_buf(tmp.path().join("tiny.iso"))
        .unwrap_or_else(|path| panic!("utf8 path: {}", path.display()));
    std::fs::write(&local, b"ISO-BYTES").unwrap_or_else(|err| panic!("write: {err}"));
    let file = UploadFile {
        path: local,
        file_name: String::from("tiny.iso"),
        size: 9,
    };

    let data = client_for(&server)
        .upload(
            "/nodes/pve1/storage/local/upload",
            &[("content", "iso")],
            &file,
        )
        .await
        .unwrap_or_else(|err| panic!("upload: {err}"));
    assert_eq!(data, json!(UPID));

    let requests = server
        .received_requests()
        .await
        .unwrap_or_else(|| panic!("request recording enabled"));
    let body = String::from_utf8_lossy(&requests[0].body).into_owned();
    assert!(body.contains("name=\"content\""), "{body}");
    assert!(body.contains("name=\"filename\"; filename=\"tiny.iso\""), "{body}");
    assert!(body.contains("ISO-BYTES"), "{body}");
}

#[tokio::test]
async fn fetch_and_wait_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/storage/local/content/local:iso/ubuntu.iso"))
        .respond_with(envelope(json!({
            "path": "/var/lib/vz/template/iso/ubuntu.iso",
            "size": 4096,
            "used": "4096",
            "format": "iso"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api2/json/nodes/pve1/storage/local/content/local:iso/ubuntu.iso"))
        .respond_with(envelope(json!(UPID)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api2/json/nodes/pve1/tasks/{UPID}/status")))
        .respond_with(envelope(json!({ "status": "stopped", "exitstatus": "OK" })))
        .mount(&server)
        .await;

    let storage = Storage::new("pve1", "local", [ContentType::Iso])
        .unwrap_or_else(|err| panic!("storage: {err}"));
    let content = StorageContent::new(storage, Arc::new(client_for(&server)));

    let volume = content
        .fetch("iso", "ubuntu.iso")
        .await
        .unwrap_or_else(|err| panic!("fetch: {err}"));
    assert_eq!(volume.volid, "local:iso/ubuntu.iso");
    assert_eq!(volume.used, 4096);

    let task = content
        .delete(&volume)
        .await
        .unwrap_or_else(|err| panic!("delete: {err}"));
    let status = task
        .wait(Duration::from_millis(10), Duration::from_secs(5))
        .await
        .unwrap_or_else(|err| panic!("wait: {err}"));
    assert!(status.succeeded());
}

#[tokio::test]
async fn transport_failures_name_the_request() {
    let server = MockServer::start().await;
    let config = ProxmoxConfig {
        api_url: String::from("http://127.0.0.1:1/api2/json"),
        request_timeout_secs: 5,
        ..config_for(&server)
    };

    let storage = Storage::new("pve1", "local", [ContentType::Iso])
        .unwrap_or_else(|err| panic!("storage: {err}"));
    let client = HttpApiClient::new(&config).unwrap_or_else(|err| panic!("client: {err}"));
    let err = StorageContent::new(storage, Arc::new(client))
        .iso("ubuntu.iso")
        .await
        .expect_err("server gone");

    let StorageError::Transport(ApiError::Transport { method, path, .. }) = err else {
        panic!("expected transport error, got {err:?}");
    };
    assert_eq!(method, "GET");
    assert_eq!(path, "/nodes/pve1/storage/local/content/local:iso/ubuntu.iso");
}
