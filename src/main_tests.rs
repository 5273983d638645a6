//! Unit tests for the `pve-content` CLI binary implementation.

use super::*;
use pve_content::test_support::{EnvGuard, StubApiClient};
use pve_content::{ContentType, TaskStatus};
use rstest::rstest;
use serde_json::json;

const UPID: &str = "UPID:pve1:0001F00D:00ABCDEF:66000000:download:ubuntu.iso:root@pam!ci:";

fn rendered(write: impl FnOnce(&mut Vec<u8>)) -> String {
    let mut buf = Vec::new();
    write(&mut buf);
    String::from_utf8(buf).expect("utf8")
}

fn wait_args(wait: bool) -> WaitArgs {
    WaitArgs {
        wait,
        timeout: 5,
        poll_interval: 1,
    }
}

#[rstest]
#[case::quiet(false, "info")]
#[case::verbose(true, "pve_content=debug,info")]
fn log_filter_follows_verbosity(#[case] verbose: bool, #[case] expected: &str) {
    assert_eq!(default_log_filter(verbose), expected);
}

#[test]
fn parses_subcommands() {
    let cli = Cli::try_parse_from([
        "pve-content",
        "upload",
        "--content",
        "iso",
        "/tmp/ubuntu.iso",
        "--wait",
    ])
    .expect("valid arguments");
    let Command::Upload(args) = cli.command else {
        panic!("expected upload");
    };
    assert_eq!(args.content, "iso");
    assert_eq!(args.file, "/tmp/ubuntu.iso");
    assert!(args.wait.wait);
    assert_eq!(args.wait.timeout, 600);

    let verbose_cli = Cli::try_parse_from([
        "pve-content",
        "-v",
        "scp-upload",
        "--content",
        "snippet",
        "--name",
        "user-data.yaml",
        "./user-data.yaml",
    ])
    .expect("valid arguments");
    assert!(verbose_cli.verbose);
    assert!(matches!(verbose_cli.command, Command::ScpUpload(_)));
}

#[test]
fn write_volume_lists_known_fields() {
    let volume = Volume {
        content: ContentType::Snippet,
        node: String::from("pve1"),
        storage: String::from("snippets"),
        volid: String::from("snippets:snippets/user-data.yaml"),
        path: String::from("/var/lib/vz/snippets/user-data.yaml"),
        size: 14,
        used: 14,
        format: None,
        url: Some(String::from("https://pve:8006/api2/json/nodes/pve1/x")),
    };
    let text = rendered(|buf| write_volume(buf, &volume).expect("write"));
    assert!(text.starts_with("volid: snippets:snippets/user-data.yaml\n"));
    assert!(text.contains("content: snippet\n"));
    assert!(text.contains("path: /var/lib/vz/snippets/user-data.yaml\n"));
    assert!(text.contains("url: https://pve:8006/api2/json/nodes/pve1/x\n"));
    assert!(!text.contains("format:"));
}

#[tokio::test]
async fn report_task_prints_token_without_waiting() {
    let client = Arc::new(StubApiClient::new());
    let upid = Upid::parse(UPID).expect("token");
    let task = TaskHandle::new(upid, "pve1", Arc::clone(&client));
    let mut buf = Vec::new();

    report_task(&mut buf, &task, &wait_args(false))
        .await
        .expect("report");

    assert_eq!(String::from_utf8(buf).expect("utf8"), format!("{UPID}\n"));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn task_status_reads_node_from_token() {
    let client = Arc::new(StubApiClient::new());
    client.respond(
        "GET",
        &format!("/nodes/pve1/tasks/{UPID}/status"),
        json!({ "status": "stopped", "exitstatus": "OK" }),
    );
    let mut buf = Vec::new();

    task_status(
        &mut buf,
        &client,
        TaskStatusCommand {
            upid: String::from(UPID),
            wait: wait_args(false),
        },
    )
    .await
    .expect("status");

    assert_eq!(
        String::from_utf8(buf).expect("utf8"),
        "status: stopped\nexitstatus: OK\n"
    );
}

#[tokio::test]
async fn task_status_rejects_malformed_token() {
    let client = Arc::new(StubApiClient::new());
    let err = task_status(
        &mut Vec::new(),
        &client,
        TaskStatusCommand {
            upid: String::from("not-a-upid"),
            wait: wait_args(false),
        },
    )
    .await
    .expect_err("malformed");
    assert!(matches!(err, CliError::InvalidUpid(_)));
}

#[tokio::test]
async fn dispatch_reports_missing_configuration() {
    let _guard = EnvGuard::set_vars(&[
        ("PVE_CONTENT_CONFIG_PATH", "/nonexistent/pve-content.toml"),
        ("PVE_API_URL", ""),
        ("PVE_TOKEN_ID", ""),
        ("PVE_TOKEN_SECRET", ""),
        ("PVE_NODE", ""),
    ])
    .await;

    let err = dispatch(
        Command::Show(cli::VolumeCommand {
            content: String::from("iso"),
            name: String::from("ubuntu.iso"),
        }),
        &mut Vec::new(),
    )
    .await
    .expect_err("configuration incomplete");

    assert!(matches!(err, CliError::Config(_)), "unexpected error: {err}");
}

#[test]
fn write_status_omits_missing_exit_status() {
    let status = TaskStatus {
        status: String::from("running"),
        exitstatus: None,
    };
    let text = rendered(|buf| write_status(buf, &status).expect("write"));
    assert_eq!(text, "status: running\n");
}

#[test]
fn write_error_writes_cli_error() {
    let mut buf = Vec::new();
    let err = CliError::InvalidUpid(String::from("bogus"));
    write_error(&mut buf, &err);
    let rendered = String::from_utf8(buf).expect("utf8");
    assert!(
        rendered.contains("invalid task identifier 'bogus'"),
        "rendered: {rendered}"
    );
}
