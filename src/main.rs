//! Binary entry point for the `pve-content` CLI.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use pve_content::{
    ApiClient, ConfigError, HttpApiClient, OpenSshConnector, ProcessCommandRunner, ProxmoxConfig,
    ScpConfig, SecureCopy, StorageContent, StorageError, TaskHandle, Upid, Volume,
};

mod cli;

use cli::{Cli, Command, TaskStatusCommand, WaitArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("secure copy configuration error: {0}")]
    ScpConfig(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid task identifier '{0}': expected UPID:<node>:...")]
    InvalidUpid(String),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match dispatch(cli.command, &mut io::stdout()).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "pve_content=debug,info"
    } else {
        "info"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(verbose)));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
    {
        writeln!(io::stderr(), "failed to install logger: {err}").ok();
    }
}

fn storage_content(config: &ProxmoxConfig) -> Result<StorageContent<HttpApiClient>, CliError> {
    let storage = config.storage()?;
    let client = HttpApiClient::new(config)?;
    Ok(StorageContent::new(storage, Arc::new(client)))
}

async fn dispatch(command: Command, out: &mut impl Write) -> Result<(), CliError> {
    let config = ProxmoxConfig::load_without_cli_args()?;
    let content = storage_content(&config)?;

    match command {
        Command::Upload(args) => {
            let file = Utf8PathBuf::from(args.file);
            let task = content.upload(&args.content, &file).await?;
            report_task(out, &task, &args.wait).await
        }
        Command::DownloadUrl(args) => {
            let task = content
                .download_url(&args.content, &args.filename, &args.url)
                .await?;
            report_task(out, &task, &args.wait).await
        }
        Command::Show(args) => {
            let volume = content.fetch(&args.content, &args.name).await?;
            write_volume(out, &volume)?;
            Ok(())
        }
        Command::Delete(args) => {
            let volume = content
                .fetch(&args.volume.content, &args.volume.name)
                .await?;
            let task = content.delete(&volume).await?;
            report_task(out, &task, &args.wait).await
        }
        Command::ScpUpload(args) => {
            let scp_config = ScpConfig::load_without_cli_args()
                .map_err(|err| CliError::ScpConfig(err.to_string()))?;
            let credentials = scp_config.credentials().map_err(StorageError::from)?;
            let connector = OpenSshConnector::new(scp_config, ProcessCommandRunner)
                .map_err(StorageError::from)?;
            let copier = SecureCopy::new(connector, credentials);
            let file = Utf8PathBuf::from(args.file);
            content
                .scp_upload(&args.name, &args.content, &file, &copier)
                .await?;
            writeln!(out, "copied {file} to {}", content.storage().node())?;
            Ok(())
        }
        Command::TaskStatus(args) => task_status(out, content.client(), args).await,
    }
}

async fn task_status<C: ApiClient>(
    out: &mut impl Write,
    client: &Arc<C>,
    args: TaskStatusCommand,
) -> Result<(), CliError> {
    let upid = Upid::parse(&args.upid).ok_or_else(|| CliError::InvalidUpid(args.upid.clone()))?;
    let node = upid
        .node()
        .ok_or_else(|| CliError::InvalidUpid(args.upid.clone()))?
        .to_owned();
    let task = TaskHandle::new(upid, node, Arc::clone(client));
    if args.wait.wait {
        return report_task(out, &task, &args.wait).await;
    }
    let status = task.status().await?;
    write_status(out, &status)?;
    Ok(())
}

async fn report_task<C: ApiClient>(
    out: &mut impl Write,
    task: &TaskHandle<C>,
    wait: &WaitArgs,
) -> Result<(), CliError> {
    writeln!(out, "{}", task.upid())?;
    if !wait.wait {
        return Ok(());
    }
    let status = task
        .wait(
            Duration::from_secs(wait.poll_interval.max(1)),
            Duration::from_secs(wait.timeout),
        )
        .await?;
    write_status(out, &status)?;
    Ok(())
}

fn write_status(out: &mut impl Write, status: &pve_content::TaskStatus) -> io::Result<()> {
    writeln!(out, "status: {}", status.status)?;
    if let Some(exit) = &status.exitstatus {
        writeln!(out, "exitstatus: {exit}")?;
    }
    Ok(())
}

fn write_volume(out: &mut impl Write, volume: &Volume) -> io::Result<()> {
    writeln!(out, "volid: {}", volume.volid)?;
    writeln!(out, "content: {}", volume.content)?;
    writeln!(out, "node: {}", volume.node)?;
    writeln!(out, "storage: {}", volume.storage)?;
    if !volume.path.is_empty() {
        writeln!(out, "path: {}", volume.path)?;
    }
    writeln!(out, "size: {}", volume.size)?;
    writeln!(out, "used: {}", volume.used)?;
    if let Some(format) = &volume.format {
        writeln!(out, "format: {format}")?;
    }
    if let Some(url) = &volume.url {
        writeln!(out, "url: {url}")?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
