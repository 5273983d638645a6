//! Command-line interface definitions for the `pve-content` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `pve-content` binary.
#[derive(Debug, Parser)]
#[command(
    name = "pve-content",
    about = "Manage ISO images, container templates, backups and snippets on a Proxmox VE storage pool",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Log request details; `RUST_LOG` takes precedence when set.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Storage content operations.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Upload a local file through the API.
    #[command(name = "upload", about = "Upload a local file through the API")]
    Upload(UploadCommand),
    /// Ask the node to download a URL into the pool.
    #[command(name = "download-url", about = "Ask the node to download a URL into the pool")]
    DownloadUrl(DownloadUrlCommand),
    /// Print the metadata of a stored volume.
    #[command(name = "show", about = "Print the metadata of a stored volume")]
    Show(VolumeCommand),
    /// Delete a stored volume.
    #[command(name = "delete", about = "Delete a stored volume")]
    Delete(DeleteCommand),
    /// Copy a local file onto the node over SSH.
    #[command(name = "scp-upload", about = "Copy a local file onto the node over SSH")]
    ScpUpload(ScpUploadCommand),
    /// Query or wait for a server-side task.
    #[command(name = "task-status", about = "Query or wait for a server-side task")]
    TaskStatus(TaskStatusCommand),
}

/// Options controlling whether and how long to wait for a task.
#[derive(Debug, Args)]
pub(crate) struct WaitArgs {
    /// Block until the server-side task stops.
    #[arg(long)]
    pub(crate) wait: bool,
    /// Give up waiting after this many seconds.
    #[arg(long, value_name = "SECS", default_value_t = 600)]
    pub(crate) timeout: u64,
    /// Seconds between status polls while waiting.
    #[arg(long, value_name = "SECS", default_value_t = 2)]
    pub(crate) poll_interval: u64,
}

/// Arguments for `pve-content upload`.
#[derive(Debug, Args)]
pub(crate) struct UploadCommand {
    /// Content category: iso, vztmpl or snippet.
    #[arg(long, value_name = "TYPE")]
    pub(crate) content: String,
    /// Local file to upload.
    #[arg(value_name = "PATH")]
    pub(crate) file: String,
    #[command(flatten)]
    pub(crate) wait: WaitArgs,
}

/// Arguments for `pve-content download-url`.
#[derive(Debug, Args)]
pub(crate) struct DownloadUrlCommand {
    /// Content category: iso, vztmpl or snippet.
    #[arg(long, value_name = "TYPE")]
    pub(crate) content: String,
    /// File name to store the download under.
    #[arg(long, value_name = "NAME")]
    pub(crate) filename: String,
    /// Source URL fetched by the node.
    #[arg(value_name = "URL")]
    pub(crate) url: String,
    #[command(flatten)]
    pub(crate) wait: WaitArgs,
}

/// Arguments naming a stored volume.
#[derive(Debug, Args)]
pub(crate) struct VolumeCommand {
    /// Content category: iso, vztmpl, snippet or backup.
    #[arg(long, value_name = "TYPE")]
    pub(crate) content: String,
    /// Volume name within its category, for example `ubuntu.iso`.
    #[arg(value_name = "NAME")]
    pub(crate) name: String,
}

/// Arguments for `pve-content delete`.
#[derive(Debug, Args)]
pub(crate) struct DeleteCommand {
    #[command(flatten)]
    pub(crate) volume: VolumeCommand,
    #[command(flatten)]
    pub(crate) wait: WaitArgs,
}

/// Arguments for `pve-content scp-upload`.
#[derive(Debug, Args)]
pub(crate) struct ScpUploadCommand {
    /// Content category: iso, vztmpl or snippet.
    #[arg(long, value_name = "TYPE")]
    pub(crate) content: String,
    /// Volume name whose server-side path receives the file.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: String,
    /// Local file to copy.
    #[arg(value_name = "PATH")]
    pub(crate) file: String,
}

/// Arguments for `pve-content task-status`.
#[derive(Debug, Args)]
pub(crate) struct TaskStatusCommand {
    /// Task identifier (`UPID:...`) printed by a previous command.
    #[arg(value_name = "UPID")]
    pub(crate) upid: String,
    #[command(flatten)]
    pub(crate) wait: WaitArgs,
}
