//! Build script rendering `pve-content` man pages into `OUT_DIR`.
//!
//! Produces `pve-content.1` plus one `pve-content-<subcommand>.1` page per
//! subcommand so packagers can install them alongside the binary.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn render(
    command: clap::Command,
    title: &str,
    target: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut page = Vec::new();
    Man::new(command).title(title.to_uppercase()).render(&mut page)?;
    fs::write(target, page)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or("OUT_DIR was not set")?;

    let command = Cli::command();
    let bin = command.get_name().to_owned();
    for sub in command.get_subcommands() {
        let name = format!("{bin}-{}", sub.get_name());
        render(sub.clone(), &name, &out_dir.join(format!("{name}.1")))?;
    }
    render(command, &bin, &out_dir.join(format!("{bin}.1")))?;

    Ok(())
}
