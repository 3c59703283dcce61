//! Command-line interface module for make-cbz.
//!
//! This module handles argument parsing, configuration loading, and
//! orchestration of a packaging run or a dry run, including all user-facing
//! reporting.

use crate::archive_builder::{ArchiveBuilder, PackError, PackOutcome, PackResult};
use crate::config::PackConfig;
use crate::output::OutputFormatter;
use clap::Parser;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

/// Exit status for malformed command lines.
pub const USAGE_EXIT_CODE: i32 = 64;

/// Package the images of a directory into a comic book archive.
#[derive(Debug, Parser)]
#[command(name = "make-cbz", version, about)]
pub struct Cli {
    /// Directory whose images are packaged
    pub directory: PathBuf,

    /// Show what would be packaged without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Configuration file (defaults to .makecbzrc.toml, then ~/.config/make-cbz/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn command(&self) -> PackCommand {
        if self.dry_run {
            PackCommand::DryRun
        } else {
            PackCommand::Pack
        }
    }
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackCommand {
    /// Package the directory.
    Pack,
    /// Classify and report, without writing.
    DryRun,
}

/// Runs the command described by parsed arguments.
pub fn run_cli(cli: &Cli) -> PackResult<()> {
    run_cli_with_config(
        cli.command(),
        &cli.directory,
        cli.config.as_deref(),
        cli.json,
    )
}

/// Runs a command against `dir_path` with an optional configuration file.
///
/// # Examples
///
/// ```no_run
/// use make_cbz::cli::{PackCommand, run_cli_with_config};
/// use std::path::Path;
///
/// match run_cli_with_config(PackCommand::Pack, Path::new("/comics/vol1"), None, false) {
///     Ok(()) => println!("done"),
///     Err(e) => std::process::exit(e.exit_code()),
/// }
/// ```
pub fn run_cli_with_config(
    command: PackCommand,
    dir_path: &Path,
    config_path: Option<&Path>,
    json: bool,
) -> PackResult<()> {
    let config = PackConfig::load(config_path)?.compile()?;
    let builder = ArchiveBuilder::new(config);

    match command {
        PackCommand::Pack => pack_directory(&builder, dir_path, json),
        PackCommand::DryRun => dry_run(&builder, dir_path, json),
    }
}

fn pack_directory(builder: &ArchiveBuilder, dir_path: &Path, json: bool) -> PackResult<()> {
    if !json {
        OutputFormatter::info(&format!("Packaging contents of: {}", dir_path.display()));
    }

    let plan = builder.plan(dir_path)?;

    let outcome = if json || plan.already_packaged {
        builder.execute(&plan, None)?
    } else {
        let pb = OutputFormatter::create_progress_bar(plan.images.len() as u64);
        let result = builder.execute(&plan, Some(&pb));
        pb.finish_and_clear();
        result?
    };

    if json {
        return print_json(&outcome, dir_path);
    }

    match outcome {
        PackOutcome::AlreadyPackaged { archive } => {
            OutputFormatter::success(&format!("Already packaged: {}", archive.display()));
        }
        PackOutcome::Packaged(report) => {
            for path in &report.unencodable {
                OutputFormatter::warning(&format!(
                    "Left in place, name is not UTF-8: {}",
                    path.display()
                ));
            }
            for (path, reason) in &report.failed_removals {
                OutputFormatter::warning(&format!(
                    "Archived but could not delete {}: {}",
                    path.display(),
                    reason
                ));
            }
            if report.relocated {
                OutputFormatter::success(&format!(
                    "Archive moved next to remaining files: {}",
                    report.archive.display()
                ));
            } else {
                OutputFormatter::success(&format!(
                    "Archive written to {}",
                    report.archive.display()
                ));
            }
            OutputFormatter::summary_table(&report);
        }
    }

    Ok(())
}

fn dry_run(builder: &ArchiveBuilder, dir_path: &Path, json: bool) -> PackResult<()> {
    let plan = builder.plan(dir_path)?;

    if json {
        return print_json(&plan, dir_path);
    }

    if plan.already_packaged {
        OutputFormatter::dry_run_notice(&format!(
            "Already packaged: {}. Nothing to do.",
            plan.inner_archive_path.display()
        ));
        return Ok(());
    }

    OutputFormatter::plan_listing(&plan);
    OutputFormatter::success("Dry run complete. No files were modified.");
    Ok(())
}

fn print_json<T: Serialize>(value: &T, dir_path: &Path) -> PackResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| PackError::Io {
        path: dir_path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    println!("{}", text);
    Ok(())
}
