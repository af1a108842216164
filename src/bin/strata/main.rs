// Strata backup system.
// Copyright 2024, 2025 Strata authors.

// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

//! Command-line entry point for Strata backups.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use strata::{backup, restore, trim_to_count, Archive, BackupOptions, Result, VersionSelector};

mod log;
mod show;

#[derive(Debug, Parser)]
#[clap(
    name = "strata",
    about = "An incremental directory backup archiver",
    author,
    version
)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Set the log level to trace.
    #[clap(long, short = 'D', global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the versions stored in an archive.
    Info {
        /// Path of the archive to inspect.
        archive: PathBuf,
    },

    /// Build a new version from a directory and save it.
    Build {
        /// Source directory to back up.
        source: PathBuf,
        /// Archive file to create or append to.
        archive: PathBuf,
        /// Record this identifier in the archive on its first save.
        #[clap(long)]
        id: Option<String>,
        /// Only back up files matching these patterns.
        #[clap(long, short)]
        include: Vec<String>,
        /// Skip files matching these patterns.
        #[clap(long, short)]
        exclude: Vec<String>,
    },

    /// Restore a version into a directory.
    Restore {
        /// Destination directory.
        destination: PathBuf,
        /// Archive file to restore from.
        archive: PathBuf,
        /// Version id to restore; unknown ids fall back to the newest.
        #[clap(long, conflicts_with = "num")]
        ver: Option<String>,
        /// Version number to restore, oldest first.
        #[clap(long)]
        num: Option<usize>,
    },

    /// Drop old versions, keeping only the most recent NUM.
    Trim {
        /// How many versions to keep.
        num: usize,
        /// Archive file to trim.
        archive: PathBuf,
        /// Save the trimmed archive to a separate file, leaving the
        /// original untouched.
        #[clap(long)]
        output: Option<PathBuf>,
    },
}

impl Command {
    fn run(&self) -> Result<()> {
        match self {
            Command::Info { archive } => {
                let archive = Archive::open(archive)?;
                show::show_info(&archive)?;
            }
            Command::Build {
                source,
                archive,
                id,
                include,
                exclude,
            } => {
                let archive = Archive::open(archive)?;
                let options = BackupOptions {
                    id: id.clone(),
                    include: include.clone(),
                    exclude: exclude.clone(),
                };
                let working = backup::build(&archive, source, &options)?;
                backup::save(&archive, source, &working, &options)?;
            }
            Command::Restore {
                destination,
                archive,
                ver,
                num,
            } => {
                let archive = Archive::open(archive)?;
                let selector = if let Some(ver) = ver {
                    VersionSelector::Id(ver.clone())
                } else if let Some(num) = num {
                    VersionSelector::Num(*num)
                } else {
                    VersionSelector::Latest
                };
                restore(&archive, &selector, destination)?;
            }
            Command::Trim {
                num,
                archive,
                output,
            } => {
                let archive = Archive::open(archive)?;
                trim_to_count(&archive, *num, output.as_deref())?;
            }
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(message) = log::init(log::LoggingOptions {
        level: if args.debug {
            tracing::Level::TRACE
        } else {
            tracing::Level::INFO
        },
    }) {
        eprintln!("Failed to initialize log system:");
        eprintln!("{message}");
        return ExitCode::from(4);
    }

    match args.command.run() {
        Err(ref e) => {
            error!("{}", e);
            let mut cause: &dyn Error = e;
            while let Some(c) = cause.source() {
                error!("  caused by: {}", c);
                cause = c;
            }
            ExitCode::FAILURE
        }
        Ok(()) => ExitCode::SUCCESS,
    }
}

#[test]
fn verify_clap() {
    use clap::CommandFactory;
    Args::command().debug_assert()
}
