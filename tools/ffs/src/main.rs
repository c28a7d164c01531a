use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use ffs::{DiskFilesystem, Filesystem};

#[derive(Parser, Debug)]
#[command(name = "ffs")]
#[command(about = "Small filesystem utilities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the full path of a program found on PATH
    Which { program: PathBuf },

    /// Create a directory
    Mkdir {
        path: PathBuf,

        /// Create missing parents; succeed if it already exists
        #[arg(short, long)]
        parents: bool,
    },

    /// Create an empty file if it does not exist
    Touch { path: PathBuf },

    /// List the direct children of a directory
    Ls {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show size, permissions and modification time
    Stat { path: PathBuf },

    /// Print the first lines of a file
    Head {
        path: PathBuf,

        #[arg(short = 'n', long, default_value_t = 10)]
        lines: usize,
    },

    /// Print the last N components of a path
    Basen {
        path: String,

        #[arg(short = 'n', long, default_value_t = 1)]
        num: usize,
    },

    /// List files modified before a point in time
    Lsmtime {
        path: PathBuf,

        /// RFC 3339 timestamp, e.g. 2024-01-01T00:00:00Z
        #[arg(long)]
        before: DateTime<Utc>,
    },

    /// Print a file's size in hex
    Hsize { path: PathBuf },

    /// Create a temporary file and print its path
    Tempfile,
}

fn run(command: Commands) -> Result<ExitCode> {
    let fs = DiskFilesystem::new().context("Failed to get current directory")?;

    match command {
        Commands::Which { program } => match ffs::which(&program) {
            Some(found) => println!("{}", found.display()),
            None => {
                log::info!("{} not found on PATH", program.display());
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Mkdir { path, parents } => {
            let created = if parents {
                fs.make_directory_recursive(&path)
            } else {
                fs.make_directory(&path)
            };
            created.with_context(|| format!("Failed to create {}", path.display()))?;
        }
        Commands::Touch { path } => {
            fs.touch(&path)
                .with_context(|| format!("Failed to touch {}", path.display()))?;
        }
        Commands::Ls { path } => {
            let children = fs
                .list(&path)
                .with_context(|| format!("Failed to list {}", path.display()))?;
            for child in children {
                let name = child.file_name().map(PathBuf::from).unwrap_or(child);
                println!("{}", name.display());
            }
        }
        Commands::Stat { path } => {
            let stat = fs
                .stat(&path)
                .with_context(|| format!("Failed to stat {}", path.display()))?;
            let modified: DateTime<Utc> = stat.modified.into();
            println!("  Path: {}", stat.path.display());
            println!("  Size: {}", stat.size);
            println!("  Mode: {:o}", stat.mode);
            println!("  Type: {}", if stat.is_directory { "directory" } else { "file" });
            println!("  Modified: {}", modified.to_rfc3339());
        }
        Commands::Head { path, lines } => {
            let text = ffs::nix::head(fs.absolute_path(&path), lines)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            print!("{text}");
        }
        Commands::Basen { path, num } => println!("{}", ffs::basen(&path, num)),
        Commands::Lsmtime { path, before } => {
            let files = ffs::lsmtime(fs.absolute_path(&path), before)
                .with_context(|| format!("Failed to walk {}", path.display()))?;
            for file in files {
                println!("{}", file.display());
            }
        }
        Commands::Hsize { path } => match ffs::hsize(fs.absolute_path(&path)) {
            Some(size) => println!("{size}"),
            None => anyhow::bail!("Cannot stat {}", path.display()),
        },
        Commands::Tempfile => {
            let path = fs
                .create_temporary_file()
                .context("Failed to create temporary file")?;
            println!("{}", path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "info" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .target(env_logger::Target::Stderr)
        .init();

    run(cli.command)
}
