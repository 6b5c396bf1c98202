use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use snapdelta_tools::{
    apply_delta, diff_snapshots, format_delta_pretty, format_snapshot_pretty, inspect_snapshot,
};

#[derive(Parser)]
#[command(
    name = "snapdelta-tools",
    version,
    about = "snapshot and delta inspection tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect a snapshot blob's layout, items and CRC.
    Inspect {
        /// Path to the snapshot bytes.
        snapshot_path: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
    /// Diff two snapshot blobs and report the delta's cost.
    Diff {
        /// Path to the reference snapshot bytes.
        from_path: PathBuf,
        /// Path to the target snapshot bytes.
        to_path: PathBuf,
        /// Static size table entries as `type=size`, repeatable.
        #[arg(long = "static-size", value_parser = parse_static_size)]
        static_sizes: Vec<(i32, usize)>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
    /// Apply a delta blob to a snapshot blob.
    Apply {
        /// Path to the reference snapshot bytes.
        from_path: PathBuf,
        /// Path to the delta bytes.
        delta_path: PathBuf,
        /// Where to write the rebuilt snapshot; inspected on stdout when
        /// omitted.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

fn parse_static_size(raw: &str) -> Result<(i32, usize), String> {
    let Some((item_type, size)) = raw.split_once('=') else {
        return Err(format!("expected type=size, got `{raw}`"));
    };
    let item_type: i32 = item_type
        .parse()
        .map_err(|err| format!("bad type in `{raw}`: {err}"))?;
    let size: usize = size
        .parse()
        .map_err(|err| format!("bad size in `{raw}`: {err}"))?;
    if size % 4 != 0 {
        return Err(format!("size must be a multiple of 4, got {size}"));
    }
    Ok((item_type, size))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Inspect {
            snapshot_path,
            format,
        } => {
            let bytes = fs::read(&snapshot_path)
                .with_context(|| format!("read snapshot {}", snapshot_path.display()))?;
            let report = inspect_snapshot(&bytes)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Pretty => print!("{}", format_snapshot_pretty(&report)),
            }
        }
        Command::Diff {
            from_path,
            to_path,
            static_sizes,
            format,
        } => {
            let from = fs::read(&from_path)
                .with_context(|| format!("read snapshot {}", from_path.display()))?;
            let to = fs::read(&to_path)
                .with_context(|| format!("read snapshot {}", to_path.display()))?;
            let report = diff_snapshots(&from, &to, &static_sizes)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Pretty => print!("{}", format_delta_pretty(&report)),
            }
        }
        Command::Apply {
            from_path,
            delta_path,
            out,
            format,
        } => {
            let from = fs::read(&from_path)
                .with_context(|| format!("read snapshot {}", from_path.display()))?;
            let delta = fs::read(&delta_path)
                .with_context(|| format!("read delta {}", delta_path.display()))?;
            let rebuilt = apply_delta(&from, &delta)?;
            match out {
                Some(out_path) => {
                    fs::write(&out_path, &rebuilt)
                        .with_context(|| format!("write snapshot {}", out_path.display()))?;
                    eprintln!("wrote {} bytes to {}", rebuilt.len(), out_path.display());
                }
                None => {
                    let report = inspect_snapshot(&rebuilt)?;
                    match format {
                        OutputFormat::Json => {
                            println!("{}", serde_json::to_string_pretty(&report)?);
                        }
                        OutputFormat::Pretty => print!("{}", format_snapshot_pretty(&report)),
                    }
                }
            }
        }
    }
    Ok(())
}
