use std::path::PathBuf;

use anyhow::{Context, Result};
use apiset_cli::input::RootSpec;
use apiset_cli::pipeline::{merge_roots, read_roots, write_superset, Merged};
use apiset_config::ApisetConfig;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "apiset",
    version,
    about = "Merge per-version class files into one version-annotated API superset"
)]
struct Cli {
    /// Config file (defaults to `$APISET_CONFIG`, then `./apiset.toml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge all roots and write the superset as class files
    Generate(GenerateArgs),
    /// Merge all roots and print merge statistics
    Stats(StatsArgs),
    /// Merge all roots and print a listing of the merged classes
    Dump(DumpArgs),
}

#[derive(Args)]
struct RootArgs {
    /// Version root as `<version>=<class dir or jar>`; repeat in version order
    #[arg(long = "root", value_name = "VERSION=PATH", required = true)]
    roots: Vec<RootSpec>,
}

#[derive(Args)]
struct GenerateArgs {
    #[command(flatten)]
    roots: RootArgs,
    /// Output directory for the superset class files
    #[arg(long)]
    out: PathBuf,
    /// Emit the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct StatsArgs {
    #[command(flatten)]
    roots: RootArgs,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DumpArgs {
    #[command(flatten)]
    roots: RootArgs,
    /// Only list classes whose internal name starts with this prefix
    #[arg(long)]
    filter: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn load_config(explicit: Option<&PathBuf>) -> Result<ApisetConfig> {
    let cwd = std::env::current_dir().context("failed to determine the working directory")?;
    let (config, path) = apiset_config::load(explicit.map(PathBuf::as_path), &cwd)?;
    apiset_config::init_tracing(&config.logging);
    if let Some(path) = path {
        tracing::debug!(target: "apiset.cli", path = %path.display(), "loaded config");
    }
    Ok(config)
}

/// Reads and merges the roots. Returns `None` after reporting when too many classes failed to
/// decode.
fn merge(roots: &RootArgs, config: &ApisetConfig) -> Result<Option<Merged>> {
    let snapshots = read_roots(&roots.roots)?;
    let merged = merge_roots(snapshots, config);
    if config.run.decode_failures_exceeded(merged.decode_failures) {
        eprintln!(
            "error: {} class files failed to decode (limit {})",
            merged.decode_failures, config.run.max_decode_failures
        );
        return Ok(None);
    }
    Ok(Some(merged))
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Command::Generate(args) => {
            let Some(merged) = merge(&args.roots, &config)? else {
                return Ok(1);
            };
            std::fs::create_dir_all(&args.out)
                .with_context(|| format!("failed to create {}", args.out.display()))?;
            let written = write_superset(&merged.superset, &args.out, &config.output.encode_options())?;
            let summary = merged.summary();
            if args.json {
                print_json(&summary)?;
            } else {
                print!("{summary}");
                println!("wrote {written} classes to {}", args.out.display());
            }
            Ok(0)
        }
        Command::Stats(args) => {
            let Some(merged) = merge(&args.roots, &config)? else {
                return Ok(1);
            };
            let summary = merged.summary();
            if args.json {
                print_json(&summary)?;
            } else {
                print!("{summary}");
            }
            Ok(0)
        }
        Command::Dump(args) => {
            let Some(merged) = merge(&args.roots, &config)? else {
                return Ok(1);
            };
            let prefix = args.filter.as_deref().unwrap_or_default();
            for class in merged
                .superset
                .classes()
                .filter(|class| class.name.starts_with(prefix))
            {
                println!("{class}");
            }
            Ok(0)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}
