//! Lattice CLI - inspect quantization pattern tables, verify compiled graphs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lattice_cli::{TableFormat, table, verify};
use lattice_compiler::{LazyConfig, parse_op_list};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lattice")]
#[command(about = "Graph capture, backend extraction and quantization pattern tables", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved native backend pattern table
    Config {
        /// Only show patterns whose text contains this substring
        #[arg(long, value_name = "SUBSTR")]
        filter: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: TableFormat,
    },
    /// Compile the built-in modules and compare them against eager execution
    Verify {
        /// Operators to force onto the fallback path (comma-separated,
        /// e.g. "aten::sub,operator.mul"); defaults to LATTICE_FORCE_FALLBACK
        #[arg(long, value_name = "OPS")]
        force_fallback: Option<String>,

        /// Random samples per module
        #[arg(long, default_value = "10")]
        cases: usize,

        /// Seed for the sample generator
        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Config { filter, format } => {
            cmd_config(filter.as_deref(), format)?;
        }
        Commands::Verify {
            force_fallback,
            cases,
            seed,
        } => {
            cmd_verify(force_fallback.as_deref(), cases, seed)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print the native pattern table.
fn cmd_config(filter: Option<&str>, format: TableFormat) -> Result<()> {
    let config_table =
        lattice_quant::native_backend_config().context("Failed to resolve native backend config")?;
    if let Some(filter) = filter
        && table::select(&config_table, Some(filter)).is_empty()
    {
        anyhow::bail!("No patterns found matching filter '{filter}'");
    }

    println!("{}", table::render(&config_table, filter, format)?);
    Ok(())
}

/// Verify the demo modules and report per-module status.
fn cmd_verify(force_fallback: Option<&str>, cases: usize, seed: u64) -> Result<()> {
    let config = match force_fallback {
        Some(ops) => LazyConfig::new().with_force_fallback(parse_op_list(ops)),
        None => LazyConfig::from_env(),
    };
    let forced = config.get_force_fallback();
    if !forced.is_empty() {
        eprintln!(
            "Forcing fallback for: {}",
            forced.into_iter().collect::<Vec<_>>().join(", ")
        );
    }

    let reports = verify::run(&config, cases, seed);
    for report in &reports {
        println!("{report}");
    }

    let failed = reports.iter().filter(|r| r.is_failure()).count();
    if failed > 0 {
        anyhow::bail!("{failed}/{} modules failed verification", reports.len());
    }
    Ok(())
}
