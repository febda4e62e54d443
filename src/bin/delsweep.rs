//! Command-line front end: load a TOML configuration, run it, write results.
//!
//! ```text
//! delsweep run sweep.toml -o out.tsv
//! delsweep run sweep.toml --format json --stats
//! delsweep convergence sweep.toml --log2-h-min -8 --log2-h-max -4 --samples 5
//! delsweep init > sweep.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use delsweep::convergence::convergence_study;
use delsweep::export::{to_json, to_tsv};
use delsweep::stats::ComparisonStatistics;
use delsweep::{run_batch, BatchResult, SimulationConfig};

#[derive(Parser, Debug)]
#[command(name = "delsweep")]
#[command(about = "Delayed and classical convex sweeping simulator")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run both processes to the final time
    Run {
        /// TOML configuration file
        config: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "tsv")]
        format: Format,

        /// Include per-step statistics; requires `--format json`
        #[arg(long)]
        stats: bool,
    },
    /// Refine the step size and report terminal errors
    Convergence {
        config: PathBuf,

        #[arg(long, default_value = "-8", allow_hyphen_values = true)]
        log2_h_min: f64,

        #[arg(long, default_value = "-4", allow_hyphen_values = true)]
        log2_h_max: f64,

        #[arg(long, default_value = "5")]
        samples: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the default configuration
    Init,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Tsv,
    Json,
}

#[derive(Serialize)]
struct RunReport<'a> {
    #[serde(flatten)]
    result: &'a BatchResult,
    statistics: ComparisonStatistics,
}

/// `--stats` only has a home in the JSON report.
fn check_run_flags(format: Format, stats: bool) -> anyhow::Result<()> {
    if stats && matches!(format, Format::Tsv) {
        anyhow::bail!("--stats requires --format json");
    }
    Ok(())
}

fn render(result: &BatchResult, format: Format, stats: bool) -> anyhow::Result<String> {
    check_run_flags(format, stats)?;
    Ok(match (format, stats) {
        (Format::Tsv, _) => to_tsv(result),
        (Format::Json, false) => to_json(result)?,
        (Format::Json, true) => serde_json::to_string_pretty(&RunReport {
            statistics: ComparisonStatistics::from_batch(result)?,
            result,
        })?,
    })
}

fn emit(output: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "results written");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn load(path: &Path) -> anyhow::Result<SimulationConfig> {
    SimulationConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Run {
            config,
            output,
            format,
            stats,
        } => {
            check_run_flags(format, stats)?;
            let cfg = load(&config)?;
            let result = run_batch(&cfg)?;
            emit(output.as_deref(), &render(&result, format, stats)?)?;
        }
        Command::Convergence {
            config,
            log2_h_min,
            log2_h_max,
            samples,
            output,
        } => {
            let cfg = load(&config)?;
            let study = convergence_study(&cfg, log2_h_min, log2_h_max, samples)?;
            if let Some(order) = study.observed_order() {
                info!(order, "observed delayed order");
            }
            if let Some(order) = study.classical_observed_order() {
                info!(order, "observed classical order");
            }
            emit(output.as_deref(), &serde_json::to_string_pretty(&study)?)?;
        }
        Command::Init => {
            print!("{}", SimulationConfig::default().to_toml_string()?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_flags(argv: &[&str]) -> (Format, bool) {
        match Args::try_parse_from(argv.iter().copied()).unwrap().command {
            Command::Run { format, stats, .. } => (format, stats),
            other => panic!("expected run, got {other:?}"),
        }
    }

    fn small_result() -> BatchResult {
        let mut cfg = SimulationConfig::default();
        cfg.simulation.t_final = 0.1;
        cfg.simulation.h = 0.05;
        run_batch(&cfg).unwrap()
    }

    #[test]
    fn stats_with_tsv_is_rejected() {
        let (format, stats) = run_flags(&["delsweep", "run", "sweep.toml", "--stats"]);
        let err = check_run_flags(format, stats).unwrap_err();
        assert!(err.to_string().contains("--format json"), "{err}");
        assert!(render(&small_result(), format, stats).is_err());
    }

    #[test]
    fn stats_with_json_adds_statistics() {
        let (format, stats) =
            run_flags(&["delsweep", "run", "sweep.toml", "--format", "json", "--stats"]);
        check_run_flags(format, stats).unwrap();
        let text = render(&small_result(), format, stats).unwrap();
        let report: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(report.get("statistics").is_some());
        assert!(report.get("delayed").is_some());
    }

    #[test]
    fn plain_tsv_still_renders() {
        let (format, stats) = run_flags(&["delsweep", "run", "sweep.toml"]);
        let text = render(&small_result(), format, stats).unwrap();
        assert!(text.starts_with("time\t"));
    }
}
