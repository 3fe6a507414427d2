//! CLI entrypoint for the heap script driver.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use heapscript_harness::{RunConfig, config::SeedSource, run_generate, run_parse, run_validate};

/// Builds and checks heap allocator test scripts.
#[derive(Debug, Parser)]
#[command(name = "harness")]
#[command(about = "Build heap allocator test scripts from traces or directive patterns")]
struct Cli {
    /// RNG seed (decimal or 0x...). Falls back to HEAPSCRIPT_SEED, then a random draw.
    #[arg(long, global = true)]
    seed: Option<String>,
    /// Structured JSONL log path. Falls back to HEAPSCRIPT_LOG.
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Translate an ltrace capture into a script.
    Parse {
        /// Raw trace file.
        #[arg(long)]
        trace: PathBuf,
        /// Script output path.
        #[arg(long)]
        output: PathBuf,
    },
    /// Generate a script from directives.
    ///
    /// Options go before the directive list, since every later argument is
    /// taken as a directive: `generate --seed 5 --output s.txt -alloc(64,512) 1000 -free -leak`.
    Generate {
        /// Script output path.
        #[arg(long)]
        output: PathBuf,
        /// Directive list; must come after all options.
        #[arg(
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        directives: Vec<String>,
    },
    /// Check an existing script for lifecycle consistency.
    Validate {
        /// Script to check.
        #[arg(long)]
        script: PathBuf,
    },
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", failure_message(err.as_ref()));
            ExitCode::FAILURE
        }
    }
}

fn failure_message(err: &dyn Error) -> String {
    format!("error: {err}")
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = RunConfig::resolve(cli.seed.as_deref(), cli.log)?;
    if config.seed_source == SeedSource::Drawn {
        eprintln!("Using random seed {} (replay with --seed)", config.seed);
    }
    if let Some(path) = &config.log_path {
        eprintln!("Logging to {}", path.display());
    }

    match cli.command {
        Command::Parse { trace, output } => {
            eprintln!("Translating {} into {}", trace.display(), output.display());
            let report = run_parse(&trace, &output, &config)?;
            let stats = &report.translate;
            eprintln!(
                "Read {} lines: {} calls, {} stale frees, {} dropped, {} oversized, {} synthesized allocs, {} trailing frees",
                stats.lines_read,
                stats.calls_decoded,
                stats.stale_frees,
                stats.calls_dropped,
                stats.oversized_calls,
                stats.synthesized_allocs,
                stats.trailing_frees
            );
            eprintln!(
                "Wrote {} lines (sha256 {})",
                report.summary.lines, report.sha256
            );
            println!("Trace successfully parsed!");
        }
        Command::Generate { output, directives } => {
            eprintln!("Generating {}", output.display());
            let report = run_generate(&directives, &output, &config)?;
            let stats = &report.generate;
            eprintln!(
                "Emitted {} allocs, {} reallocs, {} frees, {} cleanup frees{}",
                stats.allocs,
                stats.reallocs,
                stats.frees,
                stats.cleanup_frees,
                if stats.leaked {
                    format!(", leaking {} ids", stats.live_at_end)
                } else {
                    String::new()
                }
            );
            if stats.short_directives > 0 {
                eprintln!(
                    "{} free directive(s) ran out of ids before their count",
                    stats.short_directives
                );
            }
            eprintln!(
                "Wrote {} lines (sha256 {})",
                report.summary.lines, report.sha256
            );
            println!("Script successfully generated!");
        }
        Command::Validate { script } => {
            eprintln!("Validating {}", script.display());
            let summary = run_validate(&script, &config)?;
            println!(
                "Script is consistent: {} lines, {} ids, {} live at end",
                summary.lines, summary.distinct_ids, summary.live_at_end
            );
        }
    }

    Ok(())
}
