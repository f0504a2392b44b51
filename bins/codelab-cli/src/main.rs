mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use codelab_common::config::ExecutorBackend;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codelab-cli")]
#[command(about = "Codelab sandbox - detect, run and validate code snippets", long_about = None)]
struct Cli {
    /// Executor backend: judge0 or docker (overrides SANDBOX_BACKEND)
    #[arg(long, global = true)]
    backend: Option<ExecutorBackend>,

    /// Language registry file (defaults to the built-in table)
    #[arg(long, global = true)]
    languages: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true, default_value = "false")]
    json: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value = "false")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the language of a source file
    Detect {
        /// Source file
        file: PathBuf,
    },

    /// Execute a source file
    Run {
        /// Source file
        file: PathBuf,

        /// Language name or alias (detected when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Text passed on stdin
        #[arg(short, long, conflicts_with = "input_file")]
        input: Option<String>,

        /// File passed on stdin
        #[arg(long)]
        input_file: Option<PathBuf>,

        /// Time limit in seconds
        #[arg(short, long, value_parser = parse_seconds)]
        time_limit: Option<f64>,

        /// Memory limit in MB
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        memory_limit: Option<u32>,
    },

    /// Validate a source file against an exercise's test cases
    Validate {
        /// Source file
        file: PathBuf,

        /// Exercise definition (JSON)
        #[arg(short, long)]
        exercise: PathBuf,

        /// Test cases run at once
        #[arg(long, default_value = "1")]
        concurrency: usize,
    },

    /// List configured languages
    Languages,
}

fn parse_seconds(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(format!("'{}' must be a positive number of seconds", s))
    }
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let ctx = commands::Context::load(cli.backend, cli.languages.as_deref(), cli.json)?;

    match cli.command {
        Commands::Detect { file } => {
            commands::detect(&ctx, &file)?;
        }
        Commands::Run {
            file,
            language,
            input,
            input_file,
            time_limit,
            memory_limit,
        } => {
            commands::run(
                &ctx,
                &file,
                language,
                input,
                input_file.as_deref(),
                time_limit,
                memory_limit,
            )
            .await?;
        }
        Commands::Validate {
            file,
            exercise,
            concurrency,
        } => {
            let all_passed = commands::validate(&ctx, &file, &exercise, concurrency).await?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        Commands::Languages => {
            commands::languages(&ctx)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["codelab-cli", "run", "main.py", "--backend", "docker", "--json"]).unwrap();
        assert_eq!(cli.backend, Some(ExecutorBackend::Docker));
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Run { language: None, .. }));
    }

    #[test]
    fn test_input_sources_conflict() {
        let parsed = Cli::try_parse_from([
            "codelab-cli",
            "run",
            "main.py",
            "--input",
            "1",
            "--input-file",
            "in.txt",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_limits_must_be_positive_and_finite() {
        for bad in ["inf", "NaN", "0", "-2"] {
            let parsed = Cli::try_parse_from(["codelab-cli", "run", "main.py", "--time-limit", bad]);
            assert!(parsed.is_err(), "{}", bad);
        }
        assert!(Cli::try_parse_from(["codelab-cli", "run", "main.py", "--memory-limit", "0"]).is_err());

        let cli = Cli::try_parse_from(["codelab-cli", "run", "main.py", "--time-limit", "1.5"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { time_limit: Some(t), .. } if t == 1.5));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["codelab-cli", "languages", "--backend", "lambda"]).is_err());
    }
}
