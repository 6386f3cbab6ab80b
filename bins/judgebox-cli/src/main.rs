mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "judgebox-cli")]
#[command(about = "Judgebox CLI - Run submissions locally and manage executor configuration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a source file through the executor
    Run {
        /// Language name or alias (e.g., cpp, c++, java, python, py)
        #[arg(short, long)]
        lang: String,

        /// Source file to execute
        #[arg(short, long)]
        file: PathBuf,

        /// File whose contents are fed to the program's stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Executor config file (defaults to config/judgebox.json + environment)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List supported languages, their aliases and toolchain binaries
    Languages {
        /// Executor config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Verify that every configured toolchain binary can be started
    Check {
        /// Executor config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a default executor config file
    Init {
        /// Project path
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing config file
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            lang,
            file,
            input,
            config,
        } => {
            let succeeded =
                commands::run_file(&lang, &file, input.as_deref(), config.as_deref()).await?;
            if !succeeded {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Languages { config, json } => {
            commands::list_languages(config.as_deref(), json)?;
        }
        Commands::Check { config } => {
            commands::check_toolchains(config.as_deref()).await?;
        }
        Commands::Init { path, force } => {
            commands::init_config(&path, force)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
