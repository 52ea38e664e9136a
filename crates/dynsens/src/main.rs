use clap::{Parser, Subcommand, ValueEnum};
use dynsens::commands::{
    DiffuseOptions, SobolOptions, init_config, run_diffuse, run_sobol,
};
use dynsens::init_logging;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dynsens")]
#[command(about = "Diffusion stepping and Sobol sensitivity analysis of growth models")]
struct Args {
    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Step a 1-D diffusion problem and report stability and conservation
    Diffuse {
        /// Study file (YAML); built-in defaults when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the concentration grid as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Run a Sobol sensitivity analysis of a growth model
    Sobol {
        /// Study file (YAML); the logistic scenario when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the number of base samples
        #[arg(short = 'n', long)]
        samples: Option<usize>,

        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the worker thread count
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Write a default study file to edit
    InitConfig {
        #[arg(value_enum)]
        kind: StudyKind,

        path: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StudyKind {
    Diffuse,
    Sobol,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let _guard = init_logging(&args.log_level, args.log_file.as_deref())?;

    match args.command {
        Command::Diffuse {
            config,
            output,
            csv,
        } => {
            run_diffuse(&DiffuseOptions {
                config,
                output,
                csv,
            })?;
        }
        Command::Sobol {
            config,
            output,
            samples,
            seed,
            workers,
        } => {
            run_sobol(&SobolOptions {
                config,
                output,
                samples,
                seed,
                workers,
            })?;
        }
        Command::InitConfig { kind, path } => {
            let kind = match kind {
                StudyKind::Diffuse => "diffuse",
                StudyKind::Sobol => "sobol",
            };
            init_config(kind, &path)?;
        }
    }

    tracing::debug!("dynsens finished");
    Ok(())
}
