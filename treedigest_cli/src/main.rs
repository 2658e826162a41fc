use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::io::IsTerminal;
use std::path::PathBuf;

use treedigest_cli::config::{AppConfig, ConfigManager, DigestOverrides};
use treedigest_cli::output::{DigestFormatter, OutputFormat, format_bytes};
use treedigest_cli::walker::{WalkSummary, Walker};
use treedigest_core::DigestRegistry;

#[derive(Parser)]
#[command(name = "treedigest")]
#[command(author, version, about = "Parallel multi-digest file hasher", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Digest a file or every regular file in a directory tree
    Digest {
        /// File or directory to digest
        path: PathBuf,

        /// Digest algorithm to compute (can be specified multiple times)
        #[arg(short, long = "algorithm", value_name = "NAME")]
        algorithms: Vec<String>,

        /// Bytes read per block
        #[arg(long, value_name = "BYTES")]
        block_size: Option<usize>,

        /// Buffers in the read-ahead ring
        #[arg(long, value_name = "N")]
        max_buffers: Option<usize>,

        /// Workers allowed to hash the same block at once
        #[arg(short, long, value_name = "N")]
        jobs: Option<usize>,

        /// Give every worker its own copy of each block
        #[arg(long)]
        inline: bool,

        /// Output format (defaults to output.default_format)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// List the available digest algorithms
    Algorithms,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the configuration file location
    Path,

    /// List all effective configuration values
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on debug flag
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Debug)
            .filter_module("treedigest_core", log::LevelFilter::Debug)
            .filter_module("treedigest_cli", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Commands::Digest {
            path,
            algorithms,
            block_size,
            max_buffers,
            jobs,
            inline,
            format,
        } => {
            let mut config = ConfigManager::new()
                .load()
                .context("Failed to load configuration")?;
            config.apply_cli_overrides(&DigestOverrides {
                algorithms,
                block_size,
                max_buffers,
                jobs,
                inline,
            });

            let summary = digest_command(&config, path, format).await?;
            if summary.error_count() > 0 {
                std::process::exit(1);
            }
        }
        Commands::Algorithms => algorithms_command(),
        Commands::Config { command } => config_command(command)?,
        Commands::Completions { shell } => generate_completions(shell),
    }

    Ok(())
}

async fn digest_command(
    config: &AppConfig,
    path: PathBuf,
    format: Option<OutputFormat>,
) -> Result<WalkSummary> {
    let format = match format {
        Some(format) => format,
        None => OutputFormat::from_config(&config.output.default_format)?,
    };
    if !config.output.color_enabled {
        colored::control::set_override(false);
    }

    let registry = DigestRegistry::builtin();
    let formatter = DigestFormatter::new(
        format,
        config.output.color_enabled && std::io::stdout().is_terminal(),
        output_order(&registry, &config.digest.algorithms),
    );

    let walker = Walker::new(&path)?;
    log::debug!("Digesting {} with {:?}", path.display(), config.digest);

    let summary = walker
        .run(&config.digest, &registry, |file, digest| {
            println!("{}", formatter.format(file, digest)?);
            Ok(())
        })
        .await
        .with_context(|| format!("Failed to digest {}", path.display()))?;

    if config.output.summary_enabled {
        print_summary(&summary);
    }

    Ok(summary)
}

/// Resolved algorithm names in the order they were requested
fn output_order(registry: &DigestRegistry, requested: &[String]) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for name in requested {
        if let Ok(spec) = registry.get(name)
            && !order.iter().any(|n| n == spec.name)
        {
            order.push(spec.name.to_string());
        }
    }
    order
}

fn print_summary(summary: &WalkSummary) {
    let stats = &summary.stats;
    eprintln!(
        "{} {} file(s), {} in {:.2}s",
        "Digested".bold().green(),
        stats.files_digested,
        format_bytes(stats.bytes_read),
        summary.elapsed.as_secs_f64()
    );

    if summary.error_count() > 0 {
        eprintln!(
            "{}",
            format!(
                "{} error(s): {} file(s) not digested, {} directory entries skipped",
                summary.error_count(),
                stats.files_failed,
                summary.walk_errors
            )
            .red()
        );
    }
}

fn algorithms_command() {
    let registry = DigestRegistry::builtin();
    for spec in registry.specs() {
        println!("{:<10} {:>4} bits", spec.name, spec.output_width * 4);
    }
}

fn config_command(command: ConfigCommand) -> Result<()> {
    let manager = ConfigManager::new();

    match command {
        ConfigCommand::Path => println!("{}", manager.config_path().display()),
        ConfigCommand::List => {
            let items = manager.list()?;
            eprintln!("Config file: {}", manager.config_path().display());
            for (key, value) in items {
                println!("{} = {}", key.cyan(), value);
            }
        }
    }

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
