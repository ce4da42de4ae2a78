use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use speech_curator::app::{RunReport, plan_chunks, run_manifest, score};
use speech_curator::cli::{Cli, Commands, ConfigAction, RunArgs};
use speech_curator::config::Config;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    speech_curator::logging::init(cli.verbose, cli.quiet);
    tracing::debug!(version = %speech_curator::version_string(), "speech-curator starting");

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(cli.config.as_deref())?;
            handle_run_command(config, args, cli.quiet).await?;
        }
        Commands::Segment { audio } => {
            let config = load_config(cli.config.as_deref())?;
            let plan = plan_chunks(&config, &audio)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Score {
            reference,
            hypothesis,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let report = score(&config, &reference, &hypothesis);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "speech-curator",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/speech-curator/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides are applied on top.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        let default_path = Config::default_path()?;
        Config::load_or_default(&default_path)?
    };

    Ok(config.with_env_overrides()?)
}

/// Run the pipeline on a blocking thread; Ctrl+C stops it between batches.
async fn handle_run_command(mut config: Config, args: RunArgs, quiet: bool) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing current batch");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let manifest = args.manifest.clone();
    let dataset_id = args.dataset_id.clone().unwrap_or_default();
    let report = tokio::task::spawn_blocking(move || {
        run_manifest(&config, &manifest, &dataset_id, &shutdown)
    })
    .await??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    let summary = &report.summary;
    println!(
        "{} {} items ({} skipped), {} chunks in {} batches, {:.1}s",
        "Done:".bold(),
        report.items,
        report.skipped_items,
        summary.records,
        summary.batches,
        summary.elapsed.as_secs_f64()
    );
    println!("  {} {}", "persisted:".dimmed(), summary.persisted.green());
    println!("  {} {}", "discarded:".dimmed(), summary.discarded.yellow());
    if summary.errored > 0 {
        println!("  {}   {}", "errored:".dimmed(), summary.errored.red());
    } else {
        println!("  {}   {}", "errored:".dimmed(), summary.errored);
    }
    if summary.interrupted {
        println!("{}", "Interrupted: remaining items were not processed".yellow());
    }
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = load_config(custom_path)?;
            match config.get_value_by_path(&key) {
                Ok(value) => println!("{}", value),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::List => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_display_toml()?);
        }
        ConfigAction::Dump => {
            print!("{}", Config::dump_template());
        }
    }
    Ok(())
}
