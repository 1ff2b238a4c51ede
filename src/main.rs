use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

use quickquest::cli::{Args, Commands};
use quickquest::commands::utils::{init_logging, load_repository, load_settings, resolve_bank_path};
use quickquest::commands::{exam, run_bank_command, run_settings_command};
use quickquest::settings::Settings;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    // `settings init` must work before the file exists
    let settings = if matches!(args.command, Commands::Settings { .. }) {
        Settings::default()
    } else {
        load_settings(args.settings.as_deref())?
    };
    init_logging(args.verbose, &settings.logging.level);

    let bank_path = resolve_bank_path(args.bank.as_deref(), &settings)?;

    match args.command {
        Commands::Take {
            code,
            name,
            auto_start,
            sample,
            json,
        } => {
            let repo = load_repository(sample, &bank_path, &settings)?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            let result = runtime.block_on(exam::take(
                &repo,
                &code,
                &name,
                auto_start,
                json,
                &settings.session,
            ));
            // The stdin reader may still be blocked on a read
            runtime.shutdown_timeout(Duration::from_millis(100));
            result
        }
        Commands::List { sample } => exam::list(&load_repository(sample, &bank_path, &settings)?),
        Commands::Show { code, sample } => {
            exam::show(&load_repository(sample, &bank_path, &settings)?, &code)
        }
        Commands::Bank { command } => run_bank_command(command, &bank_path),
        Commands::Settings { command } => run_settings_command(command, args.settings.as_deref()),
    }
}
