use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::quiz::QuizRepository;
use crate::quiz::bank::{get_bank_path, load_bank};
use crate::settings::{Settings, get_settings_path};

/// Initialize logging
pub fn init_logging(verbose: bool, default_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if verbose { "debug" } else { default_level };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Load settings from the given file, or the default location
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path),
        None => Settings::load_or_default(&get_settings_path()?),
    }
}

/// Bank file to use: command line, then settings, then the data directory
pub fn resolve_bank_path(cli: Option<&Path>, settings: &Settings) -> Result<PathBuf> {
    if let Some(path) = cli {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = &settings.bank.path {
        return Ok(path.clone());
    }
    get_bank_path()
}

/// Build the repository sessions load from
pub fn load_repository(sample: bool, bank_path: &Path, settings: &Settings) -> Result<QuizRepository> {
    let repo = if sample {
        debug!("Using bundled sample quizzes");
        QuizRepository::with_sample_quizzes()?
    } else {
        if !bank_path.exists() {
            anyhow::bail!(
                "Quiz bank not found: {}\nRun 'quickquest bank init' to create one, or pass --sample",
                bank_path.display()
            );
        }
        QuizRepository::from_bank(&load_bank(bank_path)?)?
    };

    Ok(repo
        .with_latency(settings.bank.simulated_latency())
        .with_shuffle_seed(settings.session.shuffle_seed))
}

/// Format a countdown as `M:SS`
pub fn format_countdown(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Text progress bar for the share of time left
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
