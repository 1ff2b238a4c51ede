use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::cli::SettingsCommands;
use crate::commands::utils::load_settings;
use crate::settings::{Settings, get_settings_path};

/// Run a settings subcommand. `path` is the `--settings` override, if any.
pub fn run_settings_command(command: SettingsCommands, path: Option<&Path>) -> Result<()> {
    match command {
        SettingsCommands::Init { force } => init(&settings_path(path)?, force),
        SettingsCommands::Show => show(path),
    }
}

fn settings_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => get_settings_path(),
    }
}

/// Write the default settings to disk
pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Settings file already exists: {}\nUse --force to overwrite",
            path.display()
        );
    }

    Settings::default().save(path)?;

    println!("✓ Created settings file: {}", path.display());
    Ok(())
}

pub fn show(path: Option<&Path>) -> Result<()> {
    let settings = load_settings(path)?;
    print!("{}", render(&settings)?);
    Ok(())
}

fn render(settings: &Settings) -> Result<String> {
    toml::to_string_pretty(settings).context("Failed to serialize settings")
}
