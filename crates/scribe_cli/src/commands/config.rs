use std::path::Path;

use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use scribe_core::QueueConfig;

use crate::output::Output;

/// Show current configuration
pub fn show(config: &QueueConfig, output: &Output) -> Result<()> {
    output.section("Current Configuration");
    output.print("");

    let toml_str = config.to_toml_string()?;
    for line in toml_str.lines() {
        output.print(line);
    }

    Ok(())
}

/// Save current configuration to file
pub async fn save(config: &QueueConfig, path: &Path, output: &Output) -> Result<()> {
    output.info("Saving configuration to:", &path.display().to_string());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.into_diagnostic()?;
    }
    tokio::fs::write(path, config.to_toml_string()?)
        .await
        .into_diagnostic()?;

    output.success("Configuration saved successfully!");
    output.print("");
    output.status("To use this configuration, run:");
    output.status(&format!(
        "{} --config {} simulate",
        "scribe-cli".bright_green(),
        path.display()
    ));

    Ok(())
}
