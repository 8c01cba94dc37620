use anyhow::{Context, Result};
use colored::Colorize;
use pocketchat_infrastructure::{ConfigService, PocketchatPaths};

pub fn show(paths: &PocketchatPaths) -> Result<()> {
    let service = ConfigService::new(paths).context("Failed to resolve config path")?;
    let config = service.get_config().context("Failed to load configuration")?;

    let source = if service.path().exists() {
        service.path().display().to_string()
    } else {
        format!("{} (not found, using defaults)", service.path().display())
    };
    println!("{}", format!("# {}", source).dimmed());
    println!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to render configuration")?
    );
    Ok(())
}
