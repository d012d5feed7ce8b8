use anyhow::{Context, Result};
use colored::Colorize;
use delve_infrastructure::{ConfigService, DelvePaths};

pub fn show(paths: &DelvePaths) -> Result<()> {
    let service = ConfigService::new(paths.clone());
    let path = service.config_path()?;

    let config = match service.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "{}",
                format!("Could not read {}: {} (showing defaults)", path.display(), e).red()
            );
            service.get_config()
        }
    };

    let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
    println!("{}", format!("# {}", path.display()).bright_black());
    print!("{}", rendered);
    Ok(())
}

pub fn init(paths: &DelvePaths, force: bool) -> Result<()> {
    let service = ConfigService::new(paths.clone());
    let path = service.config_path()?;

    if service.write_defaults(force)? {
        println!("{}", format!("Wrote {}", path.display()).green());
    } else {
        println!(
            "{}",
            format!("{} already exists (use --force to overwrite)", path.display()).yellow()
        );
    }
    Ok(())
}
