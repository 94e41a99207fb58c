//! Config command - show effective configuration

use clap::Args;
use grove_core::{Config, Secrets};

/// Show the effective configuration
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Create an owner-only secrets file template if none exists
    #[arg(long)]
    init_secrets: bool,
}

impl ConfigArgs {
    /// Execute the config command
    pub fn execute(&self) -> anyhow::Result<()> {
        if self.init_secrets {
            let path = Secrets::default_secrets_path()
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
            Secrets::create_template(&path)?;
            println!("Created secrets template at {}", path.display());
            return Ok(());
        }

        let config = Config::load()?.with_env_overrides()?;

        println!("Grove Configuration");
        println!("===================");
        println!();
        print!("{}", toml::to_string_pretty(&config)?);
        println!();

        if let Some(path) = Config::default_config_path() {
            println!("Config file: {}", path.display());
            if path.exists() {
                println!("  (exists)");
            } else {
                println!("  (not found - using defaults)");
            }
        }

        let token = match Secrets::load() {
            Ok(secrets) if secrets.github_token().is_some() => "configured",
            Ok(_) => "not set",
            Err(_) => "unreadable",
        };
        println!("GitHub token: {}", token);

        Ok(())
    }
}
