//! Secrets management for Grove
//!
//! The tracker token is kept out of `config.toml` so configuration can be
//! shared freely. The secrets file lives at `~/.config/grove/secrets.toml` and
//! must be readable by the owner only (0600 on Unix).
//!
//! Token lookup order:
//! 1. `GROVE_GITHUB_TOKEN`
//! 2. `GITHUB_TOKEN`
//! 3. Secrets file

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Environment variables consulted for the tracker token, highest priority first
const TOKEN_ENV_VARS: [&str; 2] = ["GROVE_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// Issue tracker credentials
    pub github: TrackerSecrets,
}

/// Credentials for the issue tracker
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerSecrets {
    /// Personal access token with issue and contents scopes
    pub token: Option<String>,
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns empty secrets if the file doesn't exist
    pub fn load() -> Result<Self> {
        match Self::default_secrets_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load secrets from a specific file, refusing group/world-readable files
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path).map_err(Error::Io)?.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. Run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }

        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        secrets.github.token = secrets
            .github
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(secrets)
    }

    /// Get the default secrets file path
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("grove").join("secrets.toml"))
    }

    /// Resolve the tracker token, environment first
    pub fn github_token(&self) -> Option<String> {
        for var in TOKEN_ENV_VARS {
            if let Ok(token) = std::env::var(var) {
                let token = token.trim().to_string();
                if !token.is_empty() {
                    debug!(source = var, "Using tracker token from environment");
                    return Some(token);
                }
            }
        }

        let token = self.github.token.clone();
        if token.is_some() {
            debug!("Using tracker token from secrets file");
        }
        token
    }

    /// Write an empty secrets file with owner-only permissions
    pub fn create_template(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        let template = r#"# Grove secrets - do not commit this file
#
# The token needs to close issues and push branches:
# classic scope `repo`, or fine-grained Issues read/write + Contents read/write.

[github]
token = ""
"#;

        std::fs::write(path, template).map_err(Error::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(Error::Io)?;
        }

        warn!(
            path = %path.display(),
            "Created secrets template; add a token to enable issue tracking"
        );
        Ok(())
    }
}
