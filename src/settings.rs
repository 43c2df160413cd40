use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};

fn default_scraper_command() -> String {
    String::from("ani-cli")
}

// Mirror hosts whose links play reliably regardless of quality tag.
fn default_trusted_hosts() -> Vec<String> {
    vec![
        String::from("fast4speed.rsvp"),
        String::from("sharepoint.com"),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Player command; `mpv` when unset. `STREMO_PLAYER` overrides.
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default = "default_scraper_command")]
    pub scraper_command: String,
    #[serde(default = "default_trusted_hosts")]
    pub trusted_hosts: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player: None,
            scraper_command: default_scraper_command(),
            trusted_hosts: default_trusted_hosts(),
        }
    }
}

impl Settings {
    /// Optional config file under the platform config dir, then `STREMO_*`
    /// environment overrides on top.
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = settings_path() {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder
            .add_source(Environment::with_prefix("STREMO"))
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Writes the compiled-in defaults to the config file path, refusing to
    /// clobber an existing file.
    pub fn write_default() -> Result<PathBuf> {
        let path =
            settings_path().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        if path.exists() {
            anyhow::bail!("config file already exists at {}", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }
        let data = toml::to_string_pretty(&Settings::default())?;
        fs::write(&path, data)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(path)
    }
}

fn settings_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("stremo").join("config.toml"))
}
