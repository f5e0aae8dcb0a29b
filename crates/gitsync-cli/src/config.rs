use std::path::PathBuf;

use serde::Deserialize;

/// Settings read from `~/.config/gitsync/config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// GitHub API root; `None` means `https://api.github.com`.
    pub api_base_url: Option<String>,
    pub user_agent: String,
    /// Concurrent transfers per batch.
    pub batch_size: usize,
    /// Upper bound on a single push or pull.
    pub timeout_secs: u64,
    /// SQLite database path; defaults to the platform data directory.
    pub database: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            user_agent: concat!("gitsync/", env!("CARGO_PKG_VERSION")).to_owned(),
            batch_size: gitsync::DEFAULT_BATCH_SIZE,
            timeout_secs: 120,
            database: None,
        }
    }
}

/// Config file path: `~/.config/gitsync/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gitsync").join("config.toml"))
}

/// Load config from file, falling back to defaults if missing.
pub fn load_config() -> AppConfig {
    if let Some(path) = config_path()
        && let Ok(contents) = std::fs::read_to_string(&path)
    {
        match parse_config(&contents) {
            Ok(config) => return config,
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config, using defaults"
            ),
        }
    }

    AppConfig::default()
}

fn parse_config(contents: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(contents)
}
