use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{EnrichError, Result};

// Embedded at compile time; also what `init-config` writes out.
const DEFAULT_CONFIG: &str = include_str!("../default_trafficfill.toml");

pub const CONFIG_FILE_NAME: &str = "trafficfill.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub browse: BrowseConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// `[database]`: where the traffic and users tables live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub table: String,
    pub key_column: String,
    pub date_column: String,
    pub users_table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("traffic.db"),
            table: "traffic_analytics".into(),
            key_column: "targets".into(),
            date_column: "display_date".into(),
            users_table: "users".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseConfig {
    pub default_columns: Vec<String>,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            default_columns: ["targets", "display_date", "rank", "users", "bounce_rate"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub default_attributes: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            default_attributes: vec!["users".into(), "bounce_rate".into()],
        }
    }
}

fn parse(content: &str, origin: &Path) -> Result<AppConfig> {
    toml::from_str(content)
        .map_err(|e| EnrichError::config(format!("failed to parse {}: {}", origin.display(), e)))
}

/// Resolve configuration: an explicit file (must exist and parse), else
/// `trafficfill.toml` in the working directory, else the embedded defaults.
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig> {
    let start_time = Instant::now();

    let config = if let Some(path) = config_path {
        info!(action = "load", component = "config_file", file_path = ?path, "Loading config from specified file");
        if !path.exists() {
            return Err(EnrichError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path).map_err(|e| EnrichError::io(path, e))?;
        parse(&content, path)?
    } else {
        let default_file = Path::new(CONFIG_FILE_NAME);
        let from_file = if default_file.exists() {
            info!(action = "load", component = "default_config_file", file_path = ?default_file, "Loading config from default file");
            let content =
                fs::read_to_string(default_file).map_err(|e| EnrichError::io(default_file, e))?;
            match parse(&content, default_file) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!(action = "parse", component = "default_config_file", error = %e, "Invalid config file, using defaults");
                    None
                }
            }
        } else {
            None
        };

        match from_file {
            Some(config) => config,
            None => {
                info!(
                    action = "load",
                    component = "embedded_config",
                    "Using embedded default config"
                );
                parse(DEFAULT_CONFIG, Path::new("<embedded>"))?
            }
        }
    };

    info!(
        action = "complete",
        component = "config_loading",
        database = ?config.database.path,
        table = %config.database.table,
        duration_ms = start_time.elapsed().as_millis(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Write the default config file into the working directory.
pub fn init_default_config() -> Result<PathBuf> {
    let default_file = Path::new(CONFIG_FILE_NAME);

    if default_file.exists() {
        return Err(EnrichError::config(format!(
            "{} already exists. Remove it first if you want to reinitialize.",
            CONFIG_FILE_NAME
        )));
    }

    fs::write(default_file, DEFAULT_CONFIG).map_err(|e| EnrichError::io(default_file, e))?;
    Ok(default_file.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_matches_defaults() {
        let parsed = parse(DEFAULT_CONFIG, Path::new("<embedded>")).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[database]
path = "/data/semrush.db"
"#,
        )
        .unwrap();
        assert_eq!(config.database.path, PathBuf::from("/data/semrush.db"));
        assert_eq!(config.database.key_column, "targets");
        assert_eq!(config.upload.default_attributes, vec!["users", "bounce_rate"]);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[database]\ntable = \"daily_traffic\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.database.table, "daily_traffic");
        assert_eq!(config.database.date_column, "display_date");
    }

    #[test]
    fn invalid_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[database\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(EnrichError::Config { .. })
        ));
    }
}
