//! Application configuration for the content-list tools.
//!
//! User config lives at `~/.contentlist/contentlist.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ContentListError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentlist.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentlist";

// ---------------------------------------------------------------------------
// Config structs (matching contentlist.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Outline rendering settings.
    #[serde(default)]
    pub outline: OutlineConfig,

    /// Preference store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Anti-forgery token settings.
    #[serde(default)]
    pub security: SecurityConfig,
}

/// `[outline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineConfig {
    /// Visible title of the outline block.
    #[serde(default = "default_title")]
    pub title: String,

    /// Element name of root (level-1) headings.
    #[serde(default = "default_root_tag")]
    pub root_tag: String,

    /// Element name of sub (level-2) headings.
    #[serde(default = "default_sub_tag")]
    pub sub_tag: String,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            root_tag: default_root_tag(),
            sub_tag: default_sub_tag(),
        }
    }
}

fn default_title() -> String {
    "Content".into()
}
fn default_root_tag() -> String {
    "h2".into()
}
fn default_sub_tag() -> String {
    "h3".into()
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the preference database. A leading `~` is expanded.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.contentlist/prefs.db".into()
}

/// `[security]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Name of the env var holding the token secret (never store the secret itself).
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
        }
    }
}

fn default_secret_env() -> String {
    "CONTENTLIST_SECRET".into()
}

impl AppConfig {
    /// Resolved path of the preference database.
    pub fn db_path(&self) -> Result<PathBuf> {
        expand_home(&self.store.db_path)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contentlist/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContentListError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contentlist/contentlist.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentListError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ContentListError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ContentListError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ContentListError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ContentListError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the anti-forgery secret from the env var named in the config.
pub fn resolve_secret(config: &AppConfig) -> Result<String> {
    let var_name = &config.security.secret_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ContentListError::config(format!(
            "token secret not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Expand a bare `~` or a leading `~/` to the user's home directory.
///
/// `~user` forms are left as literal paths.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with(['/', '\\']) => rest.trim_start_matches(['/', '\\']),
        _ => return Ok(PathBuf::from(path)),
    };

    let home = dirs::home_dir()
        .ok_or_else(|| ContentListError::config("could not determine home directory"))?;
    Ok(home.join(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("root_tag"));
        assert!(toml_str.contains("CONTENTLIST_SECRET"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.outline.title, "Content");
        assert_eq!(parsed.outline.root_tag, "h2");
        assert_eq!(parsed.outline.sub_tag, "h3");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[outline]
title = "Содержание"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.outline.title, "Содержание");
        assert_eq!(config.outline.sub_tag, "h3");
        assert_eq!(config.store.db_path, "~/.contentlist/prefs.db");
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(
            expand_home("/var/lib/prefs.db").unwrap(),
            PathBuf::from("/var/lib/prefs.db")
        );
    }

    #[test]
    fn expand_home_resolves_tilde() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(
            expand_home("~/.contentlist/prefs.db").unwrap(),
            home.join(".contentlist/prefs.db")
        );
    }

    #[test]
    fn expand_home_ignores_other_users() {
        assert_eq!(
            expand_home("~alice/x").unwrap(),
            PathBuf::from("~alice/x")
        );
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~").unwrap(), home);
        }
    }

    #[test]
    fn secret_resolution() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.security.secret_env = "CL_TEST_NONEXISTENT_SECRET_12345".into();
        let result = resolve_secret(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("secret not found"));
    }
}
