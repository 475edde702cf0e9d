//! Application configuration for docsetter.
//!
//! User config lives at `~/.docsetter/docsetter.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocsetError, Result};
use crate::types::{DEFAULT_SUFFIX, ErrorPolicy};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docsetter.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docsetter";

// ---------------------------------------------------------------------------
// Config structs (matching docsetter.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Markup tree processing.
    #[serde(default)]
    pub html: HtmlConfig,

    /// Navigation description handling.
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// Docset layout and packaging.
    #[serde(default)]
    pub docset: DocsetConfig,
}

/// `[html]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlConfig {
    /// Only files whose name ends with this suffix are rewritten.
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Policy for documents that cannot be decoded.
    #[serde(default)]
    pub on_markup_error: ErrorPolicy,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            on_markup_error: ErrorPolicy::Abort,
        }
    }
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.into()
}

/// `[navigation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Navigation description file, relative to the working directory.
    #[serde(default = "default_nav_file")]
    pub file: String,

    /// Policy for entries that are not single-key title mappings.
    #[serde(default = "default_skip")]
    pub on_malformed_entry: ErrorPolicy,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            file: default_nav_file(),
            on_malformed_entry: default_skip(),
        }
    }
}

fn default_nav_file() -> String {
    "mkdocs.yml".into()
}
fn default_skip() -> ErrorPolicy {
    ErrorPolicy::Skip
}

/// `[docset]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsetConfig {
    /// Directory the `<name>.docset` bundle is created in.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Site-relative files deleted from `Documents/` after copying.
    #[serde(default = "default_remove")]
    pub remove: Vec<String>,

    /// 16x16 icon copied to `icon.png`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// 32x32 icon copied to `icon@2x.png`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_2x: Option<String>,
}

impl Default for DocsetConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            remove: default_remove(),
            icon: None,
            icon_2x: None,
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}
fn default_remove() -> Vec<String> {
    vec!["search_content.json".into()]
}

// ---------------------------------------------------------------------------
// Tree config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime settings for the tree rewriter and anchor pass.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// File name suffix filter.
    pub suffix: String,
    /// Policy for documents that cannot be decoded.
    pub on_markup_error: ErrorPolicy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for TreeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            suffix: config.html.suffix.clone(),
            on_markup_error: config.html.on_markup_error,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docsetter/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DocsetError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docsetter/docsetter.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| DocsetError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocsetError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocsetError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocsetError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocsetError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
