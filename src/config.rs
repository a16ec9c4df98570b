use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::pagination::Pagination;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  #[serde(default)]
  pub pagination: PaginationConfig,
  /// Directory for log files (defaults to the platform data directory)
  pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  pub url: String,
  pub email: String,
  /// Records requested per page when walking a collection
  #[serde(default = "default_page_size")]
  pub page_size: u32,
}

fn default_page_size() -> u32 {
  200
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
  /// Allowed table page sizes; the first one is the default
  #[serde(default = "default_rows_per_page")]
  pub rows_per_page: Vec<usize>,
}

impl Default for PaginationConfig {
  fn default() -> Self {
    Self {
      rows_per_page: default_rows_per_page(),
    }
  }
}

fn default_rows_per_page() -> Vec<usize> {
  vec![10, 25, 50, 100]
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./finboard.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/finboard/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/finboard/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("finboard.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("finboard").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.pagination()?;
    Ok(config)
  }

  /// The table page sizes as a validated [`Pagination`].
  pub fn pagination(&self) -> Result<Pagination> {
    Pagination::new(self.pagination.rows_per_page.clone())
      .map_err(|e| eyre!("pagination.rows_per_page: {}", e))
  }

  /// Get the backend password from environment variables.
  ///
  /// Checks FINBOARD_PASSWORD first, then POCKETBASE_PASSWORD as fallback.
  pub fn get_password() -> Result<String> {
    std::env::var("FINBOARD_PASSWORD")
      .or_else(|_| std::env::var("POCKETBASE_PASSWORD"))
      .map_err(|_| {
        eyre!("Backend password not found. Set FINBOARD_PASSWORD or POCKETBASE_PASSWORD environment variable.")
      })
  }
}
