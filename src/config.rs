use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::constants::constants;

/// User preferences persisted in `prefs.toml`.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub theme_name: Option<String>,
  /// Overrides the content API base from `constants.ron`.
  pub api_base: Option<String>,
  pub page_size: Option<u32>,
}

/// Effective connection settings: CLI flags over `prefs.toml` over `constants.ron`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub api_base: String,
  pub page_size: u32,
}

impl Settings {
  pub fn resolve(cli_api_base: Option<String>, cli_page_size: Option<u32>, config: &Config) -> Self {
    let c = constants();
    let api_base = cli_api_base.or_else(|| config.api_base.clone()).unwrap_or_else(|| c.api_base.clone());
    let page_size = cli_page_size.or(config.page_size).filter(|n| *n > 0).unwrap_or(c.page_size);
    Self { api_base, page_size }
  }
}

fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "vista")
}

/// Directory for log files. Falls back to the temp dir when no home is known.
pub fn data_dir() -> PathBuf {
  project_dirs().map(|d| d.data_dir().to_path_buf()).unwrap_or_else(std::env::temp_dir)
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = project_dirs() {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(&config_file) {
        match Self::parse(&content) {
          Some(config) => return config,
          None => warn!(path = %config_file.display(), "ignoring malformed prefs file"),
        }
      }
    }
    Self::default()
  }

  fn parse(content: &str) -> Option<Self> {
    toml::from_str(content).ok()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = project_dirs() {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        if let Ok(content) = toml::to_string(self) {
          let _ = std::fs::write(config_file, content);
        }
      }
    }
  }
}
