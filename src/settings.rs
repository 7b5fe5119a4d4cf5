use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Runtime settings, read from built-in defaults, then an optional
/// `lineal.toml` (or `.json`, `.yaml`) next to the working directory, then
/// `LINEAL_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Extra directories searched by the file includer after the including
    /// file's own directory.
    pub include_paths: Vec<PathBuf>,
    pub max_include_depth: usize,
    pub log_filter: String,
    pub flatten_on_export: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            max_include_depth: 16,
            log_filter: String::from("info"),
            flatten_on_export: true,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::build(Config::builder().add_source(File::with_name("lineal").required(false)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(Config::builder().add_source(File::from(path.as_ref()).required(true)))
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings = builder
            .add_source(
                Environment::with_prefix("LINEAL")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("include_paths"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
