//! Code for loading program settings.
use crate::get_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::{Context, Result};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// The environment variable which overrides the API key in the settings file
pub const API_KEY_ENV_VAR: &str = "NREL_API_KEY";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# This file contains the program settings for solar_designer
";

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> Result<PathBuf> {
    let mut path = get_config_dir()?;
    path.push(SETTINGS_FILE_NAME);

    Ok(path)
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// The default program log level
    pub log_level: String,
    /// Whether to overwrite output files by default
    pub overwrite: bool,
    /// API key for the NREL PVWatts service. The NREL_API_KEY environment variable takes precedence.
    pub nrel_api_key: String,
    /// How long to wait for a production estimate, in seconds
    pub production_timeout_secs: u64,
    /// Whether to always use the offline sun-hours production model
    pub offline: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            overwrite: false,
            nrel_api_key: String::new(),
            production_timeout_secs: 30,
            offline: false,
        }
    }
}

impl Settings {
    /// Read the contents of the settings file from the program's config directory.
    ///
    /// If the file is not present, default values for settings will be used
    ///
    /// # Returns
    ///
    /// The program settings as a `Settings` struct or an error if the file is invalid
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path()?)
    }

    /// Read from the specified path, falling back to defaults if there is no file
    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }

    /// The API key for the production service, preferring the environment variable
    pub fn api_key(&self) -> Option<String> {
        env::var(API_KEY_ENV_VAR)
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| Some(self.nrel_api_key.clone()).filter(|key| !key.is_empty()))
    }

    /// How long to wait for a production estimate
    pub fn production_timeout(&self) -> Duration {
        Duration::from_secs(self.production_timeout_secs)
    }

    /// The contents of the default settings file
    pub fn default_file_contents() -> Result<String> {
        // Settings object with default values set by serde
        let settings: Settings =
            toml::from_str("").context("Cannot create settings from empty TOML file")?;

        // Convert to TOML
        let settings_raw =
            toml::to_string(&settings).context("Could not convert settings to TOML")?;

        // Iterate through the generated TOML, commenting out lines and adding docs
        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.split('\n') {
            if let Some(last) = line.find('=') {
                // Add documentation from doc comments
                let field = line[..last].trim();

                // Use doc comment to document parameter. All fields should have doc comments.
                let docs = Settings::get_field_docs(field)
                    .with_context(|| format!("Missing doc comment for field {field}"))?;
                for line in docs.split('\n') {
                    write!(&mut out, "\n# # {}\n", line.trim())?;
                }

                writeln!(&mut out, "# {}", line.trim())?;
            }
        }

        Ok(out)
    }
}
