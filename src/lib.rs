//! Rooftop solar design: panel layout, stringing, cost, production and savings.
#![warn(missing_docs)]
use anyhow::{Context, Result};
use std::path::PathBuf;

pub mod cli;
pub mod cost;
pub mod design;
pub mod equipment;
pub mod finance;
pub mod footprint;
pub mod geo;
pub mod id;
pub mod input;
pub mod layout;
pub mod log;
pub mod metrics;
pub mod output;
pub mod placement;
pub mod production;
pub mod quick;
pub mod settings;
pub mod shading;
pub mod stringing;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the path to the folder where program settings are stored
pub fn get_config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Could not determine config directory")?;
    path.push("solar_designer");

    Ok(path)
}
