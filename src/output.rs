//! The module responsible for writing output data to disk.
use crate::cost::CostBreakdown;
use crate::design::{Design, DesignOutcome};
use crate::equipment::EquipmentID;
use crate::finance::{SimplePayback, YearlyProjection};
use crate::metrics::DesignMetrics;
use crate::placement::PlacementID;
use crate::stringing::{StringCheck, StringConfiguration};
use crate::units::{Dimensionless, Energy, Money, MoneyPerEnergy};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which design-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "solar_designer_results";

/// The output file name for panel placements
const PANELS_FILE_NAME: &str = "panels.csv";

/// The output file name for strings
const STRINGS_FILE_NAME: &str = "strings.csv";

/// The output file name for the savings projection
const PROJECTION_FILE_NAME: &str = "projection.csv";

/// The output file name for monthly production
const MONTHLY_PRODUCTION_FILE_NAME: &str = "monthly_production.csv";

/// The output file name for the summary
const SUMMARY_FILE_NAME: &str = "summary.toml";

/// Get the output folder for the design in the specified directory
pub fn get_output_dir(design_dir: &Path) -> Result<PathBuf> {
    // Get the design name from the dir path. This ends up being convoluted because we need to
    // check for all possible errors. Ugh.
    let design_dir = design_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to design")?;

    let design_name = design_dir
        .file_name()
        .context("Design cannot be in root folder")?
        .to_str()
        .context("Invalid chars in design dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, design_name].iter().collect())
}

/// Create a new output directory.
///
/// An existing folder is only reused if it is empty, unless `allow_overwrite` is set, in which case
/// its contents are deleted.
///
/// # Returns
///
/// Whether an existing folder's contents were deleted.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite to replace it."
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in the panels CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct PanelRow {
    placement_id: PlacementID,
    panel_id: EquipmentID,
    lat: f64,
    lon: f64,
    rotation: f64,
    row: Option<u32>,
    column: Option<u32>,
    string: Option<usize>,
    shading: f64,
}

/// Represents a row in the strings CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StringRow {
    string: usize,
    inverter_id: EquipmentID,
    panel_count: usize,
    voltage: f64,
    current: f64,
    power: f64,
    within_voltage_limit: bool,
}

/// Represents a row in the monthly production CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct MonthlyProductionRow {
    month: u32,
    production: Energy,
}

/// An object for writing design results to CSV files
pub struct DataWriter {
    panels_writer: csv::Writer<File>,
    strings_writer: csv::Writer<File>,
    projection_writer: csv::Writer<File>,
    monthly_writer: csv::Writer<File>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        Ok(Self {
            panels_writer: new_writer(PANELS_FILE_NAME)?,
            strings_writer: new_writer(STRINGS_FILE_NAME)?,
            projection_writer: new_writer(PROJECTION_FILE_NAME)?,
            monthly_writer: new_writer(MONTHLY_PRODUCTION_FILE_NAME)?,
        })
    }

    /// Write every placed panel, with its grid cell, string and shading
    pub fn write_panels(&mut self, outcome: &DesignOutcome) -> Result<()> {
        let string_of: HashMap<PlacementID, usize> = outcome
            .strings
            .iter()
            .enumerate()
            .flat_map(|(idx, string)| string.placements.iter().map(move |p| (p.id, idx)))
            .collect();

        for (idx, placement) in outcome.placements.iter().enumerate() {
            // Layout positions are in the same order as the placements made from them
            let cell = outcome
                .layout
                .as_ref()
                .and_then(|layout| layout.positions.get(idx));
            let row = PanelRow {
                placement_id: placement.id,
                panel_id: placement.panel_id.clone(),
                lat: placement.position.lat,
                lon: placement.position.lon,
                rotation: placement.rotation,
                row: cell.map(|cell| cell.row),
                column: cell.map(|cell| cell.column),
                string: string_of.get(&placement.id).copied(),
                shading: outcome.shading.panels.get(idx).map_or(0.0, |s| s.average),
            };
            self.panels_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Write one row per string with its electrical check
    pub fn write_strings<'a, I>(&mut self, strings: I) -> Result<()>
    where
        I: Iterator<Item = (&'a StringConfiguration, &'a StringCheck)>,
    {
        for (idx, (string, check)) in strings.enumerate() {
            let row = StringRow {
                string: idx,
                inverter_id: string.inverter_id.clone(),
                panel_count: string.len(),
                voltage: check.voltage,
                current: check.current,
                power: check.power,
                within_voltage_limit: check.within_voltage_limit,
            };
            self.strings_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Write the year-by-year savings projection
    pub fn write_projection(&mut self, projections: &[YearlyProjection]) -> Result<()> {
        for projection in projections {
            self.projection_writer.serialize(projection)?;
        }

        Ok(())
    }

    /// Write production for each calendar month
    pub fn write_monthly_production(&mut self, monthly: &[Energy]) -> Result<()> {
        for (month, production) in (1..).zip(monthly) {
            self.monthly_writer.serialize(MonthlyProductionRow {
                month,
                production: *production,
            })?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.panels_writer.flush()?;
        self.strings_writer.flush()?;
        self.projection_writer.flush()?;
        self.monthly_writer.flush()?;

        Ok(())
    }
}

/// Production figures for the summary file
#[derive(Serialize)]
struct ProductionSummary {
    annual: Energy,
    performance_ratio: Dimensionless,
    total_loss_percent: f64,
    shading_loss: f64,
}

/// Savings figures for the summary file
#[derive(Serialize)]
struct SavingsSummary {
    first_year_savings: Money,
    loan_amount: Money,
    monthly_payment: Money,
    payback_period: u32,
    roi: f64,
    current_rate: MoneyPerEnergy,
    offset_percentage: f64,
    lifetime_savings: Money,
}

/// Stringing figures for the summary file
#[derive(Serialize)]
struct StringingSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    is_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    incompatibility: Option<String>,
    strings_count: usize,
    unused_panels: usize,
    compatible_inverters: Vec<EquipmentID>,
    compatible_batteries: Vec<EquipmentID>,
}

/// The contents of the summary file
#[derive(Serialize)]
struct Summary<'a> {
    name: String,
    metrics: &'a DesignMetrics,
    cost: &'a CostBreakdown,
    production: ProductionSummary,
    stringing: StringingSummary,
    savings: SavingsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    simple_payback: Option<&'a SimplePayback>,
}

impl<'a> Summary<'a> {
    fn new(design: &Design, outcome: &'a DesignOutcome) -> Self {
        let savings = &outcome.savings;
        let wired: usize = outcome.strings.iter().map(StringConfiguration::len).sum();

        Self {
            name: design.name(),
            metrics: &outcome.metrics,
            cost: &outcome.cost,
            production: ProductionSummary {
                annual: outcome.production.output.annual,
                performance_ratio: outcome.production.performance_ratio,
                total_loss_percent: outcome.production.total_loss_percent,
                shading_loss: outcome.shading.total_shading_loss,
            },
            stringing: StringingSummary {
                is_valid: outcome.validation.as_ref().map(|v| v.is_valid),
                incompatibility: outcome
                    .validation
                    .as_ref()
                    .and_then(|v| v.incompatibility.as_ref())
                    .map(ToString::to_string),
                strings_count: outcome.strings.len(),
                unused_panels: outcome.placements.len() - wired,
                compatible_inverters: outcome.compatible_inverters.clone(),
                compatible_batteries: outcome.compatible_batteries.clone(),
            },
            savings: SavingsSummary {
                first_year_savings: savings.first_year_savings,
                loan_amount: savings.loan_amount,
                monthly_payment: savings.monthly_payment,
                payback_period: savings.payback_period,
                roi: savings.roi,
                current_rate: savings.current_rate,
                offset_percentage: savings.offset_percentage,
                lifetime_savings: savings
                    .projections
                    .last()
                    .map_or(Money(0.0), |p| p.cumulative_savings),
            },
            simple_payback: outcome.simple_payback.as_ref(),
        }
    }
}

/// Write the headline results for a design to `summary.toml`
pub fn write_summary(output_path: &Path, design: &Design, outcome: &DesignOutcome) -> Result<()> {
    let summary = Summary::new(design, outcome);
    let file_path = output_path.join(SUMMARY_FILE_NAME);
    fs::write(&file_path, toml::to_string(&summary)?)?;

    Ok(())
}

/// Write all results for a design to `output_path`
pub fn write_outcome(output_path: &Path, design: &Design, outcome: &DesignOutcome) -> Result<()> {
    let mut writer = DataWriter::create(output_path)?;
    writer.write_panels(outcome)?;
    writer.write_strings(outcome.strings.iter().zip(&outcome.string_checks))?;
    writer.write_projection(&outcome.savings.projections)?;
    writer.write_monthly_production(&outcome.production.output.monthly)?;
    writer.flush()?;

    write_summary(output_path, design, outcome)
}
