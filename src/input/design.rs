//! Code for reading a design file.
use super::{input_err_msg, read_toml};
use crate::cost::CostParameters;
use crate::equipment::EquipmentID;
use crate::finance::{FinanceParameters, Incentives, UsageProfile};
use crate::footprint::Footprint;
use crate::geo::GeoPoint;
use crate::layout::{LayoutConfig, RoofOrientation};
use crate::placement::GroupingConfig;
use crate::production::{ArrayType, LossBreakdown, ModuleType, ProductionSource};
use crate::production::sun_hours::DEFAULT_SUN_HOURS;
use crate::quick::QuickEstimateConfig;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

/// The name of the design file within a design directory
pub const DESIGN_FILE_NAME: &str = "design.toml";

/// Day of the year used for shading analysis if none is given (the winter solstice)
const DEFAULT_SHADING_DAY: u32 = 355;

/// Where the system is being installed
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Site {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Postal address, for reference only
    #[serde(default)]
    pub address: Option<String>,
}

impl Site {
    /// The site as a point
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// The roof plane to be covered
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Roof {
    /// Tilt from horizontal, in degrees
    pub pitch: f64,
    /// Direction the roof faces. Inferred from the footprint if absent.
    #[serde(default)]
    pub azimuth: Option<f64>,
    /// The outline of the roof
    pub footprint: Footprint,
    /// Outlines of chimneys, trees and other things which may cast shade
    #[serde(default)]
    pub obstacles: Vec<Vec<GeoPoint>>,
}

/// The catalog entries chosen for the design
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EquipmentChoice {
    /// The panel model
    pub panel: EquipmentID,
    /// The inverter model, if one has been chosen
    #[serde(default)]
    pub inverter: Option<EquipmentID>,
    /// The battery model, if any
    #[serde(default)]
    pub battery: Option<EquipmentID>,
}

/// How production should be estimated
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProductionSettings {
    /// Which model to use
    pub source: ProductionSource,
    /// Mounting arrangement
    pub array_type: ArrayType,
    /// Cell technology
    pub module_type: ModuleType,
    /// Peak sun hours per day, for the sun-hours model
    pub sun_hours: f64,
    /// System losses
    pub losses: LossBreakdown,
    /// Day of the year (1-366) on which shading is analysed
    pub shading_day: u32,
}

impl Default for ProductionSettings {
    fn default() -> Self {
        Self {
            source: ProductionSource::default(),
            array_type: ArrayType::default(),
            module_type: ModuleType::default(),
            sun_hours: DEFAULT_SUN_HOURS,
            losses: LossBreakdown::default(),
            shading_day: DEFAULT_SHADING_DAY,
        }
    }
}

impl ProductionSettings {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.sun_hours > 0.0 && self.sun_hours <= 24.0,
            "sun_hours must be greater than 0 and at most 24"
        );
        ensure!(
            (1..=366).contains(&self.shading_day),
            "shading_day must be between 1 and 366"
        );
        self.losses.validate()
    }
}

/// A panel placed by hand
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ManualPlacement {
    /// Latitude of the panel's centre
    pub lat: f64,
    /// Longitude of the panel's centre
    pub lon: f64,
    /// Clockwise rotation in degrees
    #[serde(default)]
    pub rotation: f64,
}

impl ManualPlacement {
    /// The panel's centre as a point
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// The contents of a design file.
///
/// Only the site, roof and equipment sections are required. Every other section falls back to
/// default parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DesignFile {
    /// A name for the design
    #[serde(default)]
    pub name: Option<String>,
    /// Where the system is
    pub site: Site,
    /// The roof being covered
    pub roof: Roof,
    /// The chosen equipment
    pub equipment: EquipmentChoice,
    /// Layout engine parameters
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Thresholds for stringing manually placed panels
    #[serde(default)]
    pub grouping: GroupingConfig,
    /// Installation cost rates
    #[serde(default)]
    pub cost: CostParameters,
    /// Production model settings
    #[serde(default)]
    pub production: ProductionSettings,
    /// The customer's current consumption
    #[serde(default)]
    pub usage: UsageProfile,
    /// Loan and projection parameters
    #[serde(default)]
    pub finance: FinanceParameters,
    /// Incentives for the simple payback summary
    #[serde(default)]
    pub incentives: Incentives,
    /// Rules of thumb for quick estimates
    #[serde(default)]
    pub quick: QuickEstimateConfig,
    /// Panels placed by hand. If empty, the layout engine places panels.
    #[serde(default)]
    pub placements: Vec<ManualPlacement>,
}

impl DesignFile {
    /// Read a design file from the specified design directory.
    ///
    /// # Arguments
    ///
    /// * `design_dir` - Folder containing the design
    ///
    /// # Returns
    ///
    /// The design file contents or an error if the file is missing or invalid
    pub fn from_path<P: AsRef<Path>>(design_dir: P) -> Result<DesignFile> {
        let file_path = design_dir.as_ref().join(DESIGN_FILE_NAME);
        let design: DesignFile = read_toml(&file_path)?;
        design
            .validate()
            .with_context(|| input_err_msg(&file_path))?;

        Ok(design)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        self.site
            .location()
            .validate()
            .context("Invalid site location")?;
        self.roof
            .footprint
            .validate()
            .context("Invalid roof footprint")?;
        if let Some(azimuth) = self.roof.azimuth {
            RoofOrientation {
                pitch: self.roof.pitch,
                azimuth,
            }
            .validate()?;
        } else {
            ensure!(
                (0.0..90.0).contains(&self.roof.pitch),
                "Roof pitch must be at least 0 and less than 90 degrees"
            );
        }
        for obstacle in &self.roof.obstacles {
            ensure!(
                obstacle.len() >= 3,
                "Obstacle outlines need at least 3 vertices"
            );
            for vertex in obstacle {
                vertex.validate().context("Invalid obstacle outline")?;
            }
        }
        for placement in &self.placements {
            placement
                .position()
                .validate()
                .context("Invalid panel placement")?;
        }

        self.layout.validate()?;
        self.grouping.validate()?;
        self.cost.validate()?;
        self.production.validate()?;
        self.finance.validate()?;
        self.quick.validate()?;

        Ok(())
    }

    /// The roof orientation, inferring the azimuth from the footprint if it wasn't given
    pub fn orientation(&self) -> Result<RoofOrientation> {
        let azimuth = match self.roof.azimuth {
            Some(azimuth) => azimuth,
            None => self
                .roof
                .footprint
                .infer_azimuth()
                .context("Could not infer roof azimuth")?,
        };

        Ok(RoofOrientation {
            pitch: self.roof.pitch,
            azimuth,
        })
    }
}
