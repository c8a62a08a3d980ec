//! Annual energy production estimates.
//!
//! Production is modelled by an external service (see [`PvWattsClient`]) behind the
//! [`ProductionModel`] trait. A flat sun-hours heuristic ([`SunHoursModel`]) implements the same
//! trait for offline use, but it is never substituted automatically when the service fails.
use crate::geo::GeoPoint;
use crate::units::{Dimensionless, Energy, HOURS_PER_YEAR, Power};
use anyhow::ensure;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::time::Duration;
use thiserror::Error;

pub mod pvwatts;
pub use pvwatts::PvWattsClient;
pub mod sun_hours;
pub use sun_hours::SunHoursModel;

/// Number of months in the monthly production profile
pub const MONTHS_PER_YEAR: usize = 12;

/// Number of hours in the hourly production profile
pub const HOURS_PER_PROFILE: usize = 8760;

/// A failed production estimate
#[derive(Debug, Error)]
pub enum ProductionServiceError {
    /// The request was rejected before being sent
    #[error("Invalid production request: {0}")]
    InvalidRequest(String),
    /// No API key is available for the service
    #[error("No API key has been configured for the production service")]
    MissingApiKey,
    /// The service replied with a non-success status
    #[error("Production service returned HTTP status {status}")]
    Http {
        /// The HTTP status code
        status: u16,
    },
    /// The service rejected the request's parameters
    #[error("Production service validation error: {}", .0.join(", "))]
    Validation(Vec<String>),
    /// The service could not be reached
    #[error("Could not reach production service")]
    Transport(#[from] reqwest::Error),
    /// The reply was not valid JSON of the expected shape
    #[error("Could not decode production service response")]
    Decode(#[from] serde_json::Error),
    /// The reply decoded but its contents were unusable
    #[error("Malformed production response: {0}")]
    MalformedResponse(String),
    /// The caller's deadline passed
    #[error("Production service did not respond within {0:?}")]
    Timeout(Duration),
}

/// Named loss categories, each as a percentage of DC output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossBreakdown {
    /// Dirt, snow and other surface covering
    pub soiling: f64,
    /// Shading from nearby objects
    pub shading: f64,
    /// Differences between panels in a string
    pub mismatch: f64,
    /// Resistive losses in DC and AC wiring
    pub wiring: f64,
    /// Resistive losses in connectors
    pub connections: f64,
    /// Light-induced degradation in the first months
    pub degradation: f64,
    /// Deviation from nameplate rating
    pub nameplate: f64,
    /// Weathering of the panels
    pub age: f64,
    /// Downtime for maintenance and outages
    pub availability: f64,
}

impl Default for LossBreakdown {
    fn default() -> Self {
        Self {
            soiling: 2.0,
            shading: 3.0,
            mismatch: 2.0,
            wiring: 2.0,
            connections: 0.5,
            degradation: 1.5,
            nameplate: 1.0,
            age: 1.0,
            availability: 1.08,
        }
    }
}

impl LossBreakdown {
    fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("soiling", self.soiling),
            ("shading", self.shading),
            ("mismatch", self.mismatch),
            ("wiring", self.wiring),
            ("connections", self.connections),
            ("degradation", self.degradation),
            ("nameplate", self.nameplate),
            ("age", self.age),
            ("availability", self.availability),
        ]
        .into_iter()
    }

    /// Sum of all categories, in percent
    pub fn total(&self) -> f64 {
        self.iter().map(|(_, loss)| loss).sum()
    }

    /// Check that each category is a percentage and the total is below 100
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, loss) in self.iter() {
            ensure!(
                (0.0..=100.0).contains(&loss),
                "Loss category {name} must be between 0 and 100 percent"
            );
        }
        ensure!(self.total() < 100.0, "Total losses must be below 100 percent");

        Ok(())
    }
}

/// Mounting arrangement, as understood by the production service
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
)]
pub enum ArrayType {
    /// Fixed, free-standing rack
    #[string = "fixed_open_rack"]
    FixedOpenRack,
    /// Fixed, flush with the roof
    #[default]
    #[string = "fixed_roof_mount"]
    FixedRoofMount,
    /// Single-axis tracker
    #[string = "one_axis"]
    OneAxis,
    /// Single-axis tracker with backtracking
    #[string = "one_axis_backtracking"]
    OneAxisBacktracking,
    /// Dual-axis tracker
    #[string = "two_axis"]
    TwoAxis,
}

impl ArrayType {
    /// The service's numeric code
    pub fn code(self) -> u8 {
        match self {
            Self::FixedOpenRack => 0,
            Self::FixedRoofMount => 1,
            Self::OneAxis => 2,
            Self::OneAxisBacktracking => 3,
            Self::TwoAxis => 4,
        }
    }
}

/// Panel cell technology, as understood by the production service
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
)]
pub enum ModuleType {
    /// Standard crystalline silicon
    #[default]
    #[string = "standard"]
    Standard,
    /// High-efficiency crystalline silicon
    #[string = "premium"]
    Premium,
    /// Thin film
    #[string = "thin_film"]
    ThinFilm,
}

impl ModuleType {
    /// The service's numeric code
    pub fn code(self) -> u8 {
        match self {
            Self::Standard => 0,
            Self::Premium => 1,
            Self::ThinFilm => 2,
        }
    }
}

/// Which model produces the estimate
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
)]
pub enum ProductionSource {
    /// The PVWatts web service
    #[default]
    #[string = "pvwatts"]
    PvWatts,
    /// The flat sun-hours heuristic
    #[string = "sun_hours"]
    SunHours,
}

/// The inputs to a production estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionRequest {
    /// Nameplate DC capacity
    pub system_capacity: Power,
    /// Site latitude in degrees
    pub latitude: f64,
    /// Site longitude in degrees
    pub longitude: f64,
    /// Direction the panels face, in degrees
    pub azimuth: f64,
    /// Panel tilt from horizontal, in degrees
    pub tilt: f64,
    /// Mounting arrangement
    pub array_type: ArrayType,
    /// Cell technology
    pub module_type: ModuleType,
    /// Total system losses in percent
    pub total_loss_percent: f64,
}

impl ProductionRequest {
    /// Check that all parameters are in range
    pub fn validate(&self) -> Result<(), ProductionServiceError> {
        let invalid = |message: &str| Err(ProductionServiceError::InvalidRequest(message.into()));

        if !(self.system_capacity.is_finite() && self.system_capacity > Power(0.0)) {
            return invalid("system capacity must be positive");
        }
        if GeoPoint::new(self.latitude, self.longitude)
            .validate()
            .is_err()
        {
            return invalid("site coordinates are out of range");
        }
        if !(0.0..=90.0).contains(&self.tilt) {
            return invalid("tilt must be between 0 and 90 degrees");
        }
        if !(0.0..=360.0).contains(&self.azimuth) {
            return invalid("azimuth must be between 0 and 360 degrees");
        }
        if !(0.0..100.0).contains(&self.total_loss_percent) {
            return invalid("losses must be at least 0 and below 100 percent");
        }

        Ok(())
    }
}

/// Modelled AC output of a system
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionOutput {
    /// Output over a year
    pub annual: Energy,
    /// Output per calendar month
    pub monthly: Vec<Energy>,
    /// Output per hour of the year
    pub hourly: Vec<Energy>,
}

impl ProductionOutput {
    /// Check the profile lengths and that all values are finite and non-negative
    fn validate(&self) -> Result<(), ProductionServiceError> {
        let malformed = |message: String| Err(ProductionServiceError::MalformedResponse(message));

        if self.monthly.len() != MONTHS_PER_YEAR {
            return malformed(format!(
                "expected {MONTHS_PER_YEAR} monthly values, got {}",
                self.monthly.len()
            ));
        }
        if self.hourly.len() != HOURS_PER_PROFILE {
            return malformed(format!(
                "expected {HOURS_PER_PROFILE} hourly values, got {}",
                self.hourly.len()
            ));
        }
        let all_values = std::iter::once(&self.annual)
            .chain(&self.monthly)
            .chain(&self.hourly);
        for value in all_values {
            if !(value.is_finite() && *value >= Energy(0.0)) {
                return malformed(format!("invalid production value {value}"));
            }
        }

        Ok(())
    }
}

/// A production estimate together with derived figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionEstimate {
    /// The modelled output
    pub output: ProductionOutput,
    /// Total losses assumed, in percent
    pub total_loss_percent: f64,
    /// Annual output divided by nameplate capacity running all year
    pub performance_ratio: Dimensionless,
}

/// Something which can model a system's energy output
pub trait ProductionModel {
    /// Estimate the output of the system described by `request`
    fn estimate(
        &self,
        request: &ProductionRequest,
    ) -> impl Future<Output = Result<ProductionOutput, ProductionServiceError>>;
}

/// Estimate production with `model`, giving up after `timeout`.
///
/// The request is validated first. Any failure from the model is returned as is; no fallback
/// value is substituted.
pub async fn estimate_production<M: ProductionModel>(
    model: &M,
    request: &ProductionRequest,
    timeout: Duration,
) -> Result<ProductionEstimate, ProductionServiceError> {
    request.validate()?;

    let output = tokio::time::timeout(timeout, model.estimate(request))
        .await
        .map_err(|_| ProductionServiceError::Timeout(timeout))??;
    output.validate()?;

    let max_output = Energy(request.system_capacity.value() * HOURS_PER_YEAR);
    let performance_ratio = output.annual / max_output;
    debug!(
        "Annual production {:.1} kWh, performance ratio {:.4}",
        output.annual.value(),
        performance_ratio.value()
    );

    Ok(ProductionEstimate {
        output,
        total_loss_percent: request.total_loss_percent,
        performance_ratio,
    })
}
