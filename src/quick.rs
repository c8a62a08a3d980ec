//! Instant estimate from roof area alone.
//!
//! This path needs no layout or production service. It assumes a fixed fraction of the roof can
//! be covered, a flat number of sun hours per day and a flat installed cost per watt.
use crate::cost::system_size;
use crate::equipment::PanelSpec;
use crate::metrics::DesignMetrics;
use crate::production::SunHoursModel;
use crate::production::sun_hours::DEFAULT_SUN_HOURS;
use crate::units::{Dimensionless, Money};
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// Assumptions for a quick estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickEstimateConfig {
    /// Extra area around each panel, as a fraction of its area
    pub spacing: f64,
    /// Fraction of the roof which can be covered
    pub utilization: f64,
    /// Average peak sun hours per day
    pub sun_hours: f64,
    /// Installed cost per watt of capacity
    pub cost_per_watt: Money,
}

impl Default for QuickEstimateConfig {
    fn default() -> Self {
        Self {
            spacing: 0.1,
            utilization: 0.9,
            sun_hours: DEFAULT_SUN_HOURS,
            cost_per_watt: Money(2.8),
        }
    }
}

impl QuickEstimateConfig {
    /// Check the assumptions are in range
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.spacing.is_finite() && self.spacing >= 0.0,
            "Panel spacing cannot be negative"
        );
        ensure!(
            self.utilization > 0.0 && self.utilization <= 1.0,
            "Utilization must be in the range (0, 1]"
        );
        ensure!(
            self.sun_hours.is_finite() && (0.0..=24.0).contains(&self.sun_hours),
            "Sun hours must be between 0 and 24"
        );
        ensure!(
            self.cost_per_watt.is_finite() && self.cost_per_watt >= Money(0.0),
            "Cost per watt cannot be negative"
        );

        Ok(())
    }
}

/// How many panels of `panel_area` fit on `roof_area` (both in m²)
pub fn max_panels_for_area(roof_area: f64, panel_area: f64, config: &QuickEstimateConfig) -> u32 {
    let footprint = panel_area * (1.0 + config.spacing);
    if roof_area <= 0.0 || footprint <= 0.0 {
        return 0;
    }

    (roof_area * config.utilization / footprint).floor() as u32
}

/// Estimate size, production and cost for a roof of `roof_area` square metres
pub fn quick_estimate(
    roof_area: f64,
    panel: &PanelSpec,
    config: &QuickEstimateConfig,
) -> DesignMetrics {
    let panel_count = max_panels_for_area(roof_area, panel.area(), config);
    let size = system_size(panel_count, panel.watts);
    let annual_production = SunHoursModel::new(config.sun_hours).output(size).annual;
    let estimated_cost = config.cost_per_watt * Dimensionless(size.value() * 1000.0);

    DesignMetrics::new(
        panel_count,
        panel.watts,
        annual_production,
        estimated_cost,
        roof_area,
    )
}
