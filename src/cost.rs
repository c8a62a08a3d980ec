//! System sizing and installed cost.
use crate::equipment::{BatterySpec, InverterSpec, PanelSpec};
use crate::units::{Dimensionless, Money, Power};
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// Nameplate capacity of `panel_count` panels
pub fn system_size(panel_count: u32, watts: f64) -> Power {
    Power(f64::from(panel_count) * watts / 1000.0)
}

/// Line-item rates for installation, racking and paperwork
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostParameters {
    /// Labour per panel
    pub installation_per_panel: Money,
    /// Mounting hardware per panel
    pub racking_per_panel: Money,
    /// Cabling per panel
    pub wiring_per_panel: Money,
    /// Monitoring equipment, per system
    pub monitoring: Money,
    /// Permits and design work, per system
    pub permit_and_design: Money,
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            installation_per_panel: Money(200.0),
            racking_per_panel: Money(100.0),
            wiring_per_panel: Money(50.0),
            monitoring: Money(500.0),
            permit_and_design: Money(2500.0),
        }
    }
}

impl CostParameters {
    /// Check that no rate is negative
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("installation_per_panel", self.installation_per_panel),
            ("racking_per_panel", self.racking_per_panel),
            ("wiring_per_panel", self.wiring_per_panel),
            ("monitoring", self.monitoring),
            ("permit_and_design", self.permit_and_design),
        ] {
            ensure!(
                value.is_finite() && value >= Money(0.0),
                "Cost parameter {name} cannot be negative"
            );
        }

        Ok(())
    }
}

/// An itemised installed cost
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBreakdown {
    /// All panels
    pub panels: Money,
    /// The inverter, if any
    pub inverter: Money,
    /// The battery, if any
    pub battery: Money,
    /// Installation labour
    pub installation: Money,
    /// Racking
    pub racking: Money,
    /// Wiring
    pub wiring: Money,
    /// Monitoring
    pub monitoring: Money,
    /// Permits and design
    pub permit_and_design: Money,
    /// Sum of all the above
    pub total: Money,
}

/// Price a system of `panel_count` panels with optional inverter and battery
pub fn calculate_system_cost(
    panel_count: u32,
    panel: &PanelSpec,
    inverter: Option<&InverterSpec>,
    battery: Option<&BatterySpec>,
    params: &CostParameters,
) -> CostBreakdown {
    let count = Dimensionless(f64::from(panel_count));
    let panels = panel.cost * count;
    let inverter = inverter.map_or(Money(0.0), |i| i.cost);
    let battery = battery.map_or(Money(0.0), |b| b.cost);
    let installation = params.installation_per_panel * count;
    let racking = params.racking_per_panel * count;
    let wiring = params.wiring_per_panel * count;

    CostBreakdown {
        panels,
        inverter,
        battery,
        installation,
        racking,
        wiring,
        monitoring: params.monitoring,
        permit_and_design: params.permit_and_design,
        total: panels
            + inverter
            + battery
            + installation
            + racking
            + wiring
            + params.monitoring
            + params.permit_and_design,
    }
}
