//! A complete design: the design file, its equipment and the evaluation pipeline.
use crate::cost::{CostBreakdown, calculate_system_cost, system_size};
use crate::equipment::{BatterySpec, EquipmentCatalog, EquipmentID, InverterSpec, PanelSpec};
use crate::finance::{SavingsResult, SimplePayback, simple_payback, simulate_savings};
use crate::input::{DesignFile, read_catalog};
use crate::layout::{PanelLayout, calculate_optimal_layout};
use crate::metrics::DesignMetrics;
use crate::placement::{PlacementSet, group_into_strings};
use crate::production::{
    ProductionEstimate, ProductionModel, ProductionRequest, ProductionSource, PvWattsClient,
    SunHoursModel, estimate_production,
};
use crate::quick::quick_estimate;
use crate::shading::{ShadingAnalysis, analyse_shading};
use crate::stringing::{
    StringCheck, StringConfiguration, StringValidation, compatible_batteries,
    compatible_inverters, validate_string_configuration,
};
use anyhow::{Context, Result, bail};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to run the production model for a design
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOptions {
    /// API key for the PVWatts service
    pub api_key: Option<String>,
    /// Use the sun-hours model whatever the design file says
    pub offline: bool,
    /// How long to wait for a production estimate
    pub timeout: Duration,
}

/// A design read from disk, with its equipment resolved against the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    /// The folder the design was read from
    pub design_path: PathBuf,
    /// The design file contents
    pub file: DesignFile,
    /// The equipment catalog
    pub catalog: EquipmentCatalog,
    /// The chosen panel
    pub panel: PanelSpec,
    /// The chosen inverter, if any
    pub inverter: Option<InverterSpec>,
    /// The chosen battery, if any
    pub battery: Option<BatterySpec>,
}

/// Everything computed for a design
#[derive(Debug, Clone, PartialEq)]
pub struct DesignOutcome {
    /// The automatic layout, if the layout engine placed the panels
    pub layout: Option<PanelLayout>,
    /// Every panel on the roof
    pub placements: PlacementSet,
    /// The panels wired into strings. Empty if no inverter was chosen.
    pub strings: Vec<StringConfiguration>,
    /// Electrical checks for each of `strings`, in the same order
    pub string_checks: Vec<StringCheck>,
    /// The panel count checked against the inverter, if one was chosen
    pub validation: Option<StringValidation>,
    /// Catalog inverters suitable for the panels
    pub compatible_inverters: Vec<EquipmentID>,
    /// Catalog batteries suitable for the system size
    pub compatible_batteries: Vec<EquipmentID>,
    /// Itemised installed cost
    pub cost: CostBreakdown,
    /// Modelled production
    pub production: ProductionEstimate,
    /// Headline figures
    pub metrics: DesignMetrics,
    /// Shading of each panel
    pub shading: ShadingAnalysis,
    /// Year-by-year savings
    pub savings: SavingsResult,
    /// Flat-rate payback, if the system pays back at all
    pub simple_payback: Option<SimplePayback>,
}

impl Design {
    /// Read a design and its catalog from `design_dir`
    pub fn from_path<P: AsRef<Path>>(design_dir: P) -> Result<Self> {
        let design_dir = design_dir.as_ref();
        let file = DesignFile::from_path(design_dir)?;
        let catalog = read_catalog(design_dir)?;

        let panel = catalog.panel(&file.equipment.panel.0)?.panel_spec()?;
        let inverter = file
            .equipment
            .inverter
            .as_ref()
            .map(|id| catalog.inverter(&id.0)?.inverter_spec())
            .transpose()?;
        let battery = file
            .equipment
            .battery
            .as_ref()
            .map(|id| catalog.battery(&id.0)?.battery_spec())
            .transpose()?;

        Ok(Self {
            design_path: design_dir.to_path_buf(),
            file,
            catalog,
            panel,
            inverter,
            battery,
        })
    }

    /// A display name for the design
    pub fn name(&self) -> String {
        self.file.name.clone().unwrap_or_else(|| {
            self.design_path
                .file_name()
                .map_or_else(|| "design".into(), |name| name.to_string_lossy().into())
        })
    }

    /// Put panels on the roof, either from the hand placements or with the layout engine
    fn place_panels(&self) -> Result<(Option<PanelLayout>, PlacementSet)> {
        let footprint = &self.file.roof.footprint;
        let panel_id = &self.file.equipment.panel;

        if self.file.placements.is_empty() {
            let layout = calculate_optimal_layout(
                footprint,
                &self.panel,
                self.file.orientation()?,
                self.file.site.latitude,
                &self.file.layout,
            )
            .context("Failed to lay out panels")?;
            let placements = PlacementSet::from_layout(&layout, panel_id);
            info!(
                "Laid out {} panels in {} rows",
                layout.total_panels, layout.number_of_rows
            );

            return Ok((Some(layout), placements));
        }

        let mut placements = PlacementSet::new();
        for placement in &self.file.placements {
            let added = placements.add_within(
                footprint,
                placement.position(),
                placement.rotation,
                panel_id.clone(),
            )?;
            if added.is_none() {
                warn!(
                    "Ignoring panel at ({}, {}) as it is not on the roof",
                    placement.lat, placement.lon
                );
            }
        }
        info!("Placed {} panels by hand", placements.len());

        Ok((None, placements))
    }

    /// Wire the panels to the chosen inverter
    fn wire_panels(
        &self,
        placements: &PlacementSet,
        manual: bool,
    ) -> (Option<StringValidation>, Vec<StringConfiguration>) {
        let (Some(inverter), Some(inverter_id)) =
            (self.inverter.as_ref(), self.file.equipment.inverter.as_ref())
        else {
            return (None, Vec::new());
        };

        let validation =
            validate_string_configuration(placements.len() as u32, &self.panel, inverter);
        if let Some(incompatibility) = &validation.incompatibility {
            warn!("Inverter {inverter_id} cannot serve the panels: {incompatibility}");
        }

        let strings = if manual {
            group_into_strings(placements.placements(), inverter_id, &self.file.grouping)
        } else {
            validation
                .suggested_configuration
                .split(placements.placements(), inverter_id)
        };

        (Some(validation), strings)
    }

    /// Run the whole pipeline with the given production model
    pub async fn evaluate<M: ProductionModel>(
        &self,
        model: &M,
        timeout: Duration,
    ) -> Result<DesignOutcome> {
        let (layout, placements) = self.place_panels()?;
        if placements.is_empty() {
            bail!("No panels could be placed on the roof");
        }
        let panel_count = placements.len() as u32;

        let (validation, strings) = self.wire_panels(&placements, layout.is_none());
        let string_checks = self.inverter.as_ref().map_or_else(Vec::new, |inverter| {
            strings
                .iter()
                .map(|string| string.check(&self.panel, inverter))
                .collect()
        });
        let size = system_size(panel_count, self.panel.watts);
        let compatible_inverters =
            compatible_inverters(&self.catalog.inverters, &self.panel, panel_count)?
                .into_iter()
                .map(|inverter| inverter.id.clone())
                .collect();
        let compatible_batteries = compatible_batteries(&self.catalog.batteries, size)?
            .into_iter()
            .map(|battery| battery.id.clone())
            .collect();

        let cost = calculate_system_cost(
            panel_count,
            &self.panel,
            self.inverter.as_ref(),
            self.battery.as_ref(),
            &self.file.cost,
        );

        let orientation = self.file.orientation()?;
        let settings = &self.file.production;
        let request = ProductionRequest {
            system_capacity: size,
            latitude: self.file.site.latitude,
            longitude: self.file.site.longitude,
            azimuth: orientation.azimuth,
            tilt: orientation.pitch,
            array_type: settings.array_type,
            module_type: settings.module_type,
            total_loss_percent: settings.losses.total(),
        };
        let production = estimate_production(model, &request, timeout)
            .await
            .context("Failed to estimate production")?;
        let annual_production = production.output.annual;
        info!(
            "Estimated annual production: {:.0} kWh",
            annual_production.value()
        );

        let positions: Vec<_> = placements.iter().map(|p| p.position).collect();
        let shading = analyse_shading(&positions, &self.file.roof.obstacles, settings.shading_day);

        let roof_area = self.file.roof.footprint.area()?;
        let metrics = DesignMetrics::new(
            panel_count,
            self.panel.watts,
            annual_production,
            cost.total,
            roof_area,
        );

        let savings = simulate_savings(
            cost.total,
            annual_production,
            &self.file.usage,
            &self.file.finance,
        )
        .context("Failed to project savings")?;
        let simple_payback = match simple_payback(
            cost.total,
            annual_production,
            savings.current_rate,
            &self.file.incentives,
        ) {
            Ok(payback) => Some(payback),
            Err(err) => {
                warn!("No simple payback figures: {err}");
                None
            }
        };

        Ok(DesignOutcome {
            layout,
            placements,
            strings,
            string_checks,
            validation,
            compatible_inverters,
            compatible_batteries,
            cost,
            production,
            metrics,
            shading,
            savings,
            simple_payback,
        })
    }

    /// Pick the production model from the design and `options`, then run the pipeline to
    /// completion on the current thread
    pub fn evaluate_blocking(&self, options: &EvaluationOptions) -> Result<DesignOutcome> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let source = if options.offline {
            ProductionSource::SunHours
        } else {
            self.file.production.source
        };
        match source {
            ProductionSource::PvWatts => {
                let api_key = options.api_key.as_deref().context(
                    "An NREL API key is needed for PVWatts estimates. Set NREL_API_KEY, add it \
                     to settings.toml or run offline.",
                )?;
                let client = PvWattsClient::new(api_key)?;
                info!("Estimating production with PVWatts");
                runtime.block_on(self.evaluate(&client, options.timeout))
            }
            ProductionSource::SunHours => {
                let model = SunHoursModel::new(self.file.production.sun_hours);
                info!(
                    "Estimating production from {} peak sun hours",
                    model.sun_hours
                );
                runtime.block_on(self.evaluate(&model, options.timeout))
            }
        }
    }

    /// Headline figures from the roof area alone, without a layout
    pub fn quick_estimate(&self) -> Result<DesignMetrics> {
        let roof_area = self.file.roof.footprint.area()?;
        Ok(quick_estimate(roof_area, &self.panel, &self.file.quick))
    }
}
