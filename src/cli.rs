//! The command line interface for the designer.
use crate::design::{Design, EvaluationOptions};
use crate::log;
use crate::output::metadata::write_metadata;
use crate::output::{create_output_directory, get_output_dir, write_outcome};
use crate::production::ProductionSource;
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the designer.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Estimate production with the sun-hours model instead of PVWatts
    #[arg(long)]
    pub offline: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Lay out, cost and project savings for a design.
    Run {
        /// Path to the design directory.
        design_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Manage example designs.
    Example {
        /// The available subcommands for managing example designs.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Validate a design.
    Validate {
        /// The path to the design directory.
        design_dir: PathBuf,
    },
    /// Estimate system size, production and cost from the roof area alone.
    Estimate {
        /// The path to the design directory.
        design_dir: PathBuf,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { design_dir, opts } => handle_run_command(&design_dir, &opts, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Validate { design_dir } => handle_validate_command(&design_dir, None),
            Self::Estimate { design_dir } => handle_estimate_command(&design_dir, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start the designer
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ solar_designer --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help in markdown format
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    if let Some(settings) = settings {
        Ok(settings)
    } else {
        Settings::load().context("Failed to load settings.")
    }
}

/// Handle the `run` command.
pub fn handle_run_command(
    design_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let mut settings = load_settings(settings)?;

    // These settings can be overridden by command-line arguments
    if opts.overwrite {
        settings.overwrite = true;
    }
    if opts.offline {
        settings.offline = true;
    }

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(design_path)?;
        &pathbuf
    };

    let overwrite =
        create_output_directory(output_path, settings.overwrite).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    log::init(Some(&settings.log_level), Some(output_path))
        .context("Failed to initialise logging.")?;

    // Load the design to run
    let design = Design::from_path(design_path).context("Failed to load design.")?;
    info!("Loaded design from {}", design_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let production_source = if settings.offline {
        ProductionSource::SunHours
    } else {
        design.file.production.source
    };
    write_metadata(output_path, design_path, production_source)
        .context("Failed to save metadata.")?;

    let outcome = design
        .evaluate_blocking(&EvaluationOptions {
            api_key: settings.api_key(),
            offline: settings.offline,
            timeout: settings.production_timeout(),
        })
        .context("Failed to evaluate design.")?;
    write_outcome(output_path, &design, &outcome).context("Failed to save results.")?;

    let metrics = &outcome.metrics;
    info!(
        "{} panels, {:.2} kW, {:.0} kWh per year, installed cost ${:.0}",
        metrics.panel_count,
        metrics.system_size.value(),
        metrics.annual_production.value(),
        metrics.estimated_cost.value()
    );
    if outcome.savings.payback_period == 0 {
        info!("The system does not pay back within the projection");
    } else {
        info!("Pays back in year {}", outcome.savings.payback_period);
    }
    info!("Design complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(design_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    // Load/validate the design
    Design::from_path(design_path).context("Failed to validate design.")?;
    info!("Design validation successful!");

    Ok(())
}

/// Handle the `estimate` command.
pub fn handle_estimate_command(design_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    let design = Design::from_path(design_path).context("Failed to load design.")?;
    let metrics = design.quick_estimate()?;
    info!(
        "Roof area {:.1} m²: about {} panels, {:.2} kW, {:.0} kWh per year, ${:.0}",
        metrics.roof_area,
        metrics.panel_count,
        metrics.system_size.value(),
        metrics.annual_production.value(),
        metrics.estimated_cost.value()
    );

    Ok(())
}
