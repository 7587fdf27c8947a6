use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use forest_yield_engine::{
    estimation::primary::percent_total,
    io,
    models::LayerType,
    process_polygon,
    visualization::print_polygon_report,
    ControlMap, PolygonWriter, RunSettings,
};

#[derive(Parser)]
#[command(
    name = "forest-yield",
    about = "Forest Yield Engine - utilization class and volume estimation for forest polygons",
    version,
    author
)]
struct Cli {
    /// Log every estimation step
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute utilization classes and volumes for every polygon in a file
    Compute {
        /// Coefficient tables (JSON)
        #[arg(short, long)]
        control: PathBuf,

        /// Polygon file (JSON)
        #[arg(short, long)]
        polygon: PathBuf,

        /// Run settings (TOML); defaults are used when absent
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Write the computed polygons to this file (.csv or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check polygons for structural problems without computing them
    Validate {
        /// Polygon file (JSON)
        #[arg(short, long)]
        polygon: PathBuf,
    },

    /// Display a quick summary of a polygon file
    Summary {
        /// Polygon file (JSON)
        #[arg(short, long)]
        polygon: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "forest_yield_engine=debug,warn"
    } else {
        "forest_yield_engine=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compute {
            control,
            polygon,
            settings,
            output,
            pretty,
        } => {
            let control = ControlMap::load(&control)?;
            let settings = match settings {
                Some(path) => RunSettings::load(&path)?,
                None => RunSettings::default(),
            };
            let polygons = io::read_polygons(&polygon)?;
            let total = polygons.len();

            let mut computed = Vec::with_capacity(total);
            for polygon in polygons {
                let identifier = polygon.identifier.clone();
                match process_polygon(polygon, &control, &settings) {
                    Ok(report) => {
                        print_polygon_report(&report);
                        computed.push(report.polygon);
                    }
                    Err(e) => {
                        warn!(polygon = %identifier, error = %e, "polygon skipped");
                        eprintln!("{}: polygon {identifier}: {e}", "Error".red().bold());
                    }
                }
            }

            if computed.is_empty() && total > 0 {
                anyhow::bail!("None of the {total} polygons could be processed");
            }

            if let Some(output) = output {
                io::writer_for(&output, pretty)?.write(&computed, &output)?;
                println!(
                    "{} Wrote {} polygons to {}",
                    "Success:".green().bold(),
                    computed.len(),
                    output.display()
                );
            }

            if computed.len() < total {
                println!(
                    "{} {} of {total} polygons were skipped",
                    "Warning:".yellow().bold(),
                    total - computed.len()
                );
            }
        }

        Commands::Validate { polygon } => {
            let polygons = io::read_polygons(&polygon)?;
            let mut failures = 0;
            for polygon in &polygons {
                let result = polygon
                    .validate()
                    .and_then(|_| polygon.primary_layer())
                    .and_then(|layer| percent_total(&polygon.identifier, layer));
                match result {
                    Ok(_) => println!("{} {}", "OK".green().bold(), polygon.identifier),
                    Err(e) => {
                        failures += 1;
                        println!("{} {}: {e}", "INVALID".red().bold(), polygon.identifier);
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} of {} polygons are invalid", polygons.len());
            }
        }

        Commands::Summary { polygon } => {
            let polygons = io::read_polygons(&polygon)?;

            println!("\n{}", "Quick Summary".bold().cyan());
            println!("{}", "=".repeat(40));
            println!("  Polygons:       {}", polygons.len());
            for polygon in &polygons {
                let species = |layer_type| {
                    polygon
                        .layer(layer_type)
                        .map(|l| l.genera().join(" "))
                        .unwrap_or_else(|| "-".to_string())
                };
                println!("  {} ({})", polygon.identifier.bold(), polygon.bec);
                println!("    Layers:       {}", polygon.layers.len());
                println!("    Species:      {}", polygon.num_species());
                println!("    Primary:      {}", species(LayerType::Primary));
                println!("    Veteran:      {}", species(LayerType::Veteran));
            }
        }
    }

    Ok(())
}
