#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive map of road traffic incidents.
//!
//! ```text
//! traffic_map [--config map.toml]
//! traffic_map --years 2014,2015 --region Uusimaa --outlines
//! ```
//!
//! Without filter flags the map opens an interactive menu. With any of
//! `--years`, `--region` or `--outlines` it applies that selection once,
//! writes the figure and exits.

use std::path::PathBuf;

use clap::Parser;
use traffic_map_cli::{MapSession, SessionError, interactive, progress};
use traffic_map_config::MapConfig;
use traffic_map_renderer::figure::FigureBackend;

#[derive(Parser)]
#[command(name = "traffic_map", about = "Interactive map of road traffic incidents")]
struct Cli {
    /// TOML file overriding the built-in configuration
    #[arg(long, env = "TRAFFIC_MAP_CONFIG")]
    config: Option<PathBuf>,

    /// Where to write the figure JSON (overrides the configuration)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Years to show, comma-separated
    #[arg(long, value_delimiter = ',')]
    years: Option<Vec<i32>>,

    /// Region to show, by name
    #[arg(long)]
    region: Option<String>,

    /// Draw region borders
    #[arg(long)]
    outlines: bool,
}

impl Cli {
    const fn is_batch(&self) -> bool {
        self.years.is_some() || self.region.is_some() || self.outlines
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = progress::init_logger();
    let cli = Cli::parse();

    let mut config = MapConfig::load(cli.config.as_deref()).map_err(SessionError::from)?;
    if let Some(output) = &cli.output {
        config.output.figure_path.clone_from(output);
    }

    let spinner = progress::spinner(&multi, "Loading incidents and region boundaries");
    let data = match traffic_map_loader::load(&config.sources).await {
        Ok(data) => {
            spinner.finish_and_clear();
            data
        }
        Err(e) => {
            spinner.abandon_with_message("Loading failed");
            log::error!("Failed to load map data: {e}");
            eprintln!("Could not load the map data: {e}");
            std::process::exit(1);
        }
    };

    let backend = FigureBackend::with_output(&config.output.figure_path);
    let mut session = MapSession::start(data, &config, backend).await?;
    println!(
        "Map figure is written to {}",
        config.output.figure_path.display()
    );

    if cli.is_batch() {
        apply_flags(&mut session, &cli)?;
        session.flush().await?;
        println!(
            "Showing {} of {} incidents",
            session.displayed_rows().len(),
            session.total_rows()
        );
    } else {
        interactive::run(&mut session).await?;
    }

    session.shutdown().await?;
    Ok(())
}

fn apply_flags(session: &mut MapSession, cli: &Cli) -> Result<(), SessionError> {
    if let Some(years) = &cli.years {
        session.set_years(years.iter().copied().collect())?;
    }

    if let Some(name) = &cli.region {
        let id = session
            .regions()
            .find_by_name(name)
            .map(|region| region.id.clone())
            .ok_or_else(|| SessionError::UnknownRegion(name.clone()))?;
        session.set_region(Some(id))?;
    }

    session.set_outlines(cli.outlines)
}
