//! Terminal controls for a running map.
//!
//! A `dialoguer` menu loop standing in for the map's widgets: a year
//! multi-select, a region selector, the border toggle and reset, plus the
//! static legend and a per-region incident summary.

use std::collections::BTreeSet;

use dialoguer::{MultiSelect, Select};
use traffic_map_incident_models::{NEUTRAL_COLOR, legend_entries};
use traffic_map_region_models::{ALL_REGIONS_LABEL, RegionOption};

use crate::{MapSession, RegionSummary};

/// One entry of the main menu.
enum Action {
    Years,
    Region,
    Outlines,
    Reset,
    Legend,
    Summary,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Years,
        Self::Region,
        Self::Outlines,
        Self::Reset,
        Self::Legend,
        Self::Summary,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Years => "Select years",
            Self::Region => "Select region",
            Self::Outlines => "Toggle region borders",
            Self::Reset => "Reset filters",
            Self::Legend => "Show legend",
            Self::Summary => "Incidents per region",
            Self::Quit => "Quit",
        }
    }
}

/// Runs the menu loop until the user quits.
///
/// # Errors
///
/// Returns an error if a prompt fails or the renderer stops.
pub async fn run(session: &mut MapSession) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    loop {
        println!();
        println!("{}", status_line(session));

        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;

        match Action::ALL[idx] {
            Action::Years => {
                let years = prompt_years(session)?;
                session.set_years(years)?;
            }
            Action::Region => {
                let region = prompt_region(session)?;
                session.set_region(region)?;
            }
            Action::Outlines => {
                let visible = !session.state().outlines_visible;
                session.set_outlines(visible)?;
            }
            Action::Reset => session.reset()?,
            Action::Legend => print_legend(),
            Action::Summary => print_summary(&session.region_summary()),
            Action::Quit => break,
        }
    }

    session.flush().await?;
    Ok(())
}

fn prompt_years(session: &MapSession) -> Result<BTreeSet<i32>, dialoguer::Error> {
    let years: Vec<i32> = session.years().iter().copied().collect();
    let labels: Vec<String> = years.iter().map(ToString::to_string).collect();
    let defaults: Vec<bool> = years
        .iter()
        .map(|year| session.state().selected_years.contains(year))
        .collect();

    let picked = MultiSelect::new()
        .with_prompt("Years (space=toggle, a=all, enter=confirm)")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;

    Ok(picked.into_iter().map(|i| years[i]).collect())
}

fn prompt_region(session: &MapSession) -> Result<Option<String>, dialoguer::Error> {
    let options = session.region_options();
    let labels: Vec<&str> = options.iter().map(RegionOption::label).collect();
    let current = options
        .iter()
        .position(|option| option.region_id() == session.state().selected_region.as_deref())
        .unwrap_or(0);

    let idx = Select::new()
        .with_prompt("Region")
        .items(&labels)
        .default(current)
        .interact()?;

    Ok(options[idx].region_id().map(str::to_string))
}

fn status_line(session: &MapSession) -> String {
    let state = session.state();
    let years = if state.selected_years == *session.years() {
        "all".to_string()
    } else if state.selected_years.is_empty() {
        "none".to_string()
    } else {
        state
            .selected_years
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let region = state
        .selected_region
        .as_deref()
        .and_then(|id| session.regions().get(id))
        .map_or(ALL_REGIONS_LABEL, |r| r.name.as_str());

    format!(
        "Showing {} of {} incidents | years: {years} | region: {region} | borders: {}",
        session.displayed_rows().len(),
        session.total_rows(),
        if state.outlines_visible { "on" } else { "off" }
    )
}

fn print_legend() {
    println!("Year colors:");
    for entry in legend_entries() {
        println!("  {}  {}", entry.color, entry.year);
    }
    println!("  {NEUTRAL_COLOR}  other");
}

fn print_summary(summary: &RegionSummary) {
    if summary.counts.is_empty() && summary.unassigned == 0 {
        println!("No incidents shown.");
        return;
    }

    let width = summary
        .counts
        .iter()
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Outside all regions".len());

    for (name, count) in &summary.counts {
        println!("  {name:<width$}  {count:>7}");
    }
    if summary.unassigned > 0 {
        println!("  {:<width$}  {:>7}", "Outside all regions", summary.unassigned);
    }
}
