//! Incident CSV parsing and row normalization.
//!
//! Rows whose longitude or latitude is not a finite number are dropped
//! here and never enter the working set.

use std::collections::BTreeSet;

use traffic_map_incident_models::{IncidentRow, RawIncidentRecord};

use crate::LoaderError;

/// Columns the incident CSV must carry.
const REQUIRED_COLUMNS: &[&str] = &["year", "lon", "lat"];

/// Parses the incident CSV and keeps every row with a valid position.
///
/// # Errors
///
/// Returns [`LoaderError`] if the CSV is malformed or lacks one of the
/// `year`, `lon`, `lat` columns.
pub fn parse_incidents_csv(text: &str) -> Result<Vec<IncidentRow>, LoaderError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *column) {
            return Err(LoaderError::MissingColumn(column));
        }
    }

    let mut rows = Vec::new();
    let mut dropped = 0usize;

    for result in reader.deserialize::<RawIncidentRecord>() {
        let raw = result?;
        match normalize_record(raw) {
            Some(row) => rows.push(row),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::debug!("Dropped {dropped} incident rows with invalid coordinates");
    }

    Ok(rows)
}

/// Converts a raw record into an [`IncidentRow`].
///
/// Returns `None` unless both coordinates parse to finite numbers.
#[must_use]
pub fn normalize_record(raw: RawIncidentRecord) -> Option<IncidentRow> {
    let longitude = parse_finite(&raw.lon)?;
    let latitude = parse_finite(&raw.lat)?;

    Some(IncidentRow {
        id: raw.id,
        year: parse_year(&raw.year),
        longitude,
        latitude,
        severity: raw.seriousness,
        vehicle_mass: raw.vehicle_mass,
    })
}

/// Sorted distinct years among `rows`. Rows without a year are ignored.
#[must_use]
pub fn year_universe(rows: &[IncidentRow]) -> BTreeSet<i32> {
    rows.iter().filter_map(|row| row.year).collect()
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accepts `2014` as well as float-formatted years such as `2014.0`.
fn parse_year(s: &str) -> Option<i32> {
    let s = s.trim();
    if let Ok(year) = s.parse::<i32>() {
        return Some(year);
    }
    let value = parse_finite(s)?;
    #[allow(clippy::cast_possible_truncation)]
    (value.fract() == 0.0 && value.abs() < f64::from(i32::MAX)).then_some(value as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
id,year,lon,lat,Seriousness,vehicle_mass
a1,2014,25.0,64.0,fatal,heavy
a2,2020,30.0,65.0,injury,light
a3,2016,,60.1,injury,light
a4,2017,abc,60.1,injury,light
a5,2018,24.9,NaN,injury,light
a6,2018,24.9,inf,injury,light
a7,unknown,24.9,60.2,minor,light
";

    #[test]
    fn keeps_only_rows_with_finite_coordinates() {
        let rows = parse_incidents_csv(SAMPLE).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "a7"]);
    }

    #[test]
    fn maps_columns_onto_row_fields() {
        let rows = parse_incidents_csv(SAMPLE).unwrap();
        let first = &rows[0];
        assert_eq!(first.year, Some(2014));
        assert!((first.longitude - 25.0).abs() < f64::EPSILON);
        assert!((first.latitude - 64.0).abs() < f64::EPSILON);
        assert_eq!(first.severity, "fatal");
        assert_eq!(first.vehicle_mass, "heavy");
    }

    #[test]
    fn unparseable_year_keeps_row_without_year() {
        let rows = parse_incidents_csv(SAMPLE).unwrap();
        let row = rows.iter().find(|r| r.id == "a7").unwrap();
        assert_eq!(row.year, None);
    }

    #[test]
    fn year_universe_is_sorted_and_distinct() {
        let rows = parse_incidents_csv(SAMPLE).unwrap();
        let years: Vec<i32> = year_universe(&rows).into_iter().collect();
        assert_eq!(years, vec![2014, 2020]);
    }

    #[test]
    fn accepts_float_formatted_years_and_padding() {
        let rows = parse_incidents_csv("id,year,lon,lat\nx, 2019.0 , 24.5 ,60.2\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year, Some(2019));
        assert!(rows[0].severity.is_empty());
    }

    #[test]
    fn rejects_csv_without_coordinate_columns() {
        let err = parse_incidents_csv("id,year,x,y\n1,2014,25,64\n").unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn("lon")));
    }

    #[test]
    fn rejects_fractional_years() {
        assert_eq!(parse_year("2014.5"), None);
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("2015"), Some(2015));
    }
}
