use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;

use crate::normalize::{NormalizationError, normalize_date, normalize_team, normalize_whitespace};
use crate::types::ScheduledMatch;

pub const SCHEDULE_COLUMNS: [&str; 9] = [
    "Match",
    "No",
    "Match Day",
    "Date",
    "Day",
    "Start",
    "Home",
    "Away",
    "Venue",
];

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Failed to open schedule {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read schedule: {0}")]
    Csv(#[from] csv::Error),
    #[error("Schedule is missing column '{0}'")]
    MissingColumn(&'static str),
    #[error("Schedule row {row}: {source}")]
    Date {
        row: usize,
        #[source]
        source: NormalizationError,
    },
}

/// Reads a schedule with the columns in [`SCHEDULE_COLUMNS`].
///
/// Header matching ignores case and surrounding whitespace. A row whose
/// date cannot be read fails the whole file.
pub fn parse_schedule<R: Read>(reader: R) -> Result<Vec<ScheduledMatch>, ScheduleError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let index: HashMap<&'static str, usize> = SCHEDULE_COLUMNS
        .iter()
        .map(|column| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(column))
                .map(|i| (*column, i))
                .ok_or(ScheduleError::MissingColumn(*column))
        })
        .collect::<Result<_, _>>()?;

    let mut matches = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        let cell = |column: &str| {
            index
                .get(column)
                .and_then(|i| row.get(*i))
                .map(normalize_whitespace)
                .unwrap_or_default()
        };

        if cell("Home").is_empty() && cell("Date").is_empty() {
            log::debug!("Skipping blank schedule row {}", i + 2);
            continue;
        }

        let date = normalize_date(&cell("Date")).map_err(|source| ScheduleError::Date {
            row: i + 2,
            source,
        })?;

        matches.push(ScheduledMatch {
            match_label: cell("Match"),
            number: cell("No").parse().ok(),
            match_day: cell("Match Day"),
            date,
            day: cell("Day"),
            start: cell("Start"),
            home: normalize_team(&cell("Home")),
            away: normalize_team(&cell("Away")),
            venue: cell("Venue"),
        });
    }

    Ok(matches)
}

pub fn read_schedule(path: &Path) -> Result<Vec<ScheduledMatch>, ScheduleError> {
    let file = File::open(path).map_err(|source| ScheduleError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let matches = parse_schedule(file)?;
    log::info!("Read {} fixture(s) from {}", matches.len(), path.display());
    Ok(matches)
}

/// Fixtures played on `date`, in file order.
pub fn matches_on(matches: &[ScheduledMatch], date: NaiveDate) -> Vec<&ScheduledMatch> {
    matches.iter().filter(|m| m.date == date).collect()
}
