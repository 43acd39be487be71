use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::parser::RawRow;
use crate::schema::{self, CategorySpec, ColumnKind};
use crate::types::{
    ComparisonRecord, EntryRecord, Field, PlayerStatRecord, Record, RecordKind, StatCategory,
    StatCell, Team, TeamName, TeamRecord, Value,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationReason {
    #[error("missing")]
    Missing,
    #[error("unparseable '{0}'")]
    Unparseable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to normalize field '{field}': {reason}")]
pub struct NormalizationError {
    pub field: &'static str,
    pub reason: NormalizationReason,
}

impl NormalizationError {
    fn missing(field: &'static str) -> Self {
        Self {
            field,
            reason: NormalizationReason::Missing,
        }
    }

    fn unparseable(field: &'static str, raw: &str) -> Self {
        Self {
            field,
            reason: NormalizationReason::Unparseable(raw.to_string()),
        }
    }
}

static RE_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("invalid regex: integer"));

static RE_DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("invalid regex: decimal")
});

/// Formats accepted for dates, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%B-%Y",
    "%d/%m/%Y",
    "%B %d, %Y",
];

/// Lower-cased alias -> franchise. Codes, current names and former names.
const TEAM_ALIASES: &[(&str, Team)] = &[
    ("csk", Team::ChennaiSuperKings),
    ("chennai", Team::ChennaiSuperKings),
    ("chennai super kings", Team::ChennaiSuperKings),
    ("dc", Team::DelhiCapitals),
    ("delhi", Team::DelhiCapitals),
    ("delhi capitals", Team::DelhiCapitals),
    ("delhi daredevils", Team::DelhiCapitals),
    ("dd", Team::DelhiCapitals),
    ("gt", Team::GujaratTitans),
    ("gujarat", Team::GujaratTitans),
    ("gujarat titans", Team::GujaratTitans),
    ("kkr", Team::KolkataKnightRiders),
    ("kolkata", Team::KolkataKnightRiders),
    ("kolkata knight riders", Team::KolkataKnightRiders),
    ("lsg", Team::LucknowSuperGiants),
    ("lucknow", Team::LucknowSuperGiants),
    ("lucknow super giants", Team::LucknowSuperGiants),
    ("mi", Team::MumbaiIndians),
    ("mumbai", Team::MumbaiIndians),
    ("mumbai indians", Team::MumbaiIndians),
    ("pbks", Team::PunjabKings),
    ("punjab", Team::PunjabKings),
    ("punjab kings", Team::PunjabKings),
    ("kings xi punjab", Team::PunjabKings),
    ("kxip", Team::PunjabKings),
    ("rr", Team::RajasthanRoyals),
    ("rajasthan", Team::RajasthanRoyals),
    ("rajasthan royals", Team::RajasthanRoyals),
    ("rcb", Team::RoyalChallengersBengaluru),
    ("bengaluru", Team::RoyalChallengersBengaluru),
    ("bangalore", Team::RoyalChallengersBengaluru),
    ("royal challengers bengaluru", Team::RoyalChallengersBengaluru),
    ("royal challengers bangalore", Team::RoyalChallengersBengaluru),
    ("srh", Team::SunrisersHyderabad),
    ("hyderabad", Team::SunrisersHyderabad),
    ("sunrisers hyderabad", Team::SunrisersHyderabad),
];

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cells that mean "no value" on the source sites.
pub fn is_placeholder(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "" | "-" | "--" | "—" | "–" | "n/a" | "na" | "null" | "none"
    )
}

fn clean_numeric(raw: &str) -> String {
    raw.trim()
        .replace([',', ' ', '\u{a0}'], "")
        .replace('\u{2212}', "-")
}

/// Parses a count such as `1,024`. Placeholders and missing cells are absent.
pub fn parse_count(field: &'static str, raw: Option<&str>) -> Result<Field<i64>, NormalizationError> {
    let Some(raw) = raw.filter(|r| !is_placeholder(r)) else {
        return Ok(Field::Absent);
    };
    let cleaned = clean_numeric(raw);
    if !RE_INTEGER.is_match(&cleaned) {
        return Err(NormalizationError::unparseable(field, raw));
    }
    cleaned
        .trim_start_matches('+')
        .parse::<i64>()
        .map(Field::Present)
        .map_err(|_| NormalizationError::unparseable(field, raw))
}

/// Parses a rate, average or net run rate such as `+0.512` or `7.25`.
pub fn parse_decimal(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Field<f64>, NormalizationError> {
    let Some(raw) = raw.filter(|r| !is_placeholder(r)) else {
        return Ok(Field::Absent);
    };
    let cleaned = clean_numeric(raw);
    let cleaned = cleaned.trim_end_matches('%');
    if !RE_DECIMAL.is_match(cleaned) {
        return Err(NormalizationError::unparseable(field, raw));
    }
    cleaned
        .trim_start_matches('+')
        .parse::<f64>()
        .map(Field::Present)
        .map_err(|_| NormalizationError::unparseable(field, raw))
}

/// Free text such as a high score `128*`, with whitespace collapsed.
pub fn parse_text(raw: Option<&str>) -> Field<String> {
    match raw.filter(|r| !is_placeholder(r)) {
        Some(raw) => Field::Present(normalize_whitespace(raw)),
        None => Field::Absent,
    }
}

/// Accepts `31-Mar-25`, `31 March 2025`, `2025-03-31` and a few neighbours.
pub fn normalize_date(raw: &str) -> Result<NaiveDate, NormalizationError> {
    let text = normalize_whitespace(raw);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
        .ok_or_else(|| NormalizationError::unparseable("date", raw))
}

/// Maps a team cell to its franchise. Unknown names pass through unchanged.
pub fn normalize_team(raw: &str) -> TeamName {
    let cleaned = normalize_whitespace(raw);
    let key = cleaned.trim_matches(|c: char| c == '.' || c == ',').to_lowercase();

    if let Some((_, team)) = TEAM_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return TeamName::Canonical(*team);
    }

    // Cells like "Mumbai Indians MI" carry both the name and the code.
    let mut words = key.split(' ');
    if let Some(last) = words.next_back() {
        let rest = words.collect::<Vec<_>>().join(" ");
        let by_code = TEAM_ALIASES.iter().find(|(alias, _)| *alias == last);
        let by_name = TEAM_ALIASES.iter().find(|(alias, _)| *alias == rest);
        if let (Some((_, a)), Some((_, b))) = (by_code, by_name)
            && a == b
        {
            return TeamName::Canonical(*a);
        }
    }

    TeamName::Unrecognized(cleaned)
}

fn or_flagged<T>(result: Result<Field<T>, NormalizationError>, raw: Option<&str>) -> Field<T> {
    result.unwrap_or_else(|e| {
        log::debug!("{}", e);
        Field::Flagged(raw.unwrap_or_default().trim().to_string())
    })
}

fn identity(row: &RawRow, field: &'static str) -> Result<String, NormalizationError> {
    row.get(field)
        .map(normalize_whitespace)
        .filter(|v| !is_placeholder(v))
        .ok_or_else(|| NormalizationError::missing(field))
}

fn count(row: &RawRow, field: &'static str) -> Field<i64> {
    or_flagged(parse_count(field, row.get(field)), row.get(field))
}

fn decimal(row: &RawRow, field: &'static str) -> Field<f64> {
    or_flagged(parse_decimal(field, row.get(field)), row.get(field))
}

/// Non-identity extracted cells, parsed by column kind.
fn stat_cells(row: &RawRow, spec: &CategorySpec) -> Vec<StatCell> {
    spec.extracted_columns()
        .filter(|c| !c.is_identity())
        .map(|column| {
            let raw = row.get(column.label);
            let value = match column.kind {
                ColumnKind::Count => {
                    or_flagged(parse_count(column.label, raw), raw).map(Value::Int)
                }
                ColumnKind::Decimal => {
                    or_flagged(parse_decimal(column.label, raw), raw).map(Value::Float)
                }
                _ => parse_text(raw).map(Value::Text),
            };
            StatCell {
                column: column.label,
                value,
            }
        })
        .collect()
}

fn text_of(cell: Option<StatCell>) -> Field<String> {
    match cell.map(|c| c.value) {
        Some(Field::Present(v)) => Field::Present(v.to_string()),
        Some(Field::Flagged(raw)) => Field::Flagged(raw),
        Some(Field::Absent) | None => Field::Absent,
    }
}

/// Turns one extracted row into a typed record.
///
/// Non-identity fields never fail the row: unreadable text becomes
/// [`Field::Flagged`]. A missing identity field (player, team, metric or
/// entry key) is an error and the caller drops the row.
pub fn normalize(row: &RawRow, category: StatCategory) -> Result<Record, NormalizationError> {
    let spec = schema::spec(category);

    match spec.kind() {
        RecordKind::Player => {
            let player = identity(row, "Player")?;
            let team = normalize_team(&identity(row, "Team")?);

            Ok(Record::Player(PlayerStatRecord {
                category,
                rank: row.position,
                player,
                team,
                stats: stat_cells(row, spec),
            }))
        }
        RecordKind::Team => Ok(Record::Team(TeamRecord {
            team: normalize_team(&identity(row, "Team")?),
            played: count(row, "Played"),
            won: count(row, "Won"),
            lost: count(row, "Lost"),
            tied: count(row, "Tied"),
            no_result: count(row, "No Result"),
            points: count(row, "Points"),
            net_run_rate: decimal(row, "NRR"),
        })),
        RecordKind::Comparison => {
            let metric = identity(row, "Metric")?;
            let mut sides = stat_cells(row, spec).into_iter();
            Ok(Record::Comparison(ComparisonRecord {
                metric,
                first: text_of(sides.next()),
                second: text_of(sides.next()),
            }))
        }
        RecordKind::Entry => {
            let key_column = spec
                .columns
                .iter()
                .find(|c| c.is_identity())
                .map_or("Key", |c| c.label);
            Ok(Record::Entry(EntryRecord {
                category,
                key: identity(row, key_column)?,
                fields: stat_cells(row, spec),
            }))
        }
    }
}
