use std::{fmt::Display, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
#[error("Unknown category '{0}'. Run `iplstats categories` to list accepted values")]
pub struct CategoryParseError(String);

#[derive(Debug, thiserror::Error)]
#[error("Unknown team '{0}'. Use a code such as 'MI' or a full name such as 'Mumbai Indians'")]
pub struct TeamParseError(String);

/// One scraped page shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatCategory {
    BattingMostRuns,
    BattingMostHundreds,
    BattingMostFifties,
    BattingMostSixes,
    BattingMostFours,
    BowlingMostWickets,
    BowlingBestEconomy,
    BowlingBestAverage,
    BowlingBestStrikeRate,
    BowlingMostMaidens,
    PointsTable,
    TeamComparison,
    PlayerComparison,
    TeamSquad,
    TeamOverview,
    TeamNews,
}

/// Which record type a category produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Player,
    Team,
    Comparison,
    /// Keyed text rows: squad members, profile facts, news items.
    Entry,
}

impl StatCategory {
    pub const ALL: [StatCategory; 16] = [
        StatCategory::BattingMostRuns,
        StatCategory::BattingMostHundreds,
        StatCategory::BattingMostFifties,
        StatCategory::BattingMostSixes,
        StatCategory::BattingMostFours,
        StatCategory::BowlingMostWickets,
        StatCategory::BowlingBestEconomy,
        StatCategory::BowlingBestAverage,
        StatCategory::BowlingBestStrikeRate,
        StatCategory::BowlingMostMaidens,
        StatCategory::PointsTable,
        StatCategory::TeamComparison,
        StatCategory::PlayerComparison,
        StatCategory::TeamSquad,
        StatCategory::TeamOverview,
        StatCategory::TeamNews,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            StatCategory::BattingMostRuns => "most-runs",
            StatCategory::BattingMostHundreds => "most-hundreds",
            StatCategory::BattingMostFifties => "most-fifties",
            StatCategory::BattingMostSixes => "most-6s",
            StatCategory::BattingMostFours => "most-4s",
            StatCategory::BowlingMostWickets => "most-wickets",
            StatCategory::BowlingBestEconomy => "best-economy-rates",
            StatCategory::BowlingBestAverage => "best-bowling-average",
            StatCategory::BowlingBestStrikeRate => "best-bowling-strike-rate",
            StatCategory::BowlingMostMaidens => "most-maidens",
            StatCategory::PointsTable => "points-table",
            StatCategory::TeamComparison => "team-comparison",
            StatCategory::PlayerComparison => "player-comparison",
            StatCategory::TeamSquad => "team-squad",
            StatCategory::TeamOverview => "team-overview",
            StatCategory::TeamNews => "team-news",
        }
    }

    /// Slug with underscores, as used in file names.
    pub fn file_slug(&self) -> String {
        self.slug().replace('-', "_")
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            StatCategory::PointsTable => RecordKind::Team,
            StatCategory::TeamComparison | StatCategory::PlayerComparison => {
                RecordKind::Comparison
            }
            StatCategory::TeamSquad | StatCategory::TeamOverview | StatCategory::TeamNews => {
                RecordKind::Entry
            }
            _ => RecordKind::Player,
        }
    }

    pub fn is_batting(&self) -> bool {
        matches!(
            self,
            StatCategory::BattingMostRuns
                | StatCategory::BattingMostHundreds
                | StatCategory::BattingMostFifties
                | StatCategory::BattingMostSixes
                | StatCategory::BattingMostFours
        )
    }

    pub fn is_bowling(&self) -> bool {
        self.kind() == RecordKind::Player && !self.is_batting()
    }

    /// Batting and bowling leaderboards, in declaration order.
    pub fn leaderboards() -> impl Iterator<Item = StatCategory> {
        Self::ALL
            .into_iter()
            .filter(|c| c.kind() == RecordKind::Player)
    }

    /// Categories fetched from one page per run, with no team or pair to name.
    pub fn site_wide() -> impl Iterator<Item = StatCategory> {
        Self::ALL
            .into_iter()
            .filter(|c| matches!(c.kind(), RecordKind::Player | RecordKind::Team))
    }

    /// Categories read from a franchise's own pages.
    pub fn team_pages() -> impl Iterator<Item = StatCategory> {
        Self::ALL
            .into_iter()
            .filter(|c| c.kind() == RecordKind::Entry)
    }
}

impl FromStr for StatCategory {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.slug() == wanted)
            .ok_or_else(|| CategoryParseError(s.to_string()))
    }
}

impl Display for StatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let title = match self {
            StatCategory::BattingMostRuns => "Most Runs",
            StatCategory::BattingMostHundreds => "Most Hundreds",
            StatCategory::BattingMostFifties => "Most Fifties",
            StatCategory::BattingMostSixes => "Most Sixes",
            StatCategory::BattingMostFours => "Most Fours",
            StatCategory::BowlingMostWickets => "Most Wickets",
            StatCategory::BowlingBestEconomy => "Best Economy Rates",
            StatCategory::BowlingBestAverage => "Best Bowling Average",
            StatCategory::BowlingBestStrikeRate => "Best Bowling Strike Rate",
            StatCategory::BowlingMostMaidens => "Most Maidens",
            StatCategory::PointsTable => "Points Table",
            StatCategory::TeamComparison => "Team Comparison",
            StatCategory::PlayerComparison => "Player Comparison",
            StatCategory::TeamSquad => "Team Squad",
            StatCategory::TeamOverview => "Team Overview",
            StatCategory::TeamNews => "Team News",
        };
        write!(f, "{}", title)
    }
}

impl Serialize for StatCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.slug())
    }
}

/// The ten current franchises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Team {
    ChennaiSuperKings,
    DelhiCapitals,
    GujaratTitans,
    KolkataKnightRiders,
    LucknowSuperGiants,
    MumbaiIndians,
    PunjabKings,
    RajasthanRoyals,
    RoyalChallengersBengaluru,
    SunrisersHyderabad,
}

impl Team {
    pub const ALL: [Team; 10] = [
        Team::ChennaiSuperKings,
        Team::DelhiCapitals,
        Team::GujaratTitans,
        Team::KolkataKnightRiders,
        Team::LucknowSuperGiants,
        Team::MumbaiIndians,
        Team::PunjabKings,
        Team::RajasthanRoyals,
        Team::RoyalChallengersBengaluru,
        Team::SunrisersHyderabad,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Team::ChennaiSuperKings => "CSK",
            Team::DelhiCapitals => "DC",
            Team::GujaratTitans => "GT",
            Team::KolkataKnightRiders => "KKR",
            Team::LucknowSuperGiants => "LSG",
            Team::MumbaiIndians => "MI",
            Team::PunjabKings => "PBKS",
            Team::RajasthanRoyals => "RR",
            Team::RoyalChallengersBengaluru => "RCB",
            Team::SunrisersHyderabad => "SRH",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Team::ChennaiSuperKings => "Chennai Super Kings",
            Team::DelhiCapitals => "Delhi Capitals",
            Team::GujaratTitans => "Gujarat Titans",
            Team::KolkataKnightRiders => "Kolkata Knight Riders",
            Team::LucknowSuperGiants => "Lucknow Super Giants",
            Team::MumbaiIndians => "Mumbai Indians",
            Team::PunjabKings => "Punjab Kings",
            Team::RajasthanRoyals => "Rajasthan Royals",
            Team::RoyalChallengersBengaluru => "Royal Challengers Bengaluru",
            Team::SunrisersHyderabad => "Sunrisers Hyderabad",
        }
    }

    /// Directory-safe name, e.g. `Mumbai_Indians`.
    pub fn dir_name(&self) -> String {
        self.name().replace(' ', "_")
    }

    /// Path segment of the franchise's pages on both source sites.
    pub fn site_slug(&self) -> String {
        match self {
            // Both sites kept the pre-2024 name in their URLs.
            Team::RoyalChallengersBengaluru => "royal-challengers-bangalore".to_string(),
            _ => self.name().to_lowercase().replace(' ', "-"),
        }
    }
}

impl FromStr for Team {
    type Err = TeamParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::normalize::normalize_team(s) {
            TeamName::Canonical(team) => Ok(team),
            TeamName::Unrecognized(_) => Err(TeamParseError(s.to_string())),
        }
    }
}

impl Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A team cell after alias lookup. Unknown names are kept verbatim for review.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TeamName {
    Canonical(Team),
    Unrecognized(String),
}

impl TeamName {
    pub fn as_str(&self) -> &str {
        match self {
            TeamName::Canonical(team) => team.name(),
            TeamName::Unrecognized(raw) => raw,
        }
    }

    pub fn team(&self) -> Option<Team> {
        match self {
            TeamName::Canonical(team) => Some(*team),
            TeamName::Unrecognized(_) => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, TeamName::Canonical(_))
    }
}

impl Display for TeamName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for TeamName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Date(v) => serializer.serialize_str(&v.format("%Y-%m-%d").to_string()),
        }
    }
}

/// A normalized field.
///
/// `Absent` means the source carried no data for the field (missing column or
/// a placeholder such as `-`). `Flagged` means the source carried text that
/// could not be read as the expected type; the raw text is kept for review.
/// Neither is ever written out as a default such as zero.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Present(T),
    Absent,
    Flagged(String),
}

impl<T> Field<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            Field::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, Field::Flagged(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Present(v) => Field::Present(f(v)),
            Field::Absent => Field::Absent,
            Field::Flagged(raw) => Field::Flagged(raw),
        }
    }
}

impl<T: Display> Field<T> {
    /// CSV/HTML cell text; anything not present is an empty cell.
    pub fn to_cell(&self) -> String {
        match self {
            Field::Present(v) => v.to_string(),
            Field::Absent | Field::Flagged(_) => String::new(),
        }
    }
}

/// Present values serialize as themselves, absent ones as `null` and flagged
/// ones as `{"flagged": "<raw text>"}`.
impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Present(v) => v.serialize(serializer),
            Field::Absent => serializer.serialize_none(),
            Field::Flagged(raw) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("flagged", raw)?;
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatCell {
    pub column: &'static str,
    pub value: Field<Value>,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatRecord {
    pub category: StatCategory,
    /// 1-based order of appearance on the source page.
    pub rank: u32,
    pub player: String,
    pub team: TeamName,
    pub stats: Vec<StatCell>,
}

impl PlayerStatRecord {
    pub fn stat(&self, column: &str) -> Option<&Field<Value>> {
        self.stats
            .iter()
            .find(|cell| cell.column.eq_ignore_ascii_case(column))
            .map(|cell| &cell.value)
    }
}

/// One points-table row.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamRecord {
    pub team: TeamName,
    pub played: Field<i64>,
    pub won: Field<i64>,
    pub lost: Field<i64>,
    pub tied: Field<i64>,
    pub no_result: Field<i64>,
    pub points: Field<i64>,
    pub net_run_rate: Field<f64>,
}

/// One head-to-head metric. Values stay text: they mix counts, scores like
/// `247/9` and decimals. `first` and `second` follow the order the two teams
/// or players were asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRecord {
    pub metric: String,
    pub first: Field<String>,
    pub second: Field<String>,
}

/// A row keyed by one identifying text, e.g. a squad member, a profile fact
/// or a news headline.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub category: StatCategory,
    pub key: String,
    pub fields: Vec<StatCell>,
}

impl EntryRecord {
    pub fn field(&self, column: &str) -> Option<&Field<Value>> {
        self.fields
            .iter()
            .find(|cell| cell.column.eq_ignore_ascii_case(column))
            .map(|cell| &cell.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Player(PlayerStatRecord),
    Team(TeamRecord),
    Comparison(ComparisonRecord),
    Entry(EntryRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Player(_) => RecordKind::Player,
            Record::Team(_) => RecordKind::Team,
            Record::Comparison(_) => RecordKind::Comparison,
            Record::Entry(_) => RecordKind::Entry,
        }
    }

    /// Cells in the declared column order of the record's schema.
    pub fn cells(&self) -> Vec<Field<Value>> {
        match self {
            Record::Player(r) => {
                let mut cells = vec![
                    Field::Present(Value::Int(i64::from(r.rank))),
                    Field::Present(Value::Text(r.player.clone())),
                    Field::Present(Value::Text(r.team.as_str().to_string())),
                ];
                cells.extend(r.stats.iter().map(|cell| cell.value.clone()));
                cells
            }
            Record::Team(r) => vec![
                Field::Present(Value::Text(r.team.as_str().to_string())),
                r.played.clone().map(Value::Int),
                r.won.clone().map(Value::Int),
                r.lost.clone().map(Value::Int),
                r.tied.clone().map(Value::Int),
                r.no_result.clone().map(Value::Int),
                r.points.clone().map(Value::Int),
                r.net_run_rate.clone().map(Value::Float),
            ],
            Record::Comparison(r) => vec![
                Field::Present(Value::Text(r.metric.clone())),
                r.first.clone().map(Value::Text),
                r.second.clone().map(Value::Text),
            ],
            Record::Entry(r) => {
                let mut cells = vec![Field::Present(Value::Text(r.key.clone()))];
                cells.extend(r.fields.iter().map(|cell| cell.value.clone()));
                cells
            }
        }
    }

    pub fn team(&self) -> Option<&TeamName> {
        match self {
            Record::Player(r) => Some(&r.team),
            Record::Team(r) => Some(&r.team),
            Record::Comparison(_) | Record::Entry(_) => None,
        }
    }

    pub fn flagged_fields(&self) -> usize {
        self.cells().iter().filter(|c| c.is_flagged()).count()
    }
}

/// A fixture row from the schedule file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledMatch {
    pub match_label: String,
    pub number: Option<u32>,
    pub match_day: String,
    pub date: NaiveDate,
    pub day: String,
    pub start: String,
    pub home: TeamName,
    pub away: TeamName,
    pub venue: String,
}

impl Display for ScheduledMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} vs {} on {}", self.home, self.away, self.date)?;
        if !self.start.is_empty() {
            write!(f, " {}", self.start)?;
        }
        if !self.venue.is_empty() {
            write!(f, " @ {}", self.venue)?;
        }
        Ok(())
    }
}

/// Capture time stamp used in file names.
pub(crate) fn date_stamp(captured_at: &NaiveDateTime) -> String {
    captured_at.format("%Y%m%d").to_string()
}
