use std::cmp::Ordering as CmpOrdering;

use std::fmt::Display;

use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::schema::{self, Ordering};
use crate::types::{Field, Record, RecordKind, StatCategory, Team, TeamRecord, Value, date_stamp};

/// What a dataset is about when the category alone does not say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// A franchise's own pages.
    Team(Team),
    /// Two teams or two players compared, in the order asked for.
    Pair(String, String),
}

impl Subject {
    /// File-name qualifier, e.g. `MI` or `CSK_vs_MI`.
    pub fn label(&self) -> String {
        match self {
            Subject::Team(team) => team.code().to_string(),
            Subject::Pair(a, b) => format!("{}_vs_{}", a, b),
        }
    }

    pub fn team(&self) -> Option<Team> {
        match self {
            Subject::Team(team) => Some(*team),
            Subject::Pair(..) => None,
        }
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Team(team) => write!(f, "{}", team),
            Subject::Pair(a, b) => write!(f, "{} vs {}", a, b),
        }
    }
}

/// Records of one category captured by one run, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub category: StatCategory,
    pub captured_at: NaiveDateTime,
    pub subject: Option<Subject>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn kind(&self) -> RecordKind {
        self.category.kind()
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Base file name without version suffix or extension.
    pub fn stem(&self) -> String {
        let mut stem = format!("ipl_{}", self.category.file_slug());
        if let Some(subject) = &self.subject {
            stem.push('_');
            stem.push_str(&subject.label());
        }
        stem.push('_');
        stem.push_str(&date_stamp(&self.captured_at));
        stem
    }

    /// The same dataset restricted to records passing `keep`, order preserved.
    pub fn filtered(&self, keep: impl Fn(&Record) -> bool) -> Dataset {
        Dataset {
            category: self.category,
            captured_at: self.captured_at,
            subject: self.subject.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

/// One record as a JSON object whose keys follow the declared column order.
struct RecordJson<'a> {
    columns: &'a [&'static str],
    cells: Vec<Field<Value>>,
}

impl Serialize for RecordJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (label, cell) in self.columns.iter().zip(&self.cells) {
            map.serialize_entry(label, cell)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct DatasetJson<'a> {
    category: StatCategory,
    title: String,
    captured_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    columns: &'a [&'static str],
    records: Vec<RecordJson<'a>>,
}

impl Dataset {
    /// JSON document: category, capture time and one object per record keyed
    /// by column label in column order. Absent values are `null`; flagged
    /// ones are `{"flagged": "<raw text>"}`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let columns = schema::spec(self.category).labels();
        let records = self
            .records
            .iter()
            .map(|record| RecordJson {
                columns: &columns,
                cells: record.cells(),
            })
            .collect();

        serde_json::to_string_pretty(&DatasetJson {
            category: self.category,
            title: self.category.to_string(),
            captured_at: self.captured_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            subject: self.subject.as_ref().map(Subject::to_string),
            columns: &columns,
            records,
        })
    }
}

fn by_points_then_nrr(a: &Record, b: &Record) -> CmpOrdering {
    fn keys(r: &Record) -> (Option<i64>, Option<f64>) {
        match r {
            Record::Team(TeamRecord {
                points,
                net_run_rate,
                ..
            }) => (points.present().copied(), net_run_rate.present().copied()),
            _ => (None, None),
        }
    }

    // Descending, with absent values after every present one.
    fn desc<T: PartialOrd>(a: Option<T>, b: Option<T>) -> CmpOrdering {
        match (a, b) {
            (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(CmpOrdering::Equal),
            (Some(_), None) => CmpOrdering::Less,
            (None, Some(_)) => CmpOrdering::Greater,
            (None, None) => CmpOrdering::Equal,
        }
    }

    let (a_points, a_nrr) = keys(a);
    let (b_points, b_nrr) = keys(b);
    desc(a_points, b_points).then_with(|| desc(a_nrr, b_nrr))
}

/// Collects normalized records into a dataset.
///
/// Page order is kept except where the category declares a canonical sort
/// (the points table). The sort is stable so ties keep page order.
pub fn assemble(
    records: Vec<Record>,
    category: StatCategory,
    captured_at: NaiveDateTime,
) -> Dataset {
    let mut records = records;

    if let Some(stray) = records.iter().find(|r| r.kind() != category.kind()) {
        log::warn!(
            "{}: discarding {:?} record assembled into a {:?} dataset",
            category,
            stray.kind(),
            category.kind()
        );
        records.retain(|r| r.kind() == category.kind());
    }

    match schema::spec(category).ordering {
        Ordering::Source => {}
        Ordering::PointsThenNetRunRate => records.sort_by(by_points_then_nrr),
    }

    Dataset {
        category,
        captured_at,
        subject: None,
        records,
    }
}

/// Records that name `team`, for the per-team split.
pub fn team_matches(record: &Record, team: Team) -> bool {
    record.team().and_then(|t| t.team()) == Some(team)
}
