use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::dataset::{Dataset, Subject, team_matches};
use crate::pipeline::RunSummary;
use crate::schema;
use crate::types::{Field, RecordKind, ScheduledMatch, StatCategory, Team, TeamName, date_stamp};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {artifact} {}: {reason}", path.display())]
    Artifact {
        artifact: ArtifactKind,
        path: PathBuf,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Csv,
    Json,
    Html,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Csv => "csv",
            ArtifactKind::Json => "json",
            ArtifactKind::Html => "html",
        }
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Csv => write!(f, "CSV"),
            ArtifactKind::Json => write!(f, "JSON"),
            ArtifactKind::Html => write!(f, "HTML"),
        }
    }
}

/// What to do when a dataset's files already exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExistingFiles {
    /// Pick the first `_v2`, `_v3`, ... suffix free for every artifact.
    #[default]
    Version,
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub existing: ExistingFiles,
    pub html: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            existing: ExistingFiles::Version,
            html: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub files: Vec<PathBuf>,
    pub rows: usize,
}

/// Directory conventions under one output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Site-wide home of a category's datasets.
    pub fn category_dir(&self, category: StatCategory) -> PathBuf {
        match category.kind() {
            RecordKind::Player if category.is_batting() => self.root.join("batting_stats"),
            RecordKind::Player => self.root.join("bowling_stats"),
            RecordKind::Team => self.root.join("points_table"),
            RecordKind::Comparison => self
                .root
                .join("comparison_data")
                .join(category.file_slug()),
            RecordKind::Entry => self.root.join("team_data"),
        }
    }

    /// Where a dataset lands; team pages go under their franchise's folder.
    pub fn dataset_dir(&self, dataset: &Dataset) -> PathBuf {
        match (dataset.category, dataset.subject.as_ref().and_then(Subject::team)) {
            (StatCategory::TeamSquad, Some(team)) => self.team_folder(team, TeamFolder::Players),
            (StatCategory::TeamOverview, Some(team)) => self.team_folder(team, TeamFolder::Stats),
            (StatCategory::TeamNews, Some(team)) => self.team_folder(team, TeamFolder::News),
            (category, _) => self.category_dir(category),
        }
    }

    pub fn team_folder(&self, team: Team, folder: TeamFolder) -> PathBuf {
        self.root
            .join("team_data")
            .join(team.dir_name())
            .join(folder.dir_name())
    }

    pub fn match_dir(&self) -> PathBuf {
        self.root.join("match_data")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.root.join("debug_files")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    /// Creates every standard directory.
    pub fn ensure(&self) -> Result<(), WriteError> {
        let mut dirs: Vec<PathBuf> = StatCategory::ALL
            .iter()
            .filter(|c| c.kind() != RecordKind::Entry)
            .map(|c| self.category_dir(*c))
            .collect();
        dirs.dedup();
        dirs.extend([self.match_dir(), self.debug_dir(), self.reports_dir()]);
        for team in Team::ALL {
            dirs.extend(TeamFolder::ALL.iter().map(|f| self.team_folder(team, *f)));
        }
        dirs.iter().try_for_each(|d| create_dir(d))
    }
}

/// Sub-folders of `team_data/<Team>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamFolder {
    News,
    Players,
    Matches,
    Stats,
}

impl TeamFolder {
    pub const ALL: [TeamFolder; 4] = [
        TeamFolder::News,
        TeamFolder::Players,
        TeamFolder::Matches,
        TeamFolder::Stats,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            TeamFolder::News => "news",
            TeamFolder::Players => "players",
            TeamFolder::Matches => "matches",
            TeamFolder::Stats => "stats",
        }
    }
}

fn create_dir(path: &Path) -> Result<(), WriteError> {
    fs::create_dir_all(path).map_err(|source| WriteError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// One rendered file waiting to be committed.
struct Artifact {
    kind: ArtifactKind,
    path: PathBuf,
    contents: Vec<u8>,
}

impl Artifact {
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn error(&self, reason: impl ToString) -> WriteError {
        WriteError::Artifact {
            artifact: self.kind,
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Stages every artifact to a `.tmp` sibling, then renames them all into
/// place. On failure nothing written by this call is left behind.
fn commit_all(artifacts: Vec<Artifact>) -> Result<Vec<PathBuf>, WriteError> {
    let mut staged: Vec<PathBuf> = Vec::new();
    for artifact in &artifacts {
        let tmp = artifact.staging_path();
        if let Err(e) = fs::write(&tmp, &artifact.contents) {
            staged.iter().for_each(|p| remove_quietly(p));
            remove_quietly(&tmp);
            return Err(artifact.error(e));
        }
        staged.push(tmp);
    }

    let mut committed: Vec<PathBuf> = Vec::new();
    for (artifact, tmp) in artifacts.iter().zip(&staged) {
        if let Err(e) = fs::rename(tmp, &artifact.path) {
            committed.iter().for_each(|p| remove_quietly(p));
            staged.iter().for_each(|p| remove_quietly(p));
            return Err(artifact.error(e));
        }
        committed.push(artifact.path.clone());
    }

    Ok(committed)
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        log::warn!("Could not remove {}: {}", path.display(), e);
    }
}

/// First stem (base, then `base_v2`, `base_v3`, ...) for which no artifact
/// of `kinds` exists in `dir`.
fn choose_stem(dir: &Path, base: &str, kinds: &[ArtifactKind], existing: ExistingFiles) -> String {
    let taken = |stem: &str| {
        kinds
            .iter()
            .any(|k| dir.join(format!("{}.{}", stem, k.extension())).exists())
    };

    if existing == ExistingFiles::Overwrite || !taken(base) {
        return base.to_string();
    }

    (2..)
        .map(|n| format!("{}_v{}", base, n))
        .find(|stem| !taken(stem))
        .unwrap_or_else(|| base.to_string())
}

fn csv_bytes(dataset: &Dataset) -> Result<Vec<u8>, String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(schema::spec(dataset.category).labels())
        .map_err(|e| e.to_string())?;
    for record in dataset.records() {
        writer
            .write_record(record.cells().iter().map(Field::to_cell))
            .map_err(|e| e.to_string())?;
    }
    writer.into_inner().map_err(|e| e.to_string())
}

const DATASET_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>IPL {{ title }}{% if subject %} {{ subject }}{% endif %}</title>
  <style>
    body { font-family: sans-serif; margin: 2em; }
    table { border-collapse: collapse; }
    th, td { border: 1px solid #ccc; padding: 4px 8px; }
    th { background: #1f3c88; color: #fff; }
    tr:nth-child(even) td { background: #f4f6fb; }
  </style>
</head>
<body>
  <h1>{{ title }}{% if subject %} ({{ subject }}){% endif %}</h1>
  <p>Captured {{ captured_at }} &middot; {{ rows | length }} row(s)</p>
  <table>
    <thead>
      <tr>{% for column in columns %}<th>{{ column }}</th>{% endfor %}</tr>
    </thead>
    <tbody>
{% for row in rows %}      <tr>{% for cell in row %}<td>{{ cell }}</td>{% endfor %}</tr>
{% endfor %}    </tbody>
  </table>
</body>
</html>
"#;

fn html_bytes(dataset: &Dataset) -> Result<Vec<u8>, String> {
    let rows: Vec<Vec<String>> = dataset
        .records()
        .iter()
        .map(|r| r.cells().iter().map(Field::to_cell).collect())
        .collect();

    let mut context = tera::Context::new();
    context.insert("title", &dataset.category.to_string());
    context.insert("subject", &dataset.subject.as_ref().map(Subject::to_string));
    context.insert(
        "captured_at",
        &dataset.captured_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    context.insert("columns", &schema::spec(dataset.category).labels());
    context.insert("rows", &rows);

    tera::Tera::one_off(DATASET_TEMPLATE, &context, true)
        .map(String::into_bytes)
        .map_err(|e| e.to_string())
}

fn render(
    dataset: &Dataset,
    dir: &Path,
    stem: &str,
    kinds: &[ArtifactKind],
) -> Result<Vec<Artifact>, WriteError> {
    kinds
        .iter()
        .map(|kind| {
            let path = dir.join(format!("{}.{}", stem, kind.extension()));
            let contents = match kind {
                ArtifactKind::Csv => csv_bytes(dataset),
                ArtifactKind::Json => dataset
                    .to_json()
                    .map(String::into_bytes)
                    .map_err(|e| e.to_string()),
                ArtifactKind::Html => html_bytes(dataset),
            }
            .map_err(|reason| WriteError::Artifact {
                artifact: *kind,
                path: path.clone(),
                reason,
            })?;
            Ok(Artifact {
                kind: *kind,
                path,
                contents,
            })
        })
        .collect()
}

fn write_to_dir(
    dataset: &Dataset,
    dir: &Path,
    kinds: &[ArtifactKind],
    existing: ExistingFiles,
) -> Result<WriteResult, WriteError> {
    create_dir(dir)?;
    let stem = choose_stem(dir, &dataset.stem(), kinds, existing);
    let files = commit_all(render(dataset, dir, &stem, kinds)?)?;

    Ok(WriteResult {
        files,
        rows: dataset.len(),
    })
}

/// Writes the dataset's CSV, JSON and (optionally) HTML under the category's
/// directory. Either every artifact lands or none does.
pub fn write_dataset(
    dataset: &Dataset,
    layout: &OutputLayout,
    options: &WriteOptions,
) -> Result<WriteResult, WriteError> {
    let mut kinds = vec![ArtifactKind::Csv, ArtifactKind::Json];
    if options.html {
        kinds.push(ArtifactKind::Html);
    }

    let result = write_to_dir(dataset, &layout.dataset_dir(dataset), &kinds, options.existing)?;

    for file in &result.files {
        log::info!("Wrote {} row(s) to {}", result.rows, file.display());
    }
    Ok(result)
}

/// Splits a leaderboard by canonical team into `team_data/<Team>/stats/`.
/// Rows with an unrecognized team are not split out.
///
/// Every team's file is rendered first and committed together: on failure
/// no split file from this call is left behind.
pub fn write_per_team(
    dataset: &Dataset,
    layout: &OutputLayout,
    options: &WriteOptions,
) -> Result<Vec<PathBuf>, WriteError> {
    if dataset.kind() != RecordKind::Player {
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();
    for team in Team::ALL {
        let subset = dataset.filtered(|r| team_matches(r, team));
        if subset.is_empty() {
            continue;
        }
        let dir = layout.team_folder(team, TeamFolder::Stats);
        create_dir(&dir)?;
        let kinds = [ArtifactKind::Csv];
        let stem = choose_stem(&dir, &subset.stem(), &kinds, options.existing);
        log::debug!("{}: {} row(s) for {}", dataset.category, subset.len(), team);
        artifacts.extend(render(&subset, &dir, &stem, &kinds)?);
    }

    commit_all(artifacts)
}

/// Saves a fetched page as `debug_files/page_<category>[_<subject>]_<time>.html`.
pub fn save_debug_page(
    layout: &OutputLayout,
    category: StatCategory,
    subject: Option<&Subject>,
    content: &str,
    at: NaiveDateTime,
) -> Result<PathBuf, WriteError> {
    let dir = layout.debug_dir();
    create_dir(&dir)?;

    let mut base = format!("page_{}", category.file_slug());
    if let Some(subject) = subject {
        base.push('_');
        base.push_str(&subject.label());
    }
    base.push('_');
    base.push_str(&at.format("%Y%m%d_%H%M%S").to_string());

    let stem = choose_stem(&dir, &base, &[ArtifactKind::Html], ExistingFiles::Version);
    let path = dir.join(format!("{}.html", stem));
    commit_all(vec![Artifact {
        kind: ArtifactKind::Html,
        path: path.clone(),
        contents: content.as_bytes().to_vec(),
    }])?;

    log::info!("Saved page for {} to {}", category, path.display());
    Ok(path)
}

/// Writes one scheduled match as JSON under `match_data/` and a copy in the
/// `matches/` folder of each recognized team. All copies land or none does.
pub fn write_match(
    layout: &OutputLayout,
    scheduled: &ScheduledMatch,
    existing: ExistingFiles,
) -> Result<Vec<PathBuf>, WriteError> {
    let code = |t: &TeamName| match t.team() {
        Some(team) => team.code().to_string(),
        None => t.as_str().replace(' ', "_"),
    };
    let base = format!(
        "ipl_match_{}_vs_{}_{}",
        code(&scheduled.home),
        code(&scheduled.away),
        scheduled.date.format("%Y%m%d")
    );

    let mut dirs = vec![layout.match_dir()];
    dirs.extend(
        [&scheduled.home, &scheduled.away]
            .into_iter()
            .filter_map(TeamName::team)
            .map(|team| layout.team_folder(team, TeamFolder::Matches)),
    );
    dirs.dedup();

    let mut artifacts = Vec::new();
    for dir in &dirs {
        create_dir(dir)?;
        let stem = choose_stem(dir, &base, &[ArtifactKind::Json], existing);
        let path = dir.join(format!("{}.json", stem));
        let contents = serde_json::to_vec_pretty(scheduled).map_err(|e| WriteError::Artifact {
            artifact: ArtifactKind::Json,
            path: path.clone(),
            reason: e.to_string(),
        })?;
        artifacts.push(Artifact {
            kind: ArtifactKind::Json,
            path,
            contents,
        });
    }

    let files = commit_all(artifacts)?;
    for file in &files {
        log::info!("Wrote {} to {}", scheduled, file.display());
    }
    Ok(files)
}

const RUN_REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>IPL Stats Summary {{ date }}</title>
  <style>
    body { font-family: sans-serif; margin: 2em; }
    table { border-collapse: collapse; margin-bottom: 2em; }
    th, td { border: 1px solid #ccc; padding: 4px 8px; }
    th { background: #1f3c88; color: #fff; }
    .failed, .skipped { color: #b00020; }
    .partial { color: #b26a00; }
  </style>
</head>
<body>
  <h1>IPL Stats Summary</h1>
  <p>Captured {{ summary.captured_at }}</p>
  {% if leaders %}
  <h2>Leaders</h2>
  <ul>
  {% for c in leaders %}    <li>{{ c.title }}: {{ c.leader.player }} ({{ c.leader.team }}), {{ c.leader.value }} {{ c.leader.column }}</li>
  {% endfor %}</ul>
  {% endif %}
  <h2>Categories</h2>
  <table>
    <thead>
      <tr><th>Category</th><th>Status</th><th>Extracted</th><th>Normalized</th><th>Dropped</th><th>Flagged</th><th>Unrecognized teams</th><th>Written</th><th>Files</th></tr>
    </thead>
    <tbody>
{% for c in summary.categories %}      <tr class="{{ c.outcome }}">
        <td>{{ c.title }}{% if c.subject %} ({{ c.subject }}){% endif %}</td>
        <td>{{ c.outcome }}{% if c.error %}: {{ c.error }}{% endif %}</td>
        <td>{{ c.counts.extracted }}</td><td>{{ c.counts.normalized }}</td><td>{{ c.counts.dropped }}</td>
        <td>{{ c.counts.flagged_fields }}</td><td>{{ c.counts.unrecognized_teams }}</td><td>{{ c.counts.written }}</td>
        <td>{% for f in c.files %}{{ f }}<br>{% endfor %}</td>
      </tr>
{% endfor %}    </tbody>
  </table>
</body>
</html>
"#;

/// Writes `reports/ipl_stats_summary_<date>.json` and, if enabled, `.html`.
pub fn write_run_report(
    layout: &OutputLayout,
    summary: &RunSummary,
    options: &WriteOptions,
) -> Result<Vec<PathBuf>, WriteError> {
    let dir = layout.reports_dir();
    create_dir(&dir)?;

    let mut kinds = vec![ArtifactKind::Json];
    if options.html {
        kinds.push(ArtifactKind::Html);
    }
    let base = format!("ipl_stats_summary_{}", date_stamp(&summary.captured_at));
    let stem = choose_stem(&dir, &base, &kinds, options.existing);

    let leaders: Vec<_> = summary
        .categories
        .iter()
        .filter(|c| c.leader.is_some())
        .collect();

    let artifacts = kinds
        .iter()
        .map(|kind| {
            let path = dir.join(format!("{}.{}", stem, kind.extension()));
            let contents = match kind {
                ArtifactKind::Html => {
                    let mut context = tera::Context::new();
                    context.insert("date", &summary.captured_at.format("%Y-%m-%d").to_string());
                    context.insert("summary", summary);
                    context.insert("leaders", &leaders);
                    tera::Tera::one_off(RUN_REPORT_TEMPLATE, &context, true)
                        .map(String::into_bytes)
                        .map_err(|e| e.to_string())
                }
                _ => serde_json::to_vec_pretty(summary).map_err(|e| e.to_string()),
            }
            .map_err(|reason| WriteError::Artifact {
                artifact: *kind,
                path: path.clone(),
                reason,
            })?;
            Ok(Artifact {
                kind: *kind,
                path,
                contents,
            })
        })
        .collect::<Result<Vec<_>, WriteError>>()?;

    let files = commit_all(artifacts)?;
    for file in &files {
        log::info!("Wrote run report to {}", file.display());
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::assemble;
    use crate::types::{PlayerStatRecord, Record, StatCell, TeamRecord, Value};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn captured_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 18)
            .unwrap()
            .and_hms_opt(21, 4, 5)
            .unwrap()
    }

    fn wickets(rank: u32, player: &str, team: TeamName, wkts: Field<Value>) -> Record {
        Record::Player(PlayerStatRecord {
            category: StatCategory::BowlingMostWickets,
            rank,
            player: player.to_string(),
            team,
            stats: vec![
                StatCell {
                    column: "Mat",
                    value: Field::Present(Value::Int(14)),
                },
                StatCell {
                    column: "Inns",
                    value: Field::Absent,
                },
                StatCell {
                    column: "Wkts",
                    value: wkts,
                },
            ],
        })
    }

    fn wickets_dataset() -> Dataset {
        assemble(
            vec![
                wickets(
                    1,
                    "Prasidh Krishna",
                    TeamName::Canonical(Team::GujaratTitans),
                    Field::Present(Value::Int(25)),
                ),
                wickets(
                    2,
                    "Noor Ahmad",
                    TeamName::Canonical(Team::ChennaiSuperKings),
                    Field::Present(Value::Int(24)),
                ),
                wickets(
                    3,
                    "<b>Trent Boult</b>",
                    TeamName::Canonical(Team::MumbaiIndians),
                    Field::Flagged("22?".to_string()),
                ),
                wickets(
                    4,
                    "Unknown Bowler",
                    TeamName::Unrecognized("Deccan Chargers".to_string()),
                    Field::Present(Value::Int(1)),
                ),
            ],
            StatCategory::BowlingMostWickets,
            captured_at(),
        )
    }

    #[test]
    fn test_csv_round_trip_pairs() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());
        let dataset = wickets_dataset();

        let result = write_dataset(&dataset, &layout, &WriteOptions::default()).unwrap();
        assert_eq!(result.rows, 4);
        assert_eq!(result.files.len(), 3);

        let csv_path = dir
            .path()
            .join("bowling_stats/ipl_most_wickets_20250518.csv");
        assert_eq!(result.files[0], csv_path);

        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["Rank", "Player", "Team", "Mat", "Inns", "Wkts"]);

        let pairs: Vec<(String, String)> = reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[1].to_string(), r[5].to_string())
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Prasidh Krishna".to_string(), "25".to_string()),
                ("Noor Ahmad".to_string(), "24".to_string()),
                ("<b>Trent Boult</b>".to_string(), String::new()),
                ("Unknown Bowler".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_existing_files_get_shared_version_suffix() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());
        let dataset = wickets_dataset();

        write_dataset(&dataset, &layout, &WriteOptions::default()).unwrap();
        // Only the HTML of a later version exists; the next free stem is v3.
        fs::write(
            layout
                .category_dir(dataset.category)
                .join("ipl_most_wickets_20250518_v2.html"),
            "stale",
        )
        .unwrap();

        let second = write_dataset(&dataset, &layout, &WriteOptions::default()).unwrap();
        let names: Vec<String> = second
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "ipl_most_wickets_20250518_v3.csv",
                "ipl_most_wickets_20250518_v3.json",
                "ipl_most_wickets_20250518_v3.html",
            ]
        );
    }

    #[test]
    fn test_overwrite_replaces_files() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());
        let options = WriteOptions {
            existing: ExistingFiles::Overwrite,
            html: false,
        };

        let first = write_dataset(&wickets_dataset(), &layout, &options).unwrap();
        let second = write_dataset(&wickets_dataset(), &layout, &options).unwrap();
        assert_eq!(first.files, second.files);
        assert_eq!(second.files.len(), 2);
        assert!(
            fs::read_dir(layout.category_dir(StatCategory::BowlingMostWickets))
                .unwrap()
                .all(|e| !e.unwrap().file_name().to_string_lossy().ends_with(".tmp"))
        );
    }

    #[test]
    fn test_failed_artifact_leaves_nothing_behind() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());
        let target = layout.category_dir(StatCategory::BowlingMostWickets);
        fs::create_dir_all(target.join("ipl_most_wickets_20250518.json.tmp")).unwrap();

        let err = write_dataset(&wickets_dataset(), &layout, &WriteOptions::default()).unwrap_err();
        match err {
            WriteError::Artifact { artifact, path, .. } => {
                assert_eq!(artifact, ArtifactKind::Json);
                assert_eq!(path, target.join("ipl_most_wickets_20250518.json"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let left: Vec<String> = fs::read_dir(&target)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["ipl_most_wickets_20250518.json.tmp"]);
    }

    #[test]
    fn test_html_is_escaped() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());

        let result = write_dataset(&wickets_dataset(), &layout, &WriteOptions::default()).unwrap();
        let html = fs::read_to_string(&result.files[2]).unwrap();
        assert!(html.contains("&lt;b&gt;Trent Boult&lt;&#x2F;b&gt;"));
        assert!(!html.contains("<b>Trent"));
        assert!(html.contains("<th>Wkts</th>"));
    }

    #[test]
    fn test_per_team_split_skips_unrecognized() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());

        let files = write_per_team(&wickets_dataset(), &layout, &WriteOptions::default()).unwrap();
        assert_eq!(files.len(), 3);
        assert!(
            dir.path()
                .join("team_data/Gujarat_Titans/stats/ipl_most_wickets_20250518.csv")
                .exists()
        );
        assert!(!dir.path().join("team_data/Deccan_Chargers").exists());

        let points = assemble(
            vec![Record::Team(TeamRecord {
                team: TeamName::Canonical(Team::PunjabKings),
                played: Field::Present(14),
                won: Field::Absent,
                lost: Field::Absent,
                tied: Field::Absent,
                no_result: Field::Absent,
                points: Field::Present(19),
                net_run_rate: Field::Absent,
            })],
            StatCategory::PointsTable,
            captured_at(),
        );
        assert!(
            write_per_team(&points, &layout, &WriteOptions::default())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_per_team_split_is_all_or_nothing() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());
        // Mumbai's staging file cannot be created; Gujarat and Chennai are
        // staged before it and must not be committed.
        let mi = layout.team_folder(Team::MumbaiIndians, TeamFolder::Stats);
        fs::create_dir_all(mi.join("ipl_most_wickets_20250518.csv.tmp")).unwrap();

        let err = write_per_team(&wickets_dataset(), &layout, &WriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, WriteError::Artifact { .. }));

        for team in [Team::GujaratTitans, Team::ChennaiSuperKings] {
            let stats = layout.team_folder(team, TeamFolder::Stats);
            assert_eq!(fs::read_dir(&stats).unwrap().count(), 0, "{}", team);
        }
    }

    #[test]
    fn test_team_pages_land_in_team_folders() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());
        let squad = assemble(Vec::new(), StatCategory::TeamSquad, captured_at())
            .with_subject(Subject::Team(Team::MumbaiIndians));
        let news = assemble(Vec::new(), StatCategory::TeamNews, captured_at())
            .with_subject(Subject::Team(Team::PunjabKings));

        assert_eq!(
            layout.dataset_dir(&squad),
            dir.path().join("team_data/Mumbai_Indians/players")
        );
        assert_eq!(
            layout.dataset_dir(&news),
            dir.path().join("team_data/Punjab_Kings/news")
        );

        let result = write_dataset(&squad, &layout, &WriteOptions::default()).unwrap();
        assert_eq!(
            result.files[0],
            dir.path()
                .join("team_data/Mumbai_Indians/players/ipl_team_squad_MI_20250518.csv")
        );
    }

    #[test]
    fn test_debug_page_name() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());

        let path = save_debug_page(
            &layout,
            StatCategory::BowlingBestEconomy,
            None,
            "<html></html>",
            captured_at(),
        )
        .unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("debug_files/page_best_economy_rates_20250518_210405.html")
        );
        assert_eq!(fs::read_to_string(path).unwrap(), "<html></html>");
    }

    #[test]
    fn test_debug_page_names_subject_and_versions() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());
        let subject = Subject::Team(Team::KolkataKnightRiders);

        let first = save_debug_page(
            &layout,
            StatCategory::TeamNews,
            Some(&subject),
            "first",
            captured_at(),
        )
        .unwrap();
        let second = save_debug_page(
            &layout,
            StatCategory::TeamNews,
            Some(&subject),
            "second",
            captured_at(),
        )
        .unwrap();

        assert_eq!(
            first.file_name().unwrap(),
            "page_team_news_KKR_20250518_210405.html"
        );
        assert_eq!(
            second.file_name().unwrap(),
            "page_team_news_KKR_20250518_210405_v2.html"
        );
        assert_eq!(fs::read_to_string(first).unwrap(), "first");
    }

    #[test]
    fn test_match_is_copied_to_team_folders() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path());
        let scheduled = ScheduledMatch {
            match_label: "Match 12".to_string(),
            number: Some(12),
            match_day: "Day 10".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            day: "Mon".to_string(),
            start: "7:30 PM".to_string(),
            home: TeamName::Canonical(Team::MumbaiIndians),
            away: TeamName::Unrecognized("Deccan Chargers".to_string()),
            venue: "Mumbai".to_string(),
        };

        let files = write_match(&layout, &scheduled, ExistingFiles::Version).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path()
                    .join("match_data/ipl_match_MI_vs_Deccan_Chargers_20250331.json"),
                dir.path().join(
                    "team_data/Mumbai_Indians/matches/ipl_match_MI_vs_Deccan_Chargers_20250331.json"
                ),
            ]
        );
        assert!(!dir.path().join("team_data/Deccan_Chargers").exists());
    }

    #[test]
    fn test_layout_ensure_creates_team_dirs() {
        let dir = tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(dir.path().join("out"));
        layout.ensure().unwrap();

        assert!(layout.root().join("comparison_data/team_comparison").is_dir());
        assert!(layout.root().join("comparison_data/player_comparison").is_dir());
        for folder in TeamFolder::ALL {
            assert!(layout.team_folder(Team::SunrisersHyderabad, folder).is_dir());
        }
        assert!(layout.reports_dir().is_dir());
    }

    #[test]
    fn test_directory_failure_is_reported() {
        let dir = tempdir().expect("Failed to create temp dir");
        let blocker = dir.path().join("out");
        fs::write(&blocker, "not a directory").unwrap();

        let layout = OutputLayout::new(&blocker);
        let err = write_dataset(&wickets_dataset(), &layout, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, WriteError::CreateDir { .. }));
    }
}
