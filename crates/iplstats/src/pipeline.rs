use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::dataset::{Dataset, Subject, assemble};
use crate::normalize::normalize;
use crate::parser::{ExtractionError, extract};
use crate::report::{
    ExistingFiles, OutputLayout, WriteError, WriteOptions, save_debug_page, write_dataset,
    write_per_team, write_run_report,
};
use crate::schema::{self, SourcePage};
use crate::scraper::{PageSource, ScraperError};
use crate::types::{Field, Record, StatCategory, Team};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Scraper(#[from] ScraperError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("{0} needs a team or a pair to compare")]
    NeedsSubject(StatCategory),
    #[error("Cannot compare {0} with itself")]
    SameTeams(Team),
    #[error("Cannot compare player {0} with themselves")]
    SamePlayers(String),
    #[error("Player IDs are numeric, got '{0}'")]
    InvalidPlayer(String),
}

/// Base URLs of the sites pages are fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrls {
    pub stats_base: String,
    pub iplt20_base: String,
    pub news_base: String,
}

impl Default for SourceUrls {
    fn default() -> Self {
        Self {
            stats_base: crate::STATS_BASE_URL.to_string(),
            iplt20_base: crate::IPLT20_BASE_URL.to_string(),
            news_base: crate::NEWS_BASE_URL.to_string(),
        }
    }
}

impl SourceUrls {
    /// Page URL for a site-wide category. `None` for categories that need a
    /// team or a pair.
    pub fn url_for(&self, category: StatCategory) -> Option<String> {
        match schema::spec(category).source {
            SourcePage::StatsLeaderboard => Some(format!(
                "{}/{}/",
                self.stats_base.trim_end_matches('/'),
                category.slug()
            )),
            SourcePage::PointsTable => Some(format!(
                "{}/points-table/men",
                self.iplt20_base.trim_end_matches('/')
            )),
            SourcePage::ComparisonApi
            | SourcePage::PlayerComparisonApi
            | SourcePage::TeamPage
            | SourcePage::TeamProfile => None,
        }
    }

    /// Page URL of one of a franchise's own pages.
    pub fn team_url(&self, category: StatCategory, team: Team) -> Option<String> {
        match schema::spec(category).source {
            SourcePage::TeamPage => Some(format!(
                "{}/teams/{}",
                self.iplt20_base.trim_end_matches('/'),
                team.site_slug()
            )),
            SourcePage::TeamProfile => Some(format!(
                "{}/about/{}/",
                self.news_base.trim_end_matches('/'),
                team.site_slug()
            )),
            _ => None,
        }
    }

    pub fn comparison_url(&self, team_1: Team, team_2: Team) -> String {
        format!(
            "{}/comparison/show-team-stats?team_one={}&team_two={}",
            self.iplt20_base.trim_end_matches('/'),
            team_1.code(),
            team_2.code()
        )
    }

    pub fn player_comparison_url(&self, player_1: &str, player_2: &str) -> String {
        format!(
            "{}/comparison/show-player-stats?player_one={}&player_two={}",
            self.iplt20_base.trim_end_matches('/'),
            player_1,
            player_2
        )
    }
}

/// Everything a run needs, built once by the caller.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub captured_at: NaiveDateTime,
    pub timeout: Duration,
    pub existing_files: ExistingFiles,
    pub write_html: bool,
    pub save_debug_pages: bool,
    pub per_team: bool,
    pub sources: SourceUrls,
}

impl RunConfig {
    pub fn new(output_dir: impl Into<PathBuf>, captured_at: NaiveDateTime) -> Self {
        Self {
            output_dir: output_dir.into(),
            captured_at,
            timeout: Duration::from_secs(30),
            existing_files: ExistingFiles::default(),
            write_html: true,
            save_debug_pages: true,
            per_team: false,
            sources: SourceUrls::default(),
        }
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_dir)
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            existing: self.existing_files,
            html: self.write_html,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub extracted: usize,
    pub normalized: usize,
    pub dropped: usize,
    pub flagged_fields: usize,
    pub unrecognized_teams: usize,
    pub written: usize,
}

impl std::ops::AddAssign for RowCounts {
    fn add_assign(&mut self, other: Self) {
        self.extracted += other.extracted;
        self.normalized += other.normalized;
        self.dropped += other.dropped;
        self.flagged_fields += other.flagged_fields;
        self.unrecognized_teams += other.unrecognized_teams;
        self.written += other.written;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Succeeded,
    /// The page could not be fetched.
    Skipped,
    /// The page was fetched but nothing was written.
    Failed,
    /// The dataset was written; the per-team split was rolled back.
    Partial,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Succeeded => write!(f, "succeeded"),
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::Partial => write!(f, "partial"),
        }
    }
}

/// Top row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leader {
    pub player: String,
    pub team: String,
    pub column: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReport {
    pub category: StatCategory,
    pub title: String,
    pub subject: Option<String>,
    pub outcome: Outcome,
    pub counts: RowCounts,
    pub files: Vec<PathBuf>,
    pub debug_page: Option<PathBuf>,
    pub error: Option<String>,
    pub leader: Option<Leader>,
}

impl CategoryReport {
    fn new(category: StatCategory, subject: Option<String>) -> Self {
        Self {
            category,
            title: category.to_string(),
            subject,
            outcome: Outcome::Succeeded,
            counts: RowCounts::default(),
            files: Vec::new(),
            debug_page: None,
            error: None,
            leader: None,
        }
    }

    fn with_outcome(mut self, outcome: Outcome, error: impl ToString) -> Self {
        self.outcome = outcome;
        self.error = Some(error.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub captured_at: NaiveDateTime,
    pub categories: Vec<CategoryReport>,
}

impl RunSummary {
    pub fn new(captured_at: NaiveDateTime) -> Self {
        Self {
            captured_at,
            categories: Vec::new(),
        }
    }

    pub fn push(&mut self, report: CategoryReport) {
        self.categories.push(report);
    }

    pub fn failures(&self) -> impl Iterator<Item = &CategoryReport> {
        self.categories.iter().filter(|c| !c.is_success())
    }

    pub fn totals(&self) -> RowCounts {
        let mut totals = RowCounts::default();
        for c in &self.categories {
            totals += c.counts;
        }
        totals
    }

    /// 0 when every attempted category succeeded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.failures().next().is_none() { 0 } else { 1 }
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nRun summary ({}):", self.captured_at.format("%Y-%m-%d %H:%M:%S"))?;
        for c in &self.categories {
            let name = match &c.subject {
                Some(subject) => format!("{} ({})", c.title, subject),
                None => c.title.clone(),
            };
            writeln!(
                f,
                "  {:<34} {:<10} extracted {:>3}, normalized {:>3}, dropped {:>2}, flagged {:>2}, unrecognized {:>2}, written {:>3}",
                name,
                c.outcome,
                c.counts.extracted,
                c.counts.normalized,
                c.counts.dropped,
                c.counts.flagged_fields,
                c.counts.unrecognized_teams,
                c.counts.written
            )?;
            if let Some(leader) = &c.leader {
                writeln!(
                    f,
                    "  {:<34} leader: {} ({}) {} {}",
                    "", leader.player, leader.team, leader.value, leader.column
                )?;
            }
        }

        let failed: Vec<_> = self.failures().collect();
        if failed.is_empty() {
            writeln!(f, "  All {} categories succeeded", self.categories.len())
        } else {
            writeln!(f, "  {} of {} categories did not complete:", failed.len(), self.categories.len())?;
            for c in failed {
                writeln!(
                    f,
                    "    {} [{}]: {}",
                    c.title,
                    c.outcome,
                    c.error.as_deref().unwrap_or("unknown error")
                )?;
            }
            Ok(())
        }
    }
}

/// Extracts, normalizes and assembles one page without touching the disk.
///
/// Every extracted row is accounted for: it is either a record of the
/// returned dataset or counted as dropped.
pub fn build_dataset(
    body: &str,
    category: StatCategory,
    captured_at: NaiveDateTime,
) -> Result<(Dataset, RowCounts), ExtractionError> {
    let rows = extract(body, category)?;
    let mut counts = RowCounts {
        extracted: rows.len(),
        ..RowCounts::default()
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        match normalize(row, category) {
            Ok(record) => {
                let flagged = record.flagged_fields();
                if flagged > 0 {
                    log::warn!(
                        "{}: row {} has {} unreadable field(s)",
                        category,
                        row.position,
                        flagged
                    );
                    counts.flagged_fields += flagged;
                }
                if let Some(team) = record.team()
                    && !team.is_recognized()
                {
                    log::warn!("{}: unrecognized team '{}' in row {}", category, team, row.position);
                    counts.unrecognized_teams += 1;
                }
                records.push(record);
            }
            Err(e) => {
                log::warn!("{}: dropping row {}: {}", category, row.position, e);
                counts.dropped += 1;
            }
        }
    }
    counts.normalized = records.len();

    Ok((assemble(records, category, captured_at), counts))
}

fn leader(dataset: &Dataset) -> Option<Leader> {
    let column = schema::spec(dataset.category).headline?;
    match dataset.records().first()? {
        Record::Player(r) => Some(Leader {
            player: r.player.clone(),
            team: r.team.to_string(),
            column,
            value: r.stat(column).map(Field::to_cell).unwrap_or_default(),
        }),
        _ => None,
    }
}

/// Runs categories one at a time against a [`PageSource`].
pub struct Pipeline<'a, S> {
    source: &'a S,
    config: &'a RunConfig,
    layout: OutputLayout,
}

impl<'a, S: PageSource> Pipeline<'a, S> {
    pub fn new(source: &'a S, config: &'a RunConfig) -> Self {
        Self {
            source,
            config,
            layout: config.layout(),
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub async fn run_category(&self, category: StatCategory) -> CategoryReport {
        let Some(url) = self.config.sources.url_for(category) else {
            let e = PipelineError::NeedsSubject(category);
            log::error!("{}", e);
            return CategoryReport::new(category, None).with_outcome(Outcome::Failed, e);
        };
        self.fetch_and_process(category, &url, None).await
    }

    pub async fn run_comparison(&self, team_1: Team, team_2: Team) -> CategoryReport {
        let category = StatCategory::TeamComparison;
        let subject = Subject::Pair(team_1.code().to_string(), team_2.code().to_string());

        if team_1 == team_2 {
            let e = PipelineError::SameTeams(team_1);
            log::error!("{}: {}", category, e);
            return CategoryReport::new(category, Some(subject.to_string()))
                .with_outcome(Outcome::Failed, e);
        }

        let url = self.config.sources.comparison_url(team_1, team_2);
        self.fetch_and_process(category, &url, Some(subject)).await
    }

    /// Compares two players by their numeric site IDs.
    pub async fn run_player_comparison(&self, player_1: &str, player_2: &str) -> CategoryReport {
        let category = StatCategory::PlayerComparison;
        let (player_1, player_2) = (player_1.trim(), player_2.trim());
        let subject = Subject::Pair(player_1.to_string(), player_2.to_string());

        let invalid = [player_1, player_2]
            .into_iter()
            .find(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()));
        let error = match invalid {
            Some(p) => Some(PipelineError::InvalidPlayer(p.to_string())),
            None if player_1 == player_2 => Some(PipelineError::SamePlayers(player_1.to_string())),
            None => None,
        };
        if let Some(e) = error {
            log::error!("{}: {}", category, e);
            return CategoryReport::new(category, Some(subject.to_string()))
                .with_outcome(Outcome::Failed, e);
        }

        let url = self
            .config
            .sources
            .player_comparison_url(player_1, player_2);
        self.fetch_and_process(category, &url, Some(subject)).await
    }

    /// Squad, overview and news of one franchise. Each distinct page is
    /// fetched once even when several categories read it.
    pub async fn run_team(&self, team: Team) -> Vec<CategoryReport> {
        let mut pages: HashMap<String, Result<String, String>> = HashMap::new();
        let mut reports = Vec::new();

        for category in StatCategory::team_pages() {
            let subject = Subject::Team(team);
            let Some(url) = self.config.sources.team_url(category, team) else {
                let e = PipelineError::NeedsSubject(category);
                log::error!("{}", e);
                reports.push(
                    CategoryReport::new(category, Some(subject.to_string()))
                        .with_outcome(Outcome::Failed, e),
                );
                continue;
            };

            if !pages.contains_key(&url) {
                let fetched = self
                    .source
                    .fetch_page(&url)
                    .await
                    .map_err(|e| PipelineError::from(e).to_string());
                pages.insert(url.clone(), fetched);
            }

            let report = match pages.get(&url) {
                Some(Ok(body)) => self.process_page(category, body, Some(subject)),
                Some(Err(e)) => {
                    log::error!("{} ({}): skipping, {}", category, team, e);
                    CategoryReport::new(category, Some(subject.to_string()))
                        .with_outcome(Outcome::Skipped, e)
                }
                None => continue,
            };
            reports.push(report);
        }
        reports
    }

    /// Runs `categories` in order. A failure in one never stops the next.
    pub async fn run_all(&self, categories: &[StatCategory]) -> RunSummary {
        let mut summary = RunSummary::new(self.config.captured_at);
        for category in categories {
            summary.push(self.run_category(*category).await);
        }
        summary
    }

    async fn fetch_and_process(
        &self,
        category: StatCategory,
        url: &str,
        subject: Option<Subject>,
    ) -> CategoryReport {
        match self.source.fetch_page(url).await {
            Ok(body) => self.process_page(category, &body, subject),
            Err(e) => {
                log::error!("{}: skipping, {}", category, e);
                CategoryReport::new(category, subject.map(|s| s.to_string()))
                    .with_outcome(Outcome::Skipped, PipelineError::from(e))
            }
        }
    }

    /// Everything after the fetch: keep the page if asked to, then extract,
    /// normalize, assemble and write.
    pub fn process_page(
        &self,
        category: StatCategory,
        body: &str,
        subject: Option<Subject>,
    ) -> CategoryReport {
        let mut report = CategoryReport::new(category, subject.as_ref().map(Subject::to_string));

        if self.config.save_debug_pages {
            match save_debug_page(
                &self.layout,
                category,
                subject.as_ref(),
                body,
                self.config.captured_at,
            ) {
                Ok(path) => report.debug_page = Some(path),
                Err(e) => log::error!("{}: could not save page: {}", category, e),
            }
        }

        let (dataset, counts) = match build_dataset(body, category, self.config.captured_at) {
            Ok(built) => built,
            Err(e) => {
                log::error!("{}", e);
                return report.with_outcome(Outcome::Failed, PipelineError::from(e));
            }
        };
        report.counts = counts;

        let dataset = match subject {
            Some(subject) => dataset.with_subject(subject),
            None => dataset,
        };

        if dataset.is_empty() {
            log::warn!("{}: page has no rows today", category);
        }

        let options = self.config.write_options();
        match write_dataset(&dataset, &self.layout, &options) {
            Ok(result) => {
                report.counts.written = result.rows;
                report.files = result.files;
            }
            Err(e) => {
                log::error!("{}: {}", category, e);
                return report.with_outcome(Outcome::Failed, PipelineError::from(e));
            }
        }
        report.leader = leader(&dataset);

        if self.config.per_team {
            match write_per_team(&dataset, &self.layout, &options) {
                Ok(files) => report.files.extend(files),
                Err(e) => {
                    log::error!("{}: per-team split rolled back: {}", category, e);
                    return report.with_outcome(Outcome::Partial, PipelineError::from(e));
                }
            }
        }

        report
    }

    /// Writes the run report for `summary` under `reports/`.
    pub fn write_report(&self, summary: &RunSummary) -> Result<Vec<PathBuf>, WriteError> {
        write_run_report(&self.layout, summary, &self.config.write_options())
    }
}
