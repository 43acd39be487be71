//! Per-category page locators and column layouts.
//!
//! The pipeline has no per-category control flow: everything that differs
//! between the leaderboards, the points table, the comparisons and a team's
//! own pages lives in the [`CategorySpec`] table below.

use crate::types::{RecordKind, StatCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Derived from the row's position on the page, never read from a cell.
    Rank,
    Player,
    Team,
    Metric,
    /// Identifying free text such as a headline.
    Title,
    Count,
    Decimal,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Output header, also the key into a [`crate::parser::RawRow`].
    pub label: &'static str,
    /// Header texts accepted on the source page, compared case-insensitively.
    pub aliases: &'static [&'static str],
    pub kind: ColumnKind,
}

impl Column {
    pub fn is_extracted(&self) -> bool {
        self.kind != ColumnKind::Rank
    }

    pub fn is_identity(&self) -> bool {
        matches!(
            self.kind,
            ColumnKind::Player | ColumnKind::Team | ColumnKind::Metric | ColumnKind::Title
        )
    }

    pub fn matches_header(&self, header: &str) -> bool {
        let header = header.trim();
        header.eq_ignore_ascii_case(self.label)
            || self.aliases.iter().any(|a| header.eq_ignore_ascii_case(a))
    }
}

/// One cell read inside a repeated block: the text of the first element
/// matching `selector`, or its `attr` attribute when one is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCell {
    pub selector: &'static str,
    pub attr: Option<&'static str>,
}

impl BlockCell {
    pub const fn text(selector: &'static str) -> Self {
        Self {
            selector,
            attr: None,
        }
    }

    pub const fn attr(selector: &'static str, attr: &'static str) -> Self {
        Self {
            selector,
            attr: Some(attr),
        }
    }
}

/// How to find the rows of a category in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// First table matching `table` whose header row names every column in
    /// `identifying`. Cells are mapped to columns by header text.
    HeaderedTable {
        table: &'static str,
        identifying: &'static [&'static str],
    },
    /// First table matching `table`; cells are mapped to columns by position.
    PositionalTable { table: &'static str },
    /// Repeated blocks inside the first `container` holding any, one per row.
    /// `cells[i]` reads the i-th extracted column inside each block.
    Blocks {
        container: &'static str,
        block: &'static str,
        cells: &'static [BlockCell],
    },
    /// Two-column label/value rows. `fixed` pairs a label with the selector
    /// whose text is its value; every `item` then yields the text of its
    /// `label` and `value` children, or splits its own text at the first `:`.
    Facts {
        fixed: &'static [(&'static str, &'static str)],
        item: &'static str,
        label: &'static str,
        value: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    /// Keep the order rows appear on the page.
    Source,
    /// Points descending, net run rate descending.
    PointsThenNetRunRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePage {
    /// `<stats base>/<slug>/`
    StatsLeaderboard,
    /// `<iplt20 base>/points-table/men`
    PointsTable,
    /// `<iplt20 base>/comparison/show-team-stats?team_one=..&team_two=..`
    ComparisonApi,
    /// `<iplt20 base>/comparison/show-player-stats?player_one=..&player_two=..`
    PlayerComparisonApi,
    /// `<iplt20 base>/teams/<team slug>`
    TeamPage,
    /// `<news base>/about/<team slug>/`
    TeamProfile,
}

#[derive(Debug, Clone, Copy)]
pub struct CategorySpec {
    pub category: StatCategory,
    pub source: SourcePage,
    /// Tried in order; the first one that finds its structure wins.
    pub locators: &'static [Locator],
    pub columns: &'static [Column],
    pub ordering: Ordering,
    /// Column whose value the run report quotes for the leader.
    pub headline: Option<&'static str>,
}

impl CategorySpec {
    pub fn labels(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.label).collect()
    }

    pub fn extracted_columns(&self) -> impl Iterator<Item = &'static Column> {
        self.columns.iter().filter(|c| c.is_extracted())
    }

    pub fn column(&self, label: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.label == label)
    }

    pub fn kind(&self) -> RecordKind {
        self.category.kind()
    }
}

const RANK: Column = Column {
    label: "Rank",
    aliases: &[],
    kind: ColumnKind::Rank,
};
const PLAYER: Column = Column {
    label: "Player",
    aliases: &["Batter", "Batsman", "Bowler", "Name", "Player Name"],
    kind: ColumnKind::Player,
};
const TEAM: Column = Column {
    label: "Team",
    aliases: &["Teams", "Franchise"],
    kind: ColumnKind::Team,
};
const MATCHES: Column = Column {
    label: "Mat",
    aliases: &["M", "Matches", "Mts"],
    kind: ColumnKind::Count,
};
const INNINGS: Column = Column {
    label: "Inns",
    aliases: &["Inn", "Innings"],
    kind: ColumnKind::Count,
};
const RUNS: Column = Column {
    label: "Runs",
    aliases: &["R"],
    kind: ColumnKind::Count,
};
const HIGHEST: Column = Column {
    label: "HS",
    aliases: &["Highest", "Highest Score"],
    kind: ColumnKind::Text,
};
const BAT_AVERAGE: Column = Column {
    label: "Avg",
    aliases: &["Average", "Ave"],
    kind: ColumnKind::Decimal,
};
const BAT_STRIKE_RATE: Column = Column {
    label: "SR",
    aliases: &["Strike Rate", "S/R"],
    kind: ColumnKind::Decimal,
};
const HUNDREDS: Column = Column {
    label: "100s",
    aliases: &["100", "Hundreds"],
    kind: ColumnKind::Count,
};
const FIFTIES: Column = Column {
    label: "50s",
    aliases: &["50", "Fifties"],
    kind: ColumnKind::Count,
};
const FOURS: Column = Column {
    label: "4s",
    aliases: &["Fours"],
    kind: ColumnKind::Count,
};
const SIXES: Column = Column {
    label: "6s",
    aliases: &["Sixes"],
    kind: ColumnKind::Count,
};
const WICKETS: Column = Column {
    label: "Wkts",
    aliases: &["W", "Wickets", "Wkt"],
    kind: ColumnKind::Count,
};
const OVERS: Column = Column {
    label: "Overs",
    aliases: &["Ov", "O"],
    kind: ColumnKind::Decimal,
};
const ECONOMY: Column = Column {
    label: "Econ",
    aliases: &["Economy", "Econ Rate", "ER"],
    kind: ColumnKind::Decimal,
};
const BOWL_AVERAGE: Column = Column {
    label: "Avg",
    aliases: &["Average", "Ave"],
    kind: ColumnKind::Decimal,
};
const BOWL_STRIKE_RATE: Column = Column {
    label: "SR",
    aliases: &["Strike Rate", "S/R"],
    kind: ColumnKind::Decimal,
};
const MAIDENS: Column = Column {
    label: "Maidens",
    aliases: &["Mdns", "Md"],
    kind: ColumnKind::Count,
};

const POINTS_COLUMNS: &[Column] = &[
    Column {
        label: "Team",
        aliases: &["Teams"],
        kind: ColumnKind::Team,
    },
    Column {
        label: "Played",
        aliases: &["P", "M", "Mat", "Pld", "Matches"],
        kind: ColumnKind::Count,
    },
    Column {
        label: "Won",
        aliases: &["W", "Wins"],
        kind: ColumnKind::Count,
    },
    Column {
        label: "Lost",
        aliases: &["L", "Losses"],
        kind: ColumnKind::Count,
    },
    Column {
        label: "Tied",
        aliases: &["T", "Tie", "Ties"],
        kind: ColumnKind::Count,
    },
    Column {
        label: "No Result",
        aliases: &["NR", "N/R"],
        kind: ColumnKind::Count,
    },
    Column {
        label: "Points",
        aliases: &["Pts", "Pt"],
        kind: ColumnKind::Count,
    },
    Column {
        label: "NRR",
        aliases: &["Net RR", "Net Run Rate"],
        kind: ColumnKind::Decimal,
    },
];

const COMPARISON_COLUMNS: &[Column] = &[
    Column {
        label: "Metric",
        aliases: &[],
        kind: ColumnKind::Metric,
    },
    Column {
        label: "Team 1",
        aliases: &[],
        kind: ColumnKind::Text,
    },
    Column {
        label: "Team 2",
        aliases: &[],
        kind: ColumnKind::Text,
    },
];

const PLAYER_COMPARISON_COLUMNS: &[Column] = &[
    Column {
        label: "Metric",
        aliases: &[],
        kind: ColumnKind::Metric,
    },
    Column {
        label: "Player 1",
        aliases: &[],
        kind: ColumnKind::Text,
    },
    Column {
        label: "Player 2",
        aliases: &[],
        kind: ColumnKind::Text,
    },
];

const SQUAD_COLUMNS: &[Column] = &[
    Column {
        label: "Player",
        aliases: &[],
        kind: ColumnKind::Player,
    },
    Column {
        label: "Role",
        aliases: &[],
        kind: ColumnKind::Text,
    },
    Column {
        label: "Profile",
        aliases: &[],
        kind: ColumnKind::Text,
    },
    Column {
        label: "Image",
        aliases: &[],
        kind: ColumnKind::Text,
    },
];

const OVERVIEW_COLUMNS: &[Column] = &[
    Column {
        label: "Field",
        aliases: &[],
        kind: ColumnKind::Metric,
    },
    Column {
        label: "Value",
        aliases: &[],
        kind: ColumnKind::Text,
    },
];

const NEWS_COLUMNS: &[Column] = &[
    Column {
        label: "Title",
        aliases: &[],
        kind: ColumnKind::Title,
    },
    Column {
        label: "Link",
        aliases: &[],
        kind: ColumnKind::Text,
    },
    Column {
        label: "Published",
        aliases: &[],
        kind: ColumnKind::Text,
    },
    Column {
        label: "Summary",
        aliases: &[],
        kind: ColumnKind::Text,
    },
];

const fn leaderboard(identifying: &'static [&'static str]) -> [Locator; 1] {
    [Locator::HeaderedTable {
        table: "table",
        identifying,
    }]
}

const MOST_RUNS_LOCATORS: [Locator; 1] = leaderboard(&["Player", "Runs"]);
const HUNDREDS_LOCATORS: [Locator; 1] = leaderboard(&["Player", "100s"]);
const FIFTIES_LOCATORS: [Locator; 1] = leaderboard(&["Player", "50s"]);
const SIXES_LOCATORS: [Locator; 1] = leaderboard(&["Player", "6s"]);
const FOURS_LOCATORS: [Locator; 1] = leaderboard(&["Player", "4s"]);
const WICKETS_LOCATORS: [Locator; 1] = leaderboard(&["Player", "Wkts"]);
const ECONOMY_LOCATORS: [Locator; 1] = leaderboard(&["Player", "Overs"]);
const BOWL_AVERAGE_LOCATORS: [Locator; 1] = leaderboard(&["Player", "Wkts"]);
const BOWL_SR_LOCATORS: [Locator; 1] = leaderboard(&["Player", "Wkts"]);
const MAIDENS_LOCATORS: [Locator; 1] = leaderboard(&["Player", "Maidens"]);

const POINTS_LOCATORS: [Locator; 2] = [
    Locator::HeaderedTable {
        table: "table.ih-td-tab",
        identifying: &["Team", "Points"],
    },
    Locator::HeaderedTable {
        table: "table",
        identifying: &["Team", "Played", "Points"],
    },
];

const COMPARISON_LOCATORS: [Locator; 2] = [
    Locator::PositionalTable {
        table: "table.ih-comparison-table",
    },
    Locator::Blocks {
        container: "#pills-overall",
        block: ".section2",
        cells: &[
            BlockCell::text(".section2_text"),
            BlockCell::text(".section2_progressBarPointleft"),
            BlockCell::text(".section2_progressBarPointright"),
        ],
    },
];

const SQUAD_LOCATORS: [Locator; 1] = [Locator::Blocks {
    container: "body",
    block: ".ih-pcard1",
    cells: &[
        BlockCell::text(".ih-p-name h2, .ih-p-cont-in h3"),
        BlockCell::text(".d-block.w-100.text-center"),
        BlockCell::attr("a[href]", "href"),
        BlockCell::attr("img.lazyload[data-src]", "data-src"),
    ],
}];

const OVERVIEW_LOCATORS: [Locator; 2] = [
    Locator::Facts {
        fixed: &[("Description", "div.ie-backgroundstory")],
        item: "div.team-stat, div.stat-block, li.stat-item, div.test-cricket, .ie-team-info li",
        label: ".label, .name, .cricket-format, dt, strong",
        value: ".value, .number, .number-of-matches, dd",
    },
    Locator::PositionalTable {
        table: "table.team-stats, table.stats-table",
    },
];

const NEWS_LOCATORS: [Locator; 1] = [Locator::Blocks {
    container: "body",
    block: "article, .news-item",
    cells: &[
        BlockCell::text("h2, h3, h4"),
        BlockCell::attr("a[href]", "href"),
        BlockCell::text("time, .date"),
        BlockCell::text("p"),
    ],
}];

static SPECS: [CategorySpec; 16] = [
    CategorySpec {
        category: StatCategory::BattingMostRuns,
        source: SourcePage::StatsLeaderboard,
        locators: &MOST_RUNS_LOCATORS,
        columns: &[
            RANK, PLAYER, TEAM, MATCHES, INNINGS, RUNS, HIGHEST, BAT_AVERAGE, BAT_STRIKE_RATE,
            HUNDREDS, FIFTIES, FOURS, SIXES,
        ],
        ordering: Ordering::Source,
        headline: Some("Runs"),
    },
    CategorySpec {
        category: StatCategory::BattingMostHundreds,
        source: SourcePage::StatsLeaderboard,
        locators: &HUNDREDS_LOCATORS,
        columns: &[RANK, PLAYER, TEAM, MATCHES, INNINGS, HUNDREDS],
        ordering: Ordering::Source,
        headline: Some("100s"),
    },
    CategorySpec {
        category: StatCategory::BattingMostFifties,
        source: SourcePage::StatsLeaderboard,
        locators: &FIFTIES_LOCATORS,
        columns: &[RANK, PLAYER, TEAM, MATCHES, INNINGS, FIFTIES],
        ordering: Ordering::Source,
        headline: Some("50s"),
    },
    CategorySpec {
        category: StatCategory::BattingMostSixes,
        source: SourcePage::StatsLeaderboard,
        locators: &SIXES_LOCATORS,
        columns: &[RANK, PLAYER, TEAM, MATCHES, INNINGS, SIXES],
        ordering: Ordering::Source,
        headline: Some("6s"),
    },
    CategorySpec {
        category: StatCategory::BattingMostFours,
        source: SourcePage::StatsLeaderboard,
        locators: &FOURS_LOCATORS,
        columns: &[RANK, PLAYER, TEAM, MATCHES, INNINGS, FOURS],
        ordering: Ordering::Source,
        headline: Some("4s"),
    },
    CategorySpec {
        category: StatCategory::BowlingMostWickets,
        source: SourcePage::StatsLeaderboard,
        locators: &WICKETS_LOCATORS,
        columns: &[RANK, PLAYER, TEAM, MATCHES, INNINGS, WICKETS],
        ordering: Ordering::Source,
        headline: Some("Wkts"),
    },
    CategorySpec {
        category: StatCategory::BowlingBestEconomy,
        source: SourcePage::StatsLeaderboard,
        locators: &ECONOMY_LOCATORS,
        columns: &[RANK, PLAYER, TEAM, MATCHES, INNINGS, OVERS, ECONOMY],
        ordering: Ordering::Source,
        headline: Some("Econ"),
    },
    CategorySpec {
        category: StatCategory::BowlingBestAverage,
        source: SourcePage::StatsLeaderboard,
        locators: &BOWL_AVERAGE_LOCATORS,
        columns: &[RANK, PLAYER, TEAM, MATCHES, INNINGS, WICKETS, BOWL_AVERAGE],
        ordering: Ordering::Source,
        headline: Some("Avg"),
    },
    CategorySpec {
        category: StatCategory::BowlingBestStrikeRate,
        source: SourcePage::StatsLeaderboard,
        locators: &BOWL_SR_LOCATORS,
        columns: &[RANK, PLAYER, TEAM, MATCHES, INNINGS, WICKETS, BOWL_STRIKE_RATE],
        ordering: Ordering::Source,
        headline: Some("SR"),
    },
    CategorySpec {
        category: StatCategory::BowlingMostMaidens,
        source: SourcePage::StatsLeaderboard,
        locators: &MAIDENS_LOCATORS,
        columns: &[RANK, PLAYER, TEAM, MATCHES, INNINGS, MAIDENS],
        ordering: Ordering::Source,
        headline: Some("Maidens"),
    },
    CategorySpec {
        category: StatCategory::PointsTable,
        source: SourcePage::PointsTable,
        locators: &POINTS_LOCATORS,
        columns: POINTS_COLUMNS,
        ordering: Ordering::PointsThenNetRunRate,
        headline: None,
    },
    CategorySpec {
        category: StatCategory::TeamComparison,
        source: SourcePage::ComparisonApi,
        locators: &COMPARISON_LOCATORS,
        columns: COMPARISON_COLUMNS,
        ordering: Ordering::Source,
        headline: None,
    },
    CategorySpec {
        category: StatCategory::PlayerComparison,
        source: SourcePage::PlayerComparisonApi,
        locators: &COMPARISON_LOCATORS,
        columns: PLAYER_COMPARISON_COLUMNS,
        ordering: Ordering::Source,
        headline: None,
    },
    CategorySpec {
        category: StatCategory::TeamSquad,
        source: SourcePage::TeamPage,
        locators: &SQUAD_LOCATORS,
        columns: SQUAD_COLUMNS,
        ordering: Ordering::Source,
        headline: None,
    },
    CategorySpec {
        category: StatCategory::TeamOverview,
        source: SourcePage::TeamProfile,
        locators: &OVERVIEW_LOCATORS,
        columns: OVERVIEW_COLUMNS,
        ordering: Ordering::Source,
        headline: None,
    },
    CategorySpec {
        category: StatCategory::TeamNews,
        source: SourcePage::TeamProfile,
        locators: &NEWS_LOCATORS,
        columns: NEWS_COLUMNS,
        ordering: Ordering::Source,
        headline: None,
    },
];

pub fn spec(category: StatCategory) -> &'static CategorySpec {
    SPECS
        .iter()
        .find(|s| s.category == category)
        .unwrap_or_else(|| unreachable!("every category has a spec"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_a_spec() {
        for category in StatCategory::ALL {
            assert_eq!(spec(category).category, category);
        }
    }

    #[test]
    fn test_player_columns_start_with_identity() {
        for category in StatCategory::leaderboards() {
            let labels = spec(category).labels();
            assert_eq!(&labels[..3], &["Rank", "Player", "Team"], "{}", category);
        }
    }

    #[test]
    fn test_identifying_labels_are_declared_columns() {
        for s in SPECS.iter() {
            for locator in s.locators {
                if let Locator::HeaderedTable { identifying, .. } = locator {
                    for label in *identifying {
                        assert!(
                            s.column(label).is_some(),
                            "{} locator names unknown column {}",
                            s.category,
                            label
                        );
                    }
                }
                if let Locator::Blocks { cells, .. } = locator {
                    assert_eq!(cells.len(), s.extracted_columns().count(), "{}", s.category);
                }
                if let Locator::Facts { .. } = locator {
                    assert_eq!(s.extracted_columns().count(), 2, "{}", s.category);
                }
            }
        }
    }

    #[test]
    fn test_keyed_categories_lead_with_identity() {
        for category in StatCategory::team_pages() {
            let first = spec(category).columns[0];
            assert!(first.is_identity(), "{}", category);
            assert_eq!(
                spec(category).columns.iter().filter(|c| c.is_identity()).count(),
                1,
                "{}",
                category
            );
        }
    }

    #[test]
    fn test_header_matching_is_case_insensitive() {
        assert!(ECONOMY.matches_header("ECONOMY"));
        assert!(ECONOMY.matches_header(" econ "));
        assert!(!ECONOMY.matches_header("Overs"));
        assert!(spec(StatCategory::PointsTable)
            .column("No Result")
            .unwrap()
            .matches_header("NR"));
    }
}
