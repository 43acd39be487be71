use std::borrow::Cow;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;

use crate::normalize::normalize_whitespace;
use crate::schema::{self, BlockCell, CategorySpec, ColumnKind, Locator};
use crate::types::{RecordKind, StatCategory};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionReason {
    #[error("structure-not-found")]
    StructureNotFound,
    #[error("invalid locator '{0}'")]
    InvalidLocator(String),
    #[error("unreadable payload: {0}")]
    Payload(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to extract {category}: {reason}")]
pub struct ExtractionError {
    pub category: StatCategory,
    pub reason: ExtractionReason,
}

impl ExtractionError {
    fn new(category: StatCategory, reason: ExtractionReason) -> Self {
        Self { category, reason }
    }
}

/// Raw cell text of one data row, keyed by column label.
///
/// A `None` cell is an explicit absent marker: the structure was found but
/// this row carried nothing for the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based position among the data rows of the page.
    pub position: u32,
    cells: Vec<(&'static str, Option<String>)>,
}

impl RawRow {
    pub fn new(position: u32, cells: Vec<(&'static str, Option<String>)>) -> Self {
        Self { position, cells }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(l, _)| *l == label)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn cells(&self) -> &[(&'static str, Option<String>)] {
        &self.cells
    }
}

#[derive(Debug, Deserialize)]
struct ComparisonPayload {
    #[serde(default)]
    status: Option<bool>,
    #[serde(default)]
    html: Option<String>,
}

static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("invalid selector: tr"));

static TEAM_IN_CELL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".team, .team-name, .player-team")
        .expect("invalid selector: .team, .team-name, .player-team")
});

fn elem_text(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn parse_selector(selector: &str, category: StatCategory) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|_| {
        ExtractionError::new(
            category,
            ExtractionReason::InvalidLocator(selector.to_string()),
        )
    })
}

fn row_cells(row: ElementRef) -> Vec<ElementRef> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect()
}

fn is_data_row(row: ElementRef) -> bool {
    row.children()
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().name() == "td")
}

/// Splits a leaderboard cell that prints the team under the player name.
///
/// A child marked as the team wins; every other text node is the player.
/// Without a marker the last text node is taken as the team.
fn split_player_cell(cell: ElementRef) -> (Option<String>, Option<String>) {
    if let Some(team) = cell.select(&TEAM_IN_CELL).next() {
        let player = cell
            .descendants()
            .filter(|node| !node.ancestors().any(|a| a.id() == team.id()))
            .filter_map(|node| match node.value() {
                Node::Text(text) => Some(&**text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");
        return (non_empty(normalize_whitespace(&player)), non_empty(elem_text(team)));
    }

    let mut parts: Vec<String> = cell
        .text()
        .map(normalize_whitespace)
        .filter(|t| !t.is_empty())
        .collect();
    if parts.len() < 2 {
        return (parts.pop(), None);
    }
    let team = parts.pop();
    (Some(parts.join(" ")), team)
}

fn header_labels(table: ElementRef) -> Option<Vec<String>> {
    table
        .select(&ROW_SELECTOR)
        .find(|row| !is_data_row(*row) && !row_cells(*row).is_empty())
        .map(|row| row_cells(row).into_iter().map(elem_text).collect())
}

/// Unwraps the comparison API's `{ "status": .., "html": .. }` envelope.
/// Bodies that are not JSON are taken as markup.
pub fn comparison_markup(
    body: &str,
    category: StatCategory,
) -> Result<Cow<'_, str>, ExtractionError> {
    if !body.trim_start().starts_with('{') {
        return Ok(Cow::Borrowed(body));
    }

    let payload: ComparisonPayload = serde_json::from_str(body).map_err(|e| {
        ExtractionError::new(category, ExtractionReason::Payload(e.to_string()))
    })?;

    if payload.status == Some(false) {
        return Err(ExtractionError::new(
            category,
            ExtractionReason::Payload("status is false".to_string()),
        ));
    }

    payload.html.map(Cow::Owned).ok_or_else(|| {
        ExtractionError::new(
            category,
            ExtractionReason::Payload("missing 'html' field".to_string()),
        )
    })
}

/// Locates the category's rows in `content` and returns their raw cell text.
///
/// Locators are tried in order. If none finds its structure the result is
/// `StructureNotFound`; a structure with no data rows is an empty `Ok`.
pub fn extract(content: &str, category: StatCategory) -> Result<Vec<RawRow>, ExtractionError> {
    let spec = schema::spec(category);

    let markup = match category.kind() {
        RecordKind::Comparison => comparison_markup(content, category)?,
        _ => Cow::Borrowed(content),
    };
    let document = Html::parse_document(&markup);

    for locator in spec.locators {
        let found = match locator {
            Locator::HeaderedTable { table, identifying } => {
                headered_table(&document, spec, table, identifying)?
            }
            Locator::PositionalTable { table } => positional_table(&document, spec, table)?,
            Locator::Blocks {
                container,
                block,
                cells,
            } => blocks(&document, spec, container, block, cells)?,
            Locator::Facts {
                fixed,
                item,
                label,
                value,
            } => facts(&document, spec, fixed, item, label, value)?,
        };

        if let Some(rows) = found {
            log::debug!(
                "{}: {} row(s) via {:?}",
                category,
                rows.len(),
                locator
            );
            return Ok(rows);
        }
    }

    Err(ExtractionError::new(
        category,
        ExtractionReason::StructureNotFound,
    ))
}

fn headered_table(
    document: &Html,
    spec: &CategorySpec,
    table: &str,
    identifying: &[&str],
) -> Result<Option<Vec<RawRow>>, ExtractionError> {
    let table_selector = parse_selector(table, spec.category)?;

    let found = document.select(&table_selector).find_map(|table| {
        let headers = header_labels(table)?;
        let identified = identifying.iter().all(|label| {
            spec.column(label)
                .is_some_and(|c| headers.iter().any(|h| c.matches_header(h)))
        });
        identified.then_some((table, headers))
    });

    let Some((table, headers)) = found else {
        return Ok(None);
    };

    // Column label -> index of the header cell that names it.
    let positions: Vec<(&'static str, ColumnKind, Option<usize>)> = spec
        .extracted_columns()
        .map(|c| {
            (
                c.label,
                c.kind,
                headers.iter().position(|h| c.matches_header(h)),
            )
        })
        .collect();

    // Leaderboards without a team column print the team under the player name.
    let team_in_player_cell = positions
        .iter()
        .any(|(_, kind, index)| *kind == ColumnKind::Team && index.is_none());

    let rows = table
        .select(&ROW_SELECTOR)
        .filter(|row| is_data_row(*row))
        .enumerate()
        .map(|(i, row)| {
            let tds = row_cells(row);
            let (player, team) = if team_in_player_cell {
                positions
                    .iter()
                    .find(|(_, kind, _)| *kind == ColumnKind::Player)
                    .and_then(|(_, _, index)| index.and_then(|i| tds.get(i)))
                    .map(|cell| split_player_cell(*cell))
                    .unwrap_or_default()
            } else {
                (None, None)
            };

            let cells = positions
                .iter()
                .map(|(label, kind, index)| {
                    let text = match kind {
                        ColumnKind::Player if team_in_player_cell => player.clone(),
                        ColumnKind::Team if team_in_player_cell => team.clone(),
                        _ => index
                            .and_then(|i| tds.get(i))
                            .map(|cell| elem_text(*cell))
                            .and_then(non_empty),
                    };
                    (*label, text)
                })
                .collect();

            RawRow::new(i as u32 + 1, cells)
        })
        .collect();

    Ok(Some(rows))
}

fn positional_table(
    document: &Html,
    spec: &CategorySpec,
    table: &str,
) -> Result<Option<Vec<RawRow>>, ExtractionError> {
    let table_selector = parse_selector(table, spec.category)?;
    let Some(table) = document.select(&table_selector).next() else {
        return Ok(None);
    };

    let rows = table
        .select(&ROW_SELECTOR)
        .filter(|row| is_data_row(*row))
        .enumerate()
        .map(|(i, row)| {
            let tds = row_cells(row);
            let cells = spec
                .extracted_columns()
                .enumerate()
                .map(|(j, column)| {
                    let text = tds.get(j).map(|cell| elem_text(*cell)).and_then(non_empty);
                    (column.label, text)
                })
                .collect();
            RawRow::new(i as u32 + 1, cells)
        })
        .collect();

    Ok(Some(rows))
}

fn block_cell(block: ElementRef, cell: &BlockCell, selector: &Selector) -> Option<String> {
    let element = block.select(selector).next()?;
    match cell.attr {
        Some(attr) => element.value().attr(attr).map(|v| v.trim().to_string()),
        None => Some(elem_text(element)),
    }
    .and_then(non_empty)
}

fn blocks(
    document: &Html,
    spec: &CategorySpec,
    container: &str,
    block: &str,
    cells: &[BlockCell],
) -> Result<Option<Vec<RawRow>>, ExtractionError> {
    let container_selector = parse_selector(container, spec.category)?;
    let block_selector = parse_selector(block, spec.category)?;
    let cell_selectors = cells
        .iter()
        .map(|c| parse_selector(c.selector, spec.category))
        .collect::<Result<Vec<_>, _>>()?;

    let Some(container) = document
        .select(&container_selector)
        .find(|c| c.select(&block_selector).next().is_some())
    else {
        return Ok(None);
    };

    let rows = container
        .select(&block_selector)
        .enumerate()
        .map(|(i, block)| {
            let cells = spec
                .extracted_columns()
                .zip(cells.iter().zip(&cell_selectors))
                .map(|(column, (cell, selector))| {
                    (column.label, block_cell(block, cell, selector))
                })
                .collect();
            RawRow::new(i as u32 + 1, cells)
        })
        .collect();

    Ok(Some(rows))
}

fn facts(
    document: &Html,
    spec: &CategorySpec,
    fixed: &[(&'static str, &'static str)],
    item: &str,
    label: &str,
    value: &str,
) -> Result<Option<Vec<RawRow>>, ExtractionError> {
    let mut columns = spec.extracted_columns().map(|c| c.label);
    let (Some(label_column), Some(value_column)) = (columns.next(), columns.next()) else {
        return Ok(None);
    };

    let item_selector = parse_selector(item, spec.category)?;
    let label_selector = parse_selector(label, spec.category)?;
    let value_selector = parse_selector(value, spec.category)?;

    let mut pairs: Vec<(String, Option<String>)> = Vec::new();

    for (name, selector) in fixed {
        let selector = parse_selector(selector, spec.category)?;
        if let Some(element) = document.select(&selector).next() {
            pairs.push((name.to_string(), non_empty(elem_text(element))));
        }
    }

    for element in document.select(&item_selector) {
        let own = elem_text(element);
        let named = element.select(&label_selector).next().map(elem_text);
        let valued = element
            .select(&value_selector)
            .next()
            .map(elem_text)
            .and_then(non_empty);

        let pair = match (named, valued) {
            (Some(name), Some(v)) => Some((name, Some(v))),
            (Some(name), None) => {
                let rest = own.strip_prefix(name.as_str()).unwrap_or("").trim();
                Some((name, non_empty(rest.trim_start_matches(':').trim().to_string())))
            }
            (None, _) => own
                .split_once(':')
                .map(|(n, v)| (n.trim().to_string(), non_empty(v.trim().to_string()))),
        };

        if let Some((name, v)) = pair {
            let name = name.trim_end_matches(':').trim().to_string();
            if !name.is_empty() {
                pairs.push((name, v));
            }
        }
    }

    if pairs.is_empty() {
        return Ok(None);
    }

    let rows = pairs
        .into_iter()
        .enumerate()
        .map(|(i, (name, v))| {
            RawRow::new(i as u32 + 1, vec![(label_column, Some(name)), (value_column, v)])
        })
        .collect();

    Ok(Some(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture(name: &str) -> String {
        fs::read_to_string(format!("fixtures/{}", name)).expect("Failed to read fixture file")
    }

    #[test]
    fn test_extract_most_runs_from_sample() {
        let html = fixture("most_runs.html");
        let rows = extract(&html, StatCategory::BattingMostRuns).expect("Failed to extract rows");

        assert_eq!(rows.len(), 7, "spacer row must not be counted");

        let first = &rows[0];
        assert_eq!(first.position, 1);
        assert_eq!(first.get("Player"), Some("Sai Sudharsan"));
        assert_eq!(first.get("Team"), Some("GT"));
        assert_eq!(first.get("Runs"), Some("759"));
        assert_eq!(first.get("HS"), Some("108*"));
        assert_eq!(first.get("6s"), Some("21"));

        let kohli = rows
            .iter()
            .find(|r| r.get("Player") == Some("Virat Kohli"))
            .expect("Should find Kohli");
        assert_eq!(kohli.get("Team"), Some("Royal Challengers Bangalore"));
        assert_eq!(kohli.position, 3);
    }

    #[test]
    fn test_extract_team_from_player_cell_and_missing_cells() {
        let html = fixture("best_economy.html");
        let rows =
            extract(&html, StatCategory::BowlingBestEconomy).expect("Failed to extract rows");

        assert_eq!(rows.len(), 5);
        // The name is split over two spans inside the link.
        assert_eq!(rows[0].get("Player"), Some("Jasprit Bumrah"));
        assert_eq!(rows[0].get("Team"), Some("MI"));
        assert_eq!(rows[0].get("Econ"), Some("6.67"));
        assert_eq!(rows[1].get("Player"), Some("Sunil Narine"));
        assert_eq!(rows[1].get("Team"), Some("KKR"));

        let short = &rows[2];
        assert_eq!(short.get("Player"), Some("Varun Chakaravarthy"));
        assert_eq!(short.get("Overs"), Some("50"));
        assert_eq!(short.get("Econ"), None);
        assert!(short.cells().iter().any(|(label, v)| *label == "Econ" && v.is_none()));
    }

    #[test]
    fn test_unmarked_team_is_the_last_text_in_the_cell() {
        let html = r#"
            <table>
                <tr><th>PLAYER</th><th>OVERS</th><th>ECON</th></tr>
                <tr><td>Mohammed <b>Siraj</b><br>GT</td><td>54</td><td>9.27</td></tr>
                <tr><td>Kagiso Rabada</td><td>8</td><td>10.12</td></tr>
            </table>
        "#;
        let rows = extract(html, StatCategory::BowlingBestEconomy).unwrap();

        assert_eq!(rows[0].get("Player"), Some("Mohammed Siraj"));
        assert_eq!(rows[0].get("Team"), Some("GT"));
        assert_eq!(rows[1].get("Player"), Some("Kagiso Rabada"));
        assert_eq!(rows[1].get("Team"), None);
    }

    #[test]
    fn test_extract_points_table_from_sample() {
        let html = fixture("points_table.html");
        let rows = extract(&html, StatCategory::PointsTable).expect("Failed to extract rows");

        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].get("Team"), Some("Royal Challengers Bengaluru RCB"));
        assert_eq!(rows[0].get("Played"), Some("14"));
        assert_eq!(rows[0].get("Points"), Some("19"));
        assert_eq!(rows[0].get("NRR"), Some("+0.301"));
        assert_eq!(rows[0].get("Tied"), None);
    }

    #[test]
    fn test_extract_comparison_from_api_payload() {
        let body = fixture("comparison_api.json");
        let rows = extract(&body, StatCategory::TeamComparison).expect("Failed to extract rows");

        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].get("Metric"), Some("Matches"));
        assert_eq!(rows[0].get("Team 1"), Some("238"));
        assert_eq!(rows[0].get("Team 2"), Some("261"));
        assert_eq!(rows[6].get("Metric"), None);
    }

    #[test]
    fn test_extract_comparison_from_rendered_sections() {
        let html = fixture("comparison_sections.html");
        let rows = extract(&html, StatCategory::TeamComparison).expect("Failed to extract rows");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get("Metric"), Some("Won"));
        assert_eq!(rows[1].get("Team 1"), Some("138"));
        assert_eq!(rows[1].get("Team 2"), Some("142"));
    }

    #[test]
    fn test_extract_player_comparison_from_api_payload() {
        let body = fixture("player_comparison_api.json");
        let rows =
            extract(&body, StatCategory::PlayerComparison).expect("Failed to extract rows");

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[1].get("Metric"), Some("Runs"));
        assert_eq!(rows[1].get("Player 1"), Some("8661"));
        assert_eq!(rows[1].get("Player 2"), Some("7046"));
        assert_eq!(rows[4].get("Metric"), None);
    }

    #[test]
    fn test_extract_squad_cards() {
        let html = fixture("team_squad.html");
        let rows = extract(&html, StatCategory::TeamSquad).expect("Failed to extract rows");

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].get("Player"), Some("Rohit Sharma"));
        assert_eq!(rows[0].get("Role"), Some("Batter"));
        assert_eq!(rows[0].get("Profile"), Some("/players/rohit-sharma/107"));
        assert_eq!(
            rows[0].get("Image"),
            Some("https://documents.iplt20.com/ipl/IPLHeadshot2025/6.png")
        );
        assert_eq!(rows[1].get("Player"), Some("Suryakumar Yadav"));

        // No lazily loaded headshot, and a card without a name.
        assert_eq!(rows[2].get("Image"), None);
        assert_eq!(rows[2].get("Role"), Some("Bowler"));
        assert_eq!(rows[3].get("Player"), None);
    }

    #[test]
    fn test_extract_overview_facts() {
        let html = fixture("team_profile.html");
        let rows = extract(&html, StatCategory::TeamOverview).expect("Failed to extract rows");

        let facts: Vec<_> = rows
            .iter()
            .map(|r| (r.get("Field").unwrap_or_default(), r.get("Value")))
            .collect();
        assert_eq!(
            facts,
            vec![
                (
                    "Description",
                    Some(
                        "Mumbai Indians are a franchise based in Mumbai, Maharashtra. They have won the title five times."
                    )
                ),
                ("Captain", Some("Hardik Pandya")),
                ("Head Coach", Some("Mahela Jayawardene")),
                ("Home Ground", Some("Wankhede Stadium")),
                ("Matches", Some("261")),
                ("Titles", None),
                ("Owner", Some("Reliance Industries")),
            ]
        );
    }

    #[test]
    fn test_overview_falls_back_to_stats_table() {
        let html = r#"
            <table class="team-stats">
                <tr><th>Record</th><th>Value</th></tr>
                <tr><td>Won</td><td>142</td></tr>
                <tr><td>Lost</td><td>115</td></tr>
            </table>
        "#;
        let rows = extract(html, StatCategory::TeamOverview).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("Field"), Some("Lost"));
        assert_eq!(rows[1].get("Value"), Some("115"));
    }

    #[test]
    fn test_extract_news_articles() {
        let html = fixture("team_profile.html");
        let rows = extract(&html, StatCategory::TeamNews).expect("Failed to extract rows");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("Title"), Some("MI beat CSK by nine wickets"));
        assert_eq!(
            rows[0].get("Link"),
            Some("https://indianexpress.com/article/sports/ipl/mi-beat-csk-1/")
        );
        assert_eq!(rows[0].get("Published"), Some("April 20, 2025"));
        assert_eq!(rows[1].get("Published"), None);
        assert_eq!(rows[2].get("Title"), None);
    }

    #[test]
    fn test_page_without_blocks_is_not_the_structure() {
        let html = "<html><body><div class=\"ih-squad\"></div></body></html>";
        let err = extract(html, StatCategory::TeamSquad).unwrap_err();
        assert_eq!(err.reason, ExtractionReason::StructureNotFound);
    }

    #[test]
    fn test_missing_structure_is_an_error() {
        let html = "<html><body><p>Stats will be updated soon</p></body></html>";
        let err = extract(html, StatCategory::BowlingMostWickets).unwrap_err();
        assert_eq!(err.category, StatCategory::BowlingMostWickets);
        assert_eq!(err.reason, ExtractionReason::StructureNotFound);
        assert_eq!(err.reason.to_string(), "structure-not-found");

        let err = extract("", StatCategory::PointsTable).unwrap_err();
        assert_eq!(err.reason, ExtractionReason::StructureNotFound);
    }

    #[test]
    fn test_unrelated_table_is_not_the_structure() {
        let html = r#"
            <table><tr><th>Venue</th><th>City</th></tr>
            <tr><td>Wankhede</td><td>Mumbai</td></tr></table>
        "#;
        let err = extract(html, StatCategory::BattingMostRuns).unwrap_err();
        assert_eq!(err.reason, ExtractionReason::StructureNotFound);
    }

    #[test]
    fn test_structure_without_rows_is_empty() {
        let html = r#"
            <table>
                <thead><tr><th>PLAYER</th><th>TEAM</th><th>WKTS</th></tr></thead>
                <tbody></tbody>
            </table>
        "#;
        let rows = extract(html, StatCategory::BowlingMostWickets).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_comparison_payload_errors() {
        let err = comparison_markup(r#"{"status": false}"#, StatCategory::TeamComparison)
            .unwrap_err();
        assert!(matches!(err.reason, ExtractionReason::Payload(_)));

        let err =
            comparison_markup("{ not json", StatCategory::TeamComparison).unwrap_err();
        assert!(matches!(err.reason, ExtractionReason::Payload(_)));

        let markup = comparison_markup("<table></table>", StatCategory::TeamComparison).unwrap();
        assert_eq!(markup, "<table></table>");
    }
}
