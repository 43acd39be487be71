use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use iplstats::pipeline::{Pipeline, RunConfig, RunSummary, SourceUrls};
use iplstats::report::{ExistingFiles, write_match};
use iplstats::schedule::{matches_on, read_schedule};
use iplstats::scraper::WebScraper;
use iplstats::types::{RecordKind, StatCategory, Team};
use log::LevelFilter;

/// Invalid arguments or a run that could not be set up.
const EXIT_SETUP: i32 = 2;

#[derive(Parser)]
#[command(name = "iplstats")]
#[command(about = "Scrape IPL leaderboards, the points table, team pages and comparisons into CSV, JSON and HTML", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        short = 'd',
        long = "output-dir",
        default_value = ".",
        global = true,
        help = "Root directory for all output files"
    )]
    output_dir: PathBuf,

    #[arg(
        long,
        default_value_t = 30,
        global = true,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds to wait for each page"
    )]
    timeout_secs: u64,

    #[arg(long, global = true, help = "Replace existing files instead of adding a _v2 suffix")]
    overwrite: bool,

    #[arg(long, global = true, help = "Skip the HTML table next to each CSV/JSON pair")]
    no_html: bool,

    #[arg(long, global = true, help = "Do not keep fetched pages under debug_files/")]
    no_debug_pages: bool,

    #[arg(
        long,
        global = true,
        help = "Also split leaderboards per team under team_data/<Team>/stats/"
    )]
    per_team: bool,

    #[arg(
        long,
        global = true,
        default_value = iplstats::STATS_BASE_URL,
        help = "Base URL of the leaderboard pages"
    )]
    stats_base_url: String,

    #[arg(
        long,
        global = true,
        default_value = iplstats::IPLT20_BASE_URL,
        help = "Base URL of the points table, squad and comparison pages"
    )]
    iplt20_base_url: String,

    #[arg(
        long,
        global = true,
        default_value = iplstats::NEWS_BASE_URL,
        help = "Base URL of the team profile and news pages"
    )]
    news_base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape batting and bowling leaderboards (all of them when none are named)
    Stats {
        #[arg(
            value_name = "CATEGORY",
            value_parser = parse_leaderboard,
            help = "Leaderboard slugs such as most-runs or best-economy-rates"
        )]
        categories: Vec<StatCategory>,
    },
    /// Scrape the points table
    PointsTable,
    /// Scrape the head-to-head comparison of two teams
    Compare {
        #[arg(value_parser = parse_team, help = "First team, e.g. CSK or 'Chennai Super Kings'")]
        team_1: Team,

        #[arg(value_parser = parse_team, help = "Second team")]
        team_2: Team,
    },
    /// Scrape the head-to-head comparison of two players by their site IDs
    ComparePlayers {
        #[arg(value_parser = parse_player_id, help = "First player's numeric ID, as in /players/virat-kohli/164")]
        player_1: String,

        #[arg(value_parser = parse_player_id, help = "Second player's numeric ID")]
        player_2: String,
    },
    /// Scrape squad, overview and news of teams (all ten when none are named)
    Team {
        #[arg(value_name = "TEAM", value_parser = parse_team, help = "Teams such as MI or 'Punjab Kings'")]
        teams: Vec<Team>,
    },
    /// Show the match scheduled for a day and save it under match_data/
    Today {
        #[arg(long, value_name = "CSV", help = "Schedule file with Match, No, Match Day, Date, Day, Start, Home, Away, Venue columns")]
        schedule: PathBuf,

        #[arg(
            long,
            value_name = "YYYY-MM-DD",
            help = "Day to look up instead of today",
            value_parser = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string()),
        )]
        date: Option<NaiveDate>,

        #[arg(long, help = "Also scrape the comparison of the two teams")]
        compare: bool,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Scrape every leaderboard and the points table
    All,
    /// List the accepted category slugs
    Categories {
        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn parse_leaderboard(s: &str) -> Result<StatCategory, String> {
    let category = StatCategory::from_str(s).map_err(|e| e.to_string())?;
    if category.kind() != RecordKind::Player {
        return Err(format!(
            "'{}' is not a leaderboard; use the {} subcommand",
            s,
            match category {
                StatCategory::PointsTable => "points-table",
                StatCategory::PlayerComparison => "compare-players",
                StatCategory::TeamComparison => "compare",
                _ => "team",
            }
        ));
    }
    Ok(category)
}

fn parse_team(s: &str) -> Result<Team, String> {
    Team::from_str(s).map_err(|e| e.to_string())
}

fn parse_player_id(s: &str) -> Result<String, String> {
    let id = s.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("'{}' is not a numeric player ID", s));
    }
    Ok(id.to_string())
}

fn serialize_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

/// Prints the summary, writes the run report and exits. `failed` marks
/// work outside the summary that did not complete.
fn finish(pipeline: &Pipeline<'_, WebScraper>, summary: RunSummary, failed: bool) -> ! {
    let mut code = if failed { 1 } else { summary.exit_code() };
    if summary.categories.is_empty() {
        process::exit(code);
    }

    print!("{}", summary);

    match pipeline.write_report(&summary) {
        Ok(files) => {
            for file in files {
                println!("Report: {}", file.display());
            }
        }
        Err(e) => {
            log::error!("Error writing run report: {}", e);
            code = 1;
        }
    }
    process::exit(code);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    if let Commands::Categories { format } = &cli.command {
        match format {
            OutputFormat::Json => {
                let slugs: Vec<&str> = StatCategory::ALL.iter().map(|c| c.slug()).collect();
                serialize_json(&slugs);
            }
            OutputFormat::Text => {
                for category in StatCategory::ALL {
                    println!("{:<26} {}", category.slug(), category);
                }
            }
        }
        return;
    }

    let mut config = RunConfig::new(&cli.output_dir, Local::now().naive_local());
    config.timeout = Duration::from_secs(cli.timeout_secs);
    config.existing_files = if cli.overwrite {
        ExistingFiles::Overwrite
    } else {
        ExistingFiles::Version
    };
    config.write_html = !cli.no_html;
    config.save_debug_pages = !cli.no_debug_pages;
    config.per_team = cli.per_team;
    config.sources = SourceUrls {
        stats_base: cli.stats_base_url.clone(),
        iplt20_base: cli.iplt20_base_url.clone(),
        news_base: cli.news_base_url.clone(),
    };

    config.layout().ensure().unwrap_or_else(|e| {
        log::error!("Error preparing output directory: {}", e);
        process::exit(EXIT_SETUP);
    });

    let scraper = WebScraper::new(config.timeout).unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(EXIT_SETUP);
    });
    let pipeline = Pipeline::new(&scraper, &config);

    match cli.command {
        Commands::Stats { categories } => {
            let categories = if categories.is_empty() {
                StatCategory::leaderboards().collect()
            } else {
                categories
            };
            log::info!("Scraping {} leaderboard(s)...", categories.len());
            let summary = pipeline.run_all(&categories).await;
            finish(&pipeline, summary, false);
        }

        Commands::PointsTable => {
            let summary = pipeline.run_all(&[StatCategory::PointsTable]).await;
            finish(&pipeline, summary, false);
        }

        Commands::Compare { team_1, team_2 } => {
            if team_1 == team_2 {
                log::error!("Invalid args: cannot compare {} with itself", team_1);
                process::exit(EXIT_SETUP);
            }
            let mut summary = RunSummary::new(config.captured_at);
            summary.push(pipeline.run_comparison(team_1, team_2).await);
            finish(&pipeline, summary, false);
        }

        Commands::ComparePlayers { player_1, player_2 } => {
            if player_1 == player_2 {
                log::error!("Invalid args: cannot compare player {} with themselves", player_1);
                process::exit(EXIT_SETUP);
            }
            let mut summary = RunSummary::new(config.captured_at);
            summary.push(pipeline.run_player_comparison(&player_1, &player_2).await);
            finish(&pipeline, summary, false);
        }

        Commands::Team { teams } => {
            let teams = if teams.is_empty() {
                Team::ALL.to_vec()
            } else {
                teams
            };
            let mut summary = RunSummary::new(config.captured_at);
            for team in teams {
                log::info!("Scraping team pages of {}...", team);
                for report in pipeline.run_team(team).await {
                    summary.push(report);
                }
            }
            finish(&pipeline, summary, false);
        }

        Commands::All => {
            let categories: Vec<StatCategory> = StatCategory::site_wide().collect();
            log::info!("Scraping {} categories...", categories.len());
            let summary = pipeline.run_all(&categories).await;
            finish(&pipeline, summary, false);
        }

        Commands::Today {
            schedule,
            date,
            compare,
            format,
        } => {
            let fixtures = read_schedule(&schedule).unwrap_or_else(|e| {
                log::error!("Error reading schedule: {}", e);
                process::exit(EXIT_SETUP);
            });

            let date = date.unwrap_or_else(|| config.captured_at.date());
            let todays = matches_on(&fixtures, date);

            match format {
                OutputFormat::Json => serialize_json(&todays),
                OutputFormat::Text => {
                    if todays.is_empty() {
                        println!("No match scheduled on {}.", date);
                    }
                    for (i, scheduled) in todays.iter().enumerate() {
                        println!("{:>3}. {}", i + 1, scheduled);
                    }
                }
            }

            let mut failed = false;
            for scheduled in &todays {
                if let Err(e) = write_match(pipeline.layout(), scheduled, config.existing_files) {
                    log::error!("Error saving match {}: {}", scheduled, e);
                    failed = true;
                }
            }

            let mut summary = RunSummary::new(config.captured_at);
            if compare {
                for scheduled in &todays {
                    match (scheduled.home.team(), scheduled.away.team()) {
                        (Some(home), Some(away)) => {
                            summary.push(pipeline.run_comparison(home, away).await);
                        }
                        _ => {
                            log::warn!("Skipping comparison for {}: unrecognized team", scheduled);
                            failed = true;
                        }
                    }
                }
            }

            finish(&pipeline, summary, failed);
        }

        Commands::Categories { .. } => {}
    }
}
