pub mod dataset;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod schedule;
pub mod schema;
pub mod scraper;
pub mod types;

pub use pipeline::{Pipeline, RunConfig, RunSummary};
pub use scraper::WebScraper;

pub const STATS_BASE_URL: &str = "https://indianexpress.com/section/sports/ipl/stats";
pub const IPLT20_BASE_URL: &str = "https://www.iplt20.com";
pub const NEWS_BASE_URL: &str = "https://indianexpress.com";
