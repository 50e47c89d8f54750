//! Command-line interface definitions for News Scout.
//!
//! All options can be provided via command-line flags; the config path can
//! also come from the environment.

use clap::{Parser, ValueEnum};

/// Command-line arguments for the News Scout application.
///
/// # Examples
///
/// ```sh
/// # Fast search: candidates only, no article fetching
/// news_scout "курс доллара"
///
/// # Full pipeline: fetch and extract article text for 3 results
/// news_scout "климат" -n 3 --fetch-content
///
/// # Merge both backends and emit JSON
/// news_scout "технологии" --provider all --json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Free-text news query
    pub query: String,

    /// Maximum number of articles to return
    #[arg(short = 'n', long, default_value_t = 6)]
    pub limit: usize,

    /// Fetch and extract full article text for each result
    #[arg(long)]
    pub fetch_content: bool,

    /// Search backend selection
    #[arg(long, value_enum, default_value_t = ProviderChoice::Google)]
    pub provider: ProviderChoice,

    /// Optional path to a pipeline config YAML file
    #[arg(short, long, env = "NEWS_SCOUT_CONFIG")]
    pub config: Option<String>,

    /// Emit results as JSON instead of formatted text
    #[arg(long)]
    pub json: bool,

    /// Show weather / market / trending widgets before the results
    #[arg(long)]
    pub widgets: bool,

    /// Suggest related search keywords for the query
    #[arg(long)]
    pub keywords: bool,

    /// Fact-check the first fetched article (requires --fetch-content)
    #[arg(long)]
    pub fact_check: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderChoice {
    /// Google News search feed (primary), Bing News as failover
    Google,
    /// Bing News result-page scraping only
    Bing,
    /// Merge both backends, Google first
    All,
}
