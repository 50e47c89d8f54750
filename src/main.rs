//! # News Scout
//!
//! A news discovery pipeline: given a free-text query it produces a
//! deduplicated, recency-filtered list of articles from unreliable search
//! backends, then fetches the underlying pages and extracts readable text
//! and a representative image from arbitrary publisher HTML.
//!
//! ## Features
//!
//! - Two search backends behind one provider interface: the Google News
//!   search feed (RSS) and Bing News result-page scraping, composed by
//!   failover or merge
//! - Aggregator-wrapped URL decoding, consent-wall detection with fallback
//!   discovery, and a one-hop canonical-source jump for stub pages
//! - Tiered heuristic text extraction that degrades instead of failing
//! - Optional widgets (weather, market quotes, trending headlines) and an
//!   LLM collaborator for keyword expansion and fact checks
//!
//! ## Usage
//!
//! ```sh
//! news_scout "климат" -n 3 --fetch-content
//! ```
//!
//! ## Architecture
//!
//! The pipeline runs in stages: provider queries -> dedupe -> expanding
//! recency filter -> bounded concurrent article fetching (12 workers by
//! default) -> enriched records. All pipeline entry points are total;
//! failures surface as sentinel text, never as crashes.

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod aggregator;
mod cache;
mod cli;
mod config;
mod consent;
mod extract;
mod fetcher;
mod http;
mod llm;
mod models;
mod providers;
mod resolver;
mod util;
mod widgets;

use aggregator::NewsAggregator;
use cli::{Cli, ProviderChoice};
use config::PipelineConfig;
use fetcher::ArticleFetcher;
use http::HttpClient;
use llm::LlmClient;
use models::EnrichedArticle;
use providers::{BingNewsProvider, GoogleNewsProvider, ProviderMode, SearchProvider};
use util::{strip_tags, truncate_for_log};
use widgets::{WidgetHub, DEFAULT_SYMBOLS};

/// Default widget coordinates (Ufa).
const DEFAULT_LAT: f64 = 54.74;
const DEFAULT_LON: f64 = 55.97;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_scout starting up");

    let args = Cli::parse();
    debug!(?args.query, ?args.limit, ?args.provider, "Parsed CLI arguments");

    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => PipelineConfig::default(),
    };
    let config = Arc::new(config);

    let http = HttpClient::new(&config)?;

    // --- Provider composition ---
    let google: Arc<dyn SearchProvider> =
        Arc::new(GoogleNewsProvider::new(http.clone(), &config));
    let bing: Arc<dyn SearchProvider> = Arc::new(BingNewsProvider::new(http.clone(), &config));
    let (providers, mode): (Vec<Arc<dyn SearchProvider>>, ProviderMode) = match args.provider {
        ProviderChoice::Google => (
            vec![Arc::clone(&google), Arc::clone(&bing)],
            ProviderMode::Failover,
        ),
        ProviderChoice::Bing => (vec![Arc::clone(&bing)], ProviderMode::Failover),
        ProviderChoice::All => (
            vec![Arc::clone(&google), Arc::clone(&bing)],
            ProviderMode::Merge,
        ),
    };

    // Bing doubles as the consent-fallback search surface.
    let fetcher = Arc::new(
        ArticleFetcher::new(http.clone(), Arc::clone(&config)).with_fallback_search(bing),
    );
    let aggregator =
        NewsAggregator::new(providers, fetcher, Arc::clone(&config)).with_mode(mode);

    // --- Optional widgets ---
    if args.widgets {
        print_widgets(&http).await;
    }

    // --- Optional keyword suggestions ---
    let needs_llm = args.keywords || args.fact_check;
    let llm = needs_llm.then(|| LlmClient::from_env(&http));
    if args.keywords {
        if let Some(llm) = &llm {
            let keywords = llm.related_keywords(&args.query, 6).await;
            println!("Похожие запросы: {}\n", keywords.join(", "));
        }
    }

    // --- Search ---
    let articles = aggregator
        .search(&args.query, args.limit, args.fetch_content)
        .await;
    info!(count = articles.len(), "Search complete");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&articles)?);
    } else if articles.is_empty() {
        println!("По вашему запросу ничего не найдено.");
    } else {
        print_results(&articles, args.fetch_content);
    }

    // --- Optional fact check of the first readable article ---
    if args.fact_check {
        if let Some(llm) = &llm {
            match articles
                .iter()
                .find(|a| !a.full_text.is_empty() && !fetcher::is_sentinel(&a.full_text))
            {
                Some(article) => {
                    let verdict = llm.fact_check(&article.full_text, &article.title).await;
                    println!("\nФактчекинг: {}\n{}", article.title, verdict);
                }
                None => println!("\nФактчекинг: нет загруженных статей (нужен --fetch-content)."),
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

fn print_results(articles: &[EnrichedArticle], fetched: bool) {
    for (index, article) in articles.iter().enumerate() {
        let date = article
            .published
            .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
            .or_else(|| article.published_raw.clone())
            .unwrap_or_else(|| "дата неизвестна".to_string());
        println!("[{}] {}", index + 1, article.title);
        println!("    {} | {}", article.source_name, date);
        let snippet = strip_tags(&article.snippet);
        if !snippet.is_empty() {
            println!("    {}", truncate_for_log(&snippet, 200));
        }
        println!("    {}", article.url);
        if fetched && !article.full_text.is_empty() {
            println!();
            for line in article.full_text.lines().filter(|l| !l.is_empty()) {
                println!("    {line}");
            }
        }
        println!();
    }
}

async fn print_widgets(http: &HttpClient) {
    let hub = WidgetHub::new(http.clone());

    let weather = hub.weather(DEFAULT_LAT, DEFAULT_LON).await;
    if weather.is_empty() {
        println!("Погода: недоступна");
    } else {
        println!(
            "Погода: {}°C, ветер {} км/ч",
            weather.get("temperature").map(String::as_str).unwrap_or("?"),
            weather.get("windspeed").map(String::as_str).unwrap_or("?"),
        );
    }

    let quotes = hub.quotes(&DEFAULT_SYMBOLS).await;
    let rendered: Vec<String> = quotes
        .iter()
        .filter(|(_, price)| **price != 0.0)
        .map(|(symbol, price)| format!("{symbol} {price:.2}"))
        .collect();
    if !rendered.is_empty() {
        println!("Котировки: {}", rendered.join(" | "));
    }

    let trends = hub.trending().await;
    if !trends.is_empty() {
        println!("В тренде: {}", trends.iter().take(5).cloned().collect::<Vec<_>>().join(" · "));
    }
    println!();
}
