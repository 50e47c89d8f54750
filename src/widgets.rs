//! Widget data collaborators: weather, market quotes, trending headlines.
//!
//! Independent of the article pipeline: each is a cached GET-and-parse
//! against a public endpoint, exposed as plain key/value data, total by
//! construction (failures yield empty maps, zero quotes, or a static trend
//! fallback). Cache TTLs follow the endpoints' update cadence.

use crate::cache::TtlCache;
use crate::http::HttpClient;
use crate::providers::rss;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const WEATHER_TTL: Duration = Duration::from_secs(300);
const QUOTE_TTL: Duration = Duration::from_secs(300);
const TRENDS_TTL: Duration = Duration::from_secs(1800);

const WEATHER_BASE: &str = "https://api.open-meteo.com/v1/forecast";
const QUOTE_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const TRENDS_FEED: &str = "https://news.google.com/rss?hl=ru&gl=RU&ceid=RU:ru";

/// Symbols shown on the home screen when the caller does not pick any.
pub const DEFAULT_SYMBOLS: [&str; 6] = ["RUB=X", "EURRUB=X", "NVDA", "AAPL", "BTC-USD", "ETH-USD"];

pub struct WidgetHub {
    http: HttpClient,
    weather_cache: TtlCache<BTreeMap<String, String>>,
    quote_cache: TtlCache<f64>,
    trends_cache: TtlCache<Vec<String>>,
}

impl WidgetHub {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            weather_cache: TtlCache::new(WEATHER_TTL),
            quote_cache: TtlCache::new(QUOTE_TTL),
            trends_cache: TtlCache::new(TRENDS_TTL),
        }
    }

    /// Current weather for a coordinate as a flat key/value map. Empty map
    /// on any failure.
    pub async fn weather(&self, lat: f64, lon: f64) -> BTreeMap<String, String> {
        let key = format!("weather::{lat}:{lon}");
        if let Some(hit) = self.weather_cache.get(&key) {
            return hit;
        }
        let url = format!(
            "{WEATHER_BASE}?latitude={lat}&longitude={lon}&current_weather=true&timezone=auto"
        );
        let report = match self.fetch_json(&url).await {
            Some(value) => weather_from_json(&value),
            None => BTreeMap::new(),
        };
        if !report.is_empty() {
            self.weather_cache.put(&key, report.clone());
        }
        report
    }

    /// Latest traded price for one symbol; 0.0 when unavailable.
    pub async fn quote(&self, symbol: &str) -> f64 {
        let key = format!("quote::{symbol}");
        if let Some(hit) = self.quote_cache.get(&key) {
            return hit;
        }
        let url = format!(
            "{QUOTE_BASE}/{}?interval=1d&range=1d",
            urlencoding::encode(symbol)
        );
        match self.fetch_json(&url).await.as_ref().and_then(price_from_chart) {
            Some(price) => {
                self.quote_cache.put(&key, price);
                price
            }
            None => {
                warn!(symbol, "Quote unavailable");
                0.0
            }
        }
    }

    pub async fn quotes(&self, symbols: &[&str]) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for symbol in symbols {
            out.insert(symbol.to_string(), self.quote(symbol).await);
        }
        out
    }

    /// Trending headlines from the news front-page feed, with a static
    /// fallback so the widget never comes up blank.
    pub async fn trending(&self) -> Vec<String> {
        if let Some(hit) = self.trends_cache.get("trends") {
            return hit;
        }
        match self.http.get_page(TRENDS_FEED).await {
            Ok(page) if page.status.is_success() => {
                let trends = trends_from_feed(&page.body, 30);
                if !trends.is_empty() {
                    self.trends_cache.put("trends", trends.clone());
                    return trends;
                }
            }
            Ok(page) => warn!(status = page.status.as_u16(), "Trend feed rejected"),
            Err(e) => warn!(error = %e, "Trend feed unavailable"),
        }
        fallback_trends()
    }

    async fn fetch_json(&self, url: &str) -> Option<Value> {
        match self.http.inner().get(url).send().await {
            Ok(response) if response.status().is_success() => match response.json().await {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(%url, error = %e, "Widget endpoint returned bad JSON");
                    None
                }
            },
            Ok(response) => {
                warn!(%url, status = response.status().as_u16(), "Widget endpoint rejected");
                None
            }
            Err(e) => {
                warn!(%url, error = %e, "Widget endpoint unreachable");
                None
            }
        }
    }
}

fn weather_from_json(value: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let Some(current) = value.get("current_weather") else {
        return out;
    };
    for field in ["temperature", "windspeed", "winddirection", "weathercode", "time"] {
        if let Some(v) = current.get(field) {
            let rendered = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.insert(field.to_string(), rendered);
        }
    }
    debug!(fields = out.len(), "Parsed weather report");
    out
}

fn price_from_chart(value: &Value) -> Option<f64> {
    value
        .get("chart")?
        .get("result")?
        .get(0)?
        .get("meta")?
        .get("regularMarketPrice")?
        .as_f64()
}

/// Headline titles from the front-page feed, source suffix stripped.
fn trends_from_feed(xml: &str, limit: usize) -> Vec<String> {
    rss::parse_feed_items(xml)
        .into_iter()
        .map(|item| {
            let title = item.title.trim();
            match title.rfind(" - ") {
                Some(pos) => title[..pos].trim().to_string(),
                None => title.to_string(),
            }
        })
        .filter(|t| !t.is_empty())
        .take(limit)
        .collect()
}

fn fallback_trends() -> Vec<String> {
    vec![
        "ИИ и нейросети".to_string(),
        "Космос".to_string(),
        "Биткоин".to_string(),
    ]
}
