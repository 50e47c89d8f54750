//! Chat-completion collaborator: related-keyword expansion and fact checks.
//!
//! A thin wrapper over an OpenAI-compatible endpoint (OpenRouter by
//! default). Models are tried in configured order with a per-call timeout;
//! keyword expansion falls back to deterministic local variants when no key
//! is configured or every model fails, so the primary search path is never
//! blocked on the LLM being up.

use crate::cache::TtlCache;
use crate::http::HttpClient;
use crate::util::{truncate_for_log, BoxError};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODELS: [&str; 2] = ["openai/gpt-4o-mini", "openai/gpt-4o"];
const KEYWORD_TIMEOUT: Duration = Duration::from_secs(3);
const FACT_CHECK_TIMEOUT: Duration = Duration::from_secs(12);
const KEYWORD_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
/// Fact-check prompts clamp the article text to this many characters.
const FACT_CHECK_TEXT_LIMIT: usize = 8_000;

pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    models: Vec<String>,
    keyword_cache: TtlCache<Vec<String>>,
}

impl LlmClient {
    pub fn new(
        http: &HttpClient,
        base_url: String,
        api_key: Option<String>,
        models: Vec<String>,
    ) -> Self {
        Self {
            http: http.inner().clone(),
            base_url,
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            models,
            keyword_cache: TtlCache::new(KEYWORD_CACHE_TTL),
        }
    }

    /// Construct from the conventional environment variables:
    /// `OPENROUTER_BASE_URL`, `OPENAI_API_KEY`/`OPENROUTER_API_KEY`,
    /// `LLM_MODELS` (comma-separated).
    pub fn from_env(http: &HttpClient) -> Self {
        let base_url =
            env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = env::var("OPENAI_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok();
        let models = env::var("LLM_MODELS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|models| !models.is_empty())
            .unwrap_or_else(|| DEFAULT_MODELS.iter().map(|m| m.to_string()).collect());
        if api_key.is_none() {
            warn!("LLM API key not configured; fact-checking unavailable, keywords degrade to local fallback");
        }
        Self::new(http, base_url, api_key, models)
    }

    async fn call_model(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BoxError> {
        let api_key = self.api_key.as_deref().ok_or("no LLM API key configured")?;
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(format!("LLM HTTP error {}", response.status()).into());
        }
        let value: Value = response.json().await?;
        let content = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or("LLM returned an empty message")?;
        Ok(content.trim().to_string())
    }

    /// Suggest related search phrases for a query. Cached; never fails:
    /// without a key or with every model down it returns deterministic
    /// local variants.
    #[instrument(level = "info", skip(self))]
    pub async fn related_keywords(&self, query: &str, max_keywords: usize) -> Vec<String> {
        let query = query.trim();
        if query.is_empty() || max_keywords == 0 {
            return Vec::new();
        }
        let cache_key = format!("kw::{}::{max_keywords}", query.to_lowercase());
        if let Some(hit) = self.keyword_cache.get(&cache_key) {
            return hit;
        }
        if self.api_key.is_some() {
            let prompt = format!(
                "Подбери до {max_keywords} коротких ключевых фраз на русском для поиска \
                 новостей по теме: {query}. Ответ: одна строка через запятую."
            );
            for model in &self.models {
                match timeout(KEYWORD_TIMEOUT, self.call_model(model, &prompt, 80, 0.1)).await {
                    Ok(Ok(text)) => {
                        let keywords = parse_keyword_list(&text, max_keywords);
                        if !keywords.is_empty() {
                            info!(model, count = keywords.len(), "Keywords from model");
                            self.keyword_cache.put(&cache_key, keywords.clone());
                            return keywords;
                        }
                    }
                    Ok(Err(e)) => warn!(model, error = %e, "Keyword model failed"),
                    Err(_) => warn!(model, "Keyword model timed out"),
                }
            }
        }
        let fallback = deterministic_keywords(query, max_keywords);
        self.keyword_cache.put(&cache_key, fallback.clone());
        fallback
    }

    /// Produce a short free-text fact-check summary for an article. Total:
    /// every failure mode maps to a user-readable Russian message.
    #[instrument(level = "info", skip_all)]
    pub async fn fact_check(&self, text: &str, title: &str) -> String {
        if text.trim().is_empty() {
            return "Нет текста для фактчекинга.".to_string();
        }
        if self.api_key.is_none() {
            return "Фактчекинг недоступен: не настроен API ключ. Установите переменную \
                    окружения OPENROUTER_API_KEY или OPENAI_API_KEY."
                .to_string();
        }
        let clipped: String = text.chars().take(FACT_CHECK_TEXT_LIMIT).collect();
        let prompt = format!(
            "Проведи быструю проверку фактов для заголовка: {title}\n\n{clipped}\n\n\
             Кратко: укажи 3-5 ключевых утверждений и риск (НИЗКИЙ/СРЕДНИЙ/ВЫСОКИЙ)."
        );
        let mut last_error: Option<String> = None;
        for model in &self.models {
            match timeout(FACT_CHECK_TIMEOUT, self.call_model(model, &prompt, 400, 0.2)).await {
                Ok(Ok(result)) if !result.is_empty() => return result,
                Ok(Ok(_)) => last_error = Some("пустой ответ модели".to_string()),
                Ok(Err(e)) => {
                    warn!(model, error = %e, "Fact-check model failed");
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    warn!(model, "Fact-check model timed out");
                    last_error = Some("таймаут запроса".to_string());
                }
            }
        }
        match last_error {
            Some(e) => format!(
                "Ошибка фактчекинга: {}",
                truncate_for_log(&e.replace('\n', " "), 180)
            ),
            None => "Ошибка фактчекинга: модель не ответила.".to_string(),
        }
    }
}

/// Split a model's comma/newline-separated answer into deduped phrases.
fn parse_keyword_list(text: &str, max_keywords: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for part in text.replace('\n', ",").split(',') {
        let phrase = part.trim().trim_matches(|c: char| c == '"' || c == '.');
        if phrase.is_empty() {
            continue;
        }
        let lower = phrase.to_lowercase();
        if seen.contains(&lower) {
            continue;
        }
        seen.push(lower);
        out.push(phrase.to_string());
        if out.len() >= max_keywords {
            break;
        }
    }
    out
}

/// Local fallback: the query itself, its leading word pairs/triples, and a
/// news-qualified variant.
fn deterministic_keywords(query: &str, max_keywords: usize) -> Vec<String> {
    let mut variants = vec![query.to_string()];
    let words: Vec<&str> = query.split_whitespace().filter(|w| w.len() > 2).collect();
    if words.len() >= 2 {
        variants.push(words[..2].join(" "));
    }
    if words.len() >= 3 {
        variants.push(words[..3].join(" "));
    }
    variants.push(format!("{query} новости"));

    let mut out: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for variant in variants {
        let lower = variant.to_lowercase();
        if seen.contains(&lower) {
            continue;
        }
        seen.push(lower);
        out.push(variant);
        if out.len() >= max_keywords {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn client_without_key() -> LlmClient {
        let http = HttpClient::new(&PipelineConfig::default()).unwrap();
        LlmClient::new(
            &http,
            DEFAULT_BASE_URL.to_string(),
            None,
            DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        )
    }

    #[test]
    fn test_parse_keyword_list() {
        let parsed = parse_keyword_list(
            "курс доллара, курс валют\nэкономика России, курс доллара",
            6,
        );
        assert_eq!(parsed, vec!["курс доллара", "курс валют", "экономика России"]);
    }

    #[test]
    fn test_parse_keyword_list_respects_limit() {
        assert_eq!(parse_keyword_list("а1, а2, а3, а4", 2).len(), 2);
    }

    #[test]
    fn test_deterministic_keywords() {
        let out = deterministic_keywords("искусственный интеллект в медицине", 6);
        assert_eq!(out[0], "искусственный интеллект в медицине");
        assert!(out.contains(&"искусственный интеллект".to_string()));
        assert!(out.contains(&"искусственный интеллект в медицине новости".to_string()));
    }

    #[tokio::test]
    async fn test_keywords_without_key_fall_back() {
        let client = client_without_key();
        let out = client.related_keywords("биткоин", 4).await;
        assert_eq!(out[0], "биткоин");
        assert!(out.contains(&"биткоин новости".to_string()));
        // Second call comes from the cache.
        assert_eq!(client.related_keywords("биткоин", 4).await, out);
    }

    #[tokio::test]
    async fn test_fact_check_without_key() {
        let client = client_without_key();
        let message = client.fact_check("Какой-то текст статьи.", "Заголовок").await;
        assert!(message.contains("Фактчекинг недоступен"));
    }

    #[tokio::test]
    async fn test_fact_check_without_text() {
        let client = client_without_key();
        assert_eq!(
            client.fact_check("  ", "Заголовок").await,
            "Нет текста для фактчекинга."
        );
    }
}
