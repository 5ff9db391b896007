use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::analysis::AnalysisService;
use crate::cache::TtlCache;
use crate::config::{Config, Secrets};
use crate::hackernews::HnFetcher;
use crate::llm::{LlmClient, OpenRouterClient};
use crate::models::{
    AnalysisResult, EnrichedStory, RssArticle, Source, TrendInput, TrendSnapshot, UnifiedItem,
};
use crate::refresh::run_refresh;
use crate::rss::{FeedSummary, RssFetcher};
use crate::trends::TrendAggregator;
use crate::unify::{
    collect_categories, collect_sources, ContentFilter, ContentStats, ContentUnifier,
    UnifyOptions,
};

const DEFAULT_STORY_LIMIT: usize = 30;
const DEFAULT_ARTICLE_LIMIT: usize = 25;
const DEFAULT_CONTENT_LIMIT: usize = 30;
const MAX_UNIFIED_FETCH: usize = 100;
const TREND_DAYS_KEPT: usize = 7;

pub struct AppState {
    pub hn: Arc<HnFetcher>,
    pub rss: Arc<RssFetcher>,
    pub unifier: Arc<ContentUnifier>,
    pub trends: Arc<TrendAggregator>,
    pub analysis: Arc<AnalysisService>,
    pub cron_secret: Option<String>,
    pub max_stories: usize,
    pub max_articles: usize,
}

impl AppState {
    /// Wire every component from configuration, sharing one HTTP client.
    pub fn new(client: Client, config: &Config, secrets: Secrets) -> Self {
        let hn = Arc::new(HnFetcher::new(
            client.clone(),
            &config.hackernews,
            TtlCache::new(Some(config.cache.stories_ttl())),
        ));
        let rss = Arc::new(RssFetcher::new(
            client.clone(),
            &config.rss,
            TtlCache::new(Some(config.cache.rss_ttl())),
        ));
        let unifier = Arc::new(ContentUnifier::new(
            hn.clone(),
            rss.clone(),
            config.hackernews.unified_limit,
            config.rss.unified_limit,
            TtlCache::new(Some(config.cache.unified_ttl())),
        ));
        let trends = Arc::new(TrendAggregator::new(
            TtlCache::new(None).with_max_entries(TREND_DAYS_KEPT),
        ));

        let llm = secrets.llm_api_key.map(|key| {
            Arc::new(OpenRouterClient::new(client, key, &config.llm)) as Arc<dyn LlmClient>
        });
        let mut analysis_cache = TtlCache::new(None);
        if let Some(max) = config.cache.analysis_max_entries {
            analysis_cache = analysis_cache.with_max_entries(max);
        }
        let analysis = Arc::new(AnalysisService::new(
            llm,
            analysis_cache,
            config.cache.analysis_failure_ttl(),
        ));

        Self {
            hn,
            rss,
            unifier,
            trends,
            analysis,
            cron_secret: secrets.cron_secret,
            max_stories: config.hackernews.max_stories,
            max_articles: config.rss.max_articles,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/stories", get(stories))
        .route("/rss", get(rss))
        .route("/content", get(content))
        .route("/analyze", post(analyze))
        .route("/cron", get(cron).post(cron))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{message}")]
    Internal {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal { message, source } => {
                error!("{}: {:#}", message, source);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Lenient integer query parameter: anything unparsable or below 1 falls
/// back to `default`. A zero limit would otherwise cache an empty upstream
/// fetch for every caller.
fn parse_limit(raw: Option<&str>, default: usize) -> usize {
    raw.map(str::trim)
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .map_or(default, |n| n as usize)
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

// Stories

#[derive(Debug, Default, Deserialize)]
pub struct StoriesQuery {
    pub limit: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoriesResponse {
    pub stories: Vec<EnrichedStory>,
    pub total: usize,
    pub cached: bool,
}

pub async fn stories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StoriesQuery>,
) -> Json<StoriesResponse> {
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_STORY_LIMIT).min(state.max_stories);

    let mut stories = state.hn.fetch_top_stories(limit).await;
    stories.truncate(limit);
    if let Some(category) = query
        .category
        .as_deref()
        .filter(|c| !c.is_empty() && *c != "all")
    {
        stories.retain(|story| story.category == category);
    }

    Json(StoriesResponse {
        total: stories.len(),
        cached: state.hn.is_cached().await,
        stories,
    })
}

// RSS

#[derive(Debug, Default, Deserialize)]
pub struct RssQuery {
    pub feeds: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RssResponse {
    pub articles: Vec<RssArticle>,
    pub total: usize,
    pub cached: bool,
    pub available_feeds: Vec<FeedSummary>,
}

pub async fn rss(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RssQuery>,
) -> Json<RssResponse> {
    let feeds = split_list(query.feeds.as_deref());
    let limit =
        parse_limit(query.limit.as_deref(), DEFAULT_ARTICLE_LIMIT).min(state.max_articles);

    let mut articles = state.rss.fetch_all(&feeds).await;
    let total = articles.len();
    articles.truncate(limit);

    Json(RssResponse {
        articles,
        total,
        cached: state.rss.is_cached().await,
        available_feeds: state.rss.available_feeds(),
    })
}

// Unified content

#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    #[serde(rename = "includeHN")]
    pub include_hn: Option<String>,
    #[serde(rename = "includeRSS")]
    pub include_rss: Option<String>,
    #[serde(rename = "rssFeeds")]
    pub rss_feeds: Option<String>,
    pub limit: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub content: Vec<UnifiedItem>,
    pub total: usize,
    pub cached: bool,
    pub categories: Vec<String>,
    pub sources: Vec<Source>,
    pub stats: ContentStats,
}

fn parse_source(raw: &str) -> Option<Source> {
    match raw {
        "HackerNews" => Some(Source::HackerNews),
        "HackTheBox" => Some(Source::HackTheBox),
        _ => None,
    }
}

pub async fn content(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContentQuery>,
) -> Json<ContentResponse> {
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_CONTENT_LIMIT);
    let options = UnifyOptions {
        include_hn: query.include_hn.as_deref() != Some("false"),
        include_rss: query.include_rss.as_deref() != Some("false"),
        rss_feeds: split_list(query.rss_feeds.as_deref()),
        limit: (limit * 2).min(MAX_UNIFIED_FETCH),
    };

    let items = state.unifier.fetch_unified(&options).await;

    let requested_source = query.source.as_deref().filter(|s| !s.is_empty());
    let content = match requested_source.map(parse_source) {
        // A source nobody publishes under matches nothing
        Some(None) => Vec::new(),
        source => ContentFilter {
            source: source.flatten(),
            category: query.category.filter(|c| !c.is_empty()),
            limit,
        }
        .apply(items),
    };

    Json(ContentResponse {
        total: content.len(),
        cached: state.unifier.is_cached().await,
        categories: collect_categories(&content),
        sources: collect_sources(&content),
        stats: ContentStats::from_items(&content),
        content,
    })
}

// Analysis

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub stories: Option<Vec<EnrichedStory>>,
    #[serde(default)]
    pub story_id: Option<Value>,
    #[serde(default)]
    pub content: Option<Vec<UnifiedItem>>,
    #[serde(default)]
    pub content_id: Option<Value>,
}

/// Ids arrive as arbitrary JSON. `null`, `false`, `0` and `""` count as
/// absent; anything else is an id that may or may not match.
fn present_id(raw: Option<&Value>) -> Option<&Value> {
    raw.filter(|value| match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzeResponse {
    Analysis(AnalysisResult),
    Trends(TrendSnapshot),
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let request: AnalyzeRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::Internal {
            message: "Failed to analyze content",
            source: e.into(),
        })?;

    match request.kind.as_deref() {
        Some("unified") => {
            if let Some(id) = present_id(request.content_id.as_ref()) {
                let item = request
                    .content
                    .iter()
                    .flatten()
                    .find(|item| id.as_str() == Some(item.id.as_str()))
                    .ok_or(ApiError::NotFound("Content not found"))?;
                let analysis = state.analysis.analyze_content(item).await;
                return Ok(Json(AnalyzeResponse::Analysis(analysis)));
            }
        }
        Some("story") => {
            if let Some(id) = present_id(request.story_id.as_ref()) {
                let story = request
                    .stories
                    .iter()
                    .flatten()
                    .find(|story| id.as_u64() == Some(story.story.id))
                    .ok_or(ApiError::NotFound("Story not found"))?;
                let analysis = state.analysis.analyze_story(story).await;
                return Ok(Json(AnalyzeResponse::Analysis(analysis)));
            }
        }
        Some("trends") => {
            let inputs: Option<Vec<TrendInput>> = match (&request.content, &request.stories) {
                (Some(content), _) => Some(content.iter().map(TrendInput::from).collect()),
                (None, Some(stories)) => Some(stories.iter().map(TrendInput::from).collect()),
                (None, None) => None,
            };
            if let Some(inputs) = inputs {
                let trends = state.trends.analyze_trends(&inputs).await;
                return Ok(Json(AnalyzeResponse::Trends(trends)));
            }
        }
        _ => {}
    }

    Err(ApiError::BadRequest("Invalid request type"))
}

// Cron

pub async fn cron(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(secret) = &state.cron_secret {
        let expected = format!("Bearer {}", secret);
        let provided = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return ApiError::Unauthorized.into_response();
        }
    }

    Json(run_refresh(&state).await).into_response()
}

pub async fn health() -> &'static str {
    "OK"
}
