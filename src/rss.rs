use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::categorize::categorize_article;
use crate::config::{FeedConfig, RssConfig};
use crate::error::FetchError;
use crate::models::{RssArticle, Source, RSS_DEFAULT_AUTHOR};
use crate::util::time_ago;

const ALL_ARTICLES: &str = "articles";

/// Name and category of a catalog feed, as listed to API clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSummary {
    pub name: String,
    pub category: String,
}

pub struct RssFetcher {
    client: Client,
    feeds: Vec<FeedConfig>,
    default_categories: Vec<String>,
    fanout_limit: usize,
    max_articles: usize,
    cache: Mutex<TtlCache<&'static str, Vec<RssArticle>>>,
}

impl RssFetcher {
    pub fn new(
        client: Client,
        config: &RssConfig,
        cache: TtlCache<&'static str, Vec<RssArticle>>,
    ) -> Self {
        Self {
            client,
            feeds: config.feeds.clone(),
            default_categories: config.default_categories.clone(),
            fanout_limit: config.fanout_limit,
            max_articles: config.max_articles,
            cache: Mutex::new(cache),
        }
    }

    pub fn available_feeds(&self) -> Vec<FeedSummary> {
        self.feeds
            .iter()
            .map(|feed| FeedSummary {
                name: feed.name.clone(),
                category: feed.category.clone(),
            })
            .collect()
    }

    pub async fn is_cached(&self) -> bool {
        self.cache.lock().await.contains_fresh(&ALL_ARTICLES)
    }

    /// Feeds to fetch for the given category selection, in catalog order and
    /// capped at the fan-out limit. An empty selection means the default set.
    pub fn select_feeds(&self, selected_categories: &[String]) -> Vec<&FeedConfig> {
        let wanted: &[String] = if selected_categories.is_empty() {
            &self.default_categories
        } else {
            selected_categories
        };

        let matching: Vec<&FeedConfig> = self
            .feeds
            .iter()
            .filter(|feed| wanted.contains(&feed.category))
            .collect();

        if matching.len() > self.fanout_limit {
            warn!(
                "{} feeds selected, fetching only the first {}",
                matching.len(),
                self.fanout_limit
            );
        }

        matching.into_iter().take(self.fanout_limit).collect()
    }

    /// Most recent articles across the selected feeds. While the cache is
    /// fresh it is returned as-is and the selection is ignored.
    pub async fn fetch_all(&self, selected_categories: &[String]) -> Vec<RssArticle> {
        if let Some(cached) = self.cache.lock().await.get(&ALL_ARTICLES) {
            return cached;
        }

        let feeds = self.select_feeds(selected_categories);
        info!("Fetching {} RSS feeds", feeds.len());

        let requests = feeds.into_iter().map(|feed| self.fetch_feed_or_empty(feed));
        let results = join_all(requests).await;

        let mut articles: Vec<RssArticle> = results.into_iter().flatten().collect();
        articles.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
        articles.truncate(self.max_articles);

        info!("Fetched {} total RSS articles", articles.len());
        self.cache.lock().await.insert(ALL_ARTICLES, articles.clone());

        articles
    }

    async fn fetch_feed_or_empty(&self, feed: &FeedConfig) -> Vec<RssArticle> {
        match self.fetch_feed(feed).await {
            Ok(articles) => articles,
            Err(e) => {
                warn!("Error fetching RSS feed '{}': {}", feed.name, e);
                Vec::new()
            }
        }
    }

    async fn fetch_feed(&self, feed: &FeedConfig) -> Result<Vec<RssArticle>, FetchError> {
        info!("Fetching feed: {} ({})", feed.name, feed.url);

        let response = self.client.get(&feed.url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        let parsed = parser::parse(&bytes[..])?;

        let now = Utc::now();
        let articles: Vec<RssArticle> = parsed
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| normalize_entry(feed, index, entry, now))
            .collect();

        info!("Parsed {} articles from '{}'", articles.len(), feed.name);
        Ok(articles)
    }
}

/// Convert one feed entry into an article. Entries without a resolvable URL
/// are dropped.
pub fn normalize_entry(
    feed: &FeedConfig,
    index: usize,
    entry: &Entry,
    now: DateTime<Utc>,
) -> Option<RssArticle> {
    let url = entry_url(entry)?;

    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.clone())
        .unwrap_or_else(|| "Untitled".to_string());

    let summary = entry.summary.as_ref().map(|s| s.content.clone());

    let content = entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .filter(|body| !body.is_empty())
        .or_else(|| summary.as_deref().map(strip_html));

    let published = entry.published.or(entry.updated);
    let pub_date = published.unwrap_or(now);

    let author = entry
        .authors
        .first()
        .map(|p| p.name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| RSS_DEFAULT_AUTHOR.to_string());

    let category = categorize_article(&title, summary.as_deref().unwrap_or(""), &feed.category);

    Some(RssArticle {
        id: article_id(&feed.category, index, published),
        title,
        url,
        content,
        description: summary,
        pub_date,
        author,
        source: Source::HackTheBox,
        source_category: feed.category.clone(),
        category,
        time_ago: time_ago(pub_date, now),
    })
}

/// First link, falling back to the guid when it is itself a web URL.
fn entry_url(entry: &Entry) -> Option<String> {
    if let Some(link) = entry.links.first().filter(|l| !l.href.trim().is_empty()) {
        return Some(link.href.trim().to_string());
    }

    let guid = entry.id.trim();
    match url::Url::parse(guid) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(guid.to_string()),
        _ => None,
    }
}

/// `<category-slug>-<position>-<published epoch ms>`. Unstable if the feed
/// reorders its items between fetches.
pub fn article_id(category: &str, index: usize, published: Option<DateTime<Utc>>) -> String {
    let slug = category
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    let epoch_ms = published.map(|p| p.timestamp_millis()).unwrap_or(0);
    format!("{}-{}-{}", slug, index, epoch_ms)
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Plain-text snippet of an HTML fragment.
pub fn strip_html(html: &str) -> String {
    let text = RE_TAGS.replace_all(html, " ");
    RE_WS.replace_all(&text, " ").trim().to_string()
}
