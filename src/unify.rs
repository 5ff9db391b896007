//! Merges HN stories and RSS articles into one feed ordered by publication
//! time.
//!
//! The merged list is cached under a single key: while it is fresh, every
//! caller gets a prefix of it no matter which sources or feeds it asked for.
//! Source and feed options only shape the list built on a cold cache.
//! Filtering by category or source happens afterwards on whatever came back.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::cache::TtlCache;
use crate::hackernews::HnFetcher;
use crate::models::{ContentKind, Source, UnifiedItem};
use crate::rss::RssFetcher;

const UNIFIED: &str = "unified";

#[derive(Debug, Clone)]
pub struct UnifyOptions {
    pub include_hn: bool,
    pub include_rss: bool,
    pub rss_feeds: Vec<String>,
    pub limit: usize,
}

impl Default for UnifyOptions {
    fn default() -> Self {
        Self {
            include_hn: true,
            include_rss: true,
            rss_feeds: Vec::new(),
            limit: 30,
        }
    }
}

pub struct ContentUnifier {
    hn: Arc<HnFetcher>,
    rss: Arc<RssFetcher>,
    hn_limit: usize,
    rss_limit: usize,
    cache: Mutex<TtlCache<&'static str, Vec<UnifiedItem>>>,
}

impl ContentUnifier {
    pub fn new(
        hn: Arc<HnFetcher>,
        rss: Arc<RssFetcher>,
        hn_limit: usize,
        rss_limit: usize,
        cache: TtlCache<&'static str, Vec<UnifiedItem>>,
    ) -> Self {
        Self {
            hn,
            rss,
            hn_limit,
            rss_limit,
            cache: Mutex::new(cache),
        }
    }

    pub async fn is_cached(&self) -> bool {
        self.cache.lock().await.contains_fresh(&UNIFIED)
    }

    pub async fn fetch_unified(&self, options: &UnifyOptions) -> Vec<UnifiedItem> {
        if let Some(cached) = self.cache.lock().await.get(&UNIFIED) {
            return cached.into_iter().take(options.limit).collect();
        }

        let stories = async {
            if !options.include_hn {
                return Vec::new();
            }
            self.hn
                .fetch_top_stories(self.hn_limit)
                .await
                .iter()
                .take(self.hn_limit)
                .map(UnifiedItem::from)
                .collect::<Vec<_>>()
        };
        let articles = async {
            if !options.include_rss {
                return Vec::new();
            }
            self.rss
                .fetch_all(&options.rss_feeds)
                .await
                .iter()
                .take(self.rss_limit)
                .map(UnifiedItem::from)
                .collect::<Vec<_>>()
        };

        let (stories, articles) = tokio::join!(stories, articles);
        info!(
            "Unifying {} stories and {} articles",
            stories.len(),
            articles.len()
        );

        let merged = merge_by_date(stories, articles);
        self.cache.lock().await.insert(UNIFIED, merged.clone());

        merged.into_iter().take(options.limit).collect()
    }
}

/// Concatenate both sources and order newest first. Ties keep input order.
pub fn merge_by_date(stories: Vec<UnifiedItem>, articles: Vec<UnifiedItem>) -> Vec<UnifiedItem> {
    let mut merged = stories;
    merged.extend(articles);
    merged.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    merged
}

/// Post-fetch narrowing applied by the content endpoint.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub source: Option<Source>,
    pub category: Option<String>,
    pub limit: usize,
}

impl ContentFilter {
    pub fn apply(&self, items: Vec<UnifiedItem>) -> Vec<UnifiedItem> {
        let category = self
            .category
            .as_deref()
            .filter(|c| *c != "all")
            .map(str::to_lowercase);

        items
            .into_iter()
            .filter(|item| self.source.map_or(true, |source| item.source == source))
            .filter(|item| match &category {
                Some(needle) => {
                    item.category.to_lowercase().contains(needle)
                        || item
                            .source_category
                            .as_deref()
                            .map_or(false, |sc| sc.to_lowercase().contains(needle))
                }
                None => true,
            })
            .take(self.limit)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStats {
    pub hacker_news: usize,
    pub hack_the_box: usize,
    pub total_stories: usize,
    pub total_articles: usize,
}

impl ContentStats {
    pub fn from_items(items: &[UnifiedItem]) -> Self {
        let mut stats = ContentStats::default();
        for item in items {
            match item.source {
                Source::HackerNews => stats.hacker_news += 1,
                Source::HackTheBox => stats.hack_the_box += 1,
            }
            match item.kind {
                ContentKind::Story => stats.total_stories += 1,
                ContentKind::Article => stats.total_articles += 1,
            }
        }
        stats
    }
}

/// Sorted union of every category and source category present.
pub fn collect_categories(items: &[UnifiedItem]) -> Vec<String> {
    let mut categories = BTreeSet::new();
    for item in items {
        if !item.category.is_empty() {
            categories.insert(item.category.clone());
        }
        if let Some(sc) = item.source_category.as_deref().filter(|sc| !sc.is_empty()) {
            categories.insert(sc.to_string());
        }
    }
    categories.into_iter().collect()
}

/// Sources present, in order of first appearance.
pub fn collect_sources(items: &[UnifiedItem]) -> Vec<Source> {
    let mut sources = Vec::new();
    for item in items {
        if !sources.contains(&item.source) {
            sources.push(item.source);
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HackerNewsConfig, RssConfig};
    use chrono::{Duration, TimeZone, Utc};

    fn item(id: &str, source: Source, category: &str, minutes_ago: i64) -> UnifiedItem {
        let base = Utc.timestamp_opt(1_733_738_400, 0).unwrap();
        let kind = match source {
            Source::HackerNews => ContentKind::Story,
            Source::HackTheBox => ContentKind::Article,
        };
        UnifiedItem {
            id: id.to_string(),
            title: format!("Item {}", id),
            url: None,
            description: None,
            author: "someone".to_string(),
            score: None,
            comments: None,
            time_ago: String::new(),
            category: category.to_string(),
            source,
            source_category: match source {
                Source::HackTheBox => Some(format!("{} feed", category)),
                Source::HackerNews => None,
            },
            kind,
            pub_date: base - Duration::minutes(minutes_ago),
            domain: None,
        }
    }

    fn ids(items: &[UnifiedItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    mod merge_tests {
        use super::*;

        #[test]
        fn test_merge_sorts_newest_first() {
            let stories = vec![
                item("hn-1", Source::HackerNews, "AI/ML", 30),
                item("hn-2", Source::HackerNews, "Programming", 5),
            ];
            let articles = vec![
                item("rss-a", Source::HackTheBox, "Red Team", 10),
                item("rss-b", Source::HackTheBox, "Blue Team", 60),
            ];

            let merged = merge_by_date(stories, articles);
            assert_eq!(ids(&merged), vec!["hn-2", "rss-a", "hn-1", "rss-b"]);
        }

        #[test]
        fn test_merge_keeps_duplicates() {
            let stories = vec![item("hn-1", Source::HackerNews, "AI/ML", 1)];
            let articles = vec![item("hn-1", Source::HackerNews, "AI/ML", 1)];

            assert_eq!(merge_by_date(stories, articles).len(), 2);
        }
    }

    mod filter_tests {
        use super::*;

        fn sample() -> Vec<UnifiedItem> {
            vec![
                item("hn-1", Source::HackerNews, "Security", 1),
                item("rss-a", Source::HackTheBox, "Red Team", 2),
                item("hn-2", Source::HackerNews, "Programming", 3),
                item("rss-b", Source::HackTheBox, "Cyber Security", 4),
            ]
        }

        #[test]
        fn test_source_filter_is_exact() {
            let filter = ContentFilter {
                source: Some(Source::HackTheBox),
                category: None,
                limit: 10,
            };
            assert_eq!(ids(&filter.apply(sample())), vec!["rss-a", "rss-b"]);
        }

        #[test]
        fn test_category_filter_is_case_insensitive_substring() {
            let filter = ContentFilter {
                source: None,
                category: Some("SECURITY".to_string()),
                limit: 10,
            };
            assert_eq!(ids(&filter.apply(sample())), vec!["hn-1", "rss-b"]);
        }

        #[test]
        fn test_category_filter_matches_source_category() {
            let filter = ContentFilter {
                source: None,
                category: Some("team feed".to_string()),
                limit: 10,
            };
            assert_eq!(ids(&filter.apply(sample())), vec!["rss-a"]);
        }

        #[test]
        fn test_all_category_and_limit() {
            let filter = ContentFilter {
                source: None,
                category: Some("all".to_string()),
                limit: 3,
            };
            assert_eq!(ids(&filter.apply(sample())), vec!["hn-1", "rss-a", "hn-2"]);
        }

        #[test]
        fn test_stats_categories_and_sources() {
            let items = sample();
            let stats = ContentStats::from_items(&items);
            assert_eq!(
                stats,
                ContentStats {
                    hacker_news: 2,
                    hack_the_box: 2,
                    total_stories: 2,
                    total_articles: 2,
                }
            );

            assert_eq!(
                collect_categories(&items),
                vec![
                    "Cyber Security",
                    "Cyber Security feed",
                    "Programming",
                    "Red Team",
                    "Red Team feed",
                    "Security",
                ]
            );
            assert_eq!(
                collect_sources(&items),
                vec![Source::HackerNews, Source::HackTheBox]
            );
        }

        #[test]
        fn test_stats_json_names() {
            let json = serde_json::to_value(ContentStats::default()).unwrap();
            assert!(json.get("hackerNews").is_some());
            assert!(json.get("hackTheBox").is_some());
            assert!(json.get("totalStories").is_some());
            assert!(json.get("totalArticles").is_some());
        }
    }

    mod cache_tests {
        use super::*;
        use std::time::Duration as StdDuration;

        fn unreachable_unifier() -> ContentUnifier {
            let client = reqwest::Client::new();
            let hn_config = HackerNewsConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                ..HackerNewsConfig::default()
            };
            let rss_config = RssConfig {
                feeds: Vec::new(),
                ..RssConfig::default()
            };
            let hn = Arc::new(HnFetcher::new(
                client.clone(),
                &hn_config,
                TtlCache::new(Some(StdDuration::from_secs(300))),
            ));
            let rss = Arc::new(RssFetcher::new(
                client,
                &rss_config,
                TtlCache::new(Some(StdDuration::from_secs(600))),
            ));
            ContentUnifier::new(
                hn,
                rss,
                20,
                25,
                TtlCache::new(Some(StdDuration::from_secs(300))),
            )
        }

        #[tokio::test]
        async fn test_unreachable_sources_degrade_to_empty() {
            let unifier = unreachable_unifier();
            let content = unifier.fetch_unified(&UnifyOptions::default()).await;

            assert!(content.is_empty());
            assert!(unifier.is_cached().await);
        }

        #[tokio::test]
        async fn test_excluding_both_sources() {
            let unifier = unreachable_unifier();
            let options = UnifyOptions {
                include_hn: false,
                include_rss: false,
                ..UnifyOptions::default()
            };

            assert!(unifier.fetch_unified(&options).await.is_empty());
        }
    }

    mod source_tests {
        use super::*;
        use crate::config::FeedConfig;
        use serde_json::json;
        use std::time::Duration as StdDuration;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn rss_body() -> String {
            let now = Utc::now();
            let entries: String = [("Kerberoasting", 1), ("Pivoting", 2)]
                .iter()
                .map(|(title, hours)| {
                    format!(
                        "<item><title>{}</title><link>https://www.hackthebox.com/blog/{}</link><pubDate>{}</pubDate></item>",
                        title,
                        title.to_lowercase(),
                        (now - Duration::hours(*hours)).to_rfc2822()
                    )
                })
                .collect();
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <rss version="2.0"><channel><title>HTB</title><link>https://www.hackthebox.com/blog</link><description>Blog</description>{}</channel></rss>"#,
                entries
            )
        }

        async fn mount_feed(server: &MockServer) {
            Mock::given(method("GET"))
                .and(path("/red-team.xml"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "application/rss+xml")
                        .set_body_string(rss_body()),
                )
                .mount(server)
                .await;
        }

        fn unifier_for(server: &MockServer) -> ContentUnifier {
            let client = reqwest::Client::new();
            let hn_config = HackerNewsConfig {
                api_base: server.uri(),
                ..HackerNewsConfig::default()
            };
            let rss_config = RssConfig {
                feeds: vec![FeedConfig {
                    name: "Red Team".to_string(),
                    url: format!("{}/red-team.xml", server.uri()),
                    category: "Red Team".to_string(),
                }],
                default_categories: vec!["Red Team".to_string()],
                ..RssConfig::default()
            };
            let hn = Arc::new(HnFetcher::new(
                client.clone(),
                &hn_config,
                TtlCache::new(Some(StdDuration::from_secs(300))),
            ));
            let rss = Arc::new(RssFetcher::new(
                client,
                &rss_config,
                TtlCache::new(Some(StdDuration::from_secs(600))),
            ));
            ContentUnifier::new(
                hn,
                rss,
                20,
                25,
                TtlCache::new(Some(StdDuration::from_secs(300))),
            )
        }

        #[tokio::test]
        async fn test_warm_cache_ignores_source_options() {
            let server = MockServer::start().await;
            mount_feed(&server).await;
            Mock::given(method("GET"))
                .and(path("/topstories.json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([1])))
                .expect(0)
                .mount(&server)
                .await;

            let unifier = unifier_for(&server);
            let cold = unifier
                .fetch_unified(&UnifyOptions {
                    include_hn: false,
                    limit: 10,
                    ..UnifyOptions::default()
                })
                .await;
            assert_eq!(cold.len(), 2);

            let warm = unifier
                .fetch_unified(&UnifyOptions {
                    include_hn: true,
                    limit: 1,
                    ..UnifyOptions::default()
                })
                .await;
            assert_eq!(warm.len(), 1);
            assert_eq!(warm[0].title, "Kerberoasting");
            assert!(warm.iter().all(|item| item.source == Source::HackTheBox));
        }

        #[tokio::test]
        async fn test_hn_outage_keeps_articles() {
            let server = MockServer::start().await;
            mount_feed(&server).await;
            Mock::given(method("GET"))
                .and(path("/topstories.json"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;

            let unifier = unifier_for(&server);
            let content = unifier.fetch_unified(&UnifyOptions::default()).await;

            let titles: Vec<&str> = content.iter().map(|item| item.title.as_str()).collect();
            assert_eq!(titles, vec!["Kerberoasting", "Pivoting"]);
            assert!(content.iter().all(|item| item.source == Source::HackTheBox));
        }
    }
}
