//! Daily trend snapshot over a batch of stories.
//!
//! One snapshot is computed per UTC date and reused for the rest of that day,
//! whatever input later calls bring.

use std::collections::HashMap;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::cache::TtlCache;
use crate::models::{
    CategoryShare, Sentiment, SentimentSplit, TrendInput, TrendSnapshot, DEFAULT_CATEGORY,
};
use crate::util::{group_thousands, percent};

const TOP_CATEGORIES: usize = 5;
const TOP_TOPICS: usize = 5;
const MIN_TOPIC_LEN: usize = 5;
const STOP_WORDS: [&str; 6] = ["show", "ask", "the", "and", "for", "with"];

#[derive(Debug, Error, PartialEq)]
pub enum TrendError {
    #[error("no stories to analyze")]
    Empty,
}

pub struct TrendAggregator {
    cache: Mutex<TtlCache<String, TrendSnapshot>>,
}

impl TrendAggregator {
    pub fn new(cache: TtlCache<String, TrendSnapshot>) -> Self {
        Self {
            cache: Mutex::new(cache),
        }
    }

    pub async fn analyze_trends(&self, items: &[TrendInput]) -> TrendSnapshot {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        self.analyze_trends_for(&today, items).await
    }

    /// Snapshot for the given date key, computed at most once per key.
    pub async fn analyze_trends_for(&self, date: &str, items: &[TrendInput]) -> TrendSnapshot {
        let key = format!("trends-{}", date);
        if let Some(cached) = self.cache.lock().await.get(&key) {
            return cached;
        }

        let snapshot = match compute_snapshot(items) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Error analyzing trends: {}", e);
                fallback_snapshot(items.len())
            }
        };

        info!("Trend snapshot for {} computed over {} items", date, items.len());
        self.cache.lock().await.insert(key, snapshot.clone());
        snapshot
    }
}

/// Counts keys in first-appearance order so that ties stay stable when
/// sorted by count.
fn ordered_counts<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for key in keys {
        match index.get(key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key, counts.len());
                counts.push((key, 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn compute_snapshot(items: &[TrendInput]) -> Result<TrendSnapshot, TrendError> {
    if items.is_empty() {
        return Err(TrendError::Empty);
    }
    let total = items.len();

    let top_categories: Vec<CategoryShare> = ordered_counts(
        items
            .iter()
            .map(|item| item.category.as_deref().unwrap_or(DEFAULT_CATEGORY)),
    )
    .into_iter()
    .take(TOP_CATEGORIES)
    .map(|(category, count)| CategoryShare {
        category: category.to_string(),
        count,
        percentage: percent(count, total),
    })
    .collect();

    let (mut positive, mut neutral, mut negative) = (0, 0, 0);
    for item in items {
        match Sentiment::from_score(item.score) {
            Sentiment::Positive => positive += 1,
            Sentiment::Neutral => neutral += 1,
            Sentiment::Negative => negative += 1,
        }
    }

    let titles: Vec<String> = items.iter().map(|item| item.title.to_lowercase()).collect();
    let emerging_topics: Vec<String> = ordered_counts(
        titles
            .iter()
            .flat_map(|title| title.split_whitespace())
            .filter(|word| word.chars().count() >= MIN_TOPIC_LEN && !STOP_WORDS.contains(word)),
    )
    .into_iter()
    .filter(|(_, count)| *count >= 2)
    .take(TOP_TOPICS)
    .map(|(word, _)| word.to_string())
    .collect();

    let total_score: i64 = items.iter().map(|item| item.score).sum();
    let total_comments: i64 = items.iter().map(|item| item.comments).sum();
    let average_score = (total_score as f64 / total as f64).round() as i64;
    let average_comments = (total_comments as f64 / total as f64).round() as i64;

    let (lead_category, lead_percentage) = top_categories
        .first()
        .map(|c| (c.category.clone(), c.percentage))
        .unwrap_or_else(|| (DEFAULT_CATEGORY.to_string(), 0));

    let mood = if positive > neutral + negative {
        "engaged and positive"
    } else if positive + neutral > negative {
        "moderately engaged"
    } else {
        "selective"
    };

    Ok(TrendSnapshot {
        key_insights: vec![
            format!("{} stories analyzed from today's front page", total),
            format!("Most popular category: {} ({}%)", lead_category, lead_percentage),
            format!("Average score: {}", average_score),
            format!("Total comments: {}", group_thousands(total_comments)),
        ],
        todays_summary: format!(
            "Today's Hacker News features {} top stories with {} dominating the discussion. \
             The community seems {} with an average of {} comments per story.",
            total, lead_category, mood, average_comments
        ),
        top_categories,
        emerging_topics,
        sentiment: SentimentSplit {
            positive: percent(positive, total),
            neutral: percent(neutral, total),
            negative: percent(negative, total),
        },
    })
}

/// Fixed snapshot served when the batch cannot be aggregated.
pub fn fallback_snapshot(count: usize) -> TrendSnapshot {
    TrendSnapshot {
        top_categories: vec![CategoryShare {
            category: DEFAULT_CATEGORY.to_string(),
            count,
            percentage: 100,
        }],
        emerging_topics: vec![
            "technology".to_string(),
            "software".to_string(),
            "programming".to_string(),
        ],
        sentiment: SentimentSplit {
            positive: 40,
            neutral: 50,
            negative: 10,
        },
        key_insights: vec![
            format!("{} stories from Hacker News", count),
            "Mixed topics and discussions".to_string(),
            "Active community engagement".to_string(),
        ],
        todays_summary: format!(
            "Today's Hacker News features {} stories covering various technology topics \
             with active community discussion.",
            count
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, score: i64, comments: i64, category: Option<&str>) -> TrendInput {
        TrendInput {
            id: title.to_string(),
            title: title.to_string(),
            score,
            comments,
            category: category.map(str::to_string),
        }
    }

    fn aggregator() -> TrendAggregator {
        TrendAggregator::new(TtlCache::new(None))
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn test_sentiment_rounds_each_bucket() {
            let items = vec![
                input("one", 150, 0, None),
                input("two", 60, 0, None),
                input("three", 10, 0, None),
            ];
            let snapshot = compute_snapshot(&items).unwrap();
            assert_eq!(
                snapshot.sentiment,
                SentimentSplit {
                    positive: 33,
                    neutral: 33,
                    negative: 33,
                }
            );
        }

        #[test]
        fn test_category_histogram() {
            let items = vec![
                input("a", 10, 0, Some("Security")),
                input("b", 10, 0, Some("Programming")),
                input("c", 10, 0, Some("Programming")),
                input("d", 10, 0, None),
            ];
            let snapshot = compute_snapshot(&items).unwrap();
            let shares: Vec<(&str, usize, u32)> = snapshot
                .top_categories
                .iter()
                .map(|c| (c.category.as_str(), c.count, c.percentage))
                .collect();
            assert_eq!(
                shares,
                vec![
                    ("Programming", 2, 50),
                    ("Security", 1, 25),
                    ("Tech News", 1, 25),
                ]
            );
        }

        #[test]
        fn test_top_categories_capped_at_five() {
            let items: Vec<TrendInput> = (0..7)
                .map(|i| {
                    let category = format!("cat{}", i);
                    input("x", 10, 0, Some(category.as_str()))
                })
                .collect();
            let snapshot = compute_snapshot(&items).unwrap();
            assert_eq!(snapshot.top_categories.len(), 5);
            assert_eq!(snapshot.top_categories[0].category, "cat0");
        }

        #[test]
        fn test_emerging_topics() {
            let items = vec![
                input("Rust compiler internals", 10, 0, None),
                input("The Rust compiler gets faster", 10, 0, None),
                input("Postgres internals explained", 10, 0, None),
                input("Show HN: Postgres internals viewer", 10, 0, None),
                input("Shows shows shows", 10, 0, None),
            ];
            let snapshot = compute_snapshot(&items).unwrap();
            // "rust" is too short, "shows" counts three times
            assert_eq!(
                snapshot.emerging_topics,
                vec!["internals", "shows", "compiler", "postgres"]
            );
        }

        #[test]
        fn test_insights_and_summary() {
            let items = vec![
                input("alpha", 200, 1500, Some("AI/ML")),
                input("beta", 150, 700, Some("AI/ML")),
                input("gamma", 20, 5, Some("Startup")),
            ];
            let snapshot = compute_snapshot(&items).unwrap();
            assert_eq!(
                snapshot.key_insights,
                vec![
                    "3 stories analyzed from today's front page",
                    "Most popular category: AI/ML (67%)",
                    "Average score: 123",
                    "Total comments: 2,205",
                ]
            );
            assert_eq!(
                snapshot.todays_summary,
                "Today's Hacker News features 3 top stories with AI/ML dominating the \
                 discussion. The community seems engaged and positive with an average of 735 \
                 comments per story."
            );
        }

        #[test]
        fn test_mood_phrases() {
            let moderate = vec![input("a", 60, 0, None), input("b", 10, 0, None), input("c", 150, 0, None)];
            assert!(compute_snapshot(&moderate)
                .unwrap()
                .todays_summary
                .contains("moderately engaged"));

            let selective = vec![input("a", 10, 0, None), input("b", 20, 0, None), input("c", 150, 0, None)];
            assert!(compute_snapshot(&selective)
                .unwrap()
                .todays_summary
                .contains("seems selective"));
        }

        #[test]
        fn test_empty_input_is_an_error() {
            assert_eq!(compute_snapshot(&[]), Err(TrendError::Empty));
        }
    }

    mod cache_tests {
        use super::*;

        #[tokio::test]
        async fn test_same_day_returns_cached_snapshot() {
            let trends = aggregator();
            let first = trends
                .analyze_trends_for("2024-12-09", &[input("alpha", 200, 3, Some("AI/ML"))])
                .await;
            let second = trends
                .analyze_trends_for(
                    "2024-12-09",
                    &[input("beta", 10, 1, Some("Security")), input("gamma", 5, 1, None)],
                )
                .await;
            assert_eq!(first, second);

            let next_day = trends
                .analyze_trends_for("2024-12-10", &[input("beta", 10, 1, Some("Security"))])
                .await;
            assert_ne!(first, next_day);
        }

        #[tokio::test]
        async fn test_empty_input_caches_fallback() {
            let trends = aggregator();
            let snapshot = trends.analyze_trends_for("2024-12-09", &[]).await;
            assert_eq!(snapshot, fallback_snapshot(0));
            assert_eq!(snapshot.sentiment.neutral, 50);
            assert_eq!(snapshot.top_categories[0].percentage, 100);

            let again = trends
                .analyze_trends_for("2024-12-09", &[input("alpha", 200, 3, None)])
                .await;
            assert_eq!(again, snapshot);
        }

        #[tokio::test]
        async fn test_today_key() {
            let trends = aggregator();
            let first = trends.analyze_trends(&[input("alpha", 200, 3, None)]).await;
            let second = trends.analyze_trends(&[]).await;
            // Only fails if the test straddles UTC midnight
            assert_eq!(first, second);
        }
    }
}
