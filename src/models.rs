//! Shapes shared between the fetchers, the unifier, the analyzers and the
//! JSON API. Field names serialize in camelCase for the web client.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY: &str = "Tech News";
pub const RSS_DEFAULT_AUTHOR: &str = "HackTheBox";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Item record as served by the HackerNews API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStory {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub by: String,
    #[serde(default)]
    pub descendants: i64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub time: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kids: Option<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedStory {
    #[serde(flatten)]
    pub story: RawStory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub time_ago: String,
    #[serde(default = "default_category")]
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    HackerNews,
    HackTheBox,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::HackerNews => write!(f, "HackerNews"),
            Source::HackTheBox => write!(f, "HackTheBox"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Story,
    Article,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RssArticle {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub pub_date: DateTime<Utc>,
    pub author: String,
    pub source: Source,
    pub source_category: String,
    pub category: String,
    pub time_ago: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<i64>,
    #[serde(default)]
    pub time_ago: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_category: Option<String>,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub pub_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

pub const STORY_ID_PREFIX: &str = "hn-";
pub const ARTICLE_ID_PREFIX: &str = "rss-";

impl UnifiedItem {
    /// Identifier of the record this item was built from, without the
    /// source prefix.
    pub fn origin_id(&self) -> &str {
        self.id
            .strip_prefix(STORY_ID_PREFIX)
            .or_else(|| self.id.strip_prefix(ARTICLE_ID_PREFIX))
            .unwrap_or(&self.id)
    }
}

impl From<&EnrichedStory> for UnifiedItem {
    fn from(enriched: &EnrichedStory) -> Self {
        let story = &enriched.story;
        Self {
            id: format!("{}{}", STORY_ID_PREFIX, story.id),
            title: story.title.clone(),
            url: story.url.clone(),
            description: None,
            author: story.by.clone(),
            score: Some(story.score),
            comments: Some(story.descendants),
            time_ago: enriched.time_ago.clone(),
            category: enriched.category.clone(),
            source: Source::HackerNews,
            source_category: None,
            kind: ContentKind::Story,
            pub_date: DateTime::from_timestamp(story.time, 0).unwrap_or_default(),
            domain: enriched.domain.clone(),
        }
    }
}

impl From<&RssArticle> for UnifiedItem {
    fn from(article: &RssArticle) -> Self {
        let author = if article.author.is_empty() {
            RSS_DEFAULT_AUTHOR.to_string()
        } else {
            article.author.clone()
        };
        let category = if article.category.is_empty() {
            article.source_category.clone()
        } else {
            article.category.clone()
        };

        Self {
            id: format!("{}{}", ARTICLE_ID_PREFIX, article.id),
            title: article.title.clone(),
            url: Some(article.url.clone()),
            description: article.description.clone(),
            author,
            score: None,
            comments: None,
            time_ago: article.time_ago.clone(),
            category,
            source: Source::HackTheBox,
            source_category: Some(article.source_category.clone()),
            kind: ContentKind::Article,
            pub_date: article.pub_date,
            domain: Some(
                crate::util::extract_domain(&article.url)
                    .unwrap_or_else(|| "hackthebox.com".to_string()),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Engagement buckets shared by the mock analysis and trend aggregation.
    pub fn from_score(score: i64) -> Self {
        if score > 100 {
            Sentiment::Positive
        } else if score > 50 {
            Sentiment::Neutral
        } else {
            Sentiment::Negative
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnicalLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl TechnicalLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beginner" => Some(TechnicalLevel::Beginner),
            "intermediate" => Some(TechnicalLevel::Intermediate),
            "advanced" => Some(TechnicalLevel::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: String,
    pub sentiment: Sentiment,
    pub key_points: Vec<String>,
    pub technical_level: TechnicalLevel,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentSplit {
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSnapshot {
    pub top_categories: Vec<CategoryShare>,
    pub emerging_topics: Vec<String>,
    pub sentiment: SentimentSplit,
    pub key_insights: Vec<String>,
    pub todays_summary: String,
}

/// Story-like view consumed by the trend aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendInput {
    pub id: String,
    pub title: String,
    pub score: i64,
    pub comments: i64,
    pub category: Option<String>,
}

impl From<&EnrichedStory> for TrendInput {
    fn from(enriched: &EnrichedStory) -> Self {
        Self {
            id: enriched.story.id.to_string(),
            title: enriched.story.title.clone(),
            score: enriched.story.score,
            comments: enriched.story.descendants,
            category: Some(enriched.category.clone()),
        }
    }
}

impl From<&UnifiedItem> for TrendInput {
    fn from(item: &UnifiedItem) -> Self {
        // Missing or zero engagement lands mid-range
        Self {
            id: item.origin_id().to_string(),
            title: item.title.clone(),
            score: item.score.filter(|s| *s != 0).unwrap_or(50),
            comments: item.comments.filter(|c| *c != 0).unwrap_or(5),
            category: Some(item.category.clone()),
        }
    }
}
