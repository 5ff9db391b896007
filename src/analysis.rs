//! Per-item analysis backed by an optional language model.
//!
//! Without a model every request gets a deterministic mock derived from the
//! item itself. With one, the completion is parsed as JSON and every field is
//! corrected in place rather than rejected. Any failure along the way yields a
//! second deterministic template, which is cached like a success; how long it
//! is kept is set by the failure TTL.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::cache::TtlCache;
use crate::error::LlmError;
use crate::llm::LlmClient;
use crate::models::{
    AnalysisResult, ContentKind, EnrichedStory, Sentiment, TechnicalLevel, UnifiedItem,
};

const STORY_SYSTEM_PROMPT: &str = "You are an expert tech analyst who summarizes and analyzes \
    Hacker News stories. Always respond with valid JSON.";
const CONTENT_SYSTEM_PROMPT: &str = "You are an expert tech and cybersecurity analyst who \
    summarizes and analyzes content from HackerNews and security blogs. Always respond with \
    valid JSON.";

const MAX_KEY_POINTS: usize = 4;

/// Values substituted for fields the model omitted or got wrong.
struct Defaults {
    summary: String,
    key_points: Vec<String>,
    relevance: f64,
}

/// Something the service knows how to analyze.
trait Subject {
    fn cache_key(&self) -> String;
    fn system_prompt(&self) -> &'static str;
    fn prompt(&self) -> String;
    fn mock(&self) -> AnalysisResult;
    fn defaults(&self) -> Defaults;
    fn fallback(&self) -> AnalysisResult;
}

fn technical_level_for(category: &str) -> TechnicalLevel {
    if ["Security", "Red Team", "Blue Team"]
        .iter()
        .any(|needle| category.contains(needle))
    {
        TechnicalLevel::Advanced
    } else {
        TechnicalLevel::Intermediate
    }
}

/// Score scaled to [0, 1]; 100 points or more is fully relevant.
fn engagement_relevance(score: i64) -> f64 {
    (score as f64 / 100.0).clamp(0.0, 1.0)
}

impl Subject for EnrichedStory {
    fn cache_key(&self) -> String {
        format!("story-{}", self.story.id)
    }

    fn system_prompt(&self) -> &'static str {
        STORY_SYSTEM_PROMPT
    }

    fn prompt(&self) -> String {
        let story = &self.story;
        format!(
            "Analyze this Hacker News story:\n\n\
             Title: {}\nURL: {}\nAuthor: {}\nScore: {} points\nComments: {}\n\
             Category: {}\nPosted: {}\n\n\
             Please provide:\n\
             1. A 2-3 sentence summary of what this story is about\n\
             2. The general sentiment (positive/neutral/negative) based on the title and engagement\n\
             3. 3-4 key points about this story\n\
             4. Technical complexity level (beginner/intermediate/advanced)\n\
             5. Relevance score (0-1) for tech professionals\n\n\
             Format your response as JSON with keys: summary, sentiment, keyPoints (array), \
             technicalLevel, relevanceScore",
            story.title,
            story.url.as_deref().unwrap_or("No URL"),
            story.by,
            story.score,
            story.descendants,
            self.category,
            self.time_ago,
        )
    }

    fn mock(&self) -> AnalysisResult {
        let story = &self.story;
        AnalysisResult {
            summary: format!(
                "A discussion about {} with {} points and {} comments.",
                story.title, story.score, story.descendants
            ),
            sentiment: Sentiment::from_score(story.score),
            key_points: vec![
                format!("Popular story with {} points", story.score),
                format!("Generated {} comments", story.descendants),
                format!("Posted {} by {}", self.time_ago, story.by),
            ],
            technical_level: technical_level_for(&self.category),
            relevance_score: engagement_relevance(story.score),
        }
    }

    fn defaults(&self) -> Defaults {
        Defaults {
            summary: format!("A story about {}", self.story.title),
            key_points: vec![
                format!("{} points", self.story.score),
                format!("{} comments", self.story.descendants),
            ],
            relevance: 0.5,
        }
    }

    fn fallback(&self) -> AnalysisResult {
        let story = &self.story;
        AnalysisResult {
            summary: format!(
                "A story titled \"{}\" with {} points and {} comments.",
                story.title, story.score, story.descendants
            ),
            sentiment: Sentiment::Neutral,
            key_points: vec![
                format!("{} points on Hacker News", story.score),
                format!("{} comments from the community", story.descendants),
                format!("Posted by {} {}", story.by, self.time_ago),
                match &self.domain {
                    Some(domain) => format!("From {}", domain),
                    None => "Discussion post".to_string(),
                },
            ],
            technical_level: TechnicalLevel::Intermediate,
            relevance_score: 0.5,
        }
    }
}

impl Subject for UnifiedItem {
    fn cache_key(&self) -> String {
        format!("unified-{}", self.id)
    }

    fn system_prompt(&self) -> &'static str {
        CONTENT_SYSTEM_PROMPT
    }

    fn prompt(&self) -> String {
        let kind = match self.kind {
            ContentKind::Story => "story",
            ContentKind::Article => "article",
        };
        let engagement = match self.kind {
            ContentKind::Story => format!(
                "Score: {} points, Comments: {}",
                self.score.unwrap_or(0),
                self.comments.unwrap_or(0)
            ),
            ContentKind::Article => String::new(),
        };
        let description = self
            .description
            .as_deref()
            .map(|d| format!("Description: {}", d))
            .unwrap_or_default();

        format!(
            "Analyze this {source} content:\n\n\
             Title: {}\nURL: {}\nAuthor: {}\nType: {}\nSource: {source}\nCategory: {}\n\
             Posted: {}\n{}\n{}\n\n\
             Please provide:\n\
             1. A 2-3 sentence summary of what this content is about\n\
             2. The general sentiment (positive/neutral/negative) based on the title and engagement\n\
             3. 3-4 key points about this content\n\
             4. Technical complexity level (beginner/intermediate/advanced)\n\
             5. Relevance score (0-1) for tech and security professionals\n\n\
             Format your response as JSON with keys: summary, sentiment, keyPoints (array), \
             technicalLevel, relevanceScore",
            self.title,
            self.url.as_deref().unwrap_or("No URL"),
            self.author,
            kind,
            self.category,
            self.time_ago,
            engagement,
            description,
            source = self.source,
        )
    }

    fn mock(&self) -> AnalysisResult {
        let technical_level = technical_level_for(&self.category);
        match self.kind {
            ContentKind::Story => {
                let score = self.score.unwrap_or(0);
                let comments = self.comments.unwrap_or(0);
                AnalysisResult {
                    summary: format!(
                        "A HackerNews discussion about {} with {} points and {} comments.",
                        self.title, score, comments
                    ),
                    sentiment: Sentiment::from_score(score),
                    key_points: vec![
                        format!("Popular {} story with {} points", self.source, score),
                        format!("Generated {} comments", comments),
                        format!("Posted {} by {}", self.time_ago, self.author),
                    ],
                    technical_level,
                    relevance_score: if score != 0 {
                        engagement_relevance(score)
                    } else {
                        0.7
                    },
                }
            }
            ContentKind::Article => AnalysisResult {
                summary: format!(
                    "A {} article about {} published {}.",
                    self.source, self.title, self.time_ago
                ),
                sentiment: Sentiment::Neutral,
                key_points: vec![
                    format!(
                        "{} article from {}",
                        self.source,
                        self.domain.as_deref().unwrap_or("hackthebox.com")
                    ),
                    format!("Published {}", self.time_ago),
                    format!("Category: {}", self.category),
                    if self.description.is_some() {
                        "Includes detailed content".to_string()
                    } else {
                        "Technical article".to_string()
                    },
                ],
                technical_level,
                relevance_score: 0.7,
            },
        }
    }

    fn defaults(&self) -> Defaults {
        Defaults {
            summary: format!("Content about {}", self.title),
            key_points: vec![
                self.source.to_string(),
                self.category.clone(),
                format!("Published {}", self.time_ago),
            ],
            relevance: 0.6,
        }
    }

    fn fallback(&self) -> AnalysisResult {
        AnalysisResult {
            summary: format!(
                "Content titled \"{}\" from {} published {}.",
                self.title, self.source, self.time_ago
            ),
            sentiment: Sentiment::Neutral,
            key_points: vec![
                format!("{} content", self.source),
                format!("Category: {}", self.category),
                format!("Posted {} by {}", self.time_ago, self.author),
                match &self.domain {
                    Some(domain) => format!("From {}", domain),
                    None => "Tech/Security content".to_string(),
                },
            ],
            technical_level: TechnicalLevel::Intermediate,
            relevance_score: 0.6,
        }
    }
}

pub struct AnalysisService {
    llm: Option<Arc<dyn LlmClient>>,
    cache: Mutex<TtlCache<String, AnalysisResult>>,
    failure_ttl: Option<Duration>,
}

impl AnalysisService {
    /// `llm = None` selects mock analysis. `failure_ttl = None` keeps fallback
    /// results as long as successful ones.
    pub fn new(
        llm: Option<Arc<dyn LlmClient>>,
        cache: TtlCache<String, AnalysisResult>,
        failure_ttl: Option<Duration>,
    ) -> Self {
        if let Some(llm) = &llm {
            info!("Analysis backed by {}", llm.name());
        } else {
            info!("No LLM credential configured, serving mock analysis");
        }
        Self {
            llm,
            cache: Mutex::new(cache),
            failure_ttl,
        }
    }

    pub async fn analyze_story(&self, story: &EnrichedStory) -> AnalysisResult {
        self.analyze(story).await
    }

    pub async fn analyze_content(&self, item: &UnifiedItem) -> AnalysisResult {
        self.analyze(item).await
    }

    async fn analyze<S: Subject + Sync>(&self, subject: &S) -> AnalysisResult {
        let key = subject.cache_key();
        if let Some(cached) = self.cache.lock().await.get(&key) {
            return cached;
        }

        let Some(llm) = &self.llm else {
            let mock = subject.mock();
            self.cache.lock().await.insert(key, mock.clone());
            return mock;
        };

        let outcome = async {
            let reply = llm
                .complete(subject.system_prompt(), &subject.prompt())
                .await?;
            parse_completion(&reply)
        }
        .await;

        match outcome {
            Ok(fields) => {
                let result = sanitize(&fields, subject.defaults());
                self.cache.lock().await.insert(key, result.clone());
                result
            }
            Err(e) => {
                error!("Error analyzing {}: {}", key, e);
                let fallback = subject.fallback();
                let mut cache = self.cache.lock().await;
                match self.failure_ttl {
                    Some(ttl) => cache.insert_with_ttl(key, fallback.clone(), Some(ttl)),
                    None => cache.insert(key, fallback.clone()),
                }
                fallback
            }
        }
    }
}

/// Parse a completion as a JSON object. A surrounding markdown code fence is
/// tolerated.
pub fn parse_completion(reply: &str) -> Result<Map<String, Value>, LlmError> {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json") on the opening fence line
        text = rest.split_once('\n').map_or("", |(_, body)| body);
        text = text.trim_end().strip_suffix("```").unwrap_or(text).trim();
    }

    match serde_json::from_str::<Value>(text)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(LlmError::NotAnObject),
    }
}

fn sanitize(fields: &Map<String, Value>, defaults: Defaults) -> AnalysisResult {
    let summary = match fields.get("summary") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => defaults.summary,
    };

    let sentiment = fields
        .get("sentiment")
        .and_then(Value::as_str)
        .and_then(Sentiment::parse)
        .unwrap_or(Sentiment::Neutral);

    let key_points = match fields.get("keyPoints") {
        Some(Value::Array(points)) => points
            .iter()
            .take(MAX_KEY_POINTS)
            .map(|point| match point {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => defaults.key_points,
    };

    let technical_level = fields
        .get("technicalLevel")
        .and_then(Value::as_str)
        .and_then(TechnicalLevel::parse)
        .unwrap_or(TechnicalLevel::Intermediate);

    let relevance_score = fields
        .get("relevanceScore")
        .and_then(Value::as_f64)
        .map(|score| score.clamp(0.0, 1.0))
        .unwrap_or(defaults.relevance);

    AnalysisResult {
        summary,
        sentiment,
        key_points,
        technical_level,
        relevance_score,
    }
}
