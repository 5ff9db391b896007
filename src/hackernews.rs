use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::cache::TtlCache;
use crate::categorize::categorize_story;
use crate::config::HackerNewsConfig;
use crate::error::FetchError;
use crate::models::{EnrichedStory, RawStory};
use crate::util::{extract_domain, time_ago_unix};

const TOP_STORIES: &str = "top";

pub struct HnFetcher {
    client: Client,
    api_base: String,
    cache: Mutex<TtlCache<&'static str, Vec<EnrichedStory>>>,
}

impl HnFetcher {
    pub fn new(
        client: Client,
        config: &HackerNewsConfig,
        cache: TtlCache<&'static str, Vec<EnrichedStory>>,
    ) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            cache: Mutex::new(cache),
        }
    }

    /// Whether a fresh story list is cached.
    pub async fn is_cached(&self) -> bool {
        self.cache.lock().await.contains_fresh(&TOP_STORIES)
    }

    /// Top stories, served from cache while fresh. Upstream failures are
    /// logged and yield an empty list.
    pub async fn fetch_top_stories(&self, limit: usize) -> Vec<EnrichedStory> {
        match self.try_fetch_top_stories(limit).await {
            Ok(stories) => stories,
            Err(e) => {
                error!("Failed to fetch top stories: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`fetch_top_stories`](Self::fetch_top_stories) but surfaces the
    /// upstream error. A cached list is returned whole regardless of `limit`.
    pub async fn try_fetch_top_stories(
        &self,
        limit: usize,
    ) -> Result<Vec<EnrichedStory>, FetchError> {
        if let Some(cached) = self.cache.lock().await.get(&TOP_STORIES) {
            return Ok(cached);
        }

        let url = format!("{}/topstories.json", self.api_base);
        info!("Fetching top story ids: {}", url);

        let ids: Vec<u64> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let requests = ids.into_iter().take(limit).map(|id| self.fetch_story(id));
        let stories = join_all(requests).await;

        let now = Utc::now();
        let enriched: Vec<EnrichedStory> = stories
            .into_iter()
            .flatten()
            .filter(|story| story.kind == "story")
            .map(|story| enrich_story(story, now))
            .collect();

        info!("Fetched {} top stories", enriched.len());
        self.cache.lock().await.insert(TOP_STORIES, enriched.clone());

        Ok(enriched)
    }

    async fn fetch_story(&self, id: u64) -> Option<RawStory> {
        let url = format!("{}/item/{}.json", self.api_base, id);

        let result: Result<Option<RawStory>, reqwest::Error> = async {
            self.client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match result {
            Ok(story) => story,
            Err(e) => {
                warn!("Error fetching story {}: {}", id, e);
                None
            }
        }
    }
}

/// Attach the derived display fields to a raw story.
pub fn enrich_story(story: RawStory, now: DateTime<Utc>) -> EnrichedStory {
    let domain = story.url.as_deref().and_then(extract_domain);
    let time_ago = time_ago_unix(story.time, now);
    let category = categorize_story(&story.title, story.url.as_deref()).to_string();

    EnrichedStory {
        story,
        domain,
        time_ago,
        category,
    }
}
