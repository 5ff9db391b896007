use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::models::TrendInput;
use crate::routes::AppState;

const REFRESH_STORIES: usize = 30;
const TREND_STORIES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub success: bool,
    pub timestamp: String,
    pub stories_refreshed: usize,
    pub cached: bool,
}

/// Warm the story cache and kick off the day's trend snapshot.
///
/// An unreachable HackerNews degrades to zero refreshed stories. Trend
/// analysis runs detached; its outcome never affects the summary.
pub async fn run_refresh(state: &AppState) -> RefreshSummary {
    let cached = state.hn.is_cached().await;
    let mut stories = state.hn.fetch_top_stories(REFRESH_STORIES).await;
    stories.truncate(REFRESH_STORIES);

    if !stories.is_empty() {
        let inputs: Vec<TrendInput> = stories
            .iter()
            .take(TREND_STORIES)
            .map(TrendInput::from)
            .collect();
        let trends = state.trends.clone();
        tokio::spawn(async move {
            trends.analyze_trends(&inputs).await;
        });
    }

    info!(
        "Refresh completed: {} stories (cached: {})",
        stories.len(),
        cached
    );
    RefreshSummary {
        success: true,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        stories_refreshed: stories.len(),
        cached,
    }
}

/// Run the refresh routine now and then every `interval_minutes`.
pub async fn start_background_refresh(state: Arc<AppState>, interval_minutes: u64) {
    let interval = Duration::from_secs(interval_minutes * 60);

    info!("Starting initial refresh");
    run_refresh(&state).await;

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled refresh");
        run_refresh(&state).await;
    }
}
