//! Signalboard - a tech and security news dashboard backend
//!
//! Pulls top stories from the HackerNews API and articles from a catalog of
//! security RSS feeds, merges them into one time-ordered feed, and serves
//! them over a JSON API together with per-item analysis and a daily trend
//! snapshot.

pub mod analysis;
pub mod cache;
pub mod categorize;
pub mod config;
pub mod error;
pub mod hackernews;
pub mod llm;
pub mod models;
pub mod refresh;
pub mod routes;
pub mod rss;
pub mod trends;
pub mod unify;
pub mod util;
