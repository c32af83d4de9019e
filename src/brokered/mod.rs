// Medley is an open source unified media search service.
// Copyright (C) 2023 Medley ApS
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Brokered sources: external providers behind a uniform absorbing
//! adapter. Provider failures never propagate; they become an empty item
//! list with a structured error the orchestrator can log.

pub mod music;
pub mod news;
pub mod ratings;
pub mod video;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    config::BrokeredConfig,
    items::{Item, Source},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub message: String,
    pub status_code: u16,
}

impl FetchError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: status,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 500,
        }
    }

    pub fn disabled() -> Self {
        Self {
            message: "provider is not configured".to_string(),
            status_code: 503,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::http(status.as_u16(), err.to_string()),
            None => Self::transport(err.to_string()),
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch(&self, text: &str, limit: usize) -> Result<Vec<Item>, FetchError>;
}

/// Result of one adapter call. A failed or cancelled fetch yields an empty
/// item list and carries the error for logging.
pub struct FetchOutcome {
    pub items: Vec<Item>,
    pub latency: Duration,
    pub error: Option<FetchError>,
}

pub struct BrokeredAdapter {
    provider: Arc<dyn Provider>,
    timeout: Duration,
}

impl BrokeredAdapter {
    pub fn new(provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Fetch with the per-provider timeout, honoring cancellation. Must
    /// not raise: every failure mode collapses into a `FetchOutcome`.
    pub async fn fetch(
        &self,
        text: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let start = std::time::Instant::now();

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                return FetchOutcome {
                    items: Vec::new(),
                    latency: start.elapsed(),
                    error: None,
                };
            }
            result = tokio::time::timeout(self.timeout, self.provider.fetch(text, limit)) => result,
        };

        match result {
            Ok(Ok(mut items)) => {
                items.truncate(limit);
                FetchOutcome {
                    items,
                    latency: start.elapsed(),
                    error: None,
                }
            }
            Ok(Err(error)) => FetchOutcome {
                items: Vec::new(),
                latency: start.elapsed(),
                error: Some(error),
            },
            Err(_) => FetchOutcome {
                items: Vec::new(),
                latency: start.elapsed(),
                error: Some(FetchError::http(504, "provider deadline exceeded")),
            },
        }
    }
}

/// The configured adapter per brokered source.
pub struct BrokeredRegistry {
    adapters: HashMap<Source, BrokeredAdapter>,
}

impl BrokeredRegistry {
    pub fn from_config(config: &BrokeredConfig) -> Self {
        let timeout = Duration::from_millis(config.search_timeout_ms);
        let mut adapters = HashMap::new();

        let news = news::NyTimes::new(BrokeredConfig::key_from_env(&config.nytimes_key_env));
        adapters.insert(
            Source::News,
            BrokeredAdapter::new(Arc::new(news), timeout),
        );

        let video = video::YouTube::new(BrokeredConfig::key_from_env(&config.youtube_key_env));
        adapters.insert(
            Source::Video,
            BrokeredAdapter::new(Arc::new(video), timeout),
        );

        let ratings =
            ratings::Watchmode::new(BrokeredConfig::key_from_env(&config.watchmode_key_env));
        adapters.insert(
            Source::Ratings,
            BrokeredAdapter::new(Arc::new(ratings), timeout),
        );

        let lastfm_key = BrokeredConfig::key_from_env(&config.lastfm_key_env);
        adapters.insert(
            Source::Artist,
            BrokeredAdapter::new(
                Arc::new(music::LastFm::artists(lastfm_key.clone())),
                timeout,
            ),
        );
        adapters.insert(
            Source::Album,
            BrokeredAdapter::new(Arc::new(music::LastFm::albums(lastfm_key)), timeout),
        );

        Self { adapters }
    }

    /// Registry with a single adapter; used by tests.
    pub fn single(source: Source, adapter: BrokeredAdapter) -> Self {
        let mut adapters = HashMap::new();
        adapters.insert(source, adapter);
        Self { adapters }
    }

    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn get(&self, source: Source) -> Option<&BrokeredAdapter> {
        self.adapters.get(&source)
    }
}

/// Build the globally unique id for a brokered item.
pub fn brokered_mc_id(provider: &str, mc_type: Option<&str>, source_id: &str) -> String {
    match mc_type {
        Some(mc_type) => format!("{provider}_{mc_type}_{source_id}"),
        None => format!("{provider}_{source_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::McType;

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        fn source(&self) -> Source {
            Source::News
        }

        async fn fetch(&self, _text: &str, _limit: usize) -> Result<Vec<Item>, FetchError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn source(&self) -> Source {
            Source::News
        }

        async fn fetch(&self, _text: &str, _limit: usize) -> Result<Vec<Item>, FetchError> {
            Err(FetchError::http(429, "rate limited"))
        }
    }

    struct OkProvider;

    #[async_trait]
    impl Provider for OkProvider {
        fn source(&self) -> Source {
            Source::News
        }

        async fn fetch(&self, text: &str, _limit: usize) -> Result<Vec<Item>, FetchError> {
            Ok(vec![Item {
                mc_id: brokered_mc_id("nytimes", None, "abc"),
                mc_type: McType::NewsArticle,
                mc_subtype: None,
                source: "nytimes".to_string(),
                source_id: "abc".to_string(),
                search_title: text.to_string(),
                title: Some(text.to_string()),
                popularity: 0.0,
                rating: None,
                image: None,
                overview: None,
                canonical_name: String::new(),
                fields: serde_json::Map::new(),
            }])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_absorbed() {
        let adapter = BrokeredAdapter::new(Arc::new(SlowProvider), Duration::from_millis(2_500));
        let outcome = adapter
            .fetch("dune", 10, &CancellationToken::new())
            .await;

        assert!(outcome.items.is_empty());
        assert_eq!(outcome.error.unwrap().status_code, 504);
    }

    #[tokio::test]
    async fn failure_is_absorbed() {
        let adapter = BrokeredAdapter::new(Arc::new(FailingProvider), Duration::from_secs(1));
        let outcome = adapter
            .fetch("dune", 10, &CancellationToken::new())
            .await;

        assert!(outcome.items.is_empty());
        let error = outcome.error.unwrap();
        assert_eq!(error.status_code, 429);
    }

    #[tokio::test]
    async fn cancellation_returns_promptly() {
        let adapter = BrokeredAdapter::new(Arc::new(SlowProvider), Duration::from_secs(30));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = adapter.fetch("dune", 10, &cancel).await;
        assert!(outcome.items.is_empty());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn success_truncates_to_limit() {
        let adapter = BrokeredAdapter::new(Arc::new(OkProvider), Duration::from_secs(1));
        let outcome = adapter
            .fetch("dune", 10, &CancellationToken::new())
            .await;

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].mc_id, "nytimes_abc");
        assert!(outcome.error.is_none());
    }

    #[test]
    fn mc_id_shapes() {
        assert_eq!(brokered_mc_id("nytimes", None, "123"), "nytimes_123");
        assert_eq!(
            brokered_mc_id("lastfm", Some("music_album"), "xyz"),
            "lastfm_music_album_xyz"
        );
    }
}
