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

pub mod defaults;

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "defaults::Index::pool_size")]
    pub pool_size: usize,

    #[serde(default = "defaults::Index::autocomplete_deadline_ms")]
    pub autocomplete_deadline_ms: u64,

    #[serde(default = "defaults::Index::search_deadline_ms")]
    pub search_deadline_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            pool_size: defaults::Index::pool_size(),
            autocomplete_deadline_ms: defaults::Index::autocomplete_deadline_ms(),
            search_deadline_ms: defaults::Index::search_deadline_ms(),
        }
    }
}

/// Per-provider settings. Auth tokens are env-injected so the config files
/// can be committed without secrets.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BrokeredConfig {
    #[serde(default = "defaults::Brokered::search_timeout_ms")]
    pub search_timeout_ms: u64,

    /// Env var holding the NYTimes article search key.
    #[serde(default)]
    pub nytimes_key_env: Option<String>,

    /// Env var holding the YouTube data API key.
    #[serde(default)]
    pub youtube_key_env: Option<String>,

    /// Env var holding the Watchmode API key.
    #[serde(default)]
    pub watchmode_key_env: Option<String>,

    /// Env var holding the Last.fm API key.
    #[serde(default)]
    pub lastfm_key_env: Option<String>,
}

impl Default for BrokeredConfig {
    fn default() -> Self {
        Self {
            search_timeout_ms: defaults::Brokered::search_timeout_ms(),
            nytimes_key_env: None,
            youtube_key_env: None,
            watchmode_key_env: None,
            lastfm_key_env: None,
        }
    }
}

impl BrokeredConfig {
    pub fn key_from_env(var: &Option<String>) -> Option<String> {
        var.as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    pub host: SocketAddr,
    pub index_path: String,

    /// IPTC taxonomy file. Missing file means expansion is the identity.
    #[serde(default)]
    pub taxonomy_path: Option<String>,

    /// Registry read on startup for coordinated cache invalidation.
    #[serde(default)]
    pub registry_path: Option<String>,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub brokered: BrokeredConfig,

    #[serde(default = "defaults::Orchestrator::request_slack_ms")]
    pub request_slack_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: ApiConfig = toml::from_str(
            r#"
            host = "0.0.0.0:3000"
            index_path = "data/index"
            "#,
        )
        .unwrap();

        assert_eq!(config.index.pool_size, 10);
        assert_eq!(config.index.autocomplete_deadline_ms, 250);
        assert_eq!(config.index.search_deadline_ms, 1_500);
        assert_eq!(config.brokered.search_timeout_ms, 2_500);
        assert_eq!(config.request_slack_ms, 500);
        assert!(config.taxonomy_path.is_none());
    }
}
