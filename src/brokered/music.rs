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

//! Last.fm artist and album search.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{brokered_mc_id, FetchError, Provider};
use crate::items::{normalize, popularity, Item, McSubtype, McType, Source};

const BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Listener counts are open-ended; cap the raw score so the popularity
/// mapping stays on the shared 0-100 scale.
const LISTENERS_PER_POINT: f64 = 10_000.0;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Artist,
    Album,
}

pub struct LastFm {
    api_key: Option<String>,
    kind: Kind,
    client: reqwest::Client,
}

impl LastFm {
    pub fn artists(api_key: Option<String>) -> Self {
        Self {
            api_key,
            kind: Kind::Artist,
            client: reqwest::Client::new(),
        }
    }

    pub fn albums(api_key: Option<String>) -> Self {
        Self {
            api_key,
            kind: Kind::Album,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for LastFm {
    fn source(&self) -> Source {
        match self.kind {
            Kind::Artist => Source::Artist,
            Kind::Album => Source::Album,
        }
    }

    async fn fetch(&self, text: &str, limit: usize) -> Result<Vec<Item>, FetchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(FetchError::disabled());
        };

        let limit_param = limit.clamp(1, 50).to_string();
        let (method, query_param) = match self.kind {
            Kind::Artist => ("artist.search", "artist"),
            Kind::Album => ("album.search", "album"),
        };

        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("method", method),
                (query_param, text),
                ("api_key", api_key),
                ("format", "json"),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::http(status.as_u16(), "last.fm request failed"));
        }

        let body: Value = resp.json().await?;
        Ok(match self.kind {
            Kind::Artist => parse_artists(&body, limit),
            Kind::Album => parse_albums(&body, limit),
        })
    }
}

fn largest_image(value: &Value) -> Option<String> {
    value
        .as_array()
        .and_then(|images| images.last())
        .and_then(|image| image["#text"].as_str())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

fn parse_artists(body: &Value, limit: usize) -> Vec<Item> {
    let matches = body["results"]["artistmatches"]["artist"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    matches
        .iter()
        .take(limit)
        .enumerate()
        .filter_map(|(i, artist)| {
            let name = artist["name"].as_str()?;
            let source_id = artist["mbid"]
                .as_str()
                .filter(|mbid| !mbid.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| normalize::canonical_name(name));

            let listeners = artist["listeners"]
                .as_str()
                .and_then(|l| l.parse::<f64>().ok())
                .unwrap_or(0.0);

            let mut fields = Map::new();
            fields.insert(
                "links".to_string(),
                json!(artist["url"]
                    .as_str()
                    .map(|url| vec![json!({"key": "lastfm", "url": url})])
                    .unwrap_or_default()),
            );
            fields.insert("images".to_string(), json!([]));
            fields.insert("metrics".to_string(), json!({ "listeners": listeners }));
            fields.insert(
                "external_ids".to_string(),
                json!({ "musicbrainz": artist["mbid"].as_str().unwrap_or_default() }),
            );
            fields.insert("sort_order".to_string(), json!(i as i64));

            Some(Item {
                mc_id: brokered_mc_id("lastfm", Some("artist"), &source_id),
                mc_type: McType::Person,
                mc_subtype: Some(McSubtype::MusicArtist),
                source: "lastfm".to_string(),
                source_id,
                search_title: name.to_string(),
                title: Some(name.to_string()),
                popularity: popularity::normalize(
                    Source::Artist,
                    listeners / LISTENERS_PER_POINT,
                ),
                rating: None,
                image: largest_image(&artist["image"]),
                overview: None,
                canonical_name: normalize::canonical_name(name),
                fields,
            })
        })
        .collect()
}

fn parse_albums(body: &Value, limit: usize) -> Vec<Item> {
    let matches = body["results"]["albummatches"]["album"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    matches
        .iter()
        .take(limit)
        .enumerate()
        .filter_map(|(i, album)| {
            let name = album["name"].as_str()?;
            let artist = album["artist"].as_str().unwrap_or_default();
            let source_id = album["mbid"]
                .as_str()
                .filter(|mbid| !mbid.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    normalize::canonical_name(&format!("{artist} {name}"))
                });

            let mut fields = Map::new();
            fields.insert(
                "links".to_string(),
                json!(album["url"]
                    .as_str()
                    .map(|url| vec![json!({"key": "lastfm", "url": url})])
                    .unwrap_or_default()),
            );
            fields.insert("images".to_string(), json!([]));
            fields.insert("metrics".to_string(), json!({}));
            fields.insert(
                "external_ids".to_string(),
                json!({ "musicbrainz": album["mbid"].as_str().unwrap_or_default() }),
            );
            fields.insert("sort_order".to_string(), json!(i as i64));
            fields.insert("artist".to_string(), json!(artist));

            Some(Item {
                mc_id: brokered_mc_id("lastfm", Some("music_album"), &source_id),
                mc_type: McType::MusicAlbum,
                mc_subtype: None,
                source: "lastfm".to_string(),
                source_id,
                search_title: name.to_string(),
                title: Some(name.to_string()),
                popularity: 0.0,
                rating: None,
                image: largest_image(&album["image"]),
                overview: None,
                canonical_name: normalize::canonical_name(name),
                fields,
            })
        })
        .collect()
}
