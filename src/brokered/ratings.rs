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

//! Watchmode title search; carries cross-provider rating identifiers.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{brokered_mc_id, FetchError, Provider};
use crate::items::{normalize, Item, McType, Source};

const BASE_URL: &str = "https://api.watchmode.com/v1/search/";

pub struct Watchmode {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl Watchmode {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for Watchmode {
    fn source(&self) -> Source {
        Source::Ratings
    }

    async fn fetch(&self, text: &str, limit: usize) -> Result<Vec<Item>, FetchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(FetchError::disabled());
        };

        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("apiKey", api_key),
                ("search_field", "name"),
                ("search_value", text),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::http(status.as_u16(), "watchmode request failed"));
        }

        let body: Value = resp.json().await?;
        Ok(parse_response(&body, limit))
    }
}

fn parse_response(body: &Value, limit: usize) -> Vec<Item> {
    let results = body["title_results"].as_array().cloned().unwrap_or_default();

    results
        .iter()
        .take(limit)
        .enumerate()
        .filter_map(|(i, title)| title_item(title, i as i64))
        .collect()
}

fn title_item(title: &Value, sort_order: i64) -> Option<Item> {
    let id = title["id"].as_i64()?.to_string();
    let name = title["name"].as_str().unwrap_or_default();

    let mc_type = match title["tmdb_type"].as_str().or(title["type"].as_str()) {
        Some("tv") | Some("tv_series") => McType::Tv,
        _ => McType::Movie,
    };

    let mut external_ids = Map::new();
    if let Some(imdb) = title["imdb_id"].as_str() {
        external_ids.insert("imdb".to_string(), json!(imdb));
    }
    if let Some(tmdb) = title["tmdb_id"].as_i64() {
        external_ids.insert("tmdb".to_string(), json!(tmdb));
    }

    let mut fields = Map::new();
    fields.insert("links".to_string(), json!([]));
    fields.insert("images".to_string(), json!([]));
    fields.insert("metrics".to_string(), json!({}));
    fields.insert("external_ids".to_string(), Value::Object(external_ids));
    fields.insert("sort_order".to_string(), json!(sort_order));

    if let Some(year) = title["year"].as_i64() {
        fields.insert("year".to_string(), json!(year));
    }

    Some(Item {
        mc_id: brokered_mc_id("watchmode", Some(mc_type.as_str()), &id),
        mc_type,
        mc_subtype: None,
        source: "watchmode".to_string(),
        source_id: id,
        search_title: name.to_string(),
        title: Some(name.to_string()),
        popularity: 0.0,
        rating: None,
        image: None,
        overview: None,
        canonical_name: normalize::canonical_name(name),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_title_payload() {
        let body = json!({
            "title_results": [{
                "id": 3173903,
                "name": "Dune",
                "type": "movie",
                "year": 2021,
                "imdb_id": "tt1160419",
                "tmdb_id": 438631,
                "tmdb_type": "movie"
            }]
        });

        let items = parse_response(&body, 10);
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.mc_id, "watchmode_movie_3173903");
        assert_eq!(item.mc_type, McType::Movie);
        assert_eq!(item.fields["external_ids"]["imdb"], "tt1160419");
        assert_eq!(item.fields["external_ids"]["tmdb"], 438631);
        assert_eq!(item.fields["year"], 2021);
    }

    #[test]
    fn tv_type_mapping() {
        let body = json!({
            "title_results": [{"id": 1, "name": "The Office", "tmdb_type": "tv"}]
        });

        let items = parse_response(&body, 10);
        assert_eq!(items[0].mc_type, McType::Tv);
        assert_eq!(items[0].mc_id, "watchmode_tv_1");
    }
}
