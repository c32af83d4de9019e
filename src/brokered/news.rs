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

//! NYTimes article search.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{brokered_mc_id, FetchError, Provider};
use crate::items::{normalize, Item, McType, Source};

const BASE_URL: &str = "https://api.nytimes.com/svc/search/v2/articlesearch.json";
const IMAGE_BASE: &str = "https://www.nytimes.com/";

pub struct NyTimes {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl NyTimes {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for NyTimes {
    fn source(&self) -> Source {
        Source::News
    }

    async fn fetch(&self, text: &str, limit: usize) -> Result<Vec<Item>, FetchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(FetchError::disabled());
        };

        let resp = self
            .client
            .get(BASE_URL)
            .query(&[("q", text), ("api-key", api_key)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::http(status.as_u16(), "nytimes request failed"));
        }

        let body: Value = resp.json().await?;
        Ok(parse_response(&body, limit))
    }
}

fn parse_response(body: &Value, limit: usize) -> Vec<Item> {
    let docs = body["response"]["docs"].as_array().cloned().unwrap_or_default();

    docs.iter()
        .take(limit)
        .enumerate()
        .filter_map(|(i, doc)| article_item(doc, i as i64))
        .collect()
}

fn article_item(doc: &Value, sort_order: i64) -> Option<Item> {
    let id = doc["_id"].as_str()?;
    let headline = doc["headline"]["main"].as_str().unwrap_or_default();

    let image = doc["multimedia"]
        .as_array()
        .and_then(|media| media.iter().find_map(|m| m["url"].as_str()))
        .map(|path| format!("{IMAGE_BASE}{path}"));

    let mut fields = Map::new();
    fields.insert(
        "links".to_string(),
        json!(doc["web_url"]
            .as_str()
            .map(|url| vec![json!({"key": "web", "url": url})])
            .unwrap_or_default()),
    );
    fields.insert(
        "images".to_string(),
        json!(image
            .as_deref()
            .map(|url| vec![json!({"key": "primary", "url": url})])
            .unwrap_or_default()),
    );
    fields.insert("metrics".to_string(), json!({}));
    fields.insert("external_ids".to_string(), json!({ "nytimes": id }));
    fields.insert("sort_order".to_string(), json!(sort_order));

    if let Some(section) = doc["section_name"].as_str() {
        fields.insert("section".to_string(), json!(section));
    }
    if let Some(byline) = doc["byline"]["original"].as_str() {
        fields.insert("byline".to_string(), json!(byline));
    }
    if let Some(published) = doc["pub_date"].as_str() {
        fields.insert("published_date".to_string(), json!(published));
    }

    Some(Item {
        mc_id: brokered_mc_id("nytimes", None, id),
        mc_type: McType::NewsArticle,
        mc_subtype: None,
        source: "nytimes".to_string(),
        source_id: id.to_string(),
        search_title: headline.to_string(),
        title: Some(headline.to_string()),
        popularity: 0.0,
        rating: None,
        image,
        overview: doc["abstract"].as_str().map(str::to_string),
        canonical_name: normalize::canonical_name(headline),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_article_payload() {
        let body = json!({
            "response": {
                "docs": [{
                    "_id": "nyt://article/abc-123",
                    "web_url": "https://www.nytimes.com/2023/01/01/movies/dune.html",
                    "headline": {"main": "Dune Returns"},
                    "abstract": "The spice must flow.",
                    "pub_date": "2023-01-01T00:00:00Z",
                    "section_name": "Movies",
                    "byline": {"original": "By A. Reporter"},
                    "multimedia": [{"url": "images/2023/dune.jpg"}]
                }]
            }
        });

        let items = parse_response(&body, 10);
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.mc_id, "nytimes_nyt://article/abc-123");
        assert_eq!(item.mc_type, McType::NewsArticle);
        assert_eq!(item.search_title, "Dune Returns");
        assert_eq!(
            item.image.as_deref(),
            Some("https://www.nytimes.com/images/2023/dune.jpg")
        );
        assert_eq!(item.fields["sort_order"], 0);
        assert_eq!(item.fields["external_ids"]["nytimes"], "nyt://article/abc-123");
    }

    #[test]
    fn respects_limit_and_skips_idless_docs() {
        let body = json!({
            "response": {
                "docs": [
                    {"headline": {"main": "no id"}},
                    {"_id": "a", "headline": {"main": "A"}},
                    {"_id": "b", "headline": {"main": "B"}}
                ]
            }
        });

        let items = parse_response(&body, 2);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].mc_id, "nytimes_a");
    }
}
