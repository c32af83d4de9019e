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

//! YouTube video search.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{brokered_mc_id, FetchError, Provider};
use crate::items::{normalize, Item, McType, Source};

const BASE_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const WATCH_BASE: &str = "https://www.youtube.com/watch?v=";

pub struct YouTube {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl YouTube {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for YouTube {
    fn source(&self) -> Source {
        Source::Video
    }

    async fn fetch(&self, text: &str, limit: usize) -> Result<Vec<Item>, FetchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(FetchError::disabled());
        };

        let max_results = limit.clamp(1, 50).to_string();
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", text),
                ("maxResults", max_results.as_str()),
                ("key", api_key),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::http(status.as_u16(), "youtube request failed"));
        }

        let body: Value = resp.json().await?;
        Ok(parse_response(&body, limit))
    }
}

fn parse_response(body: &Value, limit: usize) -> Vec<Item> {
    let results = body["items"].as_array().cloned().unwrap_or_default();

    results
        .iter()
        .take(limit)
        .enumerate()
        .filter_map(|(i, video)| video_item(video, i as i64))
        .collect()
}

fn video_item(video: &Value, sort_order: i64) -> Option<Item> {
    let id = video["id"]["videoId"].as_str()?;
    let snippet = &video["snippet"];
    let title = snippet["title"].as_str().unwrap_or_default();

    let image = snippet["thumbnails"]["high"]["url"]
        .as_str()
        .or_else(|| snippet["thumbnails"]["default"]["url"].as_str())
        .map(str::to_string);

    let mut fields = Map::new();
    fields.insert(
        "links".to_string(),
        json!([{"key": "watch", "url": format!("{WATCH_BASE}{id}")}]),
    );
    fields.insert(
        "images".to_string(),
        json!(image
            .as_deref()
            .map(|url| vec![json!({"key": "thumbnail", "url": url})])
            .unwrap_or_default()),
    );
    fields.insert("metrics".to_string(), json!({}));
    fields.insert("external_ids".to_string(), json!({ "youtube": id }));
    fields.insert("sort_order".to_string(), json!(sort_order));

    if let Some(channel) = snippet["channelTitle"].as_str() {
        fields.insert("channel".to_string(), json!(channel));
    }
    if let Some(published) = snippet["publishedAt"].as_str() {
        fields.insert("published_date".to_string(), json!(published));
    }

    Some(Item {
        mc_id: brokered_mc_id("youtube", None, id),
        mc_type: McType::Video,
        mc_subtype: None,
        source: "youtube".to_string(),
        source_id: id.to_string(),
        search_title: title.to_string(),
        title: Some(title.to_string()),
        popularity: 0.0,
        rating: None,
        image,
        overview: snippet["description"].as_str().map(str::to_string),
        canonical_name: normalize::canonical_name(title),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_video_payload() {
        let body = json!({
            "items": [{
                "id": {"videoId": "dQw4w9WgXcQ"},
                "snippet": {
                    "title": "Dune Official Trailer",
                    "description": "Trailer.",
                    "channelTitle": "Warner Bros.",
                    "publishedAt": "2021-07-22T00:00:00Z",
                    "thumbnails": {"high": {"url": "https://i.ytimg.com/vi/x/hq.jpg"}}
                }
            }]
        });

        let items = parse_response(&body, 10);
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.mc_id, "youtube_dQw4w9WgXcQ");
        assert_eq!(item.mc_type, McType::Video);
        assert_eq!(
            item.fields["links"][0]["url"],
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(item.fields["channel"], "Warner Bros.");
    }

    #[test]
    fn channel_results_are_skipped() {
        let body = json!({
            "items": [
                {"id": {"channelId": "UC123"}, "snippet": {"title": "A channel"}},
                {"id": {"videoId": "abc"}, "snippet": {"title": "A video"}}
            ]
        });

        let items = parse_response(&body, 10);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_id, "abc");
    }
}
