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

//! Converts raw stored documents into the public item shape.

use serde_json::{Map, Value};

use super::{popularity, Item, McSubtype, McType, Source};
use crate::{taxonomy::normalize_tag, Error, Result};

/// Keys that may arrive as float unix timestamps and must be integers in
/// the public shape.
const TIMESTAMP_KEYS: [&str; 2] = ["last_update_time", "published_at"];

/// Canonical form of a primary name used for exact matching: lowercased,
/// trimmed, punctuation stripped.
pub fn canonical_name(name: &str) -> String {
    normalize_tag(name)
}

fn take_str(doc: &mut Map<String, Value>, key: &str) -> Option<String> {
    match doc.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            doc.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn take_f64(doc: &mut Map<String, Value>, key: &str) -> Option<f64> {
    match doc.remove(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            doc.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

/// Repair legacy person ids that predate the `tmdb_` prefix and recover a
/// missing `source_id` from the trailing digits. Authors keep their
/// OpenLibrary ids untouched.
fn repair_person_id(id: &mut String, source_id: &mut Option<String>, subtype: Option<McSubtype>) {
    if subtype == Some(McSubtype::Author) {
        return;
    }

    if id.starts_with("person_") {
        *id = format!("tmdb_{id}");
    }

    if source_id.is_none() {
        if let Some(tail) = id.rsplit('_').next() {
            if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
                *source_id = Some(tail.to_string());
            }
        }
    }
}

/// Map a raw index document onto the public item shape for `source`.
///
/// - `mc_id` is injected from the stored `id`.
/// - `title`/`search_title` backfill each other for display.
/// - unix-second timestamps are coerced to integers.
/// - the raw per-source score is normalized to 0-100 popularity.
///
/// Fields not consumed by the base shape pass through untouched; no new
/// fields are invented.
pub fn item_from_doc(source: Source, doc: &Value) -> Result<Item> {
    let mut doc = doc
        .as_object()
        .cloned()
        .ok_or_else(|| Error::Internal("index document is not an object".to_string()))?;

    let mut mc_id = take_str(&mut doc, "id")
        .or_else(|| take_str(&mut doc, "mc_id"))
        .ok_or_else(|| Error::Internal("index document has no id".to_string()))?;

    let mc_type = match take_str(&mut doc, "mc_type").as_deref() {
        Some("movie") => McType::Movie,
        Some("tv") => McType::Tv,
        Some("person") => McType::Person,
        Some("podcast") => McType::Podcast,
        Some("book") => McType::Book,
        Some("news_article") => McType::NewsArticle,
        Some("video") => McType::Video,
        Some("music_album") => McType::MusicAlbum,
        _ => default_mc_type(source),
    };

    let mc_subtype = take_str(&mut doc, "mc_subtype").and_then(|s| parse_subtype(&s));

    let mut source_id = take_str(&mut doc, "source_id");
    if mc_type == McType::Person {
        repair_person_id(&mut mc_id, &mut source_id, mc_subtype);
    }

    let provider = take_str(&mut doc, "source").unwrap_or_else(|| default_provider(source));

    let mut search_title = take_str(&mut doc, "search_title");
    let mut title = take_str(&mut doc, "title");
    match (&search_title, &title) {
        (None, Some(t)) => search_title = Some(t.clone()),
        (Some(s), None) => title = Some(s.clone()),
        _ => {}
    }
    let search_title = search_title.unwrap_or_default();

    // The raw `popularity` is replaced by its normalized form; composite
    // book/author scores stay visible as their own fields.
    let raw_score = match raw_score_key(source) {
        "popularity" => take_f64(&mut doc, "popularity").unwrap_or(0.0),
        key => doc.get(key).and_then(Value::as_f64).unwrap_or(0.0),
    };

    for key in TIMESTAMP_KEYS {
        let coerced = match doc.get(key) {
            Some(Value::Number(n)) if n.as_i64().is_none() => n.as_f64().map(|f| f as i64),
            _ => None,
        };

        if let Some(seconds) = coerced {
            doc.insert(key.to_string(), Value::from(seconds));
        }
    }

    let rating = take_f64(&mut doc, "rating");
    let image = take_str(&mut doc, "image");
    let overview = take_str(&mut doc, "overview");

    Ok(Item {
        canonical_name: canonical_name(&search_title),
        mc_id,
        mc_type,
        mc_subtype,
        source: provider,
        source_id: source_id.unwrap_or_default(),
        search_title,
        title,
        popularity: popularity::normalize(source, raw_score),
        rating,
        image,
        overview,
        fields: doc,
    })
}

fn default_mc_type(source: Source) -> McType {
    match source {
        Source::Tv => McType::Tv,
        Source::Movie => McType::Movie,
        Source::Person | Source::Author | Source::Artist => McType::Person,
        Source::Podcast => McType::Podcast,
        Source::Book => McType::Book,
        Source::News => McType::NewsArticle,
        Source::Video => McType::Video,
        Source::Ratings => McType::Movie,
        Source::Album => McType::MusicAlbum,
    }
}

fn default_provider(source: Source) -> String {
    match source {
        Source::Tv | Source::Movie | Source::Person => "tmdb",
        Source::Podcast => "podcastindex",
        Source::Author | Source::Book => "openlibrary",
        Source::News => "nytimes",
        Source::Video => "youtube",
        Source::Ratings => "watchmode",
        Source::Artist | Source::Album => "lastfm",
    }
    .to_string()
}

fn raw_score_key(source: Source) -> &'static str {
    match source {
        Source::Book => "popularity_score",
        Source::Author => "quality_score",
        _ => "popularity",
    }
}

fn parse_subtype(s: &str) -> Option<McSubtype> {
    match s {
        "actor" => Some(McSubtype::Actor),
        "director" => Some(McSubtype::Director),
        "writer" => Some(McSubtype::Writer),
        "producer" => Some(McSubtype::Producer),
        "author" => Some(McSubtype::Author),
        "music_artist" => Some(McSubtype::MusicArtist),
        "podcaster" => Some(McSubtype::Podcaster),
        "character" => Some(McSubtype::Character),
        "person" => Some(McSubtype::Person),
        _ => None,
    }
}
