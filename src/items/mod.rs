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

//! The public data model: source tags, item shapes and the response
//! envelope, plus the typed documents that define the index contract.

pub mod normalize;
pub mod popularity;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// A data provider. Indexed sources are served from the local inverted
/// index, brokered sources from an external API per request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Tv,
    Movie,
    Person,
    Podcast,
    Author,
    Book,
    News,
    Video,
    Ratings,
    Artist,
    Album,
}

impl Source {
    pub const ALL: [Source; 11] = [
        Source::Tv,
        Source::Movie,
        Source::Person,
        Source::Podcast,
        Source::Author,
        Source::Book,
        Source::News,
        Source::Video,
        Source::Ratings,
        Source::Artist,
        Source::Album,
    ];

    pub const BROKERED: [Source; 5] = [
        Source::News,
        Source::Video,
        Source::Ratings,
        Source::Artist,
        Source::Album,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Tv => "tv",
            Source::Movie => "movie",
            Source::Person => "person",
            Source::Podcast => "podcast",
            Source::Author => "author",
            Source::Book => "book",
            Source::News => "news",
            Source::Video => "video",
            Source::Ratings => "ratings",
            Source::Artist => "artist",
            Source::Album => "album",
        }
    }

    pub fn parse(tag: &str) -> Option<Source> {
        match tag.trim().to_lowercase().as_str() {
            "tv" => Some(Source::Tv),
            "movie" => Some(Source::Movie),
            "person" => Some(Source::Person),
            "podcast" => Some(Source::Podcast),
            "author" => Some(Source::Author),
            "book" => Some(Source::Book),
            "news" => Some(Source::News),
            "video" => Some(Source::Video),
            "ratings" => Some(Source::Ratings),
            "artist" => Some(Source::Artist),
            "album" => Some(Source::Album),
            _ => None,
        }
    }

    pub fn is_brokered(&self) -> bool {
        Source::BROKERED.contains(self)
    }

    /// Position in the exact-match priority ladder. Brokered sources never
    /// yield an exact match.
    pub fn exact_match_priority(&self) -> Option<usize> {
        match self {
            Source::Movie => Some(0),
            Source::Tv => Some(1),
            Source::Person => Some(2),
            Source::Podcast => Some(3),
            Source::Book => Some(4),
            Source::Author => Some(5),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum McType {
    Movie,
    Tv,
    Person,
    Podcast,
    Book,
    NewsArticle,
    Video,
    MusicAlbum,
}

impl McType {
    pub fn as_str(&self) -> &'static str {
        match self {
            McType::Movie => "movie",
            McType::Tv => "tv",
            McType::Person => "person",
            McType::Podcast => "podcast",
            McType::Book => "book",
            McType::NewsArticle => "news_article",
            McType::Video => "video",
            McType::MusicAlbum => "music_album",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum McSubtype {
    Actor,
    Director,
    Writer,
    Producer,
    Author,
    MusicArtist,
    Podcaster,
    Character,
    Person,
}

/// Base shape shared by every result.
///
/// Per-type structured fields from the stored document are carried through
/// `fields` untouched; the normalizer never invents fields that were not in
/// the document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Item {
    pub mc_id: String,
    pub mc_type: McType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mc_subtype: Option<McSubtype>,

    pub source: String,
    pub source_id: String,
    pub search_title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Normalized 0-100 popularity.
    #[serde(default)]
    pub popularity: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,

    /// Precomputed canonicalized primary name for exact-match checks.
    #[serde(skip)]
    pub canonical_name: String,

    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub fields: Map<String, Value>,
}

impl Item {
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// A cast credit in the exact-match payload; `cast` strings zipped with
/// `cast_ids` positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CastCredit {
    pub name: String,
    pub id: Option<i64>,
}

/// The fixed-key response envelope. Missing arrays are empty, never null.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub exact_match: Option<Item>,
    pub tv: Vec<Item>,
    pub movie: Vec<Item>,
    pub person: Vec<Item>,
    pub podcast: Vec<Item>,
    pub author: Vec<Item>,
    pub book: Vec<Item>,
    pub news: Vec<Item>,
    pub video: Vec<Item>,
    pub ratings: Vec<Item>,
    pub artist: Vec<Item>,
    pub album: Vec<Item>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_hint: Option<Vec<Source>>,
}

impl SearchResponse {
    pub fn slot_mut(&mut self, source: Source) -> &mut Vec<Item> {
        match source {
            Source::Tv => &mut self.tv,
            Source::Movie => &mut self.movie,
            Source::Person => &mut self.person,
            Source::Podcast => &mut self.podcast,
            Source::Author => &mut self.author,
            Source::Book => &mut self.book,
            Source::News => &mut self.news,
            Source::Video => &mut self.video,
            Source::Ratings => &mut self.ratings,
            Source::Artist => &mut self.artist,
            Source::Album => &mut self.album,
        }
    }

    pub fn slot(&self, source: Source) -> &Vec<Item> {
        match source {
            Source::Tv => &self.tv,
            Source::Movie => &self.movie,
            Source::Person => &self.person,
            Source::Podcast => &self.podcast,
            Source::Author => &self.author,
            Source::Book => &self.book,
            Source::News => &self.news,
            Source::Video => &self.video,
            Source::Ratings => &self.ratings,
            Source::Artist => &self.artist,
            Source::Album => &self.album,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Director {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// Stored document for the `media` collection (movies and tv series).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MediaDoc {
    pub id: String,
    pub mc_type: McType,
    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub source_id: String,

    pub search_title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub popularity: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,

    #[serde(default)]
    pub genres: Vec<String>,

    #[serde(default)]
    pub cast: Vec<String>,

    #[serde(default)]
    pub cast_names: Vec<String>,

    #[serde(default)]
    pub cast_ids: Vec<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<Director>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub origin_country: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_air_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_air_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub us_rating: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_seasons: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_by: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub watch_providers: Option<Value>,
}

/// Stored document for the `person` collection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonDoc {
    pub id: String,

    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub source_id: String,

    pub search_title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mc_subtype: Option<McSubtype>,

    #[serde(default)]
    pub popularity: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_for_department: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deathday: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_of_birth: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,

    #[serde(default)]
    pub is_deceased: bool,

    #[serde(default)]
    pub known_for_titles: Vec<String>,

    /// Pipe-separated alternate names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub also_known_as: Option<String>,
}

/// Stored document for the `podcast` collection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PodcastDoc {
    pub id: String,

    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub source_id: String,

    pub search_title: String,

    /// Raw PodcastIndex popularity (0-29).
    #[serde(default)]
    pub popularity: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,

    /// RSS feed url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itunes_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub podcast_guid: Option<String>,

    /// Unix seconds of the last feed update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<i64>,
}

/// Stored document for the `book` collection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookDoc {
    pub id: String,

    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub source_id: String,

    pub search_title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default)]
    pub author_name: Vec<String>,

    #[serde(default)]
    pub isbn: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_isbn13: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_publish_year: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default)]
    pub subjects: Vec<String>,

    #[serde(default)]
    pub subjects_normalized: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratings_average: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratings_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub cover_urls: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,

    /// Composite 0-100 score computed at ingest time.
    #[serde(default)]
    pub popularity_score: f64,
}

/// Stored document for the `author` collection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorDoc {
    pub id: String,

    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub source_id: String,

    pub search_title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openlibrary_key: Option<String>,

    #[serde(default)]
    pub quality_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_roundtrip() {
        for source in Source::ALL {
            assert_eq!(Source::parse(source.as_str()), Some(source));
        }

        assert_eq!(Source::parse("TV"), Some(Source::Tv));
        assert_eq!(Source::parse(" movie "), Some(Source::Movie));
        assert_eq!(Source::parse("bogus"), None);
    }

    #[test]
    fn brokered_split() {
        let brokered: Vec<_> = Source::ALL.iter().filter(|s| s.is_brokered()).collect();
        assert_eq!(brokered.len(), 5);
        assert!(Source::News.is_brokered());
        assert!(!Source::Podcast.is_brokered());
    }

    #[test]
    fn exact_match_priority_ladder() {
        assert!(Source::Movie.exact_match_priority() < Source::Tv.exact_match_priority());
        assert!(Source::Tv.exact_match_priority() < Source::Person.exact_match_priority());
        assert!(Source::Book.exact_match_priority() < Source::Author.exact_match_priority());
        assert_eq!(Source::News.exact_match_priority(), None);
    }

    #[test]
    fn envelope_always_has_all_keys() {
        let response = SearchResponse::default();
        let json = serde_json::to_value(&response).unwrap();
        let obj = json.as_object().unwrap();

        for key in [
            "exact_match",
            "tv",
            "movie",
            "person",
            "podcast",
            "author",
            "book",
            "news",
            "video",
            "ratings",
            "artist",
            "album",
        ] {
            assert!(obj.contains_key(key), "missing envelope key {key}");
        }

        assert!(json["exact_match"].is_null());
        assert!(json["tv"].as_array().unwrap().is_empty());
    }

    #[test]
    fn item_flattens_extra_fields() {
        let json = r#"{
            "mc_id": "tmdb_movie_1",
            "mc_type": "movie",
            "source": "tmdb",
            "source_id": "1",
            "search_title": "Dune",
            "popularity": 55.0,
            "year": 2021,
            "genres": ["science_fiction"]
        }"#;

        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.fields["year"], 2021);

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["genres"][0], "science_fiction");
        assert_eq!(back["mc_id"], "tmdb_movie_1");
    }
}
