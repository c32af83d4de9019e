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

//! Field contract for the inverted-index collections.
//!
//! Field attribute classes mirror the index contract: TEXT fields run
//! through the fixed analyzer, TAG fields hold pre-normalized tokens and
//! match exactly, NUMERIC fields support ranges and sorting. Every document
//! additionally stores its full JSON form in a stored-only blob the query
//! path retrieves.

use serde_json::Value;
use tantivy::schema::{
    Cardinality, IndexRecordOption, NumericOptions, Schema, TextFieldIndexing, TextOptions, STORED,
};

use crate::items::Source;

/// Name of the fixed analyzer applied to every TEXT field.
pub const TOKENIZER: &str = "default";

/// Stored-only field carrying the complete source document.
pub const JSON_FIELD: &str = "json";

/// TAG field holding the document id; used for exact lookups.
pub const ID_FIELD: &str = "mc_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Movies and tv series share one collection, discriminated by the
    /// `mc_type` tag.
    Media,
    Person,
    Podcast,
    Book,
    Author,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Media,
        Collection::Person,
        Collection::Podcast,
        Collection::Book,
        Collection::Author,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Media => "media",
            Collection::Person => "person",
            Collection::Podcast => "podcast",
            Collection::Book => "book",
            Collection::Author => "author",
        }
    }

    pub fn from_source(source: Source) -> Option<Collection> {
        match source {
            Source::Tv | Source::Movie => Some(Collection::Media),
            Source::Person => Some(Collection::Person),
            Source::Podcast => Some(Collection::Podcast),
            Source::Book => Some(Collection::Book),
            Source::Author => Some(Collection::Author),
            _ => None,
        }
    }

    /// Weighted TEXT fields forming the full-text clause, primary first.
    pub fn text_fields(&self) -> &'static [(&'static str, f32)] {
        match self {
            Collection::Media => &[
                ("search_title", 5.0),
                ("cast", 2.0),
                ("director", 2.0),
                ("keywords", 1.0),
            ],
            Collection::Person => &[
                ("search_title", 5.0),
                ("also_known_as", 3.0),
                ("known_for_titles", 1.0),
            ],
            Collection::Podcast => &[
                ("search_title", 5.0),
                ("author", 3.0),
                ("categories", 1.0),
            ],
            Collection::Book => &[
                ("search_title", 5.0),
                ("author_search", 3.0),
                ("subjects_search", 1.0),
            ],
            Collection::Author => &[("search_title", 5.0), ("name", 4.0)],
        }
    }

    /// TAG fields accepting filter clauses. The boolean marks fields whose
    /// filter values go through IPTC expansion rather than plain
    /// normalization.
    pub fn tag_fields(&self) -> &'static [(&'static str, bool)] {
        match self {
            Collection::Media => &[
                ("mc_type", false),
                ("genres", true),
                ("origin_country", false),
                ("us_rating", false),
                ("cast_names", false),
                ("keywords_tag", true),
            ],
            Collection::Person => &[("mc_subtype", false), ("known_for_department", false)],
            Collection::Podcast => &[("language", false), ("categories_tag", true)],
            Collection::Book => &[("language", false), ("subjects_normalized", true)],
            Collection::Author => &[],
        }
    }

    /// NUMERIC fields accepting range filters.
    pub fn numeric_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Media => &["year"],
            Collection::Book => &["first_publish_year"],
            _ => &[],
        }
    }

    /// JSON keys used as deterministic tie-breaks after relevance, in
    /// order, all descending.
    pub fn sort_keys(&self) -> &'static [&'static str] {
        match self {
            Collection::Media => &["popularity", "year"],
            Collection::Person | Collection::Podcast => &["popularity"],
            Collection::Book => &["popularity_score"],
            Collection::Author => &["quality_score"],
        }
    }

    /// Document keys feeding each indexed field. TAG fields with a `_tag`
    /// suffix index the same document key as their text twin.
    pub fn doc_key(field: &str) -> &str {
        match field {
            "keywords_tag" => "keywords",
            "categories_tag" => "categories",
            "author_search" => "author_name",
            "subjects_search" => "subjects",
            _ => field,
        }
    }
}

fn text_options() -> TextOptions {
    TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    )
}

fn tag_options() -> TextOptions {
    TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer("raw")
            .set_index_option(IndexRecordOption::Basic),
    )
}

pub fn create_schema(collection: Collection) -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(ID_FIELD, tag_options());
    builder.add_text_field(JSON_FIELD, STORED);

    for (field, _) in collection.text_fields() {
        builder.add_text_field(field, text_options());
    }

    for (field, _) in collection.tag_fields() {
        builder.add_text_field(field, tag_options());
    }

    for field in collection.numeric_fields() {
        builder.add_i64_field(
            field,
            NumericOptions::default()
                .set_indexed()
                .set_fast(Cardinality::SingleValue),
        );
    }

    builder.build()
}

/// Extract the values a document key contributes to an indexed field.
/// Arrays contribute one value per element; scalars one value.
pub fn field_values(doc: &Value, key: &str) -> Vec<String> {
    match doc.get(key) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::Object(obj)) => {
            // Single nested object, e.g. `director: {name, id}`.
            obj.get("name")
                .and_then(Value::as_str)
                .map(|s| vec![s.to_string()])
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn every_collection_builds() {
        for collection in Collection::ALL {
            let schema = create_schema(collection);
            assert!(schema.get_field(ID_FIELD).is_some());
            assert!(schema.get_field(JSON_FIELD).is_some());

            for (field, _) in collection.text_fields() {
                assert!(schema.get_field(field).is_some(), "{field} missing");
            }
            for (field, _) in collection.tag_fields() {
                assert!(schema.get_field(field).is_some(), "{field} missing");
            }
        }
    }

    #[test]
    fn source_collection_mapping() {
        assert_eq!(Collection::from_source(Source::Tv), Some(Collection::Media));
        assert_eq!(
            Collection::from_source(Source::Movie),
            Some(Collection::Media)
        );
        assert_eq!(Collection::from_source(Source::News), None);
    }

    #[test]
    fn field_value_extraction() {
        let doc = json!({
            "cast": ["Timothée Chalamet", "Zendaya"],
            "director": {"name": "Denis Villeneuve", "id": 137427},
            "search_title": "Dune"
        });

        assert_eq!(field_values(&doc, "cast").len(), 2);
        assert_eq!(field_values(&doc, "director"), vec!["Denis Villeneuve"]);
        assert_eq!(field_values(&doc, "search_title"), vec!["Dune"]);
        assert!(field_values(&doc, "missing").is_empty());
    }
}
