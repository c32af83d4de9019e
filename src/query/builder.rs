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

//! Composes per-source index queries from a parsed query.

use std::ops::Bound;

use tantivy::{
    query::{AllQuery, BooleanQuery, BoostQuery, Occur, QueryClone, RangeQuery, RegexQuery, TermQuery},
    schema::{Field, IndexRecordOption, Schema},
    tokenizer::TextAnalyzer,
    Term,
};

use super::{FilterClause, Mode, ParsedQuery};
use crate::{
    index::Index,
    items::Source,
    schema::Collection,
    taxonomy::{normalize_tag, Taxonomy},
    Result,
};

/// Stopwords removed from the text clause (never from the displayed
/// query). Matches the fixed analyzer's stopword list.
const STOPWORDS: [&str; 14] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "is", "it",
];

type BoxQuery = Box<dyn tantivy::query::Query + 'static>;

/// A query ready for the executor. `Noop` means the index must not be
/// contacted at all.
pub enum BuiltQuery {
    Noop,
    Run {
        collection: Collection,
        query: BoxQuery,
        limit: usize,
    },
}

/// Build the index query for one source. Returns `Noop` for brokered
/// sources, short queries and `limit=0`.
pub fn build(
    index: &Index,
    source: Source,
    parsed: &ParsedQuery,
    taxonomy: &Taxonomy,
    mode: Mode,
    limit: usize,
) -> Result<BuiltQuery> {
    let Some(collection) = Collection::from_source(source) else {
        return Ok(BuiltQuery::Noop);
    };

    if limit == 0 || parsed.is_short() {
        return Ok(BuiltQuery::Noop);
    }

    let handle = index.collection(collection);
    let schema = &handle.schema;
    let tokenizers = handle.index.tokenizers();

    let mut clauses: Vec<(Occur, BoxQuery)> = Vec::new();

    let tokens = text_tokens(parsed);
    if tokens.is_empty() {
        clauses.push((Occur::Must, Box::new(AllQuery)));
    } else {
        let last = tokens.len() - 1;
        for (i, token) in tokens.iter().enumerate() {
            let prefix = mode == Mode::Autocomplete && i == last;
            clauses.push((
                Occur::Must,
                token_clause(collection, schema, tokenizers, token, prefix)?,
            ));
        }
    }

    // tv and movie share the media collection; pin the type.
    match source {
        Source::Tv => clauses.push((Occur::Must, tag_clause(schema, "mc_type", &["tv".into()]))),
        Source::Movie => {
            clauses.push((Occur::Must, tag_clause(schema, "mc_type", &["movie".into()])));
        }
        _ => {}
    }

    for filter in &parsed.filters {
        if let Some(clause) = filter_clause(collection, schema, taxonomy, filter) {
            clauses.push((Occur::Must, clause));
        }
    }

    Ok(BuiltQuery::Run {
        collection,
        query: Box::new(BooleanQuery::new(clauses)),
        limit,
    })
}

fn text_tokens(parsed: &ParsedQuery) -> Vec<String> {
    parsed
        .text
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|token| parsed.raw || !STOPWORDS.contains(&token.as_str()))
        .collect()
}

/// One token matched across the weighted fields of the collection. A
/// prefix token additionally matches `token*` on the primary field.
fn token_clause(
    collection: Collection,
    schema: &Schema,
    tokenizers: &tantivy::tokenizer::TokenizerManager,
    token: &str,
    prefix: bool,
) -> Result<BoxQuery> {
    let mut subclauses: Vec<(Occur, BoxQuery)> = Vec::new();

    for (i, (name, boost)) in collection.text_fields().iter().enumerate() {
        let field = schema.get_field(name).unwrap();
        let entry = schema.get_field_entry(field);
        let analyzer = analyzer_for(entry, tokenizers);

        for term in process_terms(token, analyzer, field) {
            let query = TermQuery::new(term, IndexRecordOption::WithFreqs);
            subclauses.push((
                Occur::Should,
                Box::new(BoostQuery::new(query.box_clone(), *boost)),
            ));
        }

        if prefix && i == 0 {
            let pattern = format!("{}.*", regex_escape(token));
            if let Ok(query) = RegexQuery::from_pattern(&pattern, field) {
                subclauses.push((
                    Occur::Should,
                    Box::new(BoostQuery::new(Box::new(query), *boost)),
                ));
            }
        }
    }

    Ok(Box::new(BooleanQuery::new(subclauses)))
}

fn analyzer_for(
    entry: &tantivy::schema::FieldEntry,
    tokenizers: &tantivy::tokenizer::TokenizerManager,
) -> Option<TextAnalyzer> {
    match entry.field_type() {
        tantivy::schema::FieldType::Str(options) => {
            options.get_indexing_options().and_then(|indexing| {
                let name = indexing.tokenizer();
                tokenizers.get(name)
            })
        }
        _ => None,
    }
}

fn process_terms(token: &str, analyzer: Option<TextAnalyzer>, field: Field) -> Vec<Term> {
    match analyzer {
        None => vec![Term::from_field_text(field, token)],
        Some(analyzer) => {
            let mut terms = Vec::new();
            let mut stream = analyzer.token_stream(token);
            stream.process(&mut |token| {
                terms.push(Term::from_field_text(field, &token.text));
            });

            terms
        }
    }
}

/// Conjunctive tag constraint; multiple values form a disjunction.
fn tag_clause(schema: &Schema, field: &str, values: &[String]) -> BoxQuery {
    let field = schema.get_field(field).unwrap();

    let subclauses: Vec<(Occur, BoxQuery)> = values
        .iter()
        .map(|value| {
            (
                Occur::Should,
                Box::new(TermQuery::new(
                    Term::from_field_text(field, value),
                    IndexRecordOption::Basic,
                )) as BoxQuery,
            )
        })
        .collect();

    Box::new(BooleanQuery::new(subclauses))
}

/// Resolve a filter clause against the collection's tag and numeric
/// fields. Clauses naming a field the collection does not have are
/// dropped for that source. Raw user text never reaches the index as a
/// tag; values are normalized and, where the field calls for it, fanned
/// out through the IPTC taxonomy.
fn filter_clause(
    collection: Collection,
    schema: &Schema,
    taxonomy: &Taxonomy,
    filter: &FilterClause,
) -> Option<BoxQuery> {
    let requested = filter.field.to_lowercase();

    if let Some(numeric) = resolve_numeric(collection, &requested) {
        return numeric_clause(schema, numeric, &filter.value);
    }

    let (field, expand) = resolve_tag(collection, &requested)?;

    let values = if expand {
        taxonomy.expand(&filter.value)
    } else {
        vec![normalize_tag(&filter.value)]
    };

    let values: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
    if values.is_empty() {
        return None;
    }

    Some(tag_clause(schema, field, &values))
}

fn resolve_tag(collection: Collection, requested: &str) -> Option<(&'static str, bool)> {
    let canonical = match requested {
        "genre" => "genres",
        "keyword" | "keywords" => "keywords_tag",
        "country" => "origin_country",
        "cast" => "cast_names",
        "type" => "mc_type",
        "subtype" => "mc_subtype",
        "department" => "known_for_department",
        "category" | "categories" => "categories_tag",
        "subject" | "subjects" => "subjects_normalized",
        other => other,
    };

    collection
        .tag_fields()
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(name, expand)| (*name, *expand))
}

fn resolve_numeric(collection: Collection, requested: &str) -> Option<&'static str> {
    let canonical = match requested {
        "year" if collection == Collection::Book => "first_publish_year",
        other => other,
    };

    collection
        .numeric_fields()
        .iter()
        .find(|name| **name == canonical)
        .copied()
}

/// Accepts `1994`, `1990-2000`, `1990-` and `-2000`.
fn numeric_clause(schema: &Schema, field: &'static str, value: &str) -> Option<BoxQuery> {
    let field = schema.get_field(field).unwrap();
    let value = value.trim();

    let (lower, upper) = match value.split_once('-') {
        Some((min, max)) => (
            min.trim().parse::<i64>().ok(),
            max.trim().parse::<i64>().ok(),
        ),
        None => {
            let exact = value.parse::<i64>().ok()?;
            (Some(exact), Some(exact))
        }
    };

    if lower.is_none() && upper.is_none() {
        return None;
    }

    let lower = lower.map_or(Bound::Unbounded, Bound::Included);
    let upper = upper.map_or(Bound::Unbounded, Bound::Included);

    Some(Box::new(RangeQuery::new_i64_bounds(field, lower, upper)))
}

fn regex_escape(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());

    for c in token.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;

    fn taxonomy() -> Taxonomy {
        Taxonomy::empty()
    }

    #[test]
    fn brokered_sources_are_noop() {
        let index = Index::temporary().unwrap();
        let parsed = parse("dune");

        for source in Source::BROKERED {
            let built = build(&index, source, &parsed, &taxonomy(), Mode::Search, 10).unwrap();
            assert!(matches!(built, BuiltQuery::Noop));
        }
    }

    #[test]
    fn short_query_is_noop() {
        let index = Index::temporary().unwrap();

        for q in ["", "a", " a "] {
            let built = build(
                &index,
                Source::Movie,
                &parse(q),
                &taxonomy(),
                Mode::Autocomplete,
                10,
            )
            .unwrap();
            assert!(matches!(built, BuiltQuery::Noop), "{q:?} should be noop");
        }

        let built = build(
            &index,
            Source::Movie,
            &parse("ab"),
            &taxonomy(),
            Mode::Autocomplete,
            10,
        )
        .unwrap();
        assert!(matches!(built, BuiltQuery::Run { .. }));
    }

    #[test]
    fn zero_limit_is_noop() {
        let index = Index::temporary().unwrap();
        let built = build(
            &index,
            Source::Movie,
            &parse("dune"),
            &taxonomy(),
            Mode::Search,
            0,
        )
        .unwrap();
        assert!(matches!(built, BuiltQuery::Noop));
    }

    #[test]
    fn media_sources_target_media_collection() {
        let index = Index::temporary().unwrap();

        for source in [Source::Tv, Source::Movie] {
            let built = build(&index, source, &parse("dune"), &taxonomy(), Mode::Search, 10)
                .unwrap();
            match built {
                BuiltQuery::Run { collection, .. } => assert_eq!(collection, Collection::Media),
                BuiltQuery::Noop => panic!("expected a runnable query"),
            }
        }
    }

    #[test]
    fn year_range_parsing() {
        let index = Index::temporary().unwrap();
        let schema = &index.collection(Collection::Media).schema;

        assert!(numeric_clause(schema, "year", "1994").is_some());
        assert!(numeric_clause(schema, "year", "1990-2000").is_some());
        assert!(numeric_clause(schema, "year", "1990-").is_some());
        assert!(numeric_clause(schema, "year", "-2000").is_some());
        assert!(numeric_clause(schema, "year", "not a year").is_none());
    }

    #[test]
    fn unknown_filter_field_is_dropped() {
        let index = Index::temporary().unwrap();
        let schema = &index.collection(Collection::Author).schema;

        let clause = filter_clause(
            Collection::Author,
            schema,
            &taxonomy(),
            &FilterClause {
                field: "genre".to_string(),
                value: "thriller".to_string(),
            },
        );
        assert!(clause.is_none());
    }

    #[test]
    fn keyword_filter_targets_media_keywords() {
        assert_eq!(
            resolve_tag(Collection::Media, "keyword"),
            Some(("keywords_tag", true))
        );
        assert_eq!(resolve_tag(Collection::Person, "keyword"), None);
    }

    #[test]
    fn regex_escaping() {
        assert_eq!(regex_escape("swat"), "swat");
        assert_eq!(regex_escape("s.w.a.t"), "s\\.w\\.a\\.t");
        assert_eq!(regex_escape("c++"), "c\\+\\+");
    }
}
