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

//! Deadline-bounded execution of built queries against the inverted index.
//!
//! Searches are blocking tantivy work, so they run on the blocking pool
//! behind a semaphore sized like the configured index pool. Exceeding the
//! soft deadline yields partial (empty) results flagged `timed_out` rather
//! than an error.

use std::{cmp::Ordering, sync::Arc, time::Duration};

use serde_json::Value;
use tantivy::{
    collector::TopDocs,
    query::TermQuery,
    schema::IndexRecordOption,
    Term,
};
use tokio::sync::Semaphore;

use crate::{
    index::Index,
    query::builder::BuiltQuery,
    schema::{Collection, ID_FIELD, JSON_FIELD},
    Error, Result,
};

pub struct IndexHit {
    pub doc: Value,
    pub score: f32,
}

#[derive(Default)]
pub struct IndexOutput {
    pub hits: Vec<IndexHit>,
    pub timed_out: bool,
}

pub struct InvertedIndex {
    index: Arc<Index>,
    permits: Arc<Semaphore>,
}

impl InvertedIndex {
    pub fn new(index: Arc<Index>, pool_size: usize) -> Self {
        Self {
            index,
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    /// Run a built query. A `Noop` query never touches the index.
    pub async fn execute(&self, built: BuiltQuery, deadline: Duration) -> Result<IndexOutput> {
        let BuiltQuery::Run {
            collection,
            query,
            limit,
        } = built
        else {
            return Ok(IndexOutput::default());
        };

        let index = Arc::clone(&self.index);
        let permits = Arc::clone(&self.permits);

        let search = async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| Error::IndexUnavailable)?;

            tokio::task::spawn_blocking(move || search_blocking(&index, collection, query, limit))
                .await
                .map_err(|e| Error::Internal(e.to_string()))?
        };

        match tokio::time::timeout(deadline, search).await {
            Ok(result) => result,
            Err(_) => Ok(IndexOutput {
                hits: Vec::new(),
                timed_out: true,
            }),
        }
    }

    /// Exact document lookup across collections.
    pub fn lookup_mc_id(&self, mc_id: &str) -> Result<Option<(Collection, Value)>> {
        for collection in Collection::ALL {
            let handle = self.index.collection(collection);
            let searcher = handle.reader.searcher();

            let field = handle.schema.get_field(ID_FIELD).unwrap();
            let query = TermQuery::new(
                Term::from_field_text(field, mc_id),
                IndexRecordOption::Basic,
            );

            let top = searcher.search(&query, &TopDocs::with_limit(1))?;
            if let Some((_, address)) = top.first() {
                let doc = searcher.doc(*address)?;
                if let Some(json) = stored_json(&handle.schema, &doc) {
                    return Ok(Some((collection, json)));
                }
            }
        }

        Ok(None)
    }
}

fn stored_json(schema: &tantivy::schema::Schema, doc: &tantivy::Document) -> Option<Value> {
    let field = schema.get_field(JSON_FIELD)?;
    let raw = doc.get_first(field)?.as_text()?;
    serde_json::from_str(raw).ok()
}

fn search_blocking(
    index: &Index,
    collection: Collection,
    query: Box<dyn tantivy::query::Query>,
    limit: usize,
) -> Result<IndexOutput> {
    let handle = index.collection(collection);
    let searcher = handle.reader.searcher();

    let top = searcher.search(&query, &TopDocs::with_limit(limit))?;

    let mut hits = Vec::with_capacity(top.len());
    for (score, address) in top {
        let doc = searcher.doc(address)?;
        if let Some(json) = stored_json(&handle.schema, &doc) {
            hits.push(IndexHit { doc: json, score });
        }
    }

    sort_hits(collection, &mut hits);

    Ok(IndexOutput {
        hits,
        timed_out: false,
    })
}

/// Deterministic ordering: relevance desc, then the collection's sort keys
/// desc, then `id` asc as the final stable key.
fn sort_hits(collection: Collection, hits: &mut [IndexHit]) {
    let keys = collection.sort_keys();

    hits.sort_by(|a, b| {
        let by_score = b
            .score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal);
        if by_score != Ordering::Equal {
            return by_score;
        }

        for key in keys {
            let left = a.doc.get(*key).and_then(Value::as_f64).unwrap_or(0.0);
            let right = b.doc.get(*key).and_then(Value::as_f64).unwrap_or(0.0);

            let by_key = right.partial_cmp(&left).unwrap_or(Ordering::Equal);
            if by_key != Ordering::Equal {
                return by_key;
            }
        }

        let left = a.doc.get("id").and_then(Value::as_str).unwrap_or_default();
        let right = b.doc.get("id").and_then(Value::as_str).unwrap_or_default();
        left.cmp(right)
    });
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        query::{builder, parse, Mode},
        taxonomy::Taxonomy,
    };

    fn seeded_index() -> Arc<Index> {
        let index = Index::temporary().unwrap();
        let mut writer = index.writer(Collection::Media).unwrap();

        for (id, title, mc_type, year, popularity) in [
            ("tmdb_tv_2316", "The Office", "tv", 2005, 500.0),
            ("tmdb_tv_2996", "The Office", "tv", 2001, 300.0),
            ("tmdb_movie_438631", "Dune", "movie", 2021, 800.0),
            ("tmdb_movie_841", "Dune", "movie", 1984, 200.0),
        ] {
            writer
                .insert(&json!({
                    "id": id,
                    "mc_type": mc_type,
                    "search_title": title,
                    "year": year,
                    "popularity": popularity
                }))
                .unwrap();
        }

        writer.commit().unwrap();
        index.reload().unwrap();
        Arc::new(index)
    }

    fn run(
        index: &Arc<Index>,
        executor: &InvertedIndex,
        source: crate::items::Source,
        q: &str,
        mode: Mode,
    ) -> IndexOutput {
        let built = builder::build(index, source, &parse(q), &Taxonomy::empty(), mode, 10).unwrap();

        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(executor.execute(built, Duration::from_millis(1_500)))
            .unwrap()
    }

    #[test]
    fn search_returns_ranked_docs() {
        let index = seeded_index();
        let executor = InvertedIndex::new(Arc::clone(&index), 2);

        let output = run(
            &index,
            &executor,
            crate::items::Source::Movie,
            "dune",
            Mode::Search,
        );

        assert_eq!(output.hits.len(), 2);
        assert!(!output.timed_out);

        // Equal text relevance; popularity breaks the tie.
        assert_eq!(output.hits[0].doc["id"], "tmdb_movie_438631");
        assert_eq!(output.hits[1].doc["id"], "tmdb_movie_841");
    }

    #[test]
    fn type_constraint_separates_tv_from_movies() {
        let index = seeded_index();
        let executor = InvertedIndex::new(Arc::clone(&index), 2);

        let output = run(
            &index,
            &executor,
            crate::items::Source::Tv,
            "dune",
            Mode::Search,
        );
        assert!(output.hits.is_empty());

        let output = run(
            &index,
            &executor,
            crate::items::Source::Tv,
            "office",
            Mode::Search,
        );
        assert_eq!(output.hits.len(), 2);
    }

    #[test]
    fn prefix_matching_in_autocomplete() {
        let index = seeded_index();
        let executor = InvertedIndex::new(Arc::clone(&index), 2);

        let output = run(
            &index,
            &executor,
            crate::items::Source::Tv,
            "offi",
            Mode::Autocomplete,
        );
        assert_eq!(output.hits.len(), 2);

        // Search mode wants the exact token.
        let output = run(
            &index,
            &executor,
            crate::items::Source::Tv,
            "offi",
            Mode::Search,
        );
        assert!(output.hits.is_empty());
    }

    #[test]
    fn deterministic_tie_break_on_equal_popularity() {
        let index = Index::temporary().unwrap();
        let mut writer = index.writer(Collection::Media).unwrap();

        for id in ["tmdb_movie_b", "tmdb_movie_a"] {
            writer
                .insert(&json!({
                    "id": id,
                    "mc_type": "movie",
                    "search_title": "Heat",
                    "year": 1995,
                    "popularity": 100.0
                }))
                .unwrap();
        }
        writer.commit().unwrap();
        index.reload().unwrap();

        let index = Arc::new(index);
        let executor = InvertedIndex::new(Arc::clone(&index), 2);
        let output = run(
            &index,
            &executor,
            crate::items::Source::Movie,
            "heat",
            Mode::Search,
        );

        assert_eq!(output.hits[0].doc["id"], "tmdb_movie_a");
        assert_eq!(output.hits[1].doc["id"], "tmdb_movie_b");
    }

    #[test]
    fn lookup_by_mc_id() {
        let index = seeded_index();
        let executor = InvertedIndex::new(Arc::clone(&index), 2);

        let found = executor.lookup_mc_id("tmdb_movie_438631").unwrap();
        let (collection, doc) = found.unwrap();
        assert_eq!(collection, Collection::Media);
        assert_eq!(doc["search_title"], "Dune");

        assert!(executor.lookup_mc_id("tmdb_movie_0").unwrap().is_none());
    }
}
