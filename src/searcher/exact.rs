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

//! Exact-match arbitration.
//!
//! At most one exact match per request: the entity whose canonicalized
//! primary name equals the canonicalized query, picked along the source
//! priority ladder movie > tv > person > podcast > book > author. Within a
//! source the first index-ranked item wins; index order is already pinned
//! by popularity, which doubles as the stable secondary key.

use std::collections::HashSet;

use serde_json::{json, Value};

use super::SourceResult;
use crate::items::{CastCredit, Item, McType, Source};

/// First item of a source's result list whose canonical name equals the
/// canonical query. Brokered sources never qualify.
pub fn candidate(source: Source, canonical_query: &str, items: &[Item]) -> Option<Item> {
    source.exact_match_priority()?;

    if canonical_query.is_empty() {
        return None;
    }

    items
        .iter()
        .find(|item| item.canonical_name == canonical_query)
        .cloned()
}

/// Batch arbitration: walk the priority ladder and keep the best
/// candidate.
pub fn pick(candidates: Vec<(Source, Item)>) -> Option<Item> {
    candidates
        .into_iter()
        .filter_map(|(source, item)| source.exact_match_priority().map(|p| (p, item)))
        .min_by_key(|(priority, _)| *priority)
        .map(|(_, item)| prepare(item))
}

/// Shape the winning item for the `exact_match` slot. Media items get
/// their `cast` names zipped with `cast_ids` into `{name, id}` pairs;
/// missing ids become null.
pub fn prepare(mut item: Item) -> Item {
    if !matches!(item.mc_type, McType::Movie | McType::Tv) {
        return item;
    }

    let names: Vec<String> = item
        .fields
        .get("cast")
        .and_then(Value::as_array)
        .map(|cast| {
            cast.iter()
                .filter_map(|name| name.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    if names.is_empty() {
        return item;
    }

    let ids: Vec<Option<i64>> = item
        .fields
        .get("cast_ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().map(Value::as_i64).collect())
        .unwrap_or_default();

    let credits: Vec<CastCredit> = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| CastCredit {
            name,
            id: ids.get(i).copied().flatten(),
        })
        .collect();

    item.fields.insert("cast".to_string(), json!(credits));
    item
}

/// Streaming arbitration. A candidate from source S may only be emitted
/// once every enabled source with a higher priority than S has reached a
/// terminal state, so a slow `movie` source cannot lose its exact match to
/// a fast `book` source.
pub struct StreamArbiter {
    enabled: Vec<Source>,
    terminated: HashSet<Source>,
    candidates: Vec<(usize, Item)>,
    sent: bool,
}

impl StreamArbiter {
    pub fn new(enabled: Vec<Source>) -> Self {
        Self {
            enabled,
            terminated: HashSet::new(),
            candidates: Vec::new(),
            sent: false,
        }
    }

    /// Record a terminal source outcome; returns an exact match ready to
    /// emit, at most once over the lifetime of the arbiter.
    pub fn observe(&mut self, result: &SourceResult) -> Option<Item> {
        self.terminated.insert(result.source);

        if let (Some(priority), Some(candidate)) = (
            result.source.exact_match_priority(),
            result.exact_candidate.as_ref(),
        ) {
            self.candidates.push((priority, candidate.clone()));
        }

        self.try_emit()
    }

    /// Flush the best remaining candidate; called right before `done`.
    pub fn finish(&mut self) -> Option<Item> {
        if self.sent {
            return None;
        }

        let (_, item) = self
            .candidates
            .iter()
            .min_by_key(|(priority, _)| *priority)
            .cloned()?;

        self.sent = true;
        Some(prepare(item))
    }

    fn try_emit(&mut self) -> Option<Item> {
        if self.sent {
            return None;
        }

        let (best_priority, item) = self
            .candidates
            .iter()
            .min_by_key(|(priority, _)| *priority)?
            .clone();

        let higher_still_running = self.enabled.iter().any(|source| {
            source.exact_match_priority().map_or(false, |priority| {
                priority < best_priority && !self.terminated.contains(source)
            })
        });

        if higher_still_running {
            return None;
        }

        self.sent = true;
        Some(prepare(item))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::items::normalize::item_from_doc;

    fn media_item(id: &str, title: &str, mc_type: &str) -> Item {
        item_from_doc(
            if mc_type == "tv" {
                Source::Tv
            } else {
                Source::Movie
            },
            &json!({
                "id": id,
                "mc_type": mc_type,
                "search_title": title,
                "popularity": 10.0,
                "cast": ["Timothée Chalamet", "Zendaya", "Rebecca Ferguson"],
                "cast_ids": [1190668, 505710]
            }),
        )
        .unwrap()
    }

    fn person_item(id: &str, name: &str) -> Item {
        item_from_doc(
            Source::Person,
            &json!({
                "id": id,
                "mc_type": "person",
                "search_title": name,
                "popularity": 10.0
            }),
        )
        .unwrap()
    }

    #[test]
    fn candidate_matches_canonical_name() {
        let items = vec![media_item("tmdb_movie_1", "Dune: Part Two", "movie")];
        assert!(candidate(Source::Movie, "dune", &items).is_none());

        let items = vec![media_item("tmdb_movie_2", "Dune", "movie")];
        let hit = candidate(Source::Movie, "dune", &items).unwrap();
        assert_eq!(hit.mc_id, "tmdb_movie_2");
    }

    #[test]
    fn candidate_ignores_brokered_sources() {
        let items = vec![media_item("watchmode_movie_1", "Dune", "movie")];
        assert!(candidate(Source::Ratings, "dune", &items).is_none());
    }

    #[test]
    fn empty_query_never_matches() {
        let items = vec![media_item("tmdb_movie_1", "", "movie")];
        assert!(candidate(Source::Movie, "", &items).is_none());
    }

    #[test]
    fn priority_ladder_prefers_movie_over_tv() {
        let winner = pick(vec![
            (Source::Tv, media_item("tmdb_tv_1", "Dune", "tv")),
            (Source::Movie, media_item("tmdb_movie_1", "Dune", "movie")),
        ])
        .unwrap();

        assert_eq!(winner.mc_id, "tmdb_movie_1");
    }

    #[test]
    fn priority_ladder_prefers_person_over_podcast() {
        let person = person_item("tmdb_person_1", "Brad Pitt");
        let podcast = item_from_doc(
            Source::Podcast,
            &json!({
                "id": "podcastindex_1",
                "mc_type": "podcast",
                "search_title": "Brad Pitt",
                "popularity": 5.0
            }),
        )
        .unwrap();

        let winner = pick(vec![
            (Source::Podcast, podcast),
            (Source::Person, person),
        ])
        .unwrap();

        assert_eq!(winner.mc_id, "tmdb_person_1");
    }

    #[test]
    fn cast_is_restructured_with_null_for_missing_ids() {
        let winner = pick(vec![(
            Source::Movie,
            media_item("tmdb_movie_1", "Dune", "movie"),
        )])
        .unwrap();

        let cast = winner.fields["cast"].as_array().unwrap();
        assert_eq!(cast.len(), 3);
        assert_eq!(cast[0]["name"], "Timothée Chalamet");
        assert_eq!(cast[0]["id"], 1190668);
        assert_eq!(cast[2]["name"], "Rebecca Ferguson");
        assert!(cast[2]["id"].is_null());
    }

    #[test]
    fn non_media_cast_left_alone() {
        let winner = pick(vec![(
            Source::Person,
            person_item("tmdb_person_1", "Brad Pitt"),
        )])
        .unwrap();

        assert!(!winner.fields.contains_key("cast"));
    }

    #[test]
    fn no_candidates_no_match() {
        assert!(pick(Vec::new()).is_none());
    }

    fn terminal(source: Source, candidate: Option<Item>) -> SourceResult {
        SourceResult {
            source,
            status: crate::searcher::SourceStatus::Done,
            items: Vec::new(),
            latency_ms: 1,
            exact_candidate: candidate,
            error: None,
        }
    }

    #[test]
    fn stream_arbiter_waits_for_higher_priority_sources() {
        let mut arbiter = StreamArbiter::new(vec![Source::Movie, Source::Tv, Source::Book]);

        let book = item_from_doc(
            Source::Book,
            &json!({
                "id": "openlibrary_book_1",
                "mc_type": "book",
                "search_title": "Dune",
                "popularity_score": 95.0
            }),
        )
        .unwrap();

        // A fast book candidate must not win while movie and tv are
        // still running.
        assert!(arbiter.observe(&terminal(Source::Book, Some(book))).is_none());
        assert!(arbiter.observe(&terminal(Source::Tv, None)).is_none());

        let movie = media_item("tmdb_movie_1", "Dune", "movie");
        let emitted = arbiter
            .observe(&terminal(Source::Movie, Some(movie)))
            .unwrap();
        assert_eq!(emitted.mc_id, "tmdb_movie_1");

        // At most one emission.
        assert!(arbiter.finish().is_none());
    }

    #[test]
    fn stream_arbiter_emits_top_priority_immediately() {
        let mut arbiter = StreamArbiter::new(vec![Source::Movie, Source::Tv, Source::Book]);

        let movie = media_item("tmdb_movie_1", "Dune", "movie");
        let emitted = arbiter
            .observe(&terminal(Source::Movie, Some(movie)))
            .unwrap();
        assert_eq!(emitted.mc_id, "tmdb_movie_1");
    }

    #[test]
    fn stream_arbiter_unblocks_once_higher_sources_terminate() {
        let mut arbiter = StreamArbiter::new(vec![Source::Movie, Source::Tv, Source::Book]);

        let book = item_from_doc(
            Source::Book,
            &json!({
                "id": "openlibrary_book_1",
                "mc_type": "book",
                "search_title": "Dune",
                "popularity_score": 95.0
            }),
        )
        .unwrap();

        assert!(arbiter.observe(&terminal(Source::Book, Some(book))).is_none());
        assert!(arbiter.observe(&terminal(Source::Movie, None)).is_none());

        let emitted = arbiter.observe(&terminal(Source::Tv, None)).unwrap();
        assert_eq!(emitted.mc_id, "openlibrary_book_1");
    }

    #[test]
    fn stream_arbiter_finish_flushes_remaining_candidate() {
        let mut arbiter = StreamArbiter::new(vec![Source::Movie, Source::Book]);

        let book = item_from_doc(
            Source::Book,
            &json!({
                "id": "openlibrary_book_1",
                "mc_type": "book",
                "search_title": "Dune",
                "popularity_score": 95.0
            }),
        )
        .unwrap();

        assert!(arbiter.observe(&terminal(Source::Book, Some(book))).is_none());

        let emitted = arbiter.finish().unwrap();
        assert_eq!(emitted.mc_id, "openlibrary_book_1");
        assert!(arbiter.finish().is_none());
    }
}
