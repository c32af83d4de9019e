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

//! Batch transport: one JSON envelope per request.

use std::sync::Arc;

use axum::{extract, Json};
use serde::Deserialize;
use utoipa::IntoParams;

#[allow(unused_imports)]
use super::ErrorResponse;
use super::{AppError, State};
use crate::{
    config::defaults,
    items::{SearchResponse, Source},
    query::Mode,
    searcher::{RequestCtx, SearchQuery},
    Error,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Free-text query, optionally with a source-hint prefix and filter
    /// segments.
    pub q: Option<String>,

    /// Comma-separated source tags restricting the enabled set.
    pub sources: Option<String>,

    /// Comma-separated `field=value` filter pairs.
    pub filters: Option<String>,

    /// Bypass query parsing and forward the text verbatim.
    pub raw: Option<bool>,

    /// Per-source result cap.
    pub limit: Option<usize>,
}

impl SearchParams {
    pub fn into_query(self) -> Result<SearchQuery, AppError> {
        let sources = match self.sources.as_deref() {
            None | Some("") => None,
            Some(csv) => {
                let mut sources = Vec::new();
                for tag in csv.split(',') {
                    let source = Source::parse(tag)
                        .ok_or_else(|| AppError::from(Error::UnknownSource(tag.to_string())))?;
                    if !sources.contains(&source) {
                        sources.push(source);
                    }
                }
                Some(sources)
            }
        };

        Ok(SearchQuery {
            q: self.q.unwrap_or_default(),
            sources,
            filters: self.filters.filter(|csv| !csv.is_empty()),
            limit: self.limit.unwrap_or_else(defaults::SearchQuery::num_results),
            raw: self.raw.unwrap_or(false),
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/autocomplete",
    params(SearchParams),
    responses(
        (status = 200, description = "Autocomplete results", body = SearchResponse),
        (status = 400, description = "Malformed query", body = ErrorResponse),
    )
)]
pub async fn autocomplete(
    extract::State(state): extract::State<Arc<State>>,
    extract::Query(params): extract::Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    run(state, params, Mode::Autocomplete).await
}

#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Search results", body = SearchResponse),
        (status = 400, description = "Malformed query", body = ErrorResponse),
    )
)]
pub async fn search(
    extract::State(state): extract::State<Arc<State>>,
    extract::Query(params): extract::Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    run(state, params, Mode::Search).await
}

async fn run(
    state: Arc<State>,
    params: SearchParams,
    mode: Mode,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params.into_query()?;

    let ctx = RequestCtx::new();
    // Client disconnect drops this future and the guard cancels every
    // in-flight source task.
    let _guard = ctx.guard();

    let response = state.runner.search(&query, mode, &ctx).await;
    Ok(Json(response))
}
