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

//! Streaming transport: `result`, `exact_match` and `done` SSE events.
//!
//! `done` is always last and emitted exactly once; `exact_match` at most
//! once, and only after every source higher in the priority ladder has
//! terminated. Dropping the stream (client disconnect, keystroke
//! supersession) cancels the fan-out through the request guard captured
//! inside the stream.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
};
use futures::stream::Stream;
use serde::Serialize;
use tokio_stream::StreamExt as _;
use utoipa::ToSchema;

use super::{search::SearchParams, AppError, State};
use crate::{
    items::{Item, Source},
    query::Mode,
    searcher::{exact, RequestCtx, SearchEvent},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ResultEvent {
    pub source: Source,
    pub results: Vec<Item>,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DoneEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_hint: Option<Vec<Source>>,
}

#[allow(clippy::unused_async)]
pub async fn autocomplete(
    extract::State(state): extract::State<Arc<State>>,
    extract::Query(params): extract::Query<SearchParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    run(state, params, Mode::Autocomplete)
}

#[allow(clippy::unused_async)]
pub async fn search(
    extract::State(state): extract::State<Arc<State>>,
    extract::Query(params): extract::Query<SearchParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    run(state, params, Mode::Search)
}

fn run(
    state: Arc<State>,
    params: SearchParams,
    mode: Mode,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let query = params.into_query()?;

    let ctx = RequestCtx::new();
    let guard = ctx.guard();
    let (enabled, mut rx) = state.runner.launch(&query, mode, &ctx);
    let mut arbiter = exact::StreamArbiter::new(enabled);

    let stream = async_stream::stream! {
        // Held for the lifetime of the stream; dropping the stream cancels
        // the request context.
        let _guard = guard;

        while let Some(event) = rx.recv().await {
            match event {
                SearchEvent::Source(result) => {
                    if let Some(winner) = arbiter.observe(&result) {
                        if let Ok(event) =
                            Event::default().event("exact_match").json_data(winner)
                        {
                            yield event;
                        }
                    }

                    let payload = ResultEvent {
                        source: result.source,
                        results: result.items,
                        latency_ms: result.latency_ms,
                    };
                    if let Ok(event) = Event::default().event("result").json_data(&payload) {
                        yield event;
                    }
                }
                SearchEvent::Done { source_hint } => {
                    if let Some(winner) = arbiter.finish() {
                        if let Ok(event) =
                            Event::default().event("exact_match").json_data(winner)
                        {
                            yield event;
                        }
                    }

                    let payload = DoneEvent { source_hint };
                    if let Ok(event) = Event::default().event("done").json_data(&payload) {
                        yield event;
                    }
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream.map(Ok)).keep_alive(KeepAlive::default()))
}
