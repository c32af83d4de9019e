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

//! The fan-out orchestrator.
//!
//! Every enabled source runs as its own task under its own deadline; a
//! driver task forwards per-source outcomes onto one event channel that
//! both transports consume, so batch and stream responses agree on the
//! per-source item multisets. Source states move `pending -> running ->
//! {done, timed_out, cancelled, failed}` and never re-enter `running`.

pub mod exact;

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    brokered::BrokeredRegistry,
    config::{defaults, ApiConfig},
    inverted_index::InvertedIndex,
    items::{normalize, Item, SearchResponse, Source},
    query::{self, builder, FilterClause, Mode, ParsedQuery},
    taxonomy::Taxonomy,
};

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub q: String,
    pub sources: Option<Vec<Source>>,
    pub filters: Option<String>,
    pub limit: usize,
    pub raw: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            q: String::new(),
            sources: None,
            filters: None,
            limit: defaults::SearchQuery::num_results(),
            raw: false,
        }
    }
}

/// Request-scoped state. Dropping the guard returned by [`RequestCtx::guard`]
/// cancels every in-flight source task, which is how client disconnects
/// propagate.
#[derive(Debug, Clone)]
pub struct RequestCtx {
    pub id: Uuid,
    pub cancel: CancellationToken,
}

impl RequestCtx {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn guard(&self) -> tokio_util::sync::DropGuard {
        self.cancel.clone().drop_guard()
    }
}

impl Default for RequestCtx {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Done,
    TimedOut,
    Cancelled,
    Failed,
}

impl SourceStatus {
    fn reason(&self) -> &'static str {
        match self {
            SourceStatus::Done => "done",
            SourceStatus::TimedOut => "timed_out",
            SourceStatus::Cancelled => "cancelled",
            SourceStatus::Failed => "failed",
        }
    }
}

/// Terminal outcome of one source task.
#[derive(Debug)]
pub struct SourceResult {
    pub source: Source,
    pub status: SourceStatus,
    pub items: Vec<Item>,
    pub latency_ms: u64,
    pub exact_candidate: Option<Item>,
    pub error: Option<String>,
}

impl SourceResult {
    fn empty(source: Source, status: SourceStatus, start: Instant) -> Self {
        Self {
            source,
            status,
            items: Vec::new(),
            latency_ms: start.elapsed().as_millis() as u64,
            exact_candidate: None,
            error: None,
        }
    }
}

pub enum SearchEvent {
    Source(SourceResult),
    Done { source_hint: Option<Vec<Source>> },
}

pub struct SearchRunner {
    executor: Arc<InvertedIndex>,
    brokered: Arc<BrokeredRegistry>,
    taxonomy: Arc<Taxonomy>,
    autocomplete_deadline: Duration,
    search_deadline: Duration,
    brokered_deadline: Duration,
    request_slack: Duration,
}

impl SearchRunner {
    pub fn new(
        executor: Arc<InvertedIndex>,
        brokered: Arc<BrokeredRegistry>,
        taxonomy: Arc<Taxonomy>,
        config: &ApiConfig,
    ) -> Self {
        Self {
            executor,
            brokered,
            taxonomy,
            autocomplete_deadline: Duration::from_millis(config.index.autocomplete_deadline_ms),
            search_deadline: Duration::from_millis(config.index.search_deadline_ms),
            brokered_deadline: Duration::from_millis(config.brokered.search_timeout_ms),
            request_slack: Duration::from_millis(config.request_slack_ms),
        }
    }

    pub fn parse(&self, query: &SearchQuery) -> ParsedQuery {
        let mut parsed = if query.raw {
            ParsedQuery::raw(&query.q)
        } else {
            query::parse(&query.q)
        };

        if let Some(csv) = &query.filters {
            for pair in csv.split(',') {
                if let Some((field, value)) = pair.split_once('=') {
                    let field = field.trim();
                    let value = value.trim();
                    if !field.is_empty() && !value.is_empty() {
                        parsed.filters.push(FilterClause {
                            field: field.to_string(),
                            value: value.to_string(),
                        });
                    }
                }
            }
        }

        parsed
    }

    /// Enabled set = all sources, intersected with the request `sources`
    /// filter, the source hint and the mode exclusion mask. Autocomplete
    /// hard-excludes brokered sources here, below the transport layer.
    pub fn enabled_sources(query: &SearchQuery, parsed: &ParsedQuery, mode: Mode) -> Vec<Source> {
        Source::ALL
            .into_iter()
            .filter(|source| {
                query
                    .sources
                    .as_ref()
                    .map_or(true, |requested| requested.contains(source))
            })
            .filter(|source| {
                parsed
                    .source_hint
                    .as_ref()
                    .map_or(true, |hint| hint.contains(source))
            })
            .filter(|source| mode == Mode::Search || !source.is_brokered())
            .collect()
    }

    fn index_deadline(&self, mode: Mode) -> Duration {
        match mode {
            Mode::Autocomplete => self.autocomplete_deadline,
            Mode::Search => self.search_deadline,
        }
    }

    fn request_budget(&self, enabled: &[Source], mode: Mode) -> Duration {
        let longest = enabled
            .iter()
            .map(|source| {
                if source.is_brokered() {
                    self.brokered_deadline
                } else {
                    self.index_deadline(mode)
                }
            })
            .max()
            .unwrap_or_default();

        longest + self.request_slack
    }

    /// Launch all enabled sources and return the enabled set plus the
    /// event channel. Exactly one [`SearchEvent::Source`] per enabled
    /// source arrives in completion order, then exactly one
    /// [`SearchEvent::Done`].
    pub fn launch(
        &self,
        query: &SearchQuery,
        mode: Mode,
        ctx: &RequestCtx,
    ) -> (Vec<Source>, mpsc::Receiver<SearchEvent>) {
        let parsed = self.parse(query);
        let enabled = Self::enabled_sources(query, &parsed, mode);
        let limit = query.limit.min(defaults::SearchQuery::max_results());
        let canonical_query = normalize::canonical_name(&parsed.text);

        let (tx, rx) = mpsc::channel(enabled.len() + 2);
        let mut tasks: JoinSet<SourceResult> = JoinSet::new();

        for source in enabled.iter().copied() {
            // The short-query and limit=0 boundaries yield empty results
            // without contacting the index or any provider.
            if parsed.is_short() || limit == 0 {
                tasks.spawn(async move {
                    SourceResult::empty(source, SourceStatus::Done, Instant::now())
                });
                continue;
            }

            if source.is_brokered() {
                self.spawn_brokered(&mut tasks, source, &parsed, limit, ctx);
            } else {
                self.spawn_indexed(&mut tasks, source, &parsed, &canonical_query, mode, limit, ctx);
            }
        }

        let budget = self.request_budget(&enabled, mode);
        let source_hint = parsed.source_hint.clone();
        let request_id = ctx.id;
        tokio::spawn(drive(
            tasks,
            tx,
            enabled.clone(),
            source_hint,
            request_id,
            budget,
        ));

        (enabled, rx)
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_indexed(
        &self,
        tasks: &mut JoinSet<SourceResult>,
        source: Source,
        parsed: &ParsedQuery,
        canonical_query: &str,
        mode: Mode,
        limit: usize,
        ctx: &RequestCtx,
    ) {
        let executor = Arc::clone(&self.executor);
        let taxonomy = Arc::clone(&self.taxonomy);
        let parsed = parsed.clone();
        let canonical = canonical_query.to_string();
        let cancel = ctx.cancel.clone();
        let deadline = self.index_deadline(mode);

        tasks.spawn(async move {
            let start = Instant::now();

            let work = async {
                let built =
                    builder::build(executor.index(), source, &parsed, &taxonomy, mode, limit)?;
                executor.execute(built, deadline).await
            };

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    return SourceResult::empty(source, SourceStatus::Cancelled, start);
                }
                outcome = work => outcome,
            };

            match outcome {
                Ok(output) => {
                    let items: Vec<Item> = output
                        .hits
                        .iter()
                        .filter_map(|hit| normalize::item_from_doc(source, &hit.doc).ok())
                        .collect();

                    let status = if output.timed_out {
                        SourceStatus::TimedOut
                    } else {
                        SourceStatus::Done
                    };

                    SourceResult {
                        source,
                        status,
                        exact_candidate: exact::candidate(source, &canonical, &items),
                        items,
                        latency_ms: start.elapsed().as_millis() as u64,
                        error: None,
                    }
                }
                Err(err) => SourceResult {
                    error: Some(err.to_string()),
                    ..SourceResult::empty(source, SourceStatus::Failed, start)
                },
            }
        });
    }

    fn spawn_brokered(
        &self,
        tasks: &mut JoinSet<SourceResult>,
        source: Source,
        parsed: &ParsedQuery,
        limit: usize,
        ctx: &RequestCtx,
    ) {
        let registry = Arc::clone(&self.brokered);
        let text = parsed.text.clone();
        let cancel = ctx.cancel.clone();

        tasks.spawn(async move {
            let start = Instant::now();

            let Some(adapter) = registry.get(source) else {
                return SourceResult {
                    error: Some("no adapter registered".to_string()),
                    ..SourceResult::empty(source, SourceStatus::Failed, start)
                };
            };

            let outcome = adapter.fetch(&text, limit, &cancel).await;

            if cancel.is_cancelled() {
                return SourceResult::empty(source, SourceStatus::Cancelled, start);
            }

            match outcome.error {
                Some(error) => SourceResult {
                    error: Some(format!("{} (status {})", error.message, error.status_code)),
                    latency_ms: outcome.latency.as_millis() as u64,
                    ..SourceResult::empty(source, SourceStatus::Failed, start)
                },
                None => SourceResult {
                    source,
                    status: SourceStatus::Done,
                    items: outcome.items,
                    latency_ms: outcome.latency.as_millis() as u64,
                    exact_candidate: None,
                    error: None,
                },
            }
        });
    }

    /// Batch transport: drain the event channel into one envelope. The
    /// accumulator overwrites a source slot on every completion for that
    /// source, and exact-match arbitration runs over all candidates in
    /// priority order.
    pub async fn search(&self, query: &SearchQuery, mode: Mode, ctx: &RequestCtx) -> SearchResponse {
        let (_, mut rx) = self.launch(query, mode, ctx);

        let mut response = SearchResponse::default();
        let mut candidates = Vec::new();

        while let Some(event) = rx.recv().await {
            match event {
                SearchEvent::Source(result) => {
                    if let Some(candidate) = result.exact_candidate {
                        candidates.push((result.source, candidate));
                    }
                    *response.slot_mut(result.source) = result.items;
                }
                SearchEvent::Done { source_hint } => {
                    response.source_hint = source_hint;
                    break;
                }
            }
        }

        response.exact_match = exact::pick(candidates);
        response
    }
}

/// Forward task outcomes onto the event channel, enforcing the
/// request-wide budget. Every enabled source yields exactly one event;
/// `Done` is always last.
async fn drive(
    mut tasks: JoinSet<SourceResult>,
    tx: mpsc::Sender<SearchEvent>,
    enabled: Vec<Source>,
    source_hint: Option<Vec<Source>>,
    request_id: Uuid,
    budget: Duration,
) {
    let deadline = Instant::now() + budget;
    let mut seen: HashSet<Source> = HashSet::new();

    while !tasks.is_empty() {
        let remaining = deadline.saturating_duration_since(Instant::now());

        match tokio::time::timeout(remaining, tasks.join_next()).await {
            Ok(Some(Ok(result))) => {
                log_source(request_id, &result);
                seen.insert(result.source);

                if tx.send(SearchEvent::Source(result)).await.is_err() {
                    // Receiver gone: the request was superseded or the
                    // client disconnected.
                    tasks.abort_all();
                    return;
                }
            }
            Ok(Some(Err(join_err))) => {
                tracing::error!(%request_id, ?join_err, "source task panicked");
            }
            Ok(None) => break,
            Err(_) => {
                tasks.abort_all();
                break;
            }
        }
    }

    // Sources that never reported (panic or request-wide deadline) still
    // emit an empty result so the stream contract holds.
    for source in enabled {
        if !seen.contains(&source) {
            let result = SourceResult::empty(source, SourceStatus::TimedOut, Instant::now());
            log_source(request_id, &result);
            if tx.send(SearchEvent::Source(result)).await.is_err() {
                return;
            }
        }
    }

    let _ = tx.send(SearchEvent::Done { source_hint }).await;
}

fn log_source(request_id: Uuid, result: &SourceResult) {
    match result.status {
        SourceStatus::Done => tracing::info!(
            %request_id,
            source = result.source.as_str(),
            duration_ms = result.latency_ms,
            results = result.items.len(),
            "source completed"
        ),
        status => tracing::warn!(
            %request_id,
            source = result.source.as_str(),
            duration_ms = result.latency_ms,
            reason = status.reason(),
            error = result.error.as_deref().unwrap_or_default(),
            "source did not complete cleanly"
        ),
    }
}
