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

//! Client-side two-tier debouncer.
//!
//! Tier 1 (autocomplete) fires 300 ms after the last keystroke, tier 2
//! (search) after 750 ms or immediately on Enter. A keystroke that changes
//! the query cancels all in-flight work and clears the accumulator; stale
//! responses are discarded by epoch. Tier-2 results overwrite tier-1 for
//! every key they touch.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    config::defaults,
    items::{Item, SearchResponse, Source},
    query::Mode,
    searcher::{RequestCtx, SearchQuery},
};

/// The transport the debouncer drives; in production an HTTP client for
/// the batch endpoints, in tests a mock.
#[async_trait]
pub trait Requester: Send + Sync + 'static {
    async fn run(&self, query: SearchQuery, mode: Mode, ctx: RequestCtx) -> SearchResponse;
}

struct Slot {
    tier: Mode,
    items: Vec<Item>,
}

struct State {
    text: String,
    epoch: u64,
    ctx: Option<RequestCtx>,
    accumulator: HashMap<Source, Slot>,
}

struct Inner {
    requester: Arc<dyn Requester>,
    autocomplete_delay: Duration,
    search_delay: Duration,
    state: Mutex<State>,
}

pub struct Debouncer {
    inner: Arc<Inner>,
}

impl Debouncer {
    pub fn new(requester: Arc<dyn Requester>) -> Self {
        Self::with_delays(
            requester,
            Duration::from_millis(defaults::Debounce::autocomplete_ms()),
            Duration::from_millis(defaults::Debounce::search_ms()),
        )
    }

    pub fn with_delays(
        requester: Arc<dyn Requester>,
        autocomplete_delay: Duration,
        search_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                requester,
                autocomplete_delay,
                search_delay,
                state: Mutex::new(State {
                    text: String::new(),
                    epoch: 0,
                    ctx: None,
                    accumulator: HashMap::new(),
                }),
            }),
        }
    }

    /// Register a keystroke. Changing the text supersedes the previous
    /// query: in-flight requests are cancelled and the accumulator is
    /// cleared. Both tier timers restart from this keystroke.
    pub async fn keystroke(&self, text: &str) {
        let epoch = {
            let mut state = self.inner.state.lock().await;

            if state.text != text {
                if let Some(ctx) = state.ctx.take() {
                    ctx.cancel.cancel();
                }
                state.accumulator.clear();
                state.text = text.to_string();
            }

            state.epoch += 1;
            let ctx = RequestCtx::new();
            state.ctx = Some(ctx.clone());
            state.epoch
        };

        Inner::schedule(&self.inner, epoch, Mode::Autocomplete, self.inner.autocomplete_delay);
        Inner::schedule(&self.inner, epoch, Mode::Search, self.inner.search_delay);
    }

    /// Enter forces search mode immediately.
    pub async fn submit(&self, text: &str) {
        let epoch = {
            let mut state = self.inner.state.lock().await;

            if state.text != text {
                if let Some(ctx) = state.ctx.take() {
                    ctx.cancel.cancel();
                }
                state.accumulator.clear();
                state.text = text.to_string();
            }

            state.epoch += 1;
            let ctx = RequestCtx::new();
            state.ctx = Some(ctx.clone());
            state.epoch
        };

        Inner::schedule(&self.inner, epoch, Mode::Search, Duration::ZERO);
    }

    /// Snapshot of the merged results.
    pub async fn results(&self) -> HashMap<Source, Vec<Item>> {
        let state = self.inner.state.lock().await;
        state
            .accumulator
            .iter()
            .map(|(source, slot)| (*source, slot.items.clone()))
            .collect()
    }
}

impl Inner {
    fn schedule(inner: &Arc<Inner>, epoch: u64, mode: Mode, delay: Duration) {
        let inner = Arc::clone(inner);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let (text, ctx) = {
                let state = inner.state.lock().await;
                if state.epoch != epoch {
                    // A newer keystroke superseded this timer.
                    return;
                }
                let Some(ctx) = state.ctx.clone() else {
                    return;
                };
                (state.text.clone(), ctx)
            };

            let query = SearchQuery {
                q: text.clone(),
                ..Default::default()
            };
            let response = inner.requester.run(query, mode, ctx).await;

            let mut state = inner.state.lock().await;
            if state.epoch != epoch || state.text != text {
                // Stale response: the query moved on while we were out.
                return;
            }

            merge(&mut state.accumulator, mode, response);
        });
    }
}

/// Tier-2 overwrites every key it touches; tier-1 fills keys but never
/// clobbers a tier-2 slot and never touches brokered keys.
fn merge(accumulator: &mut HashMap<Source, Slot>, mode: Mode, response: SearchResponse) {
    for source in Source::ALL {
        if mode == Mode::Autocomplete && source.is_brokered() {
            continue;
        }

        if mode == Mode::Autocomplete {
            if let Some(slot) = accumulator.get(&source) {
                if slot.tier == Mode::Search {
                    continue;
                }
            }
        }

        accumulator.insert(
            source,
            Slot {
                tier: mode,
                items: response.slot(source).clone(),
            },
        );
    }
}
