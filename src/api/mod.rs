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

//! The http api. All requests are handled with axum.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::compression::CompressionLayer;
use utoipa::ToSchema;

use crate::{
    brokered::BrokeredRegistry,
    config::ApiConfig,
    index::Index,
    inverted_index::InvertedIndex,
    registry::CacheRegistry,
    searcher::SearchRunner,
    taxonomy::Taxonomy,
    Error, Result,
};

pub mod details;
pub mod docs;
pub mod search;
pub mod stream;

pub struct State {
    pub runner: SearchRunner,
    pub executor: Arc<InvertedIndex>,
    pub registry: CacheRegistry,
}

impl State {
    pub fn open(config: &ApiConfig) -> Result<Self> {
        let index = Arc::new(Index::open(&config.index_path)?);
        let brokered = BrokeredRegistry::from_config(&config.brokered);
        let taxonomy = Taxonomy::open(config.taxonomy_path.as_deref());

        Ok(Self::with_parts(index, brokered, taxonomy, config))
    }

    /// Assemble a state from prebuilt parts; tests seed a temporary index
    /// and mock providers through this.
    pub fn with_parts(
        index: Arc<Index>,
        brokered: BrokeredRegistry,
        taxonomy: Taxonomy,
        config: &ApiConfig,
    ) -> Self {
        let executor = Arc::new(InvertedIndex::new(index, config.index.pool_size));
        let runner = SearchRunner::new(
            Arc::clone(&executor),
            Arc::new(brokered),
            Arc::new(taxonomy),
            config,
        );
        let registry = CacheRegistry::open(config.registry_path.as_deref());

        Self {
            runner,
            executor,
            registry,
        }
    }
}

pub fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/api/autocomplete", get(search::autocomplete))
        .route("/api/autocomplete/stream", get(stream::autocomplete))
        .route("/api/search", get(search::search))
        .route("/api/search/stream", get(stream::search))
        .route("/api/details", post(details::route))
        .merge(docs::router())
        .layer(CompressionLayer::new())
        .layer(cors_layer())
        .with_state(state)
}

/// Enables CORS for development where the api and frontend are on
/// different hosts.
fn cors_layer() -> tower_http::cors::CorsLayer {
    tower_http::cors::CorsLayer::permissive()
}

/// Structured error body for non-200 responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status_code: u16,
}

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::InvalidQuery(_) | Error::UnknownSource(_) => StatusCode::BAD_REQUEST,
            Error::UnknownDocument(_) => StatusCode::NOT_FOUND,
            Error::IndexUnavailable | Error::Tantivy(_) | Error::Directory(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            status_code: self.status.as_u16(),
        };

        (self.status, Json(body)).into_response()
    }
}
