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

use std::sync::Arc;

use axum::{response::IntoResponse, routing::get, Json, Router};
use utoipa::OpenApi;

use super::State;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::search::autocomplete,
        super::search::search,
        super::details::route,
    ),
    components(schemas(
        crate::items::Item,
        crate::items::SearchResponse,
        crate::items::Source,
        crate::items::McType,
        crate::items::McSubtype,
        crate::items::CastCredit,
        crate::items::Director,
        crate::items::MediaDoc,
        crate::items::PersonDoc,
        crate::items::PodcastDoc,
        crate::items::BookDoc,
        crate::items::AuthorDoc,
        super::ErrorResponse,
        super::details::DetailsRequest,
        super::details::RssDetails,
        super::details::MediaDetailResponse,
        super::details::PersonDetailResponse,
        super::details::PodcastDetailResponse,
        super::details::BookDetailResponse,
        super::details::AuthorDetailResponse,
        super::stream::ResultEvent,
        super::stream::DoneEvent,
    ))
)]
struct ApiDoc;

pub fn router() -> Router<Arc<State>> {
    Router::new().route("/api/docs/openapi.json", get(serve))
}

#[allow(clippy::unused_async)]
async fn serve() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
