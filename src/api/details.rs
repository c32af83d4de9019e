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

//! Detail lookups by `mc_id`.

use std::sync::Arc;

use axum::{extract, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[allow(unused_imports)]
use super::ErrorResponse;
use super::{AppError, State};
use crate::{
    items::{AuthorDoc, BookDoc, MediaDoc, PersonDoc, PodcastDoc},
    schema::Collection,
    Error,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct DetailsRequest {
    pub mc_id: String,

    /// Include feed metadata in podcast details.
    #[serde(default)]
    pub rss_details: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RssDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub podcast_guid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_count: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MediaDetailResponse {
    #[serde(flatten)]
    pub document: MediaDoc,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PersonDetailResponse {
    #[serde(flatten)]
    pub document: PersonDoc,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PodcastDetailResponse {
    #[serde(flatten)]
    pub document: PodcastDoc,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rss: Option<RssDetails>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookDetailResponse {
    #[serde(flatten)]
    pub document: BookDoc,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorDetailResponse {
    #[serde(flatten)]
    pub document: AuthorDoc,
}

#[utoipa::path(
    post,
    path = "/api/details",
    request_body = DetailsRequest,
    responses(
        (status = 200, description = "Document details"),
        (status = 404, description = "Unknown mc_id", body = ErrorResponse),
        (status = 503, description = "Index unavailable", body = ErrorResponse),
    )
)]
pub async fn route(
    extract::State(state): extract::State<Arc<State>>,
    Json(request): Json<DetailsRequest>,
) -> Result<axum::response::Response, AppError> {
    let (collection, doc) = state
        .executor
        .lookup_mc_id(&request.mc_id)
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::from(Error::UnknownDocument(request.mc_id.clone())))?;

    let response = match collection {
        Collection::Media => {
            let document: MediaDoc = serde_json::from_value(doc).map_err(Error::from)?;
            Json(MediaDetailResponse { document }).into_response()
        }
        Collection::Person => {
            let document: PersonDoc = serde_json::from_value(doc).map_err(Error::from)?;
            Json(PersonDetailResponse { document }).into_response()
        }
        Collection::Podcast => {
            let document: PodcastDoc = serde_json::from_value(doc).map_err(Error::from)?;
            let rss = request.rss_details.then(|| RssDetails {
                url: document.url.clone(),
                podcast_guid: document.podcast_guid.clone(),
                last_update_time: document.last_update_time,
                episode_count: document.episode_count,
            });
            Json(PodcastDetailResponse { document, rss }).into_response()
        }
        Collection::Book => {
            let document: BookDoc = serde_json::from_value(doc).map_err(Error::from)?;
            Json(BookDetailResponse { document }).into_response()
        }
        Collection::Author => {
            let document: AuthorDoc = serde_json::from_value(doc).map_err(Error::from)?;
            Json(AuthorDetailResponse { document }).into_response()
        }
    };

    Ok(response)
}
