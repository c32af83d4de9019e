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

use anyhow::Result;

use crate::{api, config::ApiConfig};

pub async fn run(config: ApiConfig) -> Result<()> {
    let state = Arc::new(api::State::open(&config)?);

    for collection in crate::schema::Collection::ALL {
        tracing::info!(
            collection = collection.name(),
            cache_version = state.registry.version(collection.name()),
            "collection ready"
        );
    }

    let app = api::router(state);

    tracing::info!("api server listening on {}", config.host);
    axum::Server::bind(&config.host)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
