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

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]

use std::io;

use thiserror::Error;

pub mod api;
pub mod brokered;
pub mod config;
pub mod debounce;
pub mod entrypoint;
pub mod index;
pub mod inverted_index;
pub mod items;
pub mod query;
pub mod registry;
pub mod schema;
pub mod searcher;
pub mod taxonomy;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Got an IO error")]
    Io(#[from] io::Error),

    #[error("Encountered a tantivy error")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Could not open inverted-index directory")]
    Directory(#[from] tantivy::directory::error::OpenDirectoryError),

    #[error("Invalid query")]
    InvalidQuery(String),

    #[error("Could not convert to/from JSON")]
    Json(#[from] serde_json::Error),

    #[error("Upstream request failed")]
    Http(#[from] reqwest::Error),

    #[error("Unknown source tag")]
    UnknownSource(String),

    #[error("Unknown document")]
    UnknownDocument(String),

    #[error("The inverted index is unavailable")]
    IndexUnavailable,

    #[error("Internal error")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
