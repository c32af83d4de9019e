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

//! Cache-version registry read on startup.
//!
//! Clients key their caches `cache_version:<prefix>`; bumping a version in
//! the registry file invalidates them in a coordinated way. An absent
//! registry or prefix means version 1.

use std::{collections::HashMap, fs, path::Path};

use serde_json::Value;

pub const DEFAULT_VERSION: u64 = 1;

#[derive(Debug, Default)]
pub struct CacheRegistry {
    versions: HashMap<String, u64>,
}

impl CacheRegistry {
    pub fn open(path: Option<&str>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match Self::from_path(path) {
            Ok(registry) => registry,
            Err(err) => {
                tracing::warn!(%path, ?err, "could not read cache registry; using defaults");
                Self::default()
            }
        }
    }

    fn from_path<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let json: Value = serde_json::from_str(&raw)?;

        let versions = json
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(key, value)| {
                        let prefix = key.strip_prefix("cache_version:")?;
                        Some((prefix.to_string(), value.as_u64()?))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { versions })
    }

    pub fn version(&self, prefix: &str) -> u64 {
        self.versions.get(prefix).copied().unwrap_or(DEFAULT_VERSION)
    }
}
