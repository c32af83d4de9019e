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

//! IPTC media-topic taxonomy used to expand filter tags.
//!
//! The taxonomy file maps aliases to topic qcodes and qcodes to their
//! broader parents. Expanding a tag yields the normalized tag itself, every
//! alias of its topic and the labels of all ancestor topics, so a filter on
//! `sci-fi` also matches documents tagged `science_fiction` or `fiction`.

use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use crate::Result;

/// Normalize a value for use as an index tag.
///
/// Lowercased, every run of non-alphanumeric characters collapsed to a
/// single `_`, leading/trailing underscores trimmed. Total and idempotent.
pub fn normalize_tag(value: &str) -> String {
    let mut res = String::with_capacity(value.len());

    for c in value.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            res.push(c);
        } else if !res.is_empty() && !res.ends_with('_') {
            res.push('_');
        }
    }

    while res.ends_with('_') {
        res.pop();
    }

    res
}

#[derive(Debug, Default, Deserialize)]
struct RawTaxonomy {
    /// alias (human form, e.g. "sci-fi") -> qcode (e.g. "medtop:20000013")
    #[serde(default)]
    aliases: HashMap<String, String>,

    /// qcode -> display label
    #[serde(default)]
    labels: HashMap<String, String>,

    /// qcode -> broader (parent) qcode
    #[serde(default)]
    broader: HashMap<String, String>,
}

pub struct Taxonomy {
    aliases: HashMap<String, String>,
    labels: HashMap<String, String>,
    broader: HashMap<String, String>,
    reverse: HashMap<String, Vec<String>>,
}

impl Taxonomy {
    pub fn empty() -> Self {
        Self::from_raw(RawTaxonomy::default())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawTaxonomy = serde_json::from_str(json)?;
        Ok(Self::from_raw(raw))
    }

    /// Load from an optional configured path. A missing or unreadable file
    /// degrades to the empty taxonomy so expansion becomes the identity.
    pub fn open(path: Option<&str>) -> Self {
        match path {
            Some(path) => match Self::from_path(path) {
                Ok(taxonomy) => taxonomy,
                Err(err) => {
                    tracing::warn!(%path, ?err, "could not load taxonomy; tag expansion disabled");
                    Self::empty()
                }
            },
            None => Self::empty(),
        }
    }

    fn from_raw(raw: RawTaxonomy) -> Self {
        let mut aliases = HashMap::new();
        let mut reverse: HashMap<String, Vec<String>> = HashMap::new();

        for (alias, qcode) in raw.aliases {
            let normalized = normalize_tag(&alias);
            if normalized.is_empty() {
                continue;
            }

            reverse
                .entry(qcode.clone())
                .or_default()
                .push(normalized.clone());
            aliases.insert(normalized, qcode);
        }

        for all in reverse.values_mut() {
            all.sort();
            all.dedup();
        }

        Self {
            aliases,
            labels: raw.labels,
            broader: raw.broader,
            reverse,
        }
    }

    /// Expand a tag to the set of normalized tokens it should match.
    ///
    /// Always contains the normalized input. Deterministic: the result is
    /// sorted and deduplicated.
    pub fn expand(&self, token: &str) -> Vec<String> {
        let normalized = normalize_tag(token);
        let mut res = vec![normalized.clone()];

        if let Some(qcode) = self.aliases.get(&normalized) {
            if let Some(aliases) = self.reverse.get(qcode) {
                res.extend(aliases.iter().cloned());
            }

            // Walk the broader chain, guarding against cycles in the data.
            let mut seen = vec![qcode.clone()];
            let mut current = qcode;
            while let Some(parent) = self.broader.get(current) {
                if seen.iter().any(|q| q == parent) {
                    break;
                }
                seen.push(parent.clone());

                if let Some(label) = self.labels.get(parent) {
                    let label = normalize_tag(label);
                    if !label.is_empty() {
                        res.push(label);
                    }
                }

                current = parent;
            }
        }

        res.sort();
        res.dedup();
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_taxonomy() -> Taxonomy {
        Taxonomy::from_json(
            r#"{
                "aliases": {
                    "sci-fi": "medtop:sf",
                    "science fiction": "medtop:sf",
                    "scifi": "medtop:sf",
                    "time travel": "medtop:tt"
                },
                "labels": {
                    "medtop:sf": "science fiction",
                    "medtop:fic": "fiction",
                    "medtop:spec": "speculative"
                },
                "broader": {
                    "medtop:sf": "medtop:spec",
                    "medtop:spec": "medtop:fic"
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_tag("Science Fiction"), "science_fiction");
        assert_eq!(normalize_tag("Tom Hanks"), "tom_hanks");
        assert_eq!(normalize_tag("R&B"), "r_b");
        assert_eq!(normalize_tag("  US "), "us");
        assert_eq!(normalize_tag("---"), "");
        assert_eq!(normalize_tag(""), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["Sci-Fi!", "  mixed   CASE  ", "æøå", "a---b"] {
            let once = normalize_tag(raw);
            assert_eq!(normalize_tag(&once), once);
        }
    }

    #[test]
    fn expansion_includes_aliases_and_ancestors() {
        let taxonomy = test_taxonomy();

        let expanded = taxonomy.expand("Sci-Fi");
        assert!(expanded.contains(&"sci_fi".to_string()));
        assert!(expanded.contains(&"science_fiction".to_string()));
        assert!(expanded.contains(&"scifi".to_string()));
        assert!(expanded.contains(&"speculative".to_string()));
        assert!(expanded.contains(&"fiction".to_string()));
    }

    #[test]
    fn expansion_of_unknown_tag_is_identity() {
        let taxonomy = test_taxonomy();
        assert_eq!(taxonomy.expand("Western Noir"), vec!["western_noir"]);
    }

    #[test]
    fn empty_taxonomy_is_identity() {
        let taxonomy = Taxonomy::empty();
        assert_eq!(taxonomy.expand("sci-fi"), vec!["sci_fi"]);
    }
}
