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

pub mod builder;
pub mod parser;

pub use parser::parse;

use crate::items::Source;

/// Autocomplete treats the trailing token as a prefix and runs under the
/// tight deadline; search is exact and patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Autocomplete,
    Search,
}

/// One conjunctive filter clause lifted out of the query (or supplied via
/// the `filters` request parameter). Values are raw user text here; the
/// builder normalizes and expands them before they reach the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub source_hint: Option<Vec<Source>>,
    pub filters: Vec<FilterClause>,
    pub text: String,

    /// Raw queries bypass stopword removal and hint/filter lifting.
    pub raw: bool,
}

impl ParsedQuery {
    /// Raw-mode parse: the text is forwarded verbatim, nothing is lifted.
    pub fn raw(text: &str) -> Self {
        Self {
            source_hint: None,
            filters: Vec::new(),
            text: text.to_string(),
            raw: true,
        }
    }

    /// Short-query policy: fewer than 2 non-whitespace characters means the
    /// index must not be contacted.
    pub fn is_short(&self) -> bool {
        self.text.chars().filter(|c| !c.is_whitespace()).count() < 2
    }
}
