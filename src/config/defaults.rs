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

pub struct Index;

impl Index {
    pub fn pool_size() -> usize {
        10
    }

    pub fn autocomplete_deadline_ms() -> u64 {
        250
    }

    pub fn search_deadline_ms() -> u64 {
        1_500
    }
}

pub struct Brokered;

impl Brokered {
    pub fn search_timeout_ms() -> u64 {
        2_500
    }
}

pub struct SearchQuery;

impl SearchQuery {
    pub fn num_results() -> usize {
        10
    }

    pub fn max_results() -> usize {
        50
    }
}

pub struct Orchestrator;

impl Orchestrator {
    pub fn request_slack_ms() -> u64 {
        500
    }
}

pub struct Debounce;

impl Debounce {
    pub fn autocomplete_ms() -> u64 {
        300
    }

    pub fn search_ms() -> u64 {
        750
    }
}
