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

//! Splits a raw query into `{source_hint, filters, text}`.
//!
//! Recognized syntax, in order of application:
//! - `tv,movie:dune` — explicit source-hint prefix over the fixed tag set.
//! - `[genre=sci-fi]` — bracketed tag filters, lifted out of the text.
//! - `keyword:"time travel"` — keyword filter with a quoted value.
//! - trailing/leading natural-language hints (`godfather movie`,
//!   `podcast joe rogan`) when no explicit hint was given.
//!
//! Parsing never fails; the empty string is a legal parse.

use super::{FilterClause, ParsedQuery};
use crate::items::Source;

/// A stripped natural-language hint must leave at least this much text.
const MIN_STRIPPED_LEN: usize = 3;

const KEYWORD_FILTER: &str = "keyword:\"";

/// Single-word natural-language hint keywords. Deliberately excludes
/// `news`, `ratings` and the bare `tv`/`show`; the fused `tvshow` and
/// `tvseries` forms do count.
const SINGLE_WORD_HINTS: [(&str, Source); 20] = [
    ("podcast", Source::Podcast),
    ("podcasts", Source::Podcast),
    ("movie", Source::Movie),
    ("movies", Source::Movie),
    ("video", Source::Video),
    ("videos", Source::Video),
    ("book", Source::Book),
    ("books", Source::Book),
    ("actor", Source::Person),
    ("actors", Source::Person),
    ("actress", Source::Person),
    ("actresses", Source::Person),
    ("author", Source::Author),
    ("authors", Source::Author),
    ("artist", Source::Artist),
    ("artists", Source::Artist),
    ("album", Source::Album),
    ("albums", Source::Album),
    ("tvshow", Source::Tv),
    ("tvseries", Source::Tv),
];

const MULTI_WORD_HINTS: [(&str, &str, Source); 3] = [
    ("tv", "series", Source::Tv),
    ("tv", "show", Source::Tv),
    ("tv", "shows", Source::Tv),
];

pub fn parse(raw: &str) -> ParsedQuery {
    let (source_hint, rest) = parse_explicit_hint(raw);
    let (filters, rest) = lift_filters(&rest);
    let text = collapse_whitespace(&rest);

    let (text, source_hint) = if source_hint.is_none() {
        let (text, hinted) = parse_natural_hint(&text);
        (text, hinted.map(|source| vec![source]))
    } else {
        (text, source_hint)
    };

    ParsedQuery {
        source_hint,
        filters,
        text,
        raw: false,
    }
}

/// `tv,movie:dune` — the head before the first `:` must consist solely of
/// known source tags, otherwise the colon belongs to the text.
fn parse_explicit_hint(raw: &str) -> (Option<Vec<Source>>, String) {
    let Some(idx) = raw.find(':') else {
        return (None, raw.to_string());
    };

    // `keyword:"…"` is a filter, not a hint.
    if raw[..idx].trim().eq_ignore_ascii_case("keyword") {
        return (None, raw.to_string());
    }

    let head = &raw[..idx];
    if head.trim().is_empty() {
        return (None, raw.to_string());
    }

    let mut sources = Vec::new();
    for token in head.split(',') {
        match Source::parse(token) {
            Some(source) => {
                if !sources.contains(&source) {
                    sources.push(source);
                }
            }
            None => return (None, raw.to_string()),
        }
    }

    (Some(sources), raw[idx + 1..].to_string())
}

/// Lift `[field=value]` and `keyword:"value"` segments into filter clauses,
/// removing them from the text. Malformed segments stay in the text.
fn lift_filters(raw: &str) -> (Vec<FilterClause>, String) {
    let mut filters = Vec::new();
    let mut text = String::with_capacity(raw.len());
    let mut rest = raw;

    while !rest.is_empty() {
        if let Some(open) = rest.find('[') {
            if let Some(close) = rest[open..].find(']') {
                let inner = &rest[open + 1..open + close];
                if let Some((field, value)) = inner.split_once('=') {
                    let field = field.trim();
                    let value = value.trim();
                    if !field.is_empty() && !value.is_empty() {
                        filters.push(FilterClause {
                            field: field.to_string(),
                            value: value.to_string(),
                        });
                        text.push_str(&rest[..open]);
                        text.push(' ');
                        rest = &rest[open + close + 1..];
                        continue;
                    }
                }
            }
        }

        break;
    }
    text.push_str(rest);

    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(start) = rest.find(KEYWORD_FILTER) {
        let value_start = start + KEYWORD_FILTER.len();
        if let Some(end) = rest[value_start..].find('"') {
            let value = rest[value_start..value_start + end].trim();
            if !value.is_empty() {
                filters.push(FilterClause {
                    field: "keyword".to_string(),
                    value: value.to_string(),
                });
            }
            out.push_str(&rest[..start]);
            out.push(' ');
            rest = &rest[value_start + end + 1..];
        } else {
            break;
        }
    }
    out.push_str(rest);

    (filters, out)
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Suffix hints win over prefix hints, multi-word keywords over single
/// words. The hint is ignored when the stripped text gets too short.
fn parse_natural_hint(text: &str) -> (String, Option<Source>) {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return (text.to_string(), None);
    }

    let lower: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
    let n = tokens.len();

    let mut matched = None;

    for (first, second, source) in MULTI_WORD_HINTS {
        if n >= 2 && lower[n - 2] == first && lower[n - 1] == second {
            matched = Some((source, n - 2, true));
            break;
        }
    }

    if matched.is_none() {
        if let Some((_, source)) = SINGLE_WORD_HINTS.iter().find(|(kw, _)| *kw == lower[n - 1]) {
            matched = Some((*source, n - 1, true));
        }
    }

    if matched.is_none() && n >= 2 {
        for (first, second, source) in MULTI_WORD_HINTS {
            if lower[0] == first && lower[1] == second {
                matched = Some((source, 2, false));
                break;
            }
        }
    }

    if matched.is_none() {
        if let Some((_, source)) = SINGLE_WORD_HINTS.iter().find(|(kw, _)| *kw == lower[0]) {
            matched = Some((*source, 1, false));
        }
    }

    let Some((source, boundary, from_end)) = matched else {
        return (text.to_string(), None);
    };

    let stripped = if from_end {
        tokens[..boundary].join(" ")
    } else {
        tokens[boundary..].join(" ")
    };

    if stripped.len() < MIN_STRIPPED_LEN {
        return (text.to_string(), None);
    }

    (stripped, Some(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_legal() {
        let parsed = parse("");
        assert_eq!(parsed.text, "");
        assert_eq!(parsed.source_hint, None);
        assert!(parsed.filters.is_empty());
        assert!(parsed.is_short());
    }

    #[test]
    fn explicit_hint() {
        let parsed = parse("person:tom hanks");
        assert_eq!(parsed.source_hint, Some(vec![Source::Person]));
        assert_eq!(parsed.text, "tom hanks");
    }

    #[test]
    fn explicit_hint_multiple_sources() {
        let parsed = parse("tv,movie:dune");
        assert_eq!(parsed.source_hint, Some(vec![Source::Tv, Source::Movie]));
        assert_eq!(parsed.text, "dune");
    }

    #[test]
    fn explicit_hint_case_insensitive() {
        let parsed = parse("TV,Movie:dune");
        assert_eq!(parsed.source_hint, Some(vec![Source::Tv, Source::Movie]));
    }

    #[test]
    fn unknown_prefix_is_text() {
        let parsed = parse("dune: part two");
        assert_eq!(parsed.source_hint, None);
        assert_eq!(parsed.text, "dune: part two");
    }

    #[test]
    fn bracketed_filter() {
        let parsed = parse("[genre=sci-fi] dune");
        assert_eq!(
            parsed.filters,
            vec![FilterClause {
                field: "genre".to_string(),
                value: "sci-fi".to_string(),
            }]
        );
        assert_eq!(parsed.text, "dune");
    }

    #[test]
    fn multiple_filters_and_hint() {
        let parsed = parse("movie:[genre=thriller] [year=1995] heat");
        assert_eq!(parsed.source_hint, Some(vec![Source::Movie]));
        assert_eq!(parsed.filters.len(), 2);
        assert_eq!(parsed.text, "heat");
    }

    #[test]
    fn keyword_filter() {
        let parsed = parse("dune keyword:\"time travel\"");
        assert_eq!(
            parsed.filters,
            vec![FilterClause {
                field: "keyword".to_string(),
                value: "time travel".to_string(),
            }]
        );
        assert_eq!(parsed.text, "dune");
    }

    #[test]
    fn malformed_bracket_stays_in_text() {
        let parsed = parse("[genre sci-fi dune");
        assert!(parsed.filters.is_empty());
        assert_eq!(parsed.text, "[genre sci-fi dune");
    }

    #[test]
    fn whitespace_collapsed() {
        let parsed = parse("  the   office  ");
        assert_eq!(parsed.text, "the office");
    }

    #[test]
    fn natural_hint_suffix() {
        let parsed = parse("godfather movie");
        assert_eq!(parsed.source_hint, Some(vec![Source::Movie]));
        assert_eq!(parsed.text, "godfather");
    }

    #[test]
    fn natural_hint_prefix() {
        let parsed = parse("podcast joe rogan");
        assert_eq!(parsed.source_hint, Some(vec![Source::Podcast]));
        assert_eq!(parsed.text, "joe rogan");
    }

    #[test]
    fn natural_hint_multi_word() {
        let parsed = parse("breaking bad tv show");
        assert_eq!(parsed.source_hint, Some(vec![Source::Tv]));
        assert_eq!(parsed.text, "breaking bad");
    }

    #[test]
    fn natural_hint_fused_tv_keywords() {
        let parsed = parse("breaking bad tvshow");
        assert_eq!(parsed.source_hint, Some(vec![Source::Tv]));
        assert_eq!(parsed.text, "breaking bad");

        let parsed = parse("tvseries breaking bad");
        assert_eq!(parsed.source_hint, Some(vec![Source::Tv]));
        assert_eq!(parsed.text, "breaking bad");
    }

    #[test]
    fn natural_hint_suffix_wins() {
        let parsed = parse("something movie podcast");
        assert_eq!(parsed.source_hint, Some(vec![Source::Podcast]));
        assert_eq!(parsed.text, "something movie");
    }

    #[test]
    fn natural_hint_requires_remaining_text() {
        let parsed = parse("up movie");
        assert_eq!(parsed.source_hint, None);
        assert_eq!(parsed.text, "up movie");
    }

    #[test]
    fn bare_tv_is_not_a_hint() {
        let parsed = parse("breaking bad tv");
        assert_eq!(parsed.source_hint, None);
        assert_eq!(parsed.text, "breaking bad tv");
    }

    #[test]
    fn explicit_hint_suppresses_natural_hint() {
        let parsed = parse("tv:the wire movie");
        assert_eq!(parsed.source_hint, Some(vec![Source::Tv]));
        assert_eq!(parsed.text, "the wire movie");
    }
}
