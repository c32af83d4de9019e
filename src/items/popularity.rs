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

//! Maps raw per-source scores onto a common 0-100 popularity scale.

use super::Source;

/// Observed raw score range for a source. TMDB popularity is effectively
/// unbounded but capped at 1000; PodcastIndex scores run 0-29; book and
/// author scores are composites that already live on 0-100.
fn raw_range(source: Source) -> (f64, f64) {
    match source {
        Source::Tv | Source::Movie => (0.0, 1_000.0),
        Source::Person => (0.0, 100.0),
        Source::Podcast => (0.0, 29.0),
        Source::Book | Source::Author => (0.0, 100.0),
        // Brokered providers expose their own metrics; map them through the
        // same formula with a provider-reported ceiling.
        Source::News | Source::Video | Source::Ratings | Source::Artist | Source::Album => {
            (0.0, 100.0)
        }
    }
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Deterministic, monotonic mapping of a raw score to 0-100.
pub fn normalize(source: Source, raw: f64) -> f64 {
    let (min, max) = raw_range(source);
    100.0 * clamp01((raw - min) / (max - min))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        for source in Source::ALL {
            assert_eq!(normalize(source, f64::MIN), 0.0);
            assert_eq!(normalize(source, f64::MAX), 100.0);
        }
    }

    #[test]
    fn movie_cap() {
        assert_eq!(normalize(Source::Movie, 1_000.0), 100.0);
        assert_eq!(normalize(Source::Movie, 2_000.0), 100.0);
        assert_eq!(normalize(Source::Movie, 500.0), 50.0);
        assert_eq!(normalize(Source::Movie, -1.0), 0.0);
    }

    #[test]
    fn podcast_scale() {
        assert_eq!(normalize(Source::Podcast, 29.0), 100.0);
        assert!((normalize(Source::Podcast, 14.5) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn monotonic() {
        for source in Source::ALL {
            let mut prev = normalize(source, 0.0);
            for step in 1..=100 {
                let next = normalize(source, f64::from(step) * 10.0);
                assert!(next >= prev);
                prev = next;
            }
        }
    }
}
