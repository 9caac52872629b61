//! Decay-weighted relevance scoring.
//!
//! `score = w_sim * similarity + w_rec * recency + w_freq * frequency` where
//! recency halves every `half_life_days` of record age and frequency saturates
//! logarithmically at `saturation_count` accesses. Scoring is pure: it never
//! touches the store, and `now` is always passed in.

use chrono::{DateTime, Utc};
use hippo_types::config::ScoringConfig;
use hippo_types::error::HippoResult;
use hippo_types::record::MemoryRecord;
use std::cmp::Ordering;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A record with its computed relevance.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub similarity: f64,
    pub score: f64,
}

/// Relevance scorer with validated weights.
#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> HippoResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// `2^(-age_days / half_life_days)`. Ages in the future count as zero.
    pub fn recency_decay(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_days = ((now - created_at).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY).max(0.0);
        (-age_days / self.config.half_life_days).exp2()
    }

    /// `min(1, ln(1 + count) / ln(1 + saturation))`.
    pub fn access_frequency(&self, access_count: u64) -> f64 {
        let saturation = (1.0 + self.config.saturation_count as f64).ln();
        ((1.0 + access_count as f64).ln() / saturation).min(1.0)
    }

    /// Composite score. `similarity` is clipped to `[0, 1]`; NaN counts as 0.
    pub fn score(&self, record: &MemoryRecord, similarity: f64, now: DateTime<Utc>) -> f64 {
        let sim = if similarity.is_nan() { 0.0 } else { similarity.clamp(0.0, 1.0) };
        let c = &self.config;
        if record.decay_exempt {
            return c.w_sim * sim + c.w_rec + c.w_freq;
        }
        c.w_sim * sim
            + c.w_rec * self.recency_decay(record.created_at, now)
            + c.w_freq * self.access_frequency(record.access_count)
    }

    /// Score and sort, best first. Equal scores put the newest record first,
    /// then the smaller id.
    pub fn rank<I>(&self, candidates: I, now: DateTime<Utc>) -> Vec<ScoredRecord>
    where
        I: IntoIterator<Item = (MemoryRecord, f64)>,
    {
        let mut scored: Vec<ScoredRecord> = candidates
            .into_iter()
            .map(|(record, similarity)| {
                let score = self.score(&record, similarity, now);
                ScoredRecord {
                    record,
                    similarity,
                    score,
                }
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.record.created_at.cmp(&a.record.created_at))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scorer() -> Scorer {
        Scorer::new(ScoringConfig::default()).unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_fourteen_day_old_record() {
        let now = Utc::now();
        let rec = MemoryRecord::new("fact", "note", now - Duration::days(14));
        assert_close(scorer().score(&rec, 1.0, now), 0.75);
    }

    #[test]
    fn test_fresh_record_full_recency() {
        let now = Utc::now();
        let rec = MemoryRecord::new("fact", "note", now);
        assert_close(scorer().score(&rec, 0.0, now), 0.3);
    }

    #[test]
    fn test_decay_is_monotonic() {
        let s = scorer();
        let created = Utc::now();
        let rec = MemoryRecord::new("fact", "note", created);
        let mut previous = f64::MAX;
        for day in [0, 1, 7, 14, 30, 365] {
            let score = s.score(&rec, 0.5, created + Duration::days(day) + Duration::seconds(1));
            assert!(score < previous, "score did not drop at day {day}");
            previous = score;
        }
    }

    #[test]
    fn test_future_created_at_clamped() {
        let now = Utc::now();
        let rec = MemoryRecord::new("fact", "note", now + Duration::days(3));
        assert_close(scorer().recency_decay(rec.created_at, now), 1.0);
    }

    #[test]
    fn test_access_frequency_saturates() {
        let s = scorer();
        assert_close(s.access_frequency(0), 0.0);
        assert_close(s.access_frequency(50), 1.0);
        assert_close(s.access_frequency(5_000), 1.0);
        assert!(s.access_frequency(5) > s.access_frequency(4));
    }

    #[test]
    fn test_decay_exempt() {
        let now = Utc::now();
        let rec = MemoryRecord::new("curated", "note", now - Duration::days(400)).decay_exempt(true);
        assert_close(scorer().score(&rec, 0.5, now), 0.6 * 0.5 + 0.3 + 0.1);
    }

    #[test]
    fn test_similarity_clipped() {
        let now = Utc::now();
        let rec = MemoryRecord::new("fact", "note", now - Duration::days(14));
        let s = scorer();
        assert_close(s.score(&rec, 1.7, now), s.score(&rec, 1.0, now));
        assert_close(s.score(&rec, -0.4, now), s.score(&rec, 0.0, now));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ScoringConfig {
            half_life_days: -1.0,
            ..Default::default()
        };
        assert!(Scorer::new(config).is_err());
    }

    #[test]
    fn test_rank_orders_best_first() {
        let now = Utc::now();
        let old = MemoryRecord::new("old", "note", now - Duration::days(60));
        let new = MemoryRecord::new("new", "note", now);
        let ranked = scorer().rank(vec![(old, 0.5), (new, 0.5)], now);
        assert_eq!(ranked[0].record.content, "new");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn test_rank_ties_prefer_newest_then_id() {
        let now = Utc::now();
        let older = MemoryRecord::new("older", "note", now - Duration::days(90)).decay_exempt(true);
        let newer = MemoryRecord::new("newer", "note", now - Duration::days(1)).decay_exempt(true);
        let twin_a = MemoryRecord::new("twin a", "note", now - Duration::days(90)).decay_exempt(true);
        let twin_b = MemoryRecord::new("twin b", "note", now - Duration::days(90)).decay_exempt(true);

        let ranked = scorer().rank(
            vec![(twin_b, 0.5), (older, 0.5), (twin_a, 0.5), (newer, 0.5)],
            now,
        );
        assert_close(ranked[0].score, ranked[3].score);
        assert_eq!(ranked[0].record.content, "newer");
        let rest: Vec<_> = ranked[1..].iter().map(|s| s.record.id.clone()).collect();
        assert_eq!(rest.len(), 3);
        assert!(rest.windows(2).all(|w| w[0] < w[1]));
    }
}
