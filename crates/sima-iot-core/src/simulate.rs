//! Deterministic failover generator.
//!
//! Pure value generation only; the tick source that drives it lives in the
//! runtime. For a fixed seed and a fixed sequence of ticks the output is
//! identical across runs, independent of wall-clock timing.

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::types::{ChannelKind, Reading, ResourceId, TimestampMs};

/// Drift noise bound: each step adds uniform noise in `[-DRIFT, DRIFT]`.
pub const DRIFT: f64 = 1.0;

/// Smoothing factor between the current value and the clamped target.
pub const SMOOTHING: f64 = 0.5;

pub fn clamp(v: f64, min: f64, max: f64) -> f64 {
    v.max(min).min(max)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Seeded per-channel random walk.
#[derive(Debug, Clone)]
pub struct Generator {
    seed: u64,
    rng: ChaCha8Rng,
    current: BTreeMap<ChannelKind, f64>,
}

impl Generator {
    /// Start every channel at its catalogue seed value.
    pub fn new(seed: u64) -> Self {
        Self::with_start_values(seed, |_| None)
    }

    /// Start each channel at `start(kind)`, or its seed value when `None`.
    pub fn with_start_values(seed: u64, start: impl Fn(ChannelKind) -> Option<f64>) -> Self {
        let current = ChannelKind::ALL
            .into_iter()
            .map(|k| (k, start(k).unwrap_or_else(|| k.meta().seed_value)))
            .collect();
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            current,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn current(&self, kind: ChannelKind) -> f64 {
        self.current
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.meta().seed_value)
    }

    /// Advance one channel by one step and return the emitted value.
    ///
    /// `next = clamp(lerp(current, current + drift + trend, 0.5), min, max)`,
    /// rounded to two decimals.
    pub fn next_value(&mut self, kind: ChannelKind) -> f64 {
        let meta = kind.meta();
        let current = self.current(kind);

        let drift = self.rng.random_range(-DRIFT..=DRIFT);
        let trend = self.rng.random_range(meta.trend.0..=meta.trend.1);

        let next = round2(clamp(
            lerp(current, current + drift + trend, SMOOTHING),
            meta.min,
            meta.max,
        ));

        self.current.insert(kind, next);
        next
    }

    /// One tick: one reading per enabled channel, in catalogue order, all
    /// stamped with `now_ms`.
    pub fn tick(
        &mut self,
        enabled: &BTreeSet<ChannelKind>,
        resource_id: &ResourceId,
        now_ms: TimestampMs,
    ) -> Vec<Reading> {
        ChannelKind::ALL
            .into_iter()
            .filter(|k| enabled.contains(k))
            .map(|k| Reading::new(now_ms, k, resource_id.clone(), self.next_value(k)))
            .collect()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(seed: u64, ticks: i64) -> Vec<Reading> {
        let enabled: BTreeSet<_> = ChannelKind::ALL.into_iter().collect();
        let pid = ResourceId::new("P-001");
        let mut g = Generator::new(seed);
        (0..ticks)
            .flat_map(|i| g.tick(&enabled, &pid, 1_000 * i))
            .collect()
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = run(42, 50);
        let b = run(42, 50);
        assert_eq!(a.len(), 250);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_diverges() {
        assert_ne!(run(1, 20), run(2, 20));
    }

    #[test]
    fn values_stay_in_range() {
        for r in run(7, 500) {
            let m = r.channel.meta();
            assert!(r.value >= m.min && r.value <= m.max, "{r:?}");
        }
    }

    #[test]
    fn values_rounded_to_two_decimals() {
        for r in run(9, 20) {
            let scaled = r.value * 100.0;
            assert!((scaled - scaled.round()).abs() < 1e-6, "{r:?}");
        }
    }

    #[test]
    fn step_is_bounded_by_half_the_max_move() {
        let mut g = Generator::new(3);
        let mut prev = g.current(ChannelKind::Humid);
        for _ in 0..100 {
            let next = g.next_value(ChannelKind::Humid);
            // drift 1.0 + |trend| 0.4, halved, plus rounding slack.
            assert!((next - prev).abs() <= 0.7 + 0.005, "{prev} -> {next}");
            prev = next;
        }
    }

    #[test]
    fn only_enabled_channels_emit() {
        let enabled: BTreeSet<_> = [ChannelKind::Co2, ChannelKind::Temp].into_iter().collect();
        let mut g = Generator::new(5);
        let out = g.tick(&enabled, &ResourceId::new("P-003"), 99);
        let kinds: Vec<_> = out.iter().map(|r| r.channel).collect();
        assert_eq!(kinds, vec![ChannelKind::Temp, ChannelKind::Co2]);
        assert!(out.iter().all(|r| r.timestamp_ms == 99));
    }

    #[test]
    fn start_values_override_seed_values() {
        let g = Generator::with_start_values(1, |k| (k == ChannelKind::Light).then_some(1234.0));
        assert_eq!(g.current(ChannelKind::Light), 1234.0);
        assert_eq!(g.current(ChannelKind::Temp), 30.0);
    }

    #[test]
    fn out_of_range_start_is_pulled_back_into_range() {
        let mut g = Generator::with_start_values(1, |k| match k {
            ChannelKind::Temp => Some(80.0),
            ChannelKind::Co2 => Some(100.0),
            _ => None,
        });
        assert_eq!(g.next_value(ChannelKind::Temp), 50.0);
        assert_eq!(g.next_value(ChannelKind::Co2), 350.0);
    }

    #[test]
    fn clamp_and_lerp() {
        assert_eq!(clamp(999.0, 0.0, 100.0), 100.0);
        assert_eq!(clamp(-1.0, 0.0, 1.0), 0.0);
        assert_eq!(lerp(10.0, 20.0, 0.5), 15.0);
    }
}
