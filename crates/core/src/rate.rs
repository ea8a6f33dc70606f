//! Counter differencing and rate smoothing.

use bwmon_types::EngineSettings;
use std::time::Instant;

/// How a counter that went backwards is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// The counter restarted from zero
    Ignore,
    /// The counter wrapped at 2^32
    Wrap32,
    /// The counter wrapped at 2^64
    Wrap64,
}

/// Difference between two raw counter readings.
///
/// A counter wrapping more than once between two readings is under-counted.
pub fn counter_delta(prev: u64, current: u64, overflow: Overflow) -> u64 {
    if current >= prev {
        return current - prev;
    }

    match overflow {
        Overflow::Ignore => current,
        Overflow::Wrap32 => (u32::MAX as u64)
            .wrapping_sub(prev)
            .wrapping_add(current)
            .wrapping_add(1),
        Overflow::Wrap64 => u64::MAX.wrapping_sub(prev).wrapping_add(current).wrapping_add(1),
    }
}

/// Usage in percent of `capacity` (bytes per second).
///
/// Returns `None` when the capacity is unknown.
pub fn usage(rate: f64, capacity: u64, rate_interval: f64) -> Option<f64> {
    if capacity == 0 {
        return None;
    }
    if rate == 0.0 {
        return Some(0.0);
    }
    Some(100.0 * rate * rate_interval / capacity as f64)
}

/// Accumulated counter and rate of one direction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSample {
    total: u64,
    current: u64,
    prev: u64,
    reset: u64,
    /// Total at `last_calc`
    calc_total: u64,
    rate: f64,
    last_calc: Option<Instant>,
}

impl RateSample {
    /// Total since the last reset
    pub fn total(&self) -> u64 {
        self.total.wrapping_sub(self.reset)
    }

    /// Total since the element was first seen, ignoring resets
    pub fn raw_total(&self) -> u64 {
        self.total
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn last_calc(&self) -> Option<Instant> {
        self.last_calc
    }

    pub(crate) fn set_current(&mut self, value: u64) {
        self.current = value;
    }

    pub(crate) fn reset(&mut self) {
        self.reset = self.total;
    }

    /// Fold the latest reading of a counter into the total and, once a full
    /// rate interval has passed, into the smoothed rate.
    ///
    /// The instant rate covers everything accumulated since the last rate
    /// calculation, not only the latest reading's delta.
    pub(crate) fn calc_counter(&mut self, overflow: Overflow, now: Instant, settings: &EngineSettings) {
        let prev_total = self.total;
        let delta = counter_delta(self.prev, self.current, overflow);

        self.total = self.total.wrapping_add(delta);
        self.prev = self.current;

        let elapsed = match self.last_calc {
            Some(last) if prev_total != 0 => now.saturating_duration_since(last).as_secs_f64(),
            _ => {
                self.stamp(now);
                return;
            }
        };

        if elapsed <= 0.0 || elapsed < settings.rate_interval - settings.rate_variance() {
            return;
        }

        let instant = self.total.wrapping_sub(self.calc_total) as f64 / elapsed;
        self.rate = if self.rate != 0.0 {
            (instant * 3.0 + self.rate) / 4.0
        } else {
            instant
        };
        self.stamp(now);
    }

    fn stamp(&mut self, now: Instant) {
        self.calc_total = self.total;
        self.last_calc = Some(now);
    }

    /// Rate and percent values are taken as reported
    pub(crate) fn calc_direct(&mut self, now: Instant) {
        self.prev = self.current;
        self.total = self.current;
        self.rate = self.current as f64;
        self.stamp(now);
    }
}
