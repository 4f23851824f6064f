// src/throughput.rs - Per-hand update rate diagnostics
use std::time::Instant;

use crate::skeleton::{HandSide, PerSide};

#[derive(Debug, Clone, Copy)]
pub struct ThroughputCounter {
    pub count: u64,
    pub first_event: Instant,
}

impl ThroughputCounter {
    /// Average events per second since the first event, `None` while no time
    /// has elapsed.
    pub fn rate_at(&self, now: Instant) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.first_event).as_secs_f64();
        if elapsed > 0.0 {
            Some(self.count as f64 / elapsed)
        } else {
            None
        }
    }
}

/// Counts pose updates per hand. Purely observational.
#[derive(Debug, Default)]
pub struct ThroughputMonitor {
    counters: PerSide<Option<ThroughputCounter>>,
}

impl ThroughputMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event(&mut self, side: HandSide) -> Option<f64> {
        self.on_event_at(side, Instant::now())
    }

    /// Records one update for `side` and returns the average rate so far.
    pub fn on_event_at(&mut self, side: HandSide, now: Instant) -> Option<f64> {
        let counter = self.counters[side].get_or_insert(ThroughputCounter {
            count: 0,
            first_event: now,
        });
        counter.count += 1;
        counter.rate_at(now)
    }

    pub fn count(&self, side: HandSide) -> u64 {
        self.counters[side].map(|c| c.count).unwrap_or(0)
    }

    pub fn rate(&self, side: HandSide, now: Instant) -> Option<f64> {
        self.counters[side].and_then(|c| c.rate_at(now))
    }

    pub fn counter(&self, side: HandSide) -> Option<ThroughputCounter> {
        self.counters[side]
    }
}
