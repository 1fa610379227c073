//! Scroll-triggered stat counters.

use std::time::Duration;

/// Frames of a counter counting up to `target`.
///
/// Each frame adds `target / speed` to the displayed value and rounds up.
/// Once the value reaches the target the final frame reads `"<target>+"`
/// and the animation ends. The value can overshoot the target by one step
/// before that final frame, exactly as the display would.
#[derive(Debug, Clone)]
pub struct CounterAnimation {
    target: u32,
    increment: f64,
    count: u32,
    tick: Duration,
    finished: bool,
}

impl CounterAnimation {
    pub fn new(target: u32, speed: u32, tick: Duration) -> Self {
        let increment = f64::from(target) / f64::from(speed.max(1));

        Self { target, increment, count: 0, tick, finished: false }
    }

    /// Delay between frames.
    pub fn tick(&self) -> Duration {
        self.tick
    }
}

impl Iterator for CounterAnimation {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }

        if self.count < self.target {
            self.count = (f64::from(self.count) + self.increment).ceil() as u32;
            return Some(self.count.to_string());
        }

        self.finished = true;
        Some(format!("{}+", self.target))
    }
}

/// Fires once, the first time an observed element is visible enough.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealTrigger {
    threshold: f32,
    fired: bool,
}

impl RevealTrigger {
    pub const STATS_THRESHOLD: f32 = 0.5;

    pub fn new(threshold: f32) -> Self {
        Self { threshold: threshold.clamp(0.0, 1.0), fired: false }
    }

    /// Reports the visible fraction of the element. Returns `true` only on
    /// the observation that first crosses the threshold.
    pub fn observe(&mut self, visible_ratio: f32) -> bool {
        let visible = visible_ratio > 0.0 && visible_ratio >= self.threshold;
        if self.fired || !visible {
            return false;
        }

        self.fired = true;
        true
    }
}

impl Default for RevealTrigger {
    fn default() -> Self {
        Self::new(Self::STATS_THRESHOLD)
    }
}
