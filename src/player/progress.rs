//! Periodic progress sampling driven by the owner's event loop.
//!
//! The sampler owns no thread. It hands out a deadline; the loop calls back
//! once the deadline passes. Each `start` bumps the generation so a tick
//! scheduled by an earlier cycle is recognized as stale and dropped.

use std::time::{Duration, Instant};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

#[derive(Debug)]
pub struct ProgressSampler {
    interval: Duration,
    generation: u64,
    next_tick: Option<(u64, Instant)>,
}

impl Default for ProgressSampler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl ProgressSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            generation: 0,
            next_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Begin a new cycle, invalidating any earlier one.
    pub fn start(&mut self, now: Instant) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.next_tick = Some((self.generation, now + self.interval));
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_tick.map(|(_, at)| at)
    }

    /// Take the pending tick if it is due, returning its generation.
    pub fn take_due(&mut self, now: Instant) -> Option<u64> {
        match self.next_tick {
            Some((generation, at)) if at <= now => {
                self.next_tick = None;
                Some(generation)
            }
            _ => None,
        }
    }

    /// Schedule the following tick of `generation`, unless it went stale.
    pub fn reschedule(&mut self, generation: u64, now: Instant) {
        if self.is_current(generation) {
            self.next_tick = Some((generation, now + self.interval));
        }
    }

    pub fn cancel(&mut self) {
        self.next_tick = None;
    }
}

/// Fraction of `duration` reached at `position`, if both are known.
pub fn sample(position: Option<Duration>, duration: Option<Duration>) -> Option<f64> {
    let duration = duration.filter(|d| !d.is_zero())?;
    let position = position?;
    Some((position.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_come_due_after_the_interval() {
        let t0 = Instant::now();
        let mut s = ProgressSampler::new(Duration::from_millis(100));
        let generation = s.start(t0);

        assert_eq!(s.take_due(t0 + Duration::from_millis(50)), None);
        assert_eq!(s.take_due(t0 + Duration::from_millis(100)), Some(generation));
        assert_eq!(s.deadline(), None);

        s.reschedule(generation, t0 + Duration::from_millis(100));
        assert_eq!(s.deadline(), Some(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn restarting_makes_older_generations_stale() {
        let t0 = Instant::now();
        let mut s = ProgressSampler::default();
        let first = s.start(t0);
        let second = s.start(t0);

        assert_ne!(first, second);
        assert!(!s.is_current(first));
        assert!(s.is_current(second));

        s.cancel();
        s.reschedule(first, t0);
        assert_eq!(s.deadline(), None);
    }

    #[test]
    fn sample_needs_a_known_duration() {
        let secs = Duration::from_secs;
        assert_eq!(sample(Some(secs(30)), Some(secs(120))), Some(0.25));
        assert_eq!(sample(Some(secs(30)), None), None);
        assert_eq!(sample(Some(secs(30)), Some(Duration::ZERO)), None);
        assert_eq!(sample(None, Some(secs(10))), None);
        assert_eq!(sample(Some(Duration::ZERO), Some(secs(10))), Some(0.0));
        assert_eq!(sample(Some(secs(11)), Some(secs(10))), Some(1.0));
    }
}
