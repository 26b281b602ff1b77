//!
//! A leaky bucket with integer capacity and continuous refill, guarding
//! sync re-entry. Refill accrues at `capacity / refill_interval`; the
//! fractional part of a refill is carried forward so the long-run rate
//! never exceeds the refill rate.

use std::time::{Duration, Instant};

/// No whole drop was available; try again after the refill interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no drops available")]
pub struct Insufficient;

#[derive(Debug, Clone)]
pub struct LeakyBucket {
    capacity: u32,
    refill_interval: Duration,
    fill_level: u32,
    last_fill: Instant,
}

impl LeakyBucket {
    pub fn new(refill_interval: Duration, capacity: u32) -> Self {
        Self::new_at(refill_interval, capacity, Instant::now())
    }

    /// A bucket that starts full at `now`.
    pub fn new_at(refill_interval: Duration, capacity: u32, now: Instant) -> Self {
        Self {
            capacity,
            refill_interval,
            fill_level: capacity,
            last_fill: now,
        }
    }

    pub fn consume(&mut self) -> Result<(), Insufficient> {
        self.consume_at(Instant::now())
    }

    /// Refill from the elapsed time, keep the fractional drop, then take
    /// one drop or fail.
    pub fn consume_at(&mut self, now: Instant) -> Result<(), Insufficient> {
        let drops = now.duration_since(self.last_fill).as_secs_f64()
            / self.refill_interval.as_secs_f64();
        let whole = drops.floor();
        self.fill_level = self.capacity.min(self.fill_level.saturating_add(whole as u32));
        self.last_fill = now - self.refill_interval.mul_f64(drops - whole);

        if self.fill_level == 0 {
            return Err(Insufficient);
        }
        self.fill_level -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn at(base: Instant, sec: u64, micros: u32) -> Instant {
        base + Duration::new(sec, micros * 1000)
    }

    #[test]
    fn test_trivial() {
        let base = Instant::now();
        let mut bucket = LeakyBucket::new_at(SECOND, 3, base);
        for _ in 0..3 {
            bucket.consume_at(base).unwrap();
        }
        assert_eq!(bucket.consume_at(base), Err(Insufficient));
    }

    #[test]
    fn test_simple_drop() {
        let base = Instant::now();
        let mut bucket = LeakyBucket::new_at(SECOND, 1, base);
        bucket.consume_at(base).unwrap();

        bucket.consume_at(at(base, 1, 0)).unwrap();
        assert_eq!(bucket.consume_at(at(base, 1, 0)), Err(Insufficient));
    }

    #[test]
    fn test_continuous() {
        let base = Instant::now();
        let mut bucket = LeakyBucket::new_at(SECOND, 1, base);
        for sec in 0..60 {
            bucket.consume_at(at(base, sec, 0)).unwrap();
            assert_eq!(bucket.consume_at(at(base, sec, 0)), Err(Insufficient));
        }
    }

    #[test]
    fn test_continuous_partial() {
        let base = Instant::now();
        let mut bucket = LeakyBucket::new_at(SECOND, 1, base);
        for sec in 0..60 {
            bucket.consume_at(at(base, sec, 123_456)).unwrap();
            assert_eq!(
                bucket.consume_at(at(base, sec, 123_456)),
                Err(Insufficient)
            );
        }
    }

    #[test]
    fn test_long_delay() {
        let base = Instant::now();
        let mut bucket = LeakyBucket::new_at(SECOND, 2, base);
        bucket.consume_at(base).unwrap();
        bucket.consume_at(base).unwrap();

        // a long idle stretch refills to capacity, never beyond
        bucket.consume_at(at(base, 59, 0)).unwrap();
        bucket.consume_at(at(base, 59, 0)).unwrap();
        assert_eq!(bucket.consume_at(at(base, 59, 0)), Err(Insufficient));
    }

    #[test]
    fn test_long_initial_delay() {
        let base = Instant::now();
        let mut bucket = LeakyBucket::new_at(SECOND, 3, base);
        for _ in 0..3 {
            bucket.consume_at(at(base, 59, 0)).unwrap();
        }
        assert_eq!(bucket.consume_at(at(base, 59, 0)), Err(Insufficient));
    }

    #[test]
    fn test_partial_drop_carries_forward() {
        let base = Instant::now();
        let mut bucket = LeakyBucket::new_at(SECOND, 1, base);
        bucket.consume_at(base).unwrap();

        assert_eq!(bucket.consume_at(at(base, 0, 200_000)), Err(Insufficient));
        assert_eq!(bucket.consume_at(at(base, 0, 999_000)), Err(Insufficient));
        bucket.consume_at(at(base, 1, 0)).unwrap();
    }
}
