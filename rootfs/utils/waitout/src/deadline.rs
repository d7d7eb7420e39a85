use std::time::Duration;

use nix::time::{clock_gettime, ClockId};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A CLOCK_MONOTONIC sample, kept as the raw (sec, nsec) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant {
    sec: i64,
    nsec: i64,
}

impl MonotonicInstant {
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Time from `start` to `self`. Saturates at zero if `start` is later.
    pub fn saturating_since(self, start: Self) -> Duration {
        let mut sec = self.sec - start.sec;
        let mut nsec = self.nsec - start.nsec;

        // borrow a second when the sub-second part of "now" is behind "start"
        if nsec < 0 {
            sec -= 1;
            nsec += NANOS_PER_SEC;
        }

        if sec < 0 {
            return Duration::ZERO;
        }
        Duration::new(sec as u64, nsec as u32)
    }
}

/// Source of monotonic time. Tests swap in a fake to move time by hand.
pub trait Clock {
    fn now(&self) -> nix::Result<MonotonicInstant>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> nix::Result<MonotonicInstant> {
        (**self).now()
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> nix::Result<MonotonicInstant> {
        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
        Ok(MonotonicInstant::new(ts.tv_sec() as i64, ts.tv_nsec() as i64))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Deadline {
    Unbounded,
    Bounded {
        start: MonotonicInstant,
        timeout: Duration,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Remaining {
    Unbounded,
    Expired,
    Millis(u64),
}

impl Deadline {
    /// Negative or absent timeout = wait forever. The clock is only read for bounded waits.
    pub fn start(timeout_secs: Option<i64>, clock: &impl Clock) -> nix::Result<Self> {
        match timeout_secs {
            Some(secs) if secs >= 0 => Ok(Self::Bounded {
                start: clock.now()?,
                timeout: Duration::from_secs(secs as u64),
            }),
            _ => Ok(Self::Unbounded),
        }
    }

    pub fn remaining(&self, clock: &impl Clock) -> nix::Result<Remaining> {
        match *self {
            Self::Unbounded => Ok(Remaining::Unbounded),
            Self::Bounded { start, timeout } => {
                Ok(Self::remaining_at(start, timeout, clock.now()?))
            }
        }
    }

    // whole milliseconds, truncated: sub-millisecond leftovers count as expired
    fn remaining_at(start: MonotonicInstant, timeout: Duration, now: MonotonicInstant) -> Remaining {
        let elapsed_ms = now.saturating_since(start).as_millis();
        match timeout.as_millis().saturating_sub(elapsed_ms) {
            0 => Remaining::Expired,
            ms => Remaining::Millis(u64::try_from(ms).unwrap_or(u64::MAX)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct FakeClock {
        now: Cell<MonotonicInstant>,
        reads: Cell<usize>,
    }

    impl FakeClock {
        fn at(sec: i64, nsec: i64) -> Self {
            Self {
                now: Cell::new(MonotonicInstant::new(sec, nsec)),
                reads: Cell::new(0),
            }
        }

        fn set(&self, sec: i64, nsec: i64) {
            self.now.set(MonotonicInstant::new(sec, nsec));
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> nix::Result<MonotonicInstant> {
            self.reads.set(self.reads.get() + 1);
            Ok(self.now.get())
        }
    }

    #[test]
    fn elapsed_borrows_a_second() {
        let start = MonotonicInstant::new(10, 900_000_000);
        let now = MonotonicInstant::new(12, 100_000_000);
        assert_eq!(now.saturating_since(start), Duration::from_millis(1200));
    }

    #[test]
    fn elapsed_without_borrow() {
        let start = MonotonicInstant::new(10, 100_000_000);
        let now = MonotonicInstant::new(12, 900_000_000);
        assert_eq!(now.saturating_since(start), Duration::from_millis(2800));
    }

    #[test]
    fn elapsed_saturates_when_now_is_earlier() {
        let start = MonotonicInstant::new(12, 0);
        let now = MonotonicInstant::new(11, 999_999_999);
        assert_eq!(now.saturating_since(start), Duration::ZERO);
    }

    #[test]
    fn negative_or_missing_timeout_is_unbounded() {
        let clock = FakeClock::at(5, 0);
        assert_eq!(Deadline::start(None, &clock).unwrap(), Deadline::Unbounded);
        assert_eq!(Deadline::start(Some(-1), &clock).unwrap(), Deadline::Unbounded);
        assert_eq!(clock.reads.get(), 0);

        let remaining = Deadline::Unbounded.remaining(&clock).unwrap();
        assert_eq!(remaining, Remaining::Unbounded);
        assert_eq!(clock.reads.get(), 0);
    }

    #[test]
    fn bounded_counts_down_to_expiry() {
        let clock = FakeClock::at(10, 900_000_000);
        let deadline = Deadline::start(Some(2), &clock).unwrap();
        assert_eq!(deadline.remaining(&clock).unwrap(), Remaining::Millis(2000));

        clock.set(12, 100_000_000);
        assert_eq!(deadline.remaining(&clock).unwrap(), Remaining::Millis(800));

        clock.set(12, 899_999_999);
        assert_eq!(deadline.remaining(&clock).unwrap(), Remaining::Millis(1));

        clock.set(12, 900_000_000);
        assert_eq!(deadline.remaining(&clock).unwrap(), Remaining::Expired);

        clock.set(40, 0);
        assert_eq!(deadline.remaining(&clock).unwrap(), Remaining::Expired);
    }

    #[test]
    fn zero_timeout_expires_immediately() {
        let clock = FakeClock::at(1, 0);
        let deadline = Deadline::start(Some(0), &clock).unwrap();
        assert_eq!(deadline.remaining(&clock).unwrap(), Remaining::Expired);
    }

    #[test]
    fn real_clock_is_monotonic() {
        let a = MonotonicClock.now().unwrap();
        let b = MonotonicClock.now().unwrap();
        assert!(b >= a);
    }
}
