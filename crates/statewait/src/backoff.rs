//! ポーリング間隔（Exponential Backoff）
//!
//! 固定間隔が指定されていなければ 100ms から始めてリフレッシュごとに倍にする。
//! 下限は `min_timeout`、上限は 10 秒。目標状態の連続観測中は間隔を伸ばさない。

use crate::spec::WaitSpec;
use std::time::Duration;

const INITIAL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    current: Duration,
    fixed: Option<Duration>,
    floor: Duration,
}

impl Backoff {
    pub(crate) fn new(spec: &WaitSpec) -> Self {
        Self {
            current: INITIAL_INTERVAL,
            fixed: spec.poll_interval(),
            floor: spec.min_timeout(),
        }
    }

    /// Interval to sleep before the next refresh.
    ///
    /// `confirming` is true while consecutive target observations are being
    /// counted.
    pub(crate) fn next_interval(&mut self, confirming: bool) -> Duration {
        if !confirming {
            self.current = self.current.saturating_mul(2);
        }

        if let Some(fixed) = self.fixed {
            return fixed;
        }

        if self.current < self.floor {
            self.current = self.floor;
        } else if self.current > MAX_INTERVAL {
            self.current = MAX_INTERVAL;
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> crate::spec::WaitSpecBuilder {
        WaitSpec::builder().pending(["pending"]).target(["available"])
    }

    #[test]
    fn test_exponential_growth_capped() {
        let mut backoff = Backoff::new(&spec().build().unwrap());

        assert_eq!(backoff.next_interval(false), Duration::from_millis(200));
        assert_eq!(backoff.next_interval(false), Duration::from_millis(400));
        assert_eq!(backoff.next_interval(false), Duration::from_millis(800));
        assert_eq!(backoff.next_interval(false), Duration::from_millis(1600));
        assert_eq!(backoff.next_interval(false), Duration::from_millis(3200));
        assert_eq!(backoff.next_interval(false), Duration::from_millis(6400));
        assert_eq!(backoff.next_interval(false), Duration::from_secs(10));
        assert_eq!(backoff.next_interval(false), Duration::from_secs(10));
    }

    #[test]
    fn test_min_timeout_floor() {
        let mut backoff = Backoff::new(&spec().min_timeout(Duration::from_secs(3)).build().unwrap());

        assert_eq!(backoff.next_interval(false), Duration::from_secs(3));
        assert_eq!(backoff.next_interval(false), Duration::from_secs(6));
        assert_eq!(backoff.next_interval(false), Duration::from_secs(10));
    }

    #[test]
    fn test_no_growth_while_confirming() {
        let mut backoff = Backoff::new(&spec().build().unwrap());

        assert_eq!(backoff.next_interval(false), Duration::from_millis(200));
        assert_eq!(backoff.next_interval(true), Duration::from_millis(200));
        assert_eq!(backoff.next_interval(true), Duration::from_millis(200));
        assert_eq!(backoff.next_interval(false), Duration::from_millis(400));
    }

    #[test]
    fn test_fixed_poll_interval() {
        let mut backoff =
            Backoff::new(&spec().poll_interval(Duration::from_secs(5)).build().unwrap());

        for _ in 0..10 {
            assert_eq!(backoff.next_interval(false), Duration::from_secs(5));
        }
    }
}
