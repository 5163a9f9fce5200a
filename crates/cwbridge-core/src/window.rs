//! Time window resolution
//!
//! A run covers the half-open window `[start, end)`. `start` comes from the
//! checkpoint and `end` is the current time. Both are rounded down to the
//! statistics period, since CloudWatch buckets from a period boundary and
//! only returns whole periods. The end of a successful run becomes the next
//! checkpoint, so consecutive windows are contiguous and never split a
//! period between runs.

use crate::checkpoint::Checkpoint;
use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Half-open time range `[start, end)` with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, clamping `end` up to `start` if they are reversed.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Resolve the window for a run starting at `now`.
    ///
    /// The window starts at the checkpoint, capped to `max_lookback` before
    /// `now`, and both bounds are aligned down to `period_secs`. A checkpoint
    /// at or past the aligned end gives an empty window at the checkpoint so
    /// it is never moved backwards.
    pub fn resolve(
        checkpoint: &Checkpoint,
        now: DateTime<Utc>,
        max_lookback: Duration,
        period_secs: i32,
    ) -> Self {
        let end = align_down(now.trunc_subsecs(0), period_secs);
        let last = checkpoint.last_run_end;

        if last >= end {
            return Self::new(last, last);
        }

        let earliest = end
            .checked_sub_signed(max_lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(align_down(last.max(earliest), period_secs), end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `ts` falls inside `[start, end)`
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    /// The checkpoint to persist once this window has been fully emitted
    pub fn next_checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.end)
    }
}

/// Round `ts` down to a multiple of `period_secs` since the epoch
fn align_down(ts: DateTime<Utc>, period_secs: i32) -> DateTime<Utc> {
    let period = i64::from(period_secs.max(1));
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(period), 0).unwrap_or(ts)
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    const DAY: Duration = Duration::days(1);

    #[test]
    fn test_resolve_from_checkpoint() {
        let w = TimeWindow::resolve(&Checkpoint::new(ts(1_200)), ts(1_500), DAY, 60);
        assert_eq!(w.start(), ts(1_200));
        assert_eq!(w.end(), ts(1_500));
        assert_eq!(w.duration(), Duration::seconds(300));
    }

    #[test]
    fn test_resolve_caps_lookback() {
        let now = ts(10 * 86_400);
        let w = TimeWindow::resolve(&Checkpoint::new(ts(0)), now, DAY, 60);
        assert_eq!(w.start(), now - DAY);
        assert_eq!(w.end(), now);
    }

    #[test]
    fn test_resolve_truncates_subseconds() {
        let now = Utc.timestamp_opt(2_040, 750_000_000).unwrap();
        let w = TimeWindow::resolve(&Checkpoint::new(ts(1_200)), now, DAY, 1);
        assert_eq!(w.end(), ts(2_040));
    }

    #[test]
    fn test_resolve_aligns_end_to_period() {
        let now = Utc.timestamp_opt(1_530, 250_000_000).unwrap();
        let w = TimeWindow::resolve(&Checkpoint::new(ts(1_200)), now, DAY, 60);
        assert_eq!(w.end(), ts(1_500));
        assert_eq!(w.next_checkpoint(), Checkpoint::new(ts(1_500)));

        let w = TimeWindow::resolve(&Checkpoint::new(ts(0)), ts(1_000), DAY, 300);
        assert_eq!(w.end(), ts(900));
    }

    #[test]
    fn test_unaligned_checkpoint_rounds_down() {
        let w = TimeWindow::resolve(&Checkpoint::new(ts(1_230)), ts(1_500), DAY, 60);
        assert_eq!(w.start(), ts(1_200));
        assert_eq!(w.end(), ts(1_500));
    }

    #[test]
    fn test_checkpoint_inside_current_period_gives_empty_window() {
        let w = TimeWindow::resolve(&Checkpoint::new(ts(1_500)), ts(1_530), DAY, 60);
        assert!(w.is_empty());
        assert_eq!(w.next_checkpoint(), Checkpoint::new(ts(1_500)));
    }

    #[test]
    fn test_huge_lookback_does_not_overflow() {
        let w = TimeWindow::resolve(&Checkpoint::new(ts(0)), ts(1_500), Duration::MAX, 60);
        assert_eq!(w.start(), ts(0));
        assert_eq!(w.end(), ts(1_500));
    }

    #[test]
    fn test_future_checkpoint_gives_empty_window() {
        let w = TimeWindow::resolve(&Checkpoint::new(ts(5_000)), ts(4_000), DAY, 60);
        assert!(w.is_empty());
        assert_eq!(w.next_checkpoint(), Checkpoint::new(ts(5_000)));
    }

    #[test]
    fn test_half_open_contains() {
        let w = TimeWindow::new(ts(100), ts(200));
        assert!(w.contains(ts(100)));
        assert!(w.contains(ts(199)));
        assert!(!w.contains(ts(200)));
        assert!(!w.contains(ts(99)));
    }

    #[test]
    fn test_consecutive_windows_are_contiguous() {
        let first = TimeWindow::resolve(&Checkpoint::new(ts(1_200)), ts(1_350), DAY, 60);
        let second = TimeWindow::resolve(&first.next_checkpoint(), ts(1_530), DAY, 60);
        assert_eq!(first.end(), ts(1_320));
        assert_eq!(second.start(), first.end());
        assert_eq!(second.end(), ts(1_500));
    }

    #[test]
    fn test_new_clamps_reversed_bounds() {
        let w = TimeWindow::new(ts(200), ts(100));
        assert!(w.is_empty());
        assert_eq!(w.end(), ts(200));
    }
}
