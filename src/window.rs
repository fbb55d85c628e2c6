//! Reverse-chronological window planner.
//!
//! Partitions a requested `[from, to)` range into half-open sub-windows a
//! fixed number of days wide, yielded newest-to-oldest. A failed run can be
//! resumed by re-invoking with `to` narrowed to the last completed window
//! boundary, because every window edge is a valid restart point.

use chrono::{DateTime, Duration, Utc};

use crate::models::TimeWindow;

/// Lazy sequence of [`TimeWindow`]s walking backward from `to` to `from`.
#[derive(Debug)]
pub struct WindowPlan {
    from: Option<DateTime<Utc>>,
    /// Effective overall upper bound, fixed at construction.
    end: Option<DateTime<Utc>>,
    /// Upper bound of the next window to yield.
    cursor: Option<DateTime<Utc>>,
    step: Duration,
    unbounded: bool,
    done: bool,
}

impl WindowPlan {
    /// Build a plan over `[from, to)` with `window_days`-sized steps.
    ///
    /// With no `from`, time filtering is disabled and the plan is a single
    /// unbounded window. With `from` but no `to`, `to` defaults to the start
    /// of the next calendar day, fixed at construction time.
    pub fn new(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        window_days: i64,
    ) -> Self {
        Self::with_now(from, to, window_days, Utc::now())
    }

    /// Like [`WindowPlan::new`] with an explicit "now" for the open-ended
    /// `to` default.
    pub fn with_now(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let step = Duration::days(window_days.max(1));
        match from {
            None => Self {
                from: None,
                end: None,
                cursor: None,
                step,
                unbounded: true,
                done: false,
            },
            Some(start) => {
                let end = to.unwrap_or_else(|| start_of_next_day(now));
                Self {
                    from: Some(start),
                    end: Some(end),
                    cursor: Some(end),
                    step,
                    unbounded: false,
                    done: false,
                }
            }
        }
    }

    /// The effective overall range this plan covers, with the open-ended
    /// `to` default already applied. Estimates must use this range so that
    /// count and scan agree on "now".
    pub fn overall(&self) -> TimeWindow {
        if self.unbounded {
            TimeWindow::unbounded()
        } else {
            TimeWindow {
                from: self.from,
                to: self.end,
            }
        }
    }
}

impl Iterator for WindowPlan {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        if self.done {
            return None;
        }
        if self.unbounded {
            self.done = true;
            return Some(TimeWindow::unbounded());
        }

        let from = self.from?;
        let to = self.cursor?;
        if to <= from {
            // Range already consumed (or empty to begin with).
            self.done = true;
            return None;
        }

        let lower = std::cmp::max(to - self.step, from);
        self.cursor = Some(lower);
        if lower == from {
            self.done = true;
        }

        Some(TimeWindow {
            from: Some(lower),
            to: Some(to),
        })
    }
}

/// Midnight at the start of the day after `now`.
fn start_of_next_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc() + Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 7, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn no_range_field_gives_single_unbounded_window() {
        let windows: Vec<_> = WindowPlan::new(None, None, 1).collect();
        assert_eq!(windows.len(), 1);
        assert!(windows[0].is_unbounded());
    }

    #[test]
    fn walks_backward_one_day_at_a_time() {
        let windows: Vec<_> = WindowPlan::new(Some(day(1)), Some(day(4)), 1).collect();
        assert_eq!(
            windows,
            vec![
                TimeWindow {
                    from: Some(day(3)),
                    to: Some(day(4))
                },
                TimeWindow {
                    from: Some(day(2)),
                    to: Some(day(3))
                },
                TimeWindow {
                    from: Some(day(1)),
                    to: Some(day(2))
                },
            ]
        );
    }

    #[test]
    fn final_window_is_clamped_to_overall_from() {
        let windows: Vec<_> = WindowPlan::new(Some(day(1)), Some(day(6)), 2).collect();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].to, Some(day(6)));
        assert_eq!(windows[0].from, Some(day(4)));
        assert_eq!(windows[1].from, Some(day(2)));
        // Shorter last window: [day 1, day 2)
        assert_eq!(windows[2].from, Some(day(1)));
        assert_eq!(windows[2].to, Some(day(2)));
    }

    #[test]
    fn empty_overall_range_yields_no_windows() {
        let windows: Vec<_> = WindowPlan::new(Some(day(5)), Some(day(5)), 1).collect();
        assert!(windows.is_empty());
    }

    #[test]
    fn open_ended_to_defaults_to_start_of_next_day() {
        let now = Utc.with_ymd_and_hms(2015, 7, 25, 13, 45, 12).unwrap();
        let mut plan = WindowPlan::with_now(Some(day(25)), None, 1, now);
        let first = plan.next().unwrap();
        assert_eq!(first.to, Some(day(26)));
        assert_eq!(first.from, Some(day(25)));
        assert!(plan.next().is_none());
    }

    #[test]
    fn windows_tile_the_range_without_gap_or_overlap() {
        let overall_from = day(2);
        let overall_to = day(31);
        let windows: Vec<_> =
            WindowPlan::new(Some(overall_from), Some(overall_to), 3).collect();

        assert_eq!(windows.first().unwrap().to, Some(overall_to));
        assert_eq!(windows.last().unwrap().from, Some(overall_from));
        for w in &windows {
            assert!(w.from.unwrap() < w.to.unwrap(), "empty window {}", w);
        }
        // Each window's lower bound is the next (older) window's upper bound.
        for pair in windows.windows(2) {
            assert_eq!(pair[0].from, pair[1].to);
        }
    }

    #[test]
    fn overall_range_applies_the_open_ended_default_once() {
        let now = Utc.with_ymd_and_hms(2015, 7, 25, 13, 45, 12).unwrap();
        let plan = WindowPlan::with_now(Some(day(20)), None, 1, now);
        let overall = plan.overall();
        assert_eq!(overall.from, Some(day(20)));
        assert_eq!(overall.to, Some(day(26)));
        assert!(WindowPlan::new(None, None, 1).overall().is_unbounded());
    }

    #[test]
    fn restartable_from_any_window_boundary() {
        let full: Vec<_> = WindowPlan::new(Some(day(1)), Some(day(9)), 2).collect();
        let resumed: Vec<_> =
            WindowPlan::new(Some(day(1)), full[0].from, 2).collect();
        assert_eq!(resumed, full[1..].to_vec());
    }
}
