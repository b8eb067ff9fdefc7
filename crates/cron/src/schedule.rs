//! Due-ness evaluation for one-shot and recurring tasks.
//!
//! Recurring tasks are evaluated by polling: each tick asks whether the
//! current wall-clock minute is a trigger minute. Missed minutes are never
//! replayed.

use std::{fmt, str::FromStr, time::Duration};

use {
    chrono::{NaiveDateTime, TimeZone, Timelike, Utc},
    cron::Schedule,
};

use crate::{
    Error, Result,
    parse::crontab_to_schedules,
    types::{ScheduledTask, TaskKind},
};

/// A validated 5-field crontab expression.
#[derive(Clone)]
pub struct CronExpr {
    expr: String,
    schedules: Vec<Schedule>,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self> {
        let normalized = expr.split_whitespace().collect::<Vec<_>>().join(" ");
        let schedules = crontab_to_schedules(&normalized)?
            .iter()
            .map(|padded| {
                Schedule::from_str(padded)
                    .map_err(|e| Error::invalid_cron(&normalized, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            expr: normalized,
            schedules,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// Whether the minute containing `at` is a trigger minute.
    ///
    /// Wall-clock times are matched field by field, so the naive value is
    /// treated as UTC purely as a carrier for the `cron` crate.
    pub fn matches_minute(&self, at: NaiveDateTime) -> bool {
        let minute = truncate_to_minute(at);
        let just_before = Utc.from_utc_datetime(&minute) - chrono::Duration::seconds(1);
        self.schedules.iter().any(|schedule| {
            schedule
                .after(&just_before)
                .next()
                .is_some_and(|next| next.naive_utc() == minute)
        })
    }

    /// First trigger minute strictly after `after`.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let after = Utc.from_utc_datetime(&after);
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(&after).next())
            .map(|dt| dt.naive_utc())
            .min()
    }
}

impl PartialEq for CronExpr {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl Eq for CronExpr {}

impl fmt::Debug for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronExpr").field(&self.expr).finish()
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

pub fn truncate_to_minute(at: NaiveDateTime) -> NaiveDateTime {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Outcome of evaluating one task against the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// Fire now.
    Fire,
    /// Not yet (one-shot) or not this minute (recurring).
    Wait,
    /// One-shot past its misfire grace window: drop without delivery.
    Expired,
}

/// Decide whether `task` should fire at `now`.
///
/// One-shot tasks whose time has already passed fire immediately unless a
/// `misfire_grace` window is configured and exceeded.
pub fn evaluate(task: &ScheduledTask, now: NaiveDateTime, misfire_grace: Option<Duration>) -> Due {
    match &task.kind {
        TaskKind::OneShot { fire_at } => {
            if now < *fire_at {
                return Due::Wait;
            }
            match misfire_grace {
                Some(grace) if (now - *fire_at).to_std().is_ok_and(|late| late > grace) => {
                    Due::Expired
                },
                _ => Due::Fire,
            }
        },
        TaskKind::Recurring { schedule } => {
            if schedule.matches_minute(now) {
                Due::Fire
            } else {
                Due::Wait
            }
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::parse::parse_run_time, rstest::rstest};

    fn at(s: &str) -> NaiveDateTime {
        parse_run_time(s).unwrap()
    }

    fn once(fire_at: &str) -> ScheduledTask {
        ScheduledTask::once("p", at(fire_at))
    }

    fn recurring(expr: &str) -> ScheduledTask {
        ScheduledTask::recurring("p", CronExpr::parse(expr).unwrap())
    }

    #[test]
    fn test_cron_normalizes_whitespace() {
        let expr = CronExpr::parse("  0   7 *  * * ").unwrap();
        assert_eq!(expr.as_str(), "0 7 * * *");
    }

    #[test]
    fn test_cron_invalid() {
        assert!(CronExpr::parse("not valid").is_err());
        assert!(CronExpr::parse("61 * * * *").is_err());
        assert!(CronExpr::parse("* 25 * * *").is_err());
    }

    #[test]
    fn test_every_minute_matches_anywhere_in_minute() {
        let expr = CronExpr::parse("* * * * *").unwrap();
        assert!(expr.matches_minute(at("05.03.2030 10:15:00")));
        assert!(expr.matches_minute(at("05.03.2030 10:15:59")));
    }

    #[test]
    fn test_daily_at_seven() {
        let expr = CronExpr::parse("0 7 * * *").unwrap();
        assert!(expr.matches_minute(at("05.03.2030 07:00:30")));
        assert!(!expr.matches_minute(at("05.03.2030 07:01:00")));
        assert!(!expr.matches_minute(at("05.03.2030 06:59:59")));
    }

    // 06.01.2030 is a Sunday.
    #[rstest]
    #[case("0 7 * * 0")]
    #[case("0 7 * * 7")]
    #[case("0 7 * * SUN")]
    fn test_sunday_spellings(#[case] expr: &str) {
        let expr = CronExpr::parse(expr).unwrap();
        assert!(expr.matches_minute(at("06.01.2030 07:00:00")));
        assert!(!expr.matches_minute(at("07.01.2030 07:00:00")));
    }

    #[test]
    fn test_weekdays_range() {
        let expr = CronExpr::parse("0 9 * * 1-5").unwrap();
        // Monday 07.01.2030 and Friday 11.01.2030.
        assert!(expr.matches_minute(at("07.01.2030 09:00:00")));
        assert!(expr.matches_minute(at("11.01.2030 09:00:00")));
        // Saturday 12.01.2030.
        assert!(!expr.matches_minute(at("12.01.2030 09:00:00")));
    }

    #[test]
    fn test_dom_or_dow() {
        // 1st of the month OR Monday.
        let expr = CronExpr::parse("0 9 1 * 1").unwrap();
        // Tuesday 01.01.2030: matches by day-of-month.
        assert!(expr.matches_minute(at("01.01.2030 09:00:00")));
        // Monday 07.01.2030: matches by weekday.
        assert!(expr.matches_minute(at("07.01.2030 09:00:00")));
        // Wednesday 09.01.2030: neither.
        assert!(!expr.matches_minute(at("09.01.2030 09:00:00")));
    }

    #[test]
    fn test_next_after() {
        let expr = CronExpr::parse("30 8 * * *").unwrap();
        let next = expr.next_after(at("05.03.2030 09:00:00")).unwrap();
        assert_eq!(next, at("06.03.2030 08:30:00"));
    }

    #[test]
    fn test_once_future_waits() {
        let task = once("01.01.2099 08:00:00");
        assert_eq!(evaluate(&task, at("31.12.2098 08:00:00"), None), Due::Wait);
    }

    #[test]
    fn test_once_exact_time_fires() {
        let task = once("01.01.2030 08:00:00");
        assert_eq!(evaluate(&task, at("01.01.2030 08:00:00"), None), Due::Fire);
    }

    #[test]
    fn test_once_late_fires_without_grace() {
        let task = once("01.01.2020 08:00:00");
        assert_eq!(evaluate(&task, at("01.01.2030 08:00:00"), None), Due::Fire);
    }

    #[test]
    fn test_once_grace_window() {
        let grace = Some(Duration::from_secs(300));
        let task = once("01.01.2030 08:00:00");
        assert_eq!(evaluate(&task, at("01.01.2030 08:01:00"), grace), Due::Fire);
        assert_eq!(evaluate(&task, at("01.01.2030 08:05:00"), grace), Due::Fire);
        assert_eq!(evaluate(&task, at("01.01.2030 08:10:00"), grace), Due::Expired);
    }

    #[test]
    fn test_recurring_ignores_grace() {
        let task = recurring("* * * * *");
        let grace = Some(Duration::from_secs(1));
        assert_eq!(evaluate(&task, at("01.01.2030 08:10:42"), grace), Due::Fire);
    }

    #[test]
    fn test_recurring_waits_off_minute() {
        let task = recurring("0 7 * * *");
        assert_eq!(evaluate(&task, at("01.01.2030 08:00:00"), None), Due::Wait);
    }
}
