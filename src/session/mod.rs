//! Trading-session phase computation.
//!
//! Boundaries are exchange-local wall-clock times, so DST shifts move the UTC
//! instants while the local schedule stays put:
//!
//! | phase   | local window      |
//! |---------|-------------------|
//! | `Pre`   | 04:00 – 09:30     |
//! | `Open`  | 09:30 – 16:00     |
//! | `After` | 16:00 – 20:00     |
//! | `Closed`| otherwise, and all weekend |

use crate::config::SessionConfig;
use crate::utils::fmt_countdown;
use chrono::{
    DateTime, Datelike, Duration as ChronoDuration, LocalResult, NaiveDate, NaiveDateTime,
    NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

const PRE_START: (u32, u32) = (4, 0);
const REGULAR_OPEN: (u32, u32) = (9, 30);
const REGULAR_CLOSE: (u32, u32) = (16, 0);
const AFTER_END: (u32, u32) = (20, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Pre,
    Open,
    After,
    Closed,
}

impl SessionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Pre => "Pre-market",
            SessionPhase::Open => "Market open",
            SessionPhase::After => "After hours",
            SessionPhase::Closed => "Market closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub label: &'static str,
    pub time_text: String,
    pub next_transition: DateTime<Tz>,
    pub until: ChronoDuration,
}

fn at(date: NaiveDate, (h, m): (u32, u32)) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN))
}

/// Pin a local wall-clock time to the zone. Session boundaries never fall in a
/// DST gap for US exchanges, but other zones get the earliest valid reading.
fn localize(tz: Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(early, _) => early,
        LocalResult::None => tz.from_utc_datetime(&local),
    }
}

fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn next_business_day(mut date: NaiveDate) -> NaiveDate {
    loop {
        date = date.succ_opt().unwrap_or(date);
        if is_business_day(date) {
            return date;
        }
    }
}

/// Phase, label and countdown text for `now`.
pub fn compute_status(now: DateTime<Utc>, tz: Tz) -> SessionStatus {
    let local = now.with_timezone(&tz);
    let today = local.date_naive();
    let naive = local.naive_local();

    let (phase, next_local, open_day) = if !is_business_day(today) {
        let day = next_business_day(today);
        (SessionPhase::Closed, at(day, PRE_START), day)
    } else if naive < at(today, PRE_START) {
        (SessionPhase::Closed, at(today, PRE_START), today)
    } else if naive < at(today, REGULAR_OPEN) {
        (SessionPhase::Pre, at(today, REGULAR_OPEN), today)
    } else if naive < at(today, REGULAR_CLOSE) {
        (SessionPhase::Open, at(today, REGULAR_CLOSE), today)
    } else if naive < at(today, AFTER_END) {
        (SessionPhase::After, at(today, AFTER_END), today)
    } else {
        let day = next_business_day(today);
        (SessionPhase::Closed, at(day, PRE_START), day)
    };

    let next_transition = localize(tz, next_local);
    let until = next_transition.with_timezone(&Utc) - now;
    let countdown = fmt_countdown(until);

    let time_text = match phase {
        SessionPhase::Pre => format!("Opens in {}", countdown),
        SessionPhase::Open => format!("Closes in {}", countdown),
        SessionPhase::After => format!("After hours end in {}", countdown),
        SessionPhase::Closed => {
            let open = localize(tz, at(open_day, REGULAR_OPEN));
            format!("Opens {}", open.format("%a %H:%M %Z"))
        }
    };

    SessionStatus {
        phase,
        label: phase.label(),
        time_text,
        next_transition,
        until,
    }
}

/// Polling interval appropriate for the current phase.
pub fn refresh_cadence(phase: SessionPhase, cfg: &SessionConfig) -> Duration {
    let secs = match phase {
        SessionPhase::Open => cfg.open_refresh_secs,
        SessionPhase::Pre | SessionPhase::After => cfg.extended_refresh_secs,
        SessionPhase::Closed => cfg.closed_refresh_secs,
    };
    Duration::from_secs(secs.max(1))
}

// ── Ticking clock ─────────────────────────────────────────────────────────────

/// Re-evaluates the session status on a fixed period and publishes it.
/// Dropping the clock stops the task.
pub struct SessionClock {
    rx: watch::Receiver<SessionStatus>,
    task: JoinHandle<()>,
}

impl SessionClock {
    pub fn spawn(tz: Tz, period: Duration) -> Self {
        let (tx, rx) = watch::channel(compute_status(Utc::now(), tz));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately; the initial value is already published
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let status = compute_status(Utc::now(), tz);
                debug!("Session tick: {:?} ({})", status.phase, status.time_text);
                if tx.send(status).is_err() {
                    break;
                }
            }
        });

        Self { rx, task }
    }

    pub fn current(&self) -> SessionStatus {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.rx.clone()
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn ny(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        New_York
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    // 2024-03-13 is a Wednesday
    #[test]
    fn test_weekday_boundaries() {
        let phase = |h, m| compute_status(ny(2024, 3, 13, h, m), New_York).phase;
        assert_eq!(phase(3, 59), SessionPhase::Closed);
        assert_eq!(phase(4, 0), SessionPhase::Pre);
        assert_eq!(phase(9, 29), SessionPhase::Pre);
        assert_eq!(phase(9, 30), SessionPhase::Open);
        assert_eq!(phase(15, 59), SessionPhase::Open);
        assert_eq!(phase(16, 0), SessionPhase::After);
        assert_eq!(phase(19, 59), SessionPhase::After);
        assert_eq!(phase(20, 0), SessionPhase::Closed);
    }

    #[test]
    fn test_countdowns() {
        let s = compute_status(ny(2024, 3, 13, 9, 0), New_York);
        assert_eq!(s.time_text, "Opens in 30m");
        assert_eq!(s.until, ChronoDuration::minutes(30));

        let s = compute_status(ny(2024, 3, 13, 14, 45), New_York);
        assert_eq!(s.time_text, "Closes in 1h 15m");

        let s = compute_status(ny(2024, 3, 13, 18, 0), New_York);
        assert_eq!(s.time_text, "After hours end in 2h 00m");
    }

    #[test]
    fn test_saturday_rolls_to_monday() {
        for hour in [0, 9, 12, 23] {
            let s = compute_status(ny(2024, 3, 16, hour, 0), New_York);
            assert_eq!(s.phase, SessionPhase::Closed);
            assert!(s.time_text.contains("Mon"), "{}", s.time_text);
            assert_eq!(s.next_transition.weekday(), Weekday::Mon);
            assert_eq!(s.next_transition.naive_local(), at(NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(), PRE_START));
        }
    }

    #[test]
    fn test_friday_evening_rolls_over_weekend() {
        let s = compute_status(ny(2024, 3, 15, 20, 30), New_York);
        assert_eq!(s.phase, SessionPhase::Closed);
        assert!(s.time_text.starts_with("Opens Mon 09:30"));
        assert!(s.until > ChronoDuration::hours(55));
    }

    #[test]
    fn test_early_morning_names_same_day() {
        let s = compute_status(ny(2024, 3, 13, 2, 0), New_York);
        assert_eq!(s.phase, SessionPhase::Closed);
        assert!(s.time_text.starts_with("Opens Wed"));
        assert_eq!(s.until, ChronoDuration::hours(2));
    }

    #[test]
    fn test_dst_shift_tracks_local_time() {
        // DST began Sunday 2024-03-10; 09:30 EDT is 13:30 UTC
        let open = Utc.with_ymd_and_hms(2024, 3, 11, 13, 30, 0).unwrap();
        assert_eq!(compute_status(open, New_York).phase, SessionPhase::Open);
        let before = Utc.with_ymd_and_hms(2024, 3, 11, 13, 29, 0).unwrap();
        assert_eq!(compute_status(before, New_York).phase, SessionPhase::Pre);

        // Sunday across the shift: 04:00 EDT Monday is 08:00 UTC
        let sunday = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let s = compute_status(sunday, New_York);
        assert_eq!(s.until, ChronoDuration::hours(20));
        assert!(s.time_text.contains("EDT"));
    }

    #[test]
    fn test_refresh_cadence_by_phase() {
        let cfg = SessionConfig::default();
        assert_eq!(refresh_cadence(SessionPhase::Open, &cfg), Duration::from_secs(30));
        assert_eq!(refresh_cadence(SessionPhase::After, &cfg), Duration::from_secs(120));
        assert_eq!(refresh_cadence(SessionPhase::Closed, &cfg), Duration::from_secs(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_ticks_and_stops_on_drop() {
        let clock = SessionClock::spawn(New_York, Duration::from_secs(60));
        let mut rx = clock.subscribe();
        rx.mark_unchanged();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(rx.changed().await.is_ok());

        drop(clock);
        assert!(rx.changed().await.is_err());
    }
}
