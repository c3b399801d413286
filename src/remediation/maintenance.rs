//! Maintenance-window evaluation (spec §4.5, §9).
//!
//! Each window is a cron-style `schedule` plus a `duration`; the window is
//! "open" if `now` falls within `duration` after the most recent fire time
//! at or before `now`. Finding that fire time walks back at most one day
//! from `now` — schedules with sparser windows need widening this look-back
//! (documented as a known approximation, spec §9).

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::crd::monitor::MaintenanceWindow;
use crate::schedule::ScheduleCache;

const LOOKBACK: chrono::Duration = chrono::Duration::days(1);

fn resolve_timezone(window_tz: Option<&str>, monitor_tz: Option<&str>) -> Tz {
    window_tz
        .or(monitor_tz)
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(chrono_tz::UTC)
}

/// Most recent fire time of `schedule` at or before `now`, searched within
/// `LOOKBACK` of `now`. `None` if the schedule never fires in that span.
fn last_fire_before(
    schedule_cache: &ScheduleCache,
    expression: &str,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let schedule = schedule_cache.schedule(expression).ok()?;
    let lookback_start = now - LOOKBACK;
    let mut last = None;
    for fire in schedule.after(&lookback_start) {
        if fire > now {
            break;
        }
        last = Some(fire);
    }
    last
}

fn window_is_open(
    window: &MaintenanceWindow,
    monitor_tz: Option<&str>,
    now: DateTime<Utc>,
    schedule_cache: &ScheduleCache,
) -> bool {
    let tz = resolve_timezone(window.timezone.as_deref(), monitor_tz);
    let local_now = now.with_timezone(&tz);
    // The `cron` crate evaluates against whatever timezone the timestamps it
    // is given carry, so evaluate in the window's zone directly.
    let local_now_utc_repr = Utc.from_utc_datetime(&local_now.naive_local());

    let Some(fired_at) = last_fire_before(schedule_cache, &window.schedule, local_now_utc_repr)
    else {
        return false;
    };

    let duration = chrono::Duration::from_std(window.duration).unwrap_or_else(|_| chrono::Duration::zero());
    local_now_utc_repr - fired_at < duration
}

/// True if `now` falls inside any of `windows`.
pub fn in_any_window(
    windows: &[MaintenanceWindow],
    monitor_tz: Option<&str>,
    now: DateTime<Utc>,
    schedule_cache: &ScheduleCache,
) -> bool {
    windows
        .iter()
        .any(|w| window_is_open(w, monitor_tz, now, schedule_cache))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(schedule: &str, duration_secs: u64) -> MaintenanceWindow {
        MaintenanceWindow {
            name: "nightly".into(),
            schedule: schedule.into(),
            duration: std::time::Duration::from_secs(duration_secs),
            timezone: None,
        }
    }

    #[test]
    fn outside_any_window_is_not_open() {
        let cache = ScheduleCache::new();
        // Fires at the top of every hour; a 5-minute window should be closed
        // 30 minutes past the hour.
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 3, 30, 0).unwrap();
        let windows = vec![window("0 0 * * * *", 300)];
        assert!(!in_any_window(&windows, None, now, &cache));
    }

    #[test]
    fn inside_window_just_after_fire_is_open() {
        let cache = ScheduleCache::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 3, 2, 0).unwrap();
        let windows = vec![window("0 0 * * * *", 600)];
        assert!(in_any_window(&windows, None, now, &cache));
    }

    #[test]
    fn unparseable_window_schedule_is_ignored() {
        let cache = ScheduleCache::new();
        let now = Utc::now();
        let windows = vec![window("not a schedule", 600)];
        assert!(!in_any_window(&windows, None, now, &cache));
    }
}
