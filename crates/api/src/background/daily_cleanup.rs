//! Daily cleanup job.
//!
//! Fires once a day at the configured wall-clock time and clears every
//! non-exempt usage record (`force = false`, so unexpired long-term
//! holds survive). The time is reconfigurable at runtime: the admin
//! settings handler pushes a new `(hour, minute)` through a watch
//! channel and the loop recomputes its next fire without restarting.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::engine::{Engine, SYSTEM_ACTOR};

/// Run the daily cleanup loop until cancelled.
pub async fn run(
    engine: Arc<Engine>,
    mut schedule: watch::Receiver<(u32, u32)>,
    cancel: CancellationToken,
) {
    loop {
        let (hour, minute) = *schedule.borrow_and_update();
        let now = Local::now().naive_local();
        let fire_at = next_fire(now, hour, minute);
        let wait = (fire_at - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        tracing::info!(%fire_at, "Daily cleanup scheduled");

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Daily cleanup job stopping");
                break;
            }
            changed = schedule.changed() => {
                if changed.is_err() {
                    // Sender gone; the process is shutting down.
                    break;
                }
                let (hour, minute) = *schedule.borrow();
                tracing::info!(hour, minute, "Daily cleanup rescheduled");
                continue;
            }
            _ = tokio::time::sleep(wait) => {
                tracing::info!("Daily cleanup firing");
                match engine.force_reclaim_all(false, SYSTEM_ACTOR).await {
                    Ok(summary) => tracing::info!(
                        released = summary.devices_released,
                        queues_cleared = summary.queues_cleared,
                        skipped = summary.skipped_long_term,
                        "Daily cleanup finished"
                    ),
                    Err(e) => tracing::error!(error = %e, "Daily cleanup failed"),
                }
            }
        }
    }
}

/// Next occurrence of `hour:minute` strictly after `now`.
fn next_fire(now: NaiveDateTime, hour: u32, minute: u32) -> NaiveDateTime {
    let target = NaiveTime::from_hms_opt(hour, minute, 0)
        // Unreachable with validated settings; fall back to the default.
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 30, 0).expect("00:30 is a valid time"));

    let today = now.date().and_time(target);
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn later_today_when_time_has_not_passed() {
        let next = next_fire(at(10, 0, 0), 23, 30);
        assert_eq!(next, at(23, 30, 0));
    }

    #[test]
    fn tomorrow_when_time_already_passed() {
        let next = next_fire(at(10, 0, 0), 0, 30);
        assert_eq!(next, at(0, 30, 0) + chrono::Duration::days(1));
    }

    #[test]
    fn tomorrow_when_exactly_at_fire_time() {
        let next = next_fire(at(0, 30, 0), 0, 30);
        assert_eq!(next, at(0, 30, 0) + chrono::Duration::days(1));
    }

    #[test]
    fn one_second_before_counts_as_today() {
        let next = next_fire(at(0, 29, 59), 0, 30);
        assert_eq!(next, at(0, 30, 0));
    }
}
