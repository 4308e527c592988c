// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The evening post: one report cycle a day, published to Slack at
//! 20:30 on the challenge clock.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;
use tracing::{error, info};

use crate::constants::challenge::{DAILY_REPORT_HOUR, DAILY_REPORT_MINUTE, REPORT_TIMEZONE};
use crate::engine::ReportEngine;
use crate::notifier::SlackNotifier;
use crate::report;

/// Next 20:30 on the challenge clock strictly after `now`.
pub fn next_run_after(now: &DateTime<Tz>) -> DateTime<Tz> {
    match report_time_on(now.date_naive()) {
        Some(at) if at > *now => at,
        _ => report_time_on(now.date_naive() + chrono::Duration::days(1))
            .unwrap_or_else(|| *now + chrono::Duration::days(1)),
    }
}

fn report_time_on(date: NaiveDate) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(DAILY_REPORT_HOUR, DAILY_REPORT_MINUTE, 0)?;
    REPORT_TIMEZONE.from_local_datetime(&naive).earliest()
}

/// Sleeps until the next post time, publishes, repeats. Never returns;
/// run it on its own task.
pub async fn run(engine: Arc<ReportEngine>, notifier: SlackNotifier) {
    loop {
        let now = report::report_now();
        let next = next_run_after(&now);
        info!(at = %next, "next daily report scheduled");
        let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
        tokio::time::sleep(wait).await;
        publish_daily_report(&engine, &notifier).await;
    }
}

/// One scheduled publish: run a cycle and post the rendered leaderboard.
/// Failures are logged and swallowed; tomorrow is another day.
pub async fn publish_daily_report(engine: &ReportEngine, notifier: &SlackNotifier) {
    match engine.run_cycle().await {
        Ok(cycle) => {
            let message = format!(
                "{}{}",
                report::DAILY_REPORT_HEADER,
                report::format_leaderboard(&cycle.reports)
            );
            if let Err(e) = notifier.post_message(&message).await {
                error!(error = %e, "failed to post daily report to Slack");
            }
        }
        Err(e) => error!(error = %e, "daily report cycle failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ny(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
        REPORT_TIMEZONE
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn before_post_time_schedules_same_day() {
        let next = next_run_after(&ny(2026, 6, 15, 9, 0));
        assert_eq!(next, ny(2026, 6, 15, 20, 30));
    }

    #[test]
    fn after_post_time_schedules_next_day() {
        let next = next_run_after(&ny(2026, 6, 15, 21, 0));
        assert_eq!(next, ny(2026, 6, 16, 20, 30));
    }

    #[test]
    fn exactly_post_time_schedules_next_day() {
        let next = next_run_after(&ny(2026, 6, 15, 20, 30));
        assert_eq!(next, ny(2026, 6, 16, 20, 30));
    }

    #[test]
    fn year_boundary_rolls_over() {
        let next = next_run_after(&ny(2026, 12, 31, 23, 0));
        assert_eq!(next, ny(2027, 1, 1, 20, 30));
    }

    #[test]
    fn dst_transition_days_still_post_at_wall_clock_time() {
        // Spring forward: March 8 2026, clocks jump 02:00 -> 03:00.
        let next = next_run_after(&ny(2026, 3, 8, 1, 30));
        assert_eq!(next, ny(2026, 3, 8, 20, 30));
        // Fall back: November 1 2026.
        let next = next_run_after(&ny(2026, 11, 1, 0, 30));
        assert_eq!(next, ny(2026, 11, 1, 20, 30));
    }
}
