// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Report windows, aggregation, ranking, and the Slack rendering.
//!
//! Everything here is pure: the engine fetches, these functions fold.
//! "Today" and "this year" are decided on the challenge clock
//! ([`crate::constants::challenge::REPORT_TIMEZONE`]), never on the
//! host's local time.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;

use crate::classifier::ClassifyActivity;
use crate::constants::challenge::REPORT_TIMEZONE;
use crate::models::{Activity, AthleteReport, LiftSession};

/// Slack header for the scheduled evening post.
pub const DAILY_REPORT_HEADER: &str = "   :man-running:  *The Daily Report!* :scroll:\n\n";

/// Header for reports requested over HTTP.
pub const REQUESTED_REPORT_HEADER: &str = "*    Requested Report!* \n\n";

/// The current instant on the challenge clock.
pub fn report_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&REPORT_TIMEZONE)
}

/// Start of the challenge year: midnight January 1st of `now`'s year,
/// on the challenge clock.
pub fn challenge_year_start(now: &DateTime<Tz>) -> DateTime<Utc> {
    REPORT_TIMEZONE
        .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
        .earliest()
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Same calendar day, compared as (year, day-of-year) so there is no
/// boundary drift between date representations.
pub fn same_year_day<A: Datelike, B: Datelike>(a: &A, b: &B) -> bool {
    a.year() == b.year() && a.ordinal() == b.ordinal()
}

/// Folds classified activities into an athlete's report. An activity
/// started today lands in both the day and year-to-date windows.
pub fn accumulate_activities(
    report: &mut AthleteReport,
    activities: &[Activity],
    classifier: &dyn ClassifyActivity,
    now: &DateTime<Tz>,
) {
    for activity in activities {
        let Some((bucket, miles)) = classifier.classify(activity) else {
            continue;
        };
        report.year_to_date.add_miles(bucket, miles);
        if same_year_day(&activity.start_date_local, now) {
            report.day.add_miles(bucket, miles);
        }
    }
}

/// Adds spreadsheet lift sessions into the matching reports, joined by
/// first name. Sheet names with no registered athlete, and athletes
/// with no sheet column, are both left untouched.
pub fn merge_lift_sessions(
    reports: &mut [AthleteReport],
    sessions_by_name: &HashMap<String, Vec<LiftSession>>,
    now: &DateTime<Tz>,
) {
    for report in reports.iter_mut() {
        let Some(sessions) = sessions_by_name.get(&report.athlete_first_name) else {
            continue;
        };
        for session in sessions {
            report
                .year_to_date
                .add_lift_session(session.mileage_equivalent, session.duration_minutes);
            if same_year_day(&session.date, now) {
                report
                    .day
                    .add_lift_session(session.mileage_equivalent, session.duration_minutes);
            }
        }
    }
}

/// Orders reports by total challenge miles, best first. The sort is
/// stable, so athletes tied on miles keep their roster order.
pub fn rank_reports(mut reports: Vec<AthleteReport>) -> Vec<AthleteReport> {
    reports.sort_by(|a, b| {
        b.year_to_date
            .total()
            .partial_cmp(&a.year_to_date.total())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    reports
}

/// 1-indexed place label. Everything past third place gets a flat
/// "th"; nobody down there has complained about "21th" yet.
pub fn place_label(position: usize) -> String {
    match position {
        1 => "1st".to_string(),
        2 => "2nd".to_string(),
        3 => "3rd".to_string(),
        other => format!("{other}th"),
    }
}

fn format_miles(miles: f64) -> String {
    format!("{miles:.2}")
}

/// Renders ranked reports in the message layout the channel knows.
pub fn format_leaderboard(reports: &[AthleteReport]) -> String {
    let mut message = String::new();
    for (index, report) in reports.iter().enumerate() {
        message.push_str(&format!(
            "*    {}*    {}\n",
            place_label(index + 1),
            report.athlete_first_name
        ));
        message.push_str(&format!(
            "    Miles Run Today:     {}\n",
            format_miles(report.day.run_miles)
        ));
        message.push_str(&format!(
            "    Miles Hiked Today:   {}\n",
            format_miles(report.day.hike_miles)
        ));
        message.push_str(&format!(
            "    Miles* Lifted Today: {}\n",
            format_miles(report.day.lift_miles)
        ));
        message.push_str("    ---   \n");
        message.push_str(&format!(
            "    Miles Run this Year:     {}\n",
            format_miles(report.year_to_date.run_miles)
        ));
        message.push_str(&format!(
            "    Miles Hiked this Year:   {}\n",
            format_miles(report.year_to_date.hike_miles)
        ));
        message.push_str(&format!(
            "    Miles* Lifted this Year: {}\n",
            format_miles(report.year_to_date.lift_miles)
        ));
        message.push_str(&format!(
            "    Total Challenge Miles: *{}*\n",
            format_miles(report.year_to_date.total())
        ));
        if index + 1 != reports.len() {
            message.push_str("    -------------------------- \n");
        }
    }
    message
}
