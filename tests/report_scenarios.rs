// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scenario tests chaining the classifier, the sheet parser, and the
//! report fold into rendered leaderboards.

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;

use miles_challenge::classifier::NameHeuristicClassifier;
use miles_challenge::constants::challenge::REPORT_TIMEZONE;
use miles_challenge::models::{Activity, AthleteReport};
use miles_challenge::providers::sheets::lift_sessions_from_grid;
use miles_challenge::report::{
    accumulate_activities, format_leaderboard, merge_lift_sessions, rank_reports,
};

fn ny(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
    REPORT_TIMEZONE
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
}

fn activity(name: &str, activity_type: &str, miles: f64, start: &str) -> Activity {
    Activity {
        id: 1,
        name: name.to_string(),
        activity_type: activity_type.to_string(),
        distance: miles * 1609.344,
        start_date_local: start.parse().unwrap(),
    }
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

#[test]
fn spreadsheet_rows_flow_into_the_leaderboard() {
    let now = ny(2026, 6, 15, 20, 30);

    // Ben ran this morning; Peter has logged nothing on Strava.
    let mut ben = AthleteReport::new(1, "Ben");
    accumulate_activities(
        &mut ben,
        &[activity("Morning run", "Run", 2.0, "2026-06-15T07:00:00Z")],
        &NameHeuristicClassifier,
        &now,
    );
    let peter = AthleteReport::new(2, "Peter");

    // Sheet columns: Leben at 0, Ben at 5, Peter at 10. Leben lifts too,
    // but nobody named Leben is registered here.
    let grid = vec![
        row(&[
            "6/15/2026", "30", "2", "", "", "6/15/2026", "45", "3", "", "", "", "", "",
        ]),
        row(&["", "", "", "", "", "2/1/2026", "30", "2"]),
    ];
    let sessions = lift_sessions_from_grid(&grid).unwrap();

    let mut reports = vec![ben, peter];
    merge_lift_sessions(&mut reports, &sessions, &now);
    let ranked = rank_reports(reports);
    let rendered = format_leaderboard(&ranked);

    // Ben: 2 run + 3 + 2 lift = 7 total, with today's session in the
    // day window.
    assert!(rendered.starts_with("*    1st*    Ben\n"));
    assert!(rendered.contains("    Miles Run Today:     2.00\n"));
    assert!(rendered.contains("    Miles* Lifted Today: 3.00\n"));
    assert!(rendered.contains("    Miles* Lifted this Year: 5.00\n"));
    assert!(rendered.contains("    Total Challenge Miles: *7.00*\n"));
    assert!(rendered.contains("*    2nd*    Peter\n"));
    assert!(rendered.contains("    Total Challenge Miles: *0.00*\n"));
}

#[test]
fn misnamed_runs_are_credited_as_lifts() {
    let now = ny(2026, 6, 15, 20, 30);

    let mut report = AthleteReport::new(1, "Peter");
    accumulate_activities(
        &mut report,
        &[activity("Workout", "Run", 1.5, "2026-06-15T18:00:00Z")],
        &NameHeuristicClassifier,
        &now,
    );

    let rendered = format_leaderboard(&[report]);
    assert!(rendered.contains("    Miles Run Today:     0.00\n"));
    assert!(rendered.contains("    Miles* Lifted Today: 1.50\n"));
}

#[test]
fn day_window_follows_the_challenge_clock_past_utc_midnight() {
    // 20:30 in New York is already tomorrow in UTC. The evening run
    // still belongs to today's report.
    let now = ny(2026, 6, 15, 20, 30);

    let mut report = AthleteReport::new(1, "Ben");
    accumulate_activities(
        &mut report,
        &[
            activity("Evening run", "Run", 3.0, "2026-06-15T19:00:00Z"),
            activity("Tomorrow run", "Run", 1.0, "2026-06-16T06:00:00Z"),
        ],
        &NameHeuristicClassifier,
        &now,
    );

    assert!((report.day.run_miles - 3.0).abs() < 1e-9);
    assert!((report.year_to_date.run_miles - 4.0).abs() < 1e-9);
}

#[test]
fn places_run_down_the_board_in_rank_order() {
    let mut reports = Vec::new();
    for (name, miles) in [
        ("Wanda", 12.0),
        ("Ben", 40.0),
        ("Peter", 25.0),
        ("Leben", 31.0),
        ("Sam", 5.0),
    ] {
        let mut report = AthleteReport::new(0, name);
        report.year_to_date.run_miles = miles;
        reports.push(report);
    }

    let rendered = format_leaderboard(&rank_reports(reports));

    let order = [
        "*    1st*    Ben\n",
        "*    2nd*    Leben\n",
        "*    3rd*    Peter\n",
        "*    4th*    Wanda\n",
        "*    5th*    Sam\n",
    ];
    let mut last = 0;
    for marker in order {
        let position = rendered.find(marker).unwrap_or_else(|| {
            panic!("leaderboard is missing {marker:?}:\n{rendered}");
        });
        assert!(position >= last, "{marker:?} rendered out of order");
        last = position;
    }
}
