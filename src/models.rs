// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Data models for the mileage challenge.
//!
//! These structs are the common currency between the credential store,
//! the activity feed client, the spreadsheet reader, and the report
//! engine. Serde derives double as the roster file format and the JSON
//! snapshot returned to a freshly registered athlete.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One registered athlete's OAuth2 state, as persisted in the roster.
///
/// The upstream rotates refresh tokens on every grant, so after a
/// refresh this record is stale until the rotated copy has been written
/// back to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AthleteCredential {
    pub athlete_id: u64,
    pub first_name: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry, stored as a unix timestamp like the
    /// upstream reports it.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

/// One activity from the upstream feed, reduced to the fields the
/// challenge cares about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: u64,
    pub name: String,
    /// Upstream sport type, e.g. "Run", "Hike", "Ride".
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Distance in meters.
    #[serde(default)]
    pub distance: f64,
    /// Wall-clock start time at the athlete's location. The feed tags it
    /// with a `Z` suffix, but the offset carries no meaning; only the
    /// date fields are ever compared.
    pub start_date_local: DateTime<Utc>,
}

/// Mileage bucket an activity counts toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Run,
    Hike,
    Lift,
}

/// Per-bucket mileage and minutes for one athlete over one window.
///
/// Minutes are only populated for lifting, which is logged by duration
/// in the spreadsheet rather than tracked as a feed activity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MileageTotals {
    pub run_miles: f64,
    pub run_minutes: i64,
    pub hike_miles: f64,
    pub hike_minutes: i64,
    pub lift_miles: f64,
    pub lift_minutes: i64,
}

impl MileageTotals {
    pub fn add_miles(&mut self, bucket: Bucket, miles: f64) {
        match bucket {
            Bucket::Run => self.run_miles += miles,
            Bucket::Hike => self.hike_miles += miles,
            Bucket::Lift => self.lift_miles += miles,
        }
    }

    pub fn add_lift_session(&mut self, mileage_equivalent: f64, duration_minutes: i64) {
        self.lift_miles += mileage_equivalent;
        self.lift_minutes += duration_minutes;
    }

    /// Challenge miles: every bucket counts at face value.
    pub fn total(&self) -> f64 {
        self.run_miles + self.hike_miles + self.lift_miles
    }
}

/// One athlete's aggregated challenge standing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AthleteReport {
    pub athlete_id: u64,
    #[serde(rename = "athlete_firstname")]
    pub athlete_first_name: String,
    pub year_to_date: MileageTotals,
    pub day: MileageTotals,
}

impl AthleteReport {
    pub fn new(athlete_id: u64, athlete_first_name: impl Into<String>) -> Self {
        Self {
            athlete_id,
            athlete_first_name: athlete_first_name.into(),
            year_to_date: MileageTotals::default(),
            day: MileageTotals::default(),
        }
    }
}

/// One logged lift from the shared spreadsheet.
#[derive(Debug, Clone, PartialEq)]
pub struct LiftSession {
    pub date: NaiveDate,
    pub duration_minutes: i64,
    /// Self-reported mileage credit for the session.
    pub mileage_equivalent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_every_bucket() {
        let mut totals = MileageTotals::default();
        totals.add_miles(Bucket::Run, 3.5);
        totals.add_miles(Bucket::Hike, 1.25);
        totals.add_lift_session(2.0, 45);
        assert!((totals.total() - 6.75).abs() < f64::EPSILON);
        assert_eq!(totals.lift_minutes, 45);
        assert_eq!(totals.run_minutes, 0);
    }

    #[test]
    fn activity_deserializes_from_feed_shape() {
        let raw = r#"{
            "id": 987654,
            "name": "Morning run around the lake",
            "type": "Run",
            "distance": 8046.72,
            "start_date_local": "2026-03-14T07:12:00Z",
            "elapsed_time": 2940,
            "kudos_count": 4
        }"#;
        let activity: Activity = serde_json::from_str(raw).unwrap();
        assert_eq!(activity.activity_type, "Run");
        assert!((activity.distance - 8046.72).abs() < f64::EPSILON);
        use chrono::Datelike;
        assert_eq!(activity.start_date_local.ordinal(), 73);
    }

    #[test]
    fn credential_roundtrips_with_unix_expiry() {
        let credential = AthleteCredential {
            athlete_id: 42,
            first_name: "Ben".to_string(),
            access_token: "acc".to_string(),
            refresh_token: "ref".to_string(),
            expires_at: DateTime::from_timestamp(1_767_225_600, 0).unwrap(),
        };
        let json = serde_json::to_string(&credential).unwrap();
        assert!(json.contains("1767225600"));
        let back: AthleteCredential = serde_json::from_str(&json).unwrap();
        assert_eq!(back, credential);
    }
}
