// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Activity classification rules.
//!
//! The challenge counts three buckets: running, hiking, and lifting.
//! Which bucket a feed activity lands in is a house rule of the group,
//! so the rule sits behind a trait and the engine takes any
//! implementation.

use crate::constants::units;
use crate::models::{Activity, Bucket};

/// Meters to challenge miles.
pub fn miles_of(meters: f64) -> f64 {
    meters / units::METERS_PER_MILE
}

/// Decides whether an activity counts, and toward which bucket.
pub trait ClassifyActivity: Send + Sync {
    /// Bucket and mileage credit for one activity, or `None` when the
    /// activity counts toward nothing.
    fn classify(&self, activity: &Activity) -> Option<(Bucket, f64)>;
}

/// The group's house rule.
///
/// Hikes count as hikes. A "Run" counts as a run only when the athlete
/// titled it as one; an untitled "Run" upload is how the group logs gym
/// sessions from a watch, so it counts as lifting mileage instead.
/// Every other sport type is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameHeuristicClassifier;

impl ClassifyActivity for NameHeuristicClassifier {
    fn classify(&self, activity: &Activity) -> Option<(Bucket, f64)> {
        let miles = miles_of(activity.distance);
        match activity.activity_type.as_str() {
            "Hike" => Some((Bucket::Hike, miles)),
            "Run" if activity.name.contains("run") || activity.name.contains("Run") => {
                Some((Bucket::Run, miles))
            }
            "Run" => Some((Bucket::Lift, miles)),
            _ => None,
        }
    }
}
