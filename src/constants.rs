// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Application constants.
//!
//! Hardcoded values live here; anything deployment-specific comes from
//! [`crate::config`] instead.

/// Upstream service endpoints.
pub mod endpoints {
    /// Strava REST API base.
    pub const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";

    /// Strava OAuth2 token endpoint.
    pub const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

    /// Google OAuth2 authorization page.
    pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

    /// Google OAuth2 token endpoint.
    pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

    /// Google Sheets values API base, up to but excluding the spreadsheet id.
    pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

    /// Read-only scope for the lift spreadsheet.
    pub const SHEETS_READONLY_SCOPE: &str =
        "https://www.googleapis.com/auth/spreadsheets.readonly";
}

/// Request and pagination limits.
pub mod limits {
    use std::time::Duration;

    /// Activities requested per feed page.
    pub const ACTIVITIES_PER_PAGE: u32 = 100;

    /// Safety valve: stop paginating past this many pages even if every
    /// page comes back full.
    pub const MAX_ACTIVITY_PAGES: u32 = 100;

    /// Athlete fetches allowed in flight at once.
    pub const FETCH_CONCURRENCY: usize = 4;

    /// Per-request timeout for every upstream call.
    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Unit conversions.
pub mod units {
    /// International mile.
    pub const METERS_PER_MILE: f64 = 1609.344;
}

/// Challenge-specific fixtures.
pub mod challenge {
    use chrono_tz::Tz;

    /// All day-bucket and year-boundary decisions happen on this clock,
    /// wherever the service runs.
    pub const REPORT_TIMEZONE: Tz = chrono_tz::America::New_York;

    /// Hour and minute (in [`REPORT_TIMEZONE`]) the daily leaderboard posts.
    pub const DAILY_REPORT_HOUR: u32 = 20;
    pub const DAILY_REPORT_MINUTE: u32 = 30;

    /// Credential roster file name inside the storage directory.
    pub const ROSTER_FILE_NAME: &str = "strava_users.json";

    /// Saved spreadsheet OAuth session file name inside the storage directory.
    pub const SHEETS_TOKEN_FILE_NAME: &str = "gc-token.json";

    /// Cell range holding every athlete's lift log.
    pub const SHEET_LIFT_RANGE: &str = "Sheet1!A3:N300";

    /// Date format used in the spreadsheet's date column (month/day/year,
    /// no zero padding).
    pub const SHEET_DATE_FORMAT: &str = "%m/%d/%Y";
}
