// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error taxonomy shared across the credential store, the upstream
//! clients, and the report engine.
//!
//! Variants are grouped by the subsystem that raises them so the
//! engine can decide per athlete whether to skip or abort the cycle.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Activity;

#[derive(Debug, Error)]
pub enum ChallengeError {
    /// The credential roster does not exist or cannot be read.
    #[error("credential roster unavailable at {path}")]
    StorageUnavailable { path: PathBuf },

    /// The roster file exists but is not valid JSON for the expected shape.
    #[error("credential roster at {path} is corrupt: {source}")]
    CorruptData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A roster write (temp file or rename) failed.
    #[error("credential roster write failed: {source}")]
    StorageWriteFailed {
        #[source]
        source: std::io::Error,
    },

    /// The token endpoint answered with a non-success status.
    #[error("OAuth token grant rejected with HTTP {status}")]
    AuthRefreshFailed { status: u16 },

    /// The token endpoint could not be reached at all.
    #[error("token endpoint unreachable: {source}")]
    AuthTransportFailed {
        #[source]
        source: reqwest::Error,
    },

    /// A page of the activity feed failed. `partial` holds every activity
    /// fetched before the failing page; it is a strict prefix of the feed
    /// and must never be published as an athlete's totals.
    #[error("activity feed request failed on page {page}: {reason} ({} activities fetched before the failure)", .partial.len())]
    UpstreamFetchFailed {
        page: u32,
        reason: String,
        status: Option<u16>,
        partial: Vec<Activity>,
    },

    /// A rotated token could not be written back to the roster. The old
    /// refresh token is already burned, so the caller must not keep using
    /// the stale credential as if nothing happened.
    #[error("refreshed tokens for athlete {athlete_id} could not be persisted: {source}")]
    TokenPersistFailed {
        athlete_id: u64,
        #[source]
        source: Box<ChallengeError>,
    },

    /// No saved authorization session for the lift spreadsheet.
    #[error("no saved spreadsheet authorization; complete the Google consent flow first")]
    NotAuthorized,

    /// The lift spreadsheet read failed even though a session exists.
    #[error("lift spreadsheet read failed: {reason}")]
    LiftSourceUnavailable {
        reason: String,
        status: Option<u16>,
    },

    /// A spreadsheet date cell did not parse.
    #[error("unparseable spreadsheet date {cell:?}")]
    DateParseFailed {
        cell: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl ChallengeError {
    /// True for errors that poison a whole report cycle rather than a
    /// single athlete.
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable { .. } | Self::CorruptData { .. }
        )
    }

    /// HTTP status attached to the error, if the upstream got far enough
    /// to answer.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::AuthRefreshFailed { status } => Some(*status),
            Self::UpstreamFetchFailed { status, .. } => *status,
            Self::LiftSourceUnavailable { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_error(status: Option<u16>, fetched: usize) -> ChallengeError {
        let partial = (0..fetched)
            .map(|i| Activity {
                id: i as u64,
                name: format!("activity {i}"),
                activity_type: "Run".to_string(),
                distance: 1609.344,
                start_date_local: chrono::Utc::now(),
            })
            .collect();
        ChallengeError::UpstreamFetchFailed {
            page: 3,
            reason: "HTTP 502".to_string(),
            status,
            partial,
        }
    }

    #[test]
    fn fetch_failure_display_counts_partial_prefix() {
        let err = fetch_error(Some(502), 200);
        let message = err.to_string();
        assert!(message.contains("page 3"));
        assert!(message.contains("200 activities"));
    }

    #[test]
    fn cycle_fatal_covers_roster_errors_only() {
        let unavailable = ChallengeError::StorageUnavailable {
            path: PathBuf::from("/data/roster.json"),
        };
        assert!(unavailable.is_cycle_fatal());
        assert!(!ChallengeError::NotAuthorized.is_cycle_fatal());
        assert!(!fetch_error(None, 0).is_cycle_fatal());
    }

    #[test]
    fn upstream_status_is_surfaced() {
        assert_eq!(fetch_error(Some(500), 1).upstream_status(), Some(500));
        assert_eq!(fetch_error(None, 1).upstream_status(), None);
        assert_eq!(
            ChallengeError::AuthRefreshFailed { status: 401 }.upstream_status(),
            Some(401)
        );
    }
}
