// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Upstream data sources.
//!
//! [`strava::StravaClient`] covers the primary source: OAuth2 grants
//! and the paginated activity feed. [`sheets::GoogleSheetsSource`]
//! covers the secondary source, the shared lift spreadsheet, behind the
//! [`LiftSource`] trait so tests can feed the engine canned sessions.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::ChallengeError;
use crate::models::LiftSession;

pub mod sheets;
pub mod strava;

pub use sheets::GoogleSheetsSource;
pub use strava::StravaClient;

/// Source of logged lift sessions, keyed by athlete first name.
///
/// Keys come from the source's own roster, not the credential store;
/// the join happens later, by first name, and names without a match on
/// either side are left alone.
#[async_trait]
pub trait LiftSource: Send + Sync {
    async fn lift_sessions(&self) -> Result<HashMap<String, Vec<LiftSession>>, ChallengeError>;
}
