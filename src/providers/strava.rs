// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Strava client: token grants and the paginated activity feed.
//!
//! Base URLs are plain fields so tests can point the client at a local
//! mock server.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;

use crate::config::StravaSettings;
use crate::constants::limits::{ACTIVITIES_PER_PAGE, HTTP_TIMEOUT, MAX_ACTIVITY_PAGES};
use crate::errors::ChallengeError;
use crate::models::{Activity, AthleteCredential};
use crate::oauth2_client::strava::{
    exchange_strava_code, expires_at_utc, refresh_strava_token, StravaTokenResponse,
};

#[derive(Clone)]
pub struct StravaClient {
    client: Client,
    api_base: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    pub fn new(settings: &StravaSettings) -> Self {
        Self {
            client: Client::new(),
            api_base: settings.api_base.clone(),
            token_url: settings.token_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        }
    }

    /// Redeems a registration code for tokens plus the athlete summary
    /// that identifies who just registered.
    pub async fn exchange_code(&self, code: &str) -> Result<AthleteCredential> {
        let response = exchange_strava_code(
            &self.client,
            &self.token_url,
            &self.client_id,
            &self.client_secret,
            code,
        )
        .await?;

        let athlete = response
            .athlete
            .as_ref()
            .context("token grant came back without an athlete summary")?;
        let first_name = athlete
            .firstname
            .clone()
            .or_else(|| athlete.username.clone())
            .unwrap_or_else(|| athlete.id.to_string());
        let athlete_id = athlete.id;

        Ok(credential_from_grant(athlete_id, first_name, &response))
    }

    /// Trades the saved refresh token for a fresh token pair.
    ///
    /// The grant burns the old refresh token, so the returned credential
    /// must reach the roster before anything else happens with it.
    pub async fn refresh_credential(
        &self,
        credential: &AthleteCredential,
    ) -> Result<AthleteCredential, ChallengeError> {
        let response = refresh_strava_token(
            &self.client,
            &self.token_url,
            &self.client_id,
            &self.client_secret,
            &credential.refresh_token,
        )
        .await?;

        Ok(credential_from_grant(
            credential.athlete_id,
            credential.first_name.clone(),
            &response,
        ))
    }

    /// Walks the activity feed from `after` to the present.
    ///
    /// Pages are requested full-size until one comes back short. A page
    /// failure aborts the walk and hands back everything fetched so far
    /// inside the error; that prefix is not a usable total.
    pub async fn activities_since(
        &self,
        access_token: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<Activity>, ChallengeError> {
        let mut activities: Vec<Activity> = Vec::new();
        let after_ts = after.timestamp().to_string();

        for page in 1..=MAX_ACTIVITY_PAGES {
            let per_page = ACTIVITIES_PER_PAGE.to_string();
            let page_number = page.to_string();
            let request = self
                .client
                .get(format!("{}/athlete/activities", self.api_base))
                .timeout(HTTP_TIMEOUT)
                .bearer_auth(access_token)
                .query(&[
                    ("after", after_ts.as_str()),
                    ("per_page", per_page.as_str()),
                    ("page", page_number.as_str()),
                ]);

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    return Err(ChallengeError::UpstreamFetchFailed {
                        page,
                        reason: e.to_string(),
                        status: None,
                        partial: activities,
                    })
                }
            };

            let status = response.status();
            if !status.is_success() {
                return Err(ChallengeError::UpstreamFetchFailed {
                    page,
                    reason: format!("HTTP {status}"),
                    status: Some(status.as_u16()),
                    partial: activities,
                });
            }

            let page_items: Vec<Activity> = match response.json().await {
                Ok(items) => items,
                Err(e) => {
                    return Err(ChallengeError::UpstreamFetchFailed {
                        page,
                        reason: format!("invalid activity payload: {e}"),
                        status: Some(status.as_u16()),
                        partial: activities,
                    })
                }
            };

            let fetched = page_items.len();
            debug!(page, fetched, "fetched activity feed page");
            activities.extend(page_items);

            if (fetched as u32) < ACTIVITIES_PER_PAGE {
                break;
            }
        }

        Ok(activities)
    }
}

fn credential_from_grant(
    athlete_id: u64,
    first_name: String,
    response: &StravaTokenResponse,
) -> AthleteCredential {
    AthleteCredential {
        athlete_id,
        first_name,
        access_token: response.access_token.clone(),
        refresh_token: response.refresh_token.clone(),
        expires_at: expires_at_utc(response),
    }
}
