// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! OAuth2 plumbing for both upstreams.
//!
//! [`OAuth2Client`] is the generic authorization-code client used for
//! the Google Sheets session. The [`strava`] submodule speaks Strava's
//! dialect, which reports an absolute `expires_at` and attaches an
//! athlete summary to the code exchange.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::limits::HTTP_TIMEOUT;
use crate::errors::ChallengeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Token {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl OAuth2Token {
    pub fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            expires_at <= Utc::now()
        } else {
            false
        }
    }

    pub fn will_expire_soon(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            expires_at <= Utc::now() + Duration::minutes(5)
        } else {
            false
        }
    }
}

pub struct OAuth2Client {
    config: OAuth2Config,
    client: reqwest::Client,
}

impl OAuth2Client {
    pub fn new(config: OAuth2Config) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn get_authorization_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url).context("Invalid auth URL")?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            // Offline access is what makes the grant come back with a
            // refresh token.
            .append_pair("access_type", "offline")
            .append_pair("state", state);

        Ok(url.to_string())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<OAuth2Token, ChallengeError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response: TokenResponse =
            post_token_request(&self.client, &self.config.token_url, &params).await?;
        Ok(token_from_response(response))
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<OAuth2Token, ChallengeError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response: TokenResponse =
            post_token_request(&self.client, &self.config.token_url, &params).await?;
        Ok(token_from_response(response))
    }
}

/// POSTs a form-encoded grant and decodes the JSON reply. Any
/// non-success status is an auth rejection, not a decode attempt.
async fn post_token_request<T: DeserializeOwned>(
    client: &reqwest::Client,
    token_url: &str,
    params: &[(&str, &str)],
) -> Result<T, ChallengeError> {
    let response = client
        .post(token_url)
        .timeout(HTTP_TIMEOUT)
        .form(params)
        .send()
        .await
        .map_err(|source| ChallengeError::AuthTransportFailed { source })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ChallengeError::AuthRefreshFailed {
            status: status.as_u16(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|source| ChallengeError::AuthTransportFailed { source })
}

fn token_from_response(response: TokenResponse) -> OAuth2Token {
    let expires_at = response
        .expires_in
        .map(|seconds| Utc::now() + Duration::seconds(seconds as i64));

    OAuth2Token {
        access_token: response.access_token,
        token_type: response.token_type,
        expires_at,
        refresh_token: response.refresh_token,
        scope: response.scope,
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

// Strava-specific OAuth2 extensions
pub mod strava {
    use super::*;

    /// Strava's token grant reply. `expires_at` is absolute unix time;
    /// the athlete summary is only present on a code exchange, never on
    /// a refresh.
    #[derive(Debug, Deserialize)]
    pub struct StravaTokenResponse {
        pub token_type: String,
        pub expires_at: i64,
        pub expires_in: i64,
        pub refresh_token: String,
        pub access_token: String,
        pub athlete: Option<StravaAthleteSummary>,
    }

    #[derive(Debug, Deserialize)]
    pub struct StravaAthleteSummary {
        pub id: u64,
        pub username: Option<String>,
        pub firstname: Option<String>,
        pub lastname: Option<String>,
    }

    pub async fn exchange_strava_code(
        client: &reqwest::Client,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<StravaTokenResponse, ChallengeError> {
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];

        post_token_request(client, token_url, &params).await
    }

    pub async fn refresh_strava_token(
        client: &reqwest::Client,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<StravaTokenResponse, ChallengeError> {
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        post_token_request(client, token_url, &params).await
    }

    pub fn expires_at_utc(response: &StravaTokenResponse) -> DateTime<Utc> {
        DateTime::from_timestamp(response.expires_at, 0).unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OAuth2Config {
        OAuth2Config {
            client_id: "client-id".to_string(),
            client_secret: "shh".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uri: "https://challenge.example.com/api/gc/auth-code".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/spreadsheets.readonly".to_string()],
        }
    }

    #[test]
    fn authorization_url_carries_offline_access() {
        let client = OAuth2Client::new(test_config());
        let url = client.get_authorization_url("state-123").unwrap();
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("spreadsheets.readonly"));
    }

    #[test]
    fn token_expiry_is_derived_from_expires_in() {
        let token = token_from_response(TokenResponse {
            access_token: "a".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            refresh_token: None,
            scope: None,
        });
        assert!(!token.is_expired());
        let expires_at = token.expires_at.unwrap();
        assert!(expires_at > Utc::now() + Duration::minutes(55));
        assert!(expires_at <= Utc::now() + Duration::minutes(61));
    }

    #[test]
    fn token_without_expiry_never_expires() {
        let token = OAuth2Token {
            access_token: "a".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            refresh_token: None,
            scope: None,
        };
        assert!(!token.is_expired());
        assert!(!token.will_expire_soon());
    }

    #[tokio::test]
    async fn rejected_grant_maps_to_refresh_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create_async()
            .await;

        let err = post_token_request::<TokenResponse>(
            &reqwest::Client::new(),
            &format!("{}/token", server.url()),
            &[("grant_type", "refresh_token")],
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ChallengeError::AuthRefreshFailed { status: 400 }
        ));
    }
}
