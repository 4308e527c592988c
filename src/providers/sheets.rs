// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lift log reader backed by the group's shared Google Sheet.
//!
//! The sheet is hand-maintained: one block of four columns per athlete
//! (date, minutes, miles, spacer), rows appended as people lift. Access
//! goes through a one-time OAuth consent whose session is saved next to
//! the credential roster and refreshed on demand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SheetsSettings;
use crate::constants::challenge::{SHEET_DATE_FORMAT, SHEET_LIFT_RANGE};
use crate::constants::endpoints::{
    GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, SHEETS_API_BASE, SHEETS_READONLY_SCOPE,
};
use crate::constants::limits::HTTP_TIMEOUT;
use crate::errors::ChallengeError;
use crate::models::LiftSession;
use crate::oauth2_client::{OAuth2Client, OAuth2Config, OAuth2Token};

use super::LiftSource;

/// One athlete's column block in the sheet. Columns are zero-based:
/// date, minutes, and miles sit at `first_col`, `first_col + 1`, and
/// `first_col + 2`, with a spacer column before the next athlete.
#[derive(Debug, Clone, Copy)]
pub struct SheetAthlete {
    pub first_name: &'static str,
    pub first_col: usize,
}

/// Who owns which columns. Kept in sheet order.
pub const SHEET_ATHLETES: &[SheetAthlete] = &[
    SheetAthlete {
        first_name: "Leben",
        first_col: 0,
    },
    SheetAthlete {
        first_name: "Ben",
        first_col: 5,
    },
    SheetAthlete {
        first_name: "Peter",
        first_col: 10,
    },
];

pub struct GoogleSheetsSource {
    oauth: OAuth2Client,
    client: reqwest::Client,
    spreadsheet_id: String,
    token_path: PathBuf,
    api_base: String,
}

impl GoogleSheetsSource {
    /// Builds the source from settings, reading the OAuth client secret
    /// file (the standard `{"installed": {...}}` shape) up front.
    pub fn new(settings: &SheetsSettings, token_path: PathBuf) -> Result<Self> {
        let raw = std::fs::read_to_string(&settings.credentials_path).with_context(|| {
            format!(
                "Failed to read Google client secret at {}",
                settings.credentials_path.display()
            )
        })?;
        let secret: ClientSecretFile =
            serde_json::from_str(&raw).context("Failed to parse Google client secret file")?;

        let oauth_config = OAuth2Config {
            client_id: secret.installed.client_id,
            client_secret: secret.installed.client_secret,
            auth_url: secret.installed.auth_uri,
            token_url: secret.installed.token_uri,
            redirect_uri: settings.redirect_url.clone(),
            scopes: vec![SHEETS_READONLY_SCOPE.to_string()],
        };

        Ok(Self::for_endpoints(
            oauth_config,
            settings.spreadsheet_id.clone(),
            token_path,
            SHEETS_API_BASE.to_string(),
        ))
    }

    /// Direct constructor with every endpoint spelled out. Tests use it
    /// to aim the source at a mock server.
    pub fn for_endpoints(
        oauth_config: OAuth2Config,
        spreadsheet_id: String,
        token_path: PathBuf,
        api_base: String,
    ) -> Self {
        Self {
            oauth: OAuth2Client::new(oauth_config),
            client: reqwest::Client::new(),
            spreadsheet_id,
            token_path,
            api_base,
        }
    }

    /// Whether a consent session has ever been saved.
    pub fn has_session(&self) -> bool {
        self.token_path.exists()
    }

    /// Consent URL an operator visits once to authorize sheet access.
    pub fn authorization_url(&self) -> Result<String> {
        self.oauth
            .get_authorization_url(&Uuid::new_v4().to_string())
    }

    /// Finishes the consent flow: trades the callback code for tokens
    /// and saves them as the session.
    pub async fn complete_authorization(&self, code: &str) -> Result<(), ChallengeError> {
        let token = self.oauth.exchange_code(code).await?;
        if token.refresh_token.is_none() {
            // Google only hands the refresh token out on the first
            // consent; without one this session dies with the access
            // token.
            warn!("spreadsheet grant came back without a refresh token");
        }
        self.save_session(&token).await?;
        info!(path = %self.token_path.display(), "spreadsheet authorization saved");
        Ok(())
    }

    async fn save_session(&self, token: &OAuth2Token) -> Result<(), ChallengeError> {
        let json = serde_json::to_string_pretty(token).map_err(|e| {
            ChallengeError::StorageWriteFailed {
                source: std::io::Error::other(e),
            }
        })?;
        tokio::fs::write(&self.token_path, json)
            .await
            .map_err(|source| ChallengeError::StorageWriteFailed { source })
    }

    /// Loads the saved session, refreshing it first when it is at or
    /// near expiry. Anything unreadable counts as never authorized.
    async fn session_token(&self) -> Result<OAuth2Token, ChallengeError> {
        let raw = tokio::fs::read_to_string(&self.token_path)
            .await
            .map_err(|_| ChallengeError::NotAuthorized)?;
        let token: OAuth2Token =
            serde_json::from_str(&raw).map_err(|_| ChallengeError::NotAuthorized)?;

        if !token.is_expired() && !token.will_expire_soon() {
            return Ok(token);
        }

        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or(ChallengeError::NotAuthorized)?;
        let mut fresh = self.oauth.refresh_token(&refresh_token).await?;
        // Google leaves the refresh token out of refresh replies; carry
        // the original forward so the session survives.
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = Some(refresh_token);
        }
        self.save_session(&fresh).await?;
        Ok(fresh)
    }

    async fn fetch_value_grid(&self) -> Result<Vec<Vec<String>>, ChallengeError> {
        let token = self.session_token().await?;
        let url = format!(
            "{}/{}/values/{}",
            self.api_base, self.spreadsheet_id, SHEET_LIFT_RANGE
        );

        let response = self
            .client
            .get(url)
            .timeout(HTTP_TIMEOUT)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| ChallengeError::LiftSourceUnavailable {
                reason: e.to_string(),
                status: None,
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ChallengeError::NotAuthorized);
        }
        if !status.is_success() {
            return Err(ChallengeError::LiftSourceUnavailable {
                reason: format!("HTTP {status}"),
                status: Some(status.as_u16()),
            });
        }

        let range: ValueRange =
            response
                .json()
                .await
                .map_err(|e| ChallengeError::LiftSourceUnavailable {
                    reason: format!("invalid values payload: {e}"),
                    status: Some(status.as_u16()),
                })?;
        Ok(range.values)
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }
}

#[async_trait]
impl LiftSource for GoogleSheetsSource {
    async fn lift_sessions(&self) -> Result<HashMap<String, Vec<LiftSession>>, ChallengeError> {
        let grid = self.fetch_value_grid().await?;
        lift_sessions_from_grid(&grid)
    }
}

/// Reply shape of the Sheets values API. `values` is absent when the
/// requested range is empty.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: ClientSecretSection,
}

#[derive(Debug, Deserialize)]
struct ClientSecretSection {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// Turns the raw cell grid into per-athlete lift sessions.
///
/// A row is relevant to an athlete only if their date cell is present
/// and non-empty; short rows simply end before the right-hand athletes'
/// blocks. A date that exists but does not parse is an error, because
/// a typo'd date would otherwise silently drop a workout. Minutes and
/// miles fall back to zero when unparseable, which is also what an
/// empty cell means in the sheet.
pub fn lift_sessions_from_grid(
    values: &[Vec<String>],
) -> Result<HashMap<String, Vec<LiftSession>>, ChallengeError> {
    let mut by_athlete = HashMap::new();

    for athlete in SHEET_ATHLETES {
        let mut sessions = Vec::new();
        for row in values {
            let Some(date_cell) = row.get(athlete.first_col) else {
                continue;
            };
            if date_cell.is_empty() {
                continue;
            }
            let date = NaiveDate::parse_from_str(date_cell, SHEET_DATE_FORMAT).map_err(
                |source| ChallengeError::DateParseFailed {
                    cell: date_cell.clone(),
                    source,
                },
            )?;
            let duration_minutes = row
                .get(athlete.first_col + 1)
                .and_then(|cell| cell.parse::<i64>().ok())
                .unwrap_or(0);
            let mileage_equivalent = row
                .get(athlete.first_col + 2)
                .and_then(|cell| cell.parse::<f64>().ok())
                .unwrap_or(0.0);
            sessions.push(LiftSession {
                date,
                duration_minutes,
                mileage_equivalent,
            });
        }
        by_athlete.insert(athlete.first_name.to_string(), sessions);
    }

    Ok(by_athlete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use mockito::{Matcher, Server};
    use tempfile::TempDir;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn source_at(server_url: &str, token_path: PathBuf) -> GoogleSheetsSource {
        GoogleSheetsSource::for_endpoints(
            OAuth2Config {
                client_id: "gc-client".to_string(),
                client_secret: "shh".to_string(),
                auth_url: format!("{server_url}/o/oauth2/auth"),
                token_url: format!("{server_url}/token"),
                redirect_uri: "https://challenge.example.com/api/gc/auth-code".to_string(),
                scopes: vec![SHEETS_READONLY_SCOPE.to_string()],
            },
            "sheet-abc".to_string(),
            token_path,
            server_url.to_string(),
        )
    }

    fn fresh_token() -> OAuth2Token {
        OAuth2Token {
            access_token: "saved-access".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: Some(Utc::now() + Duration::hours(2)),
            refresh_token: Some("keep-me".to_string()),
            scope: None,
        }
    }

    fn save_token(path: &Path, token: &OAuth2Token) {
        std::fs::write(path, serde_json::to_string(token).unwrap()).unwrap();
    }

    fn read_token(path: &Path) -> OAuth2Token {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn grid_parses_each_athlete_block() {
        let values = vec![
            row(&[
                "1/5/2026", "30", "2.5", "", "", "1/5/2026", "45", "3", "", "", "1/6/2026", "60",
                "4.25", "",
            ]),
            row(&[
                "1/7/2026", "20", "1.5", "", "", "", "", "", "", "", "1/8/2026", "40", "2",
            ]),
        ];

        let by_athlete = lift_sessions_from_grid(&values).unwrap();

        let leben = &by_athlete["Leben"];
        assert_eq!(leben.len(), 2);
        assert_eq!(leben[0].date, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert_eq!(leben[0].duration_minutes, 30);
        assert!((leben[0].mileage_equivalent - 2.5).abs() < f64::EPSILON);

        let ben = &by_athlete["Ben"];
        assert_eq!(ben.len(), 1);
        assert_eq!(ben[0].duration_minutes, 45);

        let peter = &by_athlete["Peter"];
        assert_eq!(peter.len(), 2);
        assert!((peter[1].mileage_equivalent - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_rows_only_count_for_left_athletes() {
        let values = vec![row(&["2/1/2026", "25", "2"])];
        let by_athlete = lift_sessions_from_grid(&values).unwrap();
        assert_eq!(by_athlete["Leben"].len(), 1);
        assert!(by_athlete["Ben"].is_empty());
        assert!(by_athlete["Peter"].is_empty());
    }

    #[test]
    fn empty_date_cells_are_skipped() {
        let values = vec![row(&["", "30", "2.5", "", "", "3/1/2026", "45", "3"])];
        let by_athlete = lift_sessions_from_grid(&values).unwrap();
        assert!(by_athlete["Leben"].is_empty());
        assert_eq!(by_athlete["Ben"].len(), 1);
    }

    #[test]
    fn unpadded_month_and_day_parse() {
        let values = vec![row(&["1/5/2026", "30", "2"]), row(&["12/31/2026", "30", "2"])];
        let by_athlete = lift_sessions_from_grid(&values).unwrap();
        assert_eq!(by_athlete["Leben"].len(), 2);
        assert_eq!(
            by_athlete["Leben"][1].date,
            NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()
        );
    }

    #[test]
    fn garbage_dates_are_an_error_not_a_skip() {
        let values = vec![row(&["sometime in March", "30", "2"])];
        let err = lift_sessions_from_grid(&values).unwrap_err();
        match err {
            ChallengeError::DateParseFailed { cell, .. } => {
                assert_eq!(cell, "sometime in March");
            }
            other => panic!("expected DateParseFailed, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_minutes_and_miles_fall_back_to_zero() {
        let values = vec![row(&["4/2/2026", "half an hour", "a lot"])];
        let by_athlete = lift_sessions_from_grid(&values).unwrap();
        let session = &by_athlete["Leben"][0];
        assert_eq!(session.duration_minutes, 0);
        assert_eq!(session.mileage_equivalent, 0.0);
    }

    #[tokio::test]
    async fn missing_session_is_not_authorized() {
        let dir = TempDir::new().unwrap();
        let server = Server::new_async().await;
        let source = source_at(&server.url(), dir.path().join("gc-token.json"));

        assert!(!source.has_session());
        let err = source.lift_sessions().await.unwrap_err();
        assert!(matches!(err, ChallengeError::NotAuthorized));
    }

    #[tokio::test]
    async fn consent_exchange_saves_the_session() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("gc-token.json");
        let mut server = Server::new_async().await;
        let grant = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "consent-code".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "access_token": "granted-access",
                    "token_type": "Bearer",
                    "expires_in": 3599,
                    "refresh_token": "granted-refresh",
                    "scope": SHEETS_READONLY_SCOPE
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let source = source_at(&server.url(), token_path.clone());
        source.complete_authorization("consent-code").await.unwrap();

        grant.assert_async().await;
        assert!(source.has_session());
        let saved = read_token(&token_path);
        assert_eq!(saved.access_token, "granted-access");
        assert_eq!(saved.refresh_token.as_deref(), Some("granted-refresh"));
    }

    #[tokio::test]
    async fn fresh_session_reads_the_grid_without_refreshing() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("gc-token.json");
        let mut server = Server::new_async().await;
        let token_endpoint = server.mock("POST", "/token").expect(0).create_async().await;
        let values = server
            .mock("GET", format!("/sheet-abc/values/{SHEET_LIFT_RANGE}").as_str())
            .match_header("authorization", "Bearer saved-access")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "range": SHEET_LIFT_RANGE,
                    "values": [["1/5/2026", "30", "2.5"]]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let source = source_at(&server.url(), token_path.clone());
        save_token(&token_path, &fresh_token());

        let by_athlete = source.lift_sessions().await.unwrap();

        token_endpoint.assert_async().await;
        values.assert_async().await;
        assert_eq!(by_athlete["Leben"].len(), 1);
        assert!((by_athlete["Leben"][0].mileage_equivalent - 2.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn expired_session_refreshes_and_keeps_the_refresh_token() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("gc-token.json");
        let mut server = Server::new_async().await;
        // Google leaves the refresh token out of refresh replies.
        let refresh = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "keep-me".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "access_token": "fresh-access",
                    "token_type": "Bearer",
                    "expires_in": 3599
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let values = server
            .mock("GET", format!("/sheet-abc/values/{SHEET_LIFT_RANGE}").as_str())
            .match_header("authorization", "Bearer fresh-access")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"values": []}"#)
            .expect(1)
            .create_async()
            .await;

        let source = source_at(&server.url(), token_path.clone());
        let mut stale = fresh_token();
        stale.expires_at = Some(Utc::now() - Duration::minutes(1));
        save_token(&token_path, &stale);

        let by_athlete = source.lift_sessions().await.unwrap();

        refresh.assert_async().await;
        values.assert_async().await;
        assert!(by_athlete["Ben"].is_empty());

        let resaved = read_token(&token_path);
        assert_eq!(resaved.access_token, "fresh-access");
        assert_eq!(resaved.refresh_token.as_deref(), Some("keep-me"));
    }

    #[tokio::test]
    async fn revoked_grid_access_reads_as_not_authorized() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("gc-token.json");
        let mut server = Server::new_async().await;
        let values = server
            .mock("GET", format!("/sheet-abc/values/{SHEET_LIFT_RANGE}").as_str())
            .with_status(403)
            .with_body(r#"{"error": {"status": "PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        let source = source_at(&server.url(), token_path.clone());
        save_token(&token_path, &fresh_token());

        let err = source.lift_sessions().await.unwrap_err();
        values.assert_async().await;
        assert!(matches!(err, ChallengeError::NotAuthorized));
    }

    #[tokio::test]
    async fn grid_server_errors_carry_the_status() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("gc-token.json");
        let mut server = Server::new_async().await;
        let values = server
            .mock("GET", format!("/sheet-abc/values/{SHEET_LIFT_RANGE}").as_str())
            .with_status(500)
            .with_body("backend error")
            .create_async()
            .await;

        let source = source_at(&server.url(), token_path.clone());
        save_token(&token_path, &fresh_token());

        let err = source.lift_sessions().await.unwrap_err();
        values.assert_async().await;
        match err {
            ChallengeError::LiftSourceUnavailable { status, .. } => {
                assert_eq!(status, Some(500));
            }
            other => panic!("expected LiftSourceUnavailable, got {other}"),
        }
    }
}
