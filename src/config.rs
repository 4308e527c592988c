// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration for the mileage challenge service.
//!
//! Settings come from a TOML file when one exists, otherwise from
//! environment variables (with `.env` support for local runs).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{challenge, endpoints};

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Port the HTTP surface listens on.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Directory holding the credential roster and the saved spreadsheet
    /// OAuth session. Must survive restarts.
    pub storage_dir: PathBuf,
    /// Incoming-webhook URL the leaderboard posts to.
    pub slack_webhook_url: String,
    pub strava: StravaSettings,
    pub sheets: SheetsSettings,
}

/// Strava API application credentials and endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StravaSettings {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Google Sheets access for the lift log.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    /// Path to the downloaded Google Cloud client secret file.
    pub credentials_path: PathBuf,
    /// Where the granted OAuth session is saved. Defaults to
    /// `gc-token.json` inside the storage directory.
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    /// Redirect URL registered with the Google Cloud project.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
}

fn default_http_port() -> u16 {
    8081
}

fn default_token_url() -> String {
    endpoints::STRAVA_TOKEN_URL.to_string()
}

fn default_api_base() -> String {
    endpoints::STRAVA_API_BASE.to_string()
}

fn default_redirect_url() -> String {
    "https://miles-challenge.multiplewanda.com/api/gc/auth-code".to_string()
}

impl Config {
    /// Loads configuration from `path` (or the default config location)
    /// when the file exists, falling back to environment variables.
    pub fn load(path: Option<String>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| {
            dirs::config_dir()
                .map(|p| p.join("miles-challenge/config.toml"))
                .unwrap_or_else(|| "config.toml".into())
                .to_string_lossy()
                .to_string()
        });

        if Path::new(&config_path).exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Self::from_env()
        }
    }

    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let http_port = match std::env::var("HTTP_PORT") {
            Ok(raw) => raw.parse().context("HTTP_PORT is not a valid port number")?,
            Err(_) => default_http_port(),
        };

        Ok(Config {
            http_port,
            storage_dir: PathBuf::from(require_env("NON_VOLATILE_STORAGE_DIR")?),
            slack_webhook_url: require_env("SLACK_CHANNEL_HOOK_URL")?,
            strava: StravaSettings {
                client_id: require_env("STRAVA_API_CLIENT_ID")?,
                client_secret: require_env("STRAVA_API_CLIENT_SECRET")?,
                token_url: std::env::var("STRAVA_TOKEN_ENDPOINT")
                    .unwrap_or_else(|_| default_token_url()),
                api_base: default_api_base(),
            },
            sheets: SheetsSettings {
                spreadsheet_id: require_env("GOOGLE_SHEETS_SHEET_ID")?,
                credentials_path: PathBuf::from(require_env("GOOGLE_CLOUD_CREDENTIALS_PATH")?),
                token_path: None,
                redirect_url: std::env::var("GOOGLE_AUTH_REDIRECT_URL")
                    .unwrap_or_else(|_| default_redirect_url()),
            },
        })
    }

    /// Location of the credential roster file.
    pub fn roster_path(&self) -> PathBuf {
        self.storage_dir.join(challenge::ROSTER_FILE_NAME)
    }

    /// Location of the saved spreadsheet OAuth session.
    pub fn sheets_token_path(&self) -> PathBuf {
        self.sheets
            .token_path
            .clone()
            .unwrap_or_else(|| self.storage_dir.join(challenge::SHEETS_TOKEN_FILE_NAME))
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("`{}` env variable not set", name))
}
