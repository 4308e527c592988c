// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Miles Challenge Server
//!
//! Starts the challenge tracker: the daily report schedule plus the
//! HTTP surface for athlete registration and on-demand reports.

use anyhow::Result;
use clap::Parser;
use miles_challenge::{
    classifier::NameHeuristicClassifier,
    config::Config,
    engine::ReportEngine,
    errors::ChallengeError,
    logging,
    notifier::SlackNotifier,
    providers::{GoogleSheetsSource, StravaClient},
    routes::{self, AppState},
    scheduler,
    store::{CredentialStore, JsonFileStore},
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "miles-challenge")]
#[command(about = "Mileage challenge tracker with a daily Slack leaderboard")]
pub struct Args {
    /// Port to listen on (overrides the configured port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_from_env()?;

    let args = Args::parse();
    let config = Config::load(args.config)?;
    let port = args.port.unwrap_or(config.http_port);

    let store = Arc::new(JsonFileStore::new(&config.storage_dir));
    match store.load().await {
        Ok(roster) => info!("Stored athlete roster exists! {} registered athletes", roster.len()),
        Err(ChallengeError::StorageUnavailable { .. }) => {
            info!("No athlete roster found. Register athletes to create it");
        }
        Err(e) => return Err(e.into()),
    }

    let strava = StravaClient::new(&config.strava);
    let sheets = Arc::new(GoogleSheetsSource::new(
        &config.sheets,
        config.sheets_token_path(),
    )?);
    if !sheets.has_session() {
        info!(
            "No spreadsheet authorization saved. Grant read access here: {}",
            sheets.authorization_url()?
        );
    }

    let engine = Arc::new(ReportEngine::new(
        store.clone(),
        strava.clone(),
        sheets.clone(),
        Arc::new(NameHeuristicClassifier),
    ));

    let notifier = SlackNotifier::new(config.slack_webhook_url.clone());
    tokio::spawn(scheduler::run(engine.clone(), notifier));

    info!("Starting challenge server on port {}", port);
    let state = AppState {
        engine,
        store,
        strava,
        sheets,
    };
    routes::serve(state, port).await;

    Ok(())
}
