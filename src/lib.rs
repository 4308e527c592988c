// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Miles Challenge
//!
//! A small service that runs a year-long mileage challenge between
//! friends. It pulls every registered athlete's activity feed from
//! Strava, folds in weight-lifting sessions logged in a shared Google
//! Sheet, ranks everyone by total miles, and posts the leaderboard to
//! Slack every evening.
//!
//! ## Features
//!
//! - **Strava registration**: athletes join once through an OAuth
//!   redirect; their refresh tokens are kept in a JSON roster on disk
//! - **Activity classification**: feed entries land in run, hike, or
//!   lift buckets by sport type and activity name
//! - **Lift log merge**: spreadsheet rows become mileage equivalents
//!   credited alongside feed miles
//! - **Daily report**: a ranked leaderboard posts to a Slack webhook at
//!   20:30 Eastern, and can be requested on demand over HTTP
//!
//! ## Architecture
//!
//! - **Providers**: Strava and Google Sheets clients
//! - **Store**: durable athlete credential roster
//! - **Engine**: per-athlete fetch, classify, and merge pipeline
//! - **Report**: day/year bucketing, ranking, and Slack formatting
//! - **Routes**: warp HTTP surface for registration and on-demand reports
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use miles_challenge::classifier::NameHeuristicClassifier;
//! use miles_challenge::config::Config;
//! use miles_challenge::engine::ReportEngine;
//! use miles_challenge::providers::{GoogleSheetsSource, StravaClient};
//! use miles_challenge::report;
//! use miles_challenge::store::JsonFileStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!
//!     let store = Arc::new(JsonFileStore::new(&config.storage_dir));
//!     let strava = StravaClient::new(&config.strava);
//!     let sheets = Arc::new(GoogleSheetsSource::new(
//!         &config.sheets,
//!         config.sheets_token_path(),
//!     )?);
//!
//!     let engine = ReportEngine::new(
//!         store,
//!         strava,
//!         sheets,
//!         Arc::new(NameHeuristicClassifier),
//!     );
//!
//!     let cycle = engine.run_cycle().await?;
//!     println!("{}", report::format_leaderboard(&cycle.reports));
//!     Ok(())
//! }
//! ```

/// Common data models for athletes, activities, and reports
pub mod models;

/// Activity-to-bucket classification rules
pub mod classifier;

/// Day and year bucketing, ranking, and leaderboard formatting
pub mod report;

/// The per-athlete fetch and aggregate pipeline
pub mod engine;

/// Strava and Google Sheets clients
pub mod providers;

/// OAuth2 client for upstream token grants
pub mod oauth2_client;

/// Durable athlete credential roster
pub mod store;

/// Configuration management
pub mod config;

/// Application constants
pub mod constants;

/// Error taxonomy for the report pipeline
pub mod errors;

/// Slack webhook delivery
pub mod notifier;

/// The daily report schedule
pub mod scheduler;

/// HTTP routes for registration, consent, and on-demand reports
pub mod routes;

/// Structured logging setup
pub mod logging;
