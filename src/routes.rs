// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! HTTP surface: OAuth callback endpoints for both upstreams, the
//! on-demand report, and a health check.
//!
//! Neither callback is a webhook anyone calls at volume. Athletes hit
//! `/api/strava/auth-code` once when they register, and an operator
//! hits `/api/gc/auth-code` once per spreadsheet consent.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use warp::Filter;

use crate::engine::ReportEngine;
use crate::providers::GoogleSheetsSource;
use crate::providers::StravaClient;
use crate::report;
use crate::store::CredentialStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReportEngine>,
    pub store: Arc<dyn CredentialStore>,
    pub strava: StravaClient,
    pub sheets: Arc<GoogleSheetsSource>,
}

/// Serves the HTTP surface until the process exits.
pub async fn serve(state: AppState, port: u16) {
    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "OPTIONS"]);

    // Strava registration callback: exchange the code, save the
    // athlete, greet them with their current standing.
    let strava_auth = warp::path("api")
        .and(warp::path("strava"))
        .and(warp::path("auth-code"))
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and_then({
            let state = state.clone();
            move |query: HashMap<String, String>| {
                let state = state.clone();
                async move {
                    match register_athlete(&state, &query).await {
                        Ok(body) => Ok(body),
                        Err(e) => {
                            let error = serde_json::json!({"error": e.to_string()});
                            Err(warp::reject::custom(ApiError(error)))
                        }
                    }
                }
            }
        });

    // Google consent callback for the lift spreadsheet.
    let gc_auth = warp::path("api")
        .and(warp::path("gc"))
        .and(warp::path("auth-code"))
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and_then({
            let state = state.clone();
            move |query: HashMap<String, String>| {
                let state = state.clone();
                async move {
                    match complete_sheets_consent(&state, &query).await {
                        Ok(body) => Ok(body),
                        Err(e) => {
                            let error = serde_json::json!({"error": e.to_string()});
                            Err(warp::reject::custom(ApiError(error)))
                        }
                    }
                }
            }
        });

    // On-demand report. Returns the rendered leaderboard as the
    // response body instead of posting it to the channel.
    let post_report = warp::path("api")
        .and(warp::path("slack"))
        .and(warp::path("post-report"))
        .and(warp::get())
        .and_then({
            let state = state.clone();
            move || {
                let state = state.clone();
                async move {
                    match state.engine.run_cycle().await {
                        Ok(cycle) => {
                            let body = format!(
                                "{}{}",
                                report::REQUESTED_REPORT_HEADER,
                                report::format_leaderboard(&cycle.reports)
                            );
                            Ok(body)
                        }
                        Err(e) => {
                            let error = serde_json::json!({"error": e.to_string()});
                            Err(warp::reject::custom(ApiError(error)))
                        }
                    }
                }
            }
        });

    // Health check endpoint
    let health = warp::path("health").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({"status": "ok", "service": "miles-challenge"}))
    });

    let routes = strava_auth
        .or(gc_auth)
        .or(post_report)
        .or(health)
        .with(cors)
        .recover(handle_rejection);

    info!("HTTP server ready on port {}", port);
    warp::serve(routes).run(([0, 0, 0, 0], port)).await;
}

async fn register_athlete(
    state: &AppState,
    query: &HashMap<String, String>,
) -> anyhow::Result<String> {
    let code = query
        .get("code")
        .ok_or_else(|| anyhow::anyhow!("Missing code in query params"))?;

    let credential = state.strava.exchange_code(code).await?;
    state.store.upsert(credential.clone()).await?;
    info!(
        athlete = %credential.first_name,
        athlete_id = credential.athlete_id,
        "registered athlete"
    );

    let mut body = format!(
        "Hello {}, thanks for registering. Your Strava data will be included in the challenge from now on\n",
        credential.first_name
    );
    match state.engine.athlete_snapshot(&credential).await {
        Ok(snapshot) => {
            let pretty = serde_json::to_string_pretty(&snapshot)
                .unwrap_or_else(|_| String::from("{}"));
            body.push_str("Current Data From Strava:\n");
            body.push_str(&pretty);
            body.push('\n');
        }
        Err(e) => {
            // Registration already stuck; the welcome just loses its
            // snapshot section.
            warn!(error = %e, "could not build registration snapshot");
        }
    }
    Ok(body)
}

async fn complete_sheets_consent(
    state: &AppState,
    query: &HashMap<String, String>,
) -> anyhow::Result<String> {
    let code = query
        .get("code")
        .ok_or_else(|| anyhow::anyhow!("Missing code in query params"))?;
    if !query.contains_key("scope") {
        anyhow::bail!("Missing scope in query params");
    }

    state.sheets.complete_authorization(code).await?;
    Ok(String::from(
        "Spreadsheet authorization complete. Lift data will appear in the next report.\n",
    ))
}

/// HTTP API error wrapper
#[derive(Debug)]
struct ApiError(serde_json::Value);

impl warp::reject::Reject for ApiError {}

/// Handle HTTP rejections and errors
async fn handle_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    if let Some(api_error) = err.find::<ApiError>() {
        let json = warp::reply::json(&api_error.0);
        Ok(warp::reply::with_status(
            json,
            warp::http::StatusCode::BAD_REQUEST,
        ))
    } else if err.is_not_found() {
        let json = warp::reply::json(&serde_json::json!({
            "error": "Not Found",
            "message": "The requested endpoint was not found"
        }));
        Ok(warp::reply::with_status(
            json,
            warp::http::StatusCode::NOT_FOUND,
        ))
    } else {
        let json = warp::reply::json(&serde_json::json!({
            "error": "Internal Server Error",
            "message": "Something went wrong"
        }));
        Ok(warp::reply::with_status(
            json,
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}
