// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The report cycle: refresh every athlete, persist rotated tokens,
//! fetch and classify the year's activities, merge the lift sheet, and
//! rank.
//!
//! One athlete's bad day never takes down the cycle. Refresh, persist,
//! and fetch failures drop that athlete into the skipped list with the
//! reason; only a roster that cannot be loaded at all aborts the whole
//! run. Athletes are worked concurrently under a small permit cap and
//! reported back in roster order. Cycles themselves never overlap: the
//! schedule and the on-demand route queue on one lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::classifier::ClassifyActivity;
use crate::constants::limits::FETCH_CONCURRENCY;
use crate::errors::ChallengeError;
use crate::models::{AthleteCredential, AthleteReport};
use crate::providers::{LiftSource, StravaClient};
use crate::report;
use crate::store::CredentialStore;

/// An athlete left out of a cycle, and why.
#[derive(Debug)]
pub struct SkippedAthlete {
    pub athlete_id: u64,
    pub first_name: String,
    pub reason: ChallengeError,
}

/// Outcome of one full report cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// Ranked reports, best total first.
    pub reports: Vec<AthleteReport>,
    pub skipped: Vec<SkippedAthlete>,
    /// True when the lift sheet could not be read and the totals are
    /// feed-only.
    pub lift_source_degraded: bool,
}

pub struct ReportEngine {
    store: Arc<dyn CredentialStore>,
    strava: StravaClient,
    lift_source: Arc<dyn LiftSource>,
    classifier: Arc<dyn ClassifyActivity>,
    // Cycles never interleave; a trigger that lands mid-cycle waits
    // its turn here.
    cycle_lock: Mutex<()>,
}

impl ReportEngine {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        strava: StravaClient,
        lift_source: Arc<dyn LiftSource>,
        classifier: Arc<dyn ClassifyActivity>,
    ) -> Self {
        Self {
            store,
            strava,
            lift_source,
            classifier,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Runs a cycle against the current challenge clock.
    pub async fn run_cycle(&self) -> Result<CycleReport, ChallengeError> {
        self.run_cycle_at(report::report_now()).await
    }

    /// Runs a cycle as of `now`. Split out so tests can pin the clock.
    pub async fn run_cycle_at(&self, now: DateTime<Tz>) -> Result<CycleReport, ChallengeError> {
        let _cycle = self.cycle_lock.lock().await;
        let roster = self.store.load().await?;
        info!(athletes = roster.len(), "starting report cycle");
        let after = report::challenge_year_start(&now);

        let semaphore = Arc::new(Semaphore::new(FETCH_CONCURRENCY));
        let mut tasks = JoinSet::new();
        for (index, credential) in roster.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let strava = self.strava.clone();
            let store = self.store.clone();
            let classifier = self.classifier.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("cycle semaphore is never closed");
                let outcome = athlete_cycle(
                    &strava,
                    store.as_ref(),
                    classifier.as_ref(),
                    credential,
                    &now,
                    after,
                )
                .await;
                (index, outcome)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "athlete task failed to complete"),
            }
        }
        // Tasks finish in any order; the leaderboard ties ranking to
        // roster order, so put it back.
        outcomes.sort_by_key(|(index, _)| *index);

        let mut reports = Vec::new();
        let mut skipped = Vec::new();
        for (_, outcome) in outcomes {
            match outcome {
                AthleteOutcome::Report(report) => reports.push(report),
                AthleteOutcome::Skipped(skip) => {
                    warn!(
                        athlete = %skip.first_name,
                        reason = %skip.reason,
                        "athlete skipped this cycle"
                    );
                    skipped.push(skip);
                }
            }
        }

        let lift_source_degraded = match self.lift_source.lift_sessions().await {
            Ok(sessions) => {
                report::merge_lift_sessions(&mut reports, &sessions, &now);
                false
            }
            Err(ChallengeError::NotAuthorized) => {
                warn!("lift spreadsheet not authorized; reporting feed miles only");
                true
            }
            Err(e) => {
                warn!(error = %e, "lift spreadsheet unavailable; reporting feed miles only");
                true
            }
        };

        let reports = report::rank_reports(reports);
        info!(
            ranked = reports.len(),
            skipped = skipped.len(),
            "report cycle complete"
        );
        Ok(CycleReport {
            reports,
            skipped,
            lift_source_degraded,
        })
    }

    /// Feed-only report for one athlete with known-fresh tokens. Used
    /// right after registration, where refreshing again would burn the
    /// token pair that was just issued.
    pub async fn athlete_snapshot(
        &self,
        credential: &AthleteCredential,
    ) -> Result<AthleteReport, ChallengeError> {
        let now = report::report_now();
        let after = report::challenge_year_start(&now);
        let activities = self
            .strava
            .activities_since(&credential.access_token, after)
            .await?;
        let mut snapshot = AthleteReport::new(credential.athlete_id, credential.first_name.clone());
        report::accumulate_activities(&mut snapshot, &activities, self.classifier.as_ref(), &now);
        Ok(snapshot)
    }
}

enum AthleteOutcome {
    Report(AthleteReport),
    Skipped(SkippedAthlete),
}

impl AthleteOutcome {
    fn skipped(credential: &AthleteCredential, reason: ChallengeError) -> Self {
        Self::Skipped(SkippedAthlete {
            athlete_id: credential.athlete_id,
            first_name: credential.first_name.clone(),
            reason,
        })
    }
}

/// One athlete's slice of the cycle: refresh, persist, fetch, fold.
///
/// The persist step sits between refresh and fetch on purpose. The
/// refresh burned the old refresh token, so if the rotated pair cannot
/// be written back the athlete is skipped with `TokenPersistFailed`
/// rather than reported on with tokens the roster no longer knows.
async fn athlete_cycle(
    strava: &StravaClient,
    store: &dyn CredentialStore,
    classifier: &dyn ClassifyActivity,
    credential: AthleteCredential,
    now: &DateTime<Tz>,
    after: DateTime<Utc>,
) -> AthleteOutcome {
    let fresh = match strava.refresh_credential(&credential).await {
        Ok(fresh) => fresh,
        Err(reason) => return AthleteOutcome::skipped(&credential, reason),
    };

    if let Err(source) = store.upsert(fresh.clone()).await {
        let reason = ChallengeError::TokenPersistFailed {
            athlete_id: credential.athlete_id,
            source: Box::new(source),
        };
        return AthleteOutcome::skipped(&credential, reason);
    }

    let activities = match strava.activities_since(&fresh.access_token, after).await {
        Ok(activities) => activities,
        Err(reason) => {
            if let ChallengeError::UpstreamFetchFailed { partial, page, .. } = &reason {
                warn!(
                    athlete = %credential.first_name,
                    fetched = partial.len(),
                    page,
                    "activity fetch aborted mid-pagination"
                );
            }
            return AthleteOutcome::skipped(&credential, reason);
        }
    };

    info!(
        athlete = %fresh.first_name,
        activities = activities.len(),
        "fetched activity feed"
    );

    let mut athlete_report = AthleteReport::new(fresh.athlete_id, fresh.first_name.clone());
    report::accumulate_activities(&mut athlete_report, &activities, classifier, now);
    AthleteOutcome::Report(athlete_report)
}
