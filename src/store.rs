// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Credential roster persistence.
//!
//! The roster is the list of registered athletes with their OAuth2
//! tokens. The production store is a single JSON file on a volume that
//! survives restarts; an in-memory store backs tests. Both uphold the
//! same contract: upsert replaces in place by athlete id, keeps
//! first-registration order, and never leaves a half-written roster
//! behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::constants::challenge::ROSTER_FILE_NAME;
use crate::errors::ChallengeError;
use crate::models::AthleteCredential;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Every registered athlete, in first-registration order.
    async fn load(&self) -> Result<Vec<AthleteCredential>, ChallengeError>;

    /// Insert the credential, or replace the existing record with the
    /// same athlete id in place.
    async fn upsert(&self, credential: AthleteCredential) -> Result<(), ChallengeError>;
}

/// Roster stored as one JSON array in the non-volatile storage
/// directory.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles; plain loads don't take it.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            path: storage_dir.as_ref().join(ROSTER_FILE_NAME),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_roster(&self) -> Result<Vec<AthleteCredential>, ChallengeError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|_| ChallengeError::StorageUnavailable {
                path: self.path.clone(),
            })?;
        serde_json::from_str(&raw).map_err(|source| ChallengeError::CorruptData {
            path: self.path.clone(),
            source,
        })
    }

    /// Writes the roster to a sibling temp file, then renames it over
    /// the real one. Readers see either the old roster or the new one,
    /// never a truncated file.
    async fn write_roster(&self, roster: &[AthleteCredential]) -> Result<(), ChallengeError> {
        let json = serde_json::to_string_pretty(roster)
            .map_err(|e| ChallengeError::StorageWriteFailed {
                source: std::io::Error::other(e),
            })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| ChallengeError::StorageWriteFailed { source })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| ChallengeError::StorageWriteFailed { source })
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<AthleteCredential>, ChallengeError> {
        self.read_roster().await
    }

    async fn upsert(&self, credential: AthleteCredential) -> Result<(), ChallengeError> {
        let _guard = self.write_lock.lock().await;
        let mut roster = match self.read_roster().await {
            Ok(roster) => roster,
            // The first registration creates the roster file.
            Err(ChallengeError::StorageUnavailable { .. }) => Vec::new(),
            // A corrupt roster is never silently clobbered.
            Err(e) => return Err(e),
        };
        match roster
            .iter_mut()
            .find(|existing| existing.athlete_id == credential.athlete_id)
        {
            Some(slot) => *slot = credential,
            None => roster.push(credential),
        }
        self.write_roster(&roster).await
    }
}

/// Roster held in memory. Used by tests and by the integration suite to
/// simulate storage write failures.
#[derive(Default)]
pub struct MemoryStore {
    roster: RwLock<Vec<AthleteCredential>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(roster: Vec<AthleteCredential>) -> Self {
        Self {
            roster: RwLock::new(roster),
            fail_writes: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Make every subsequent upsert fail as if the disk were gone.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<Vec<AthleteCredential>, ChallengeError> {
        Ok(self.roster.read().await.clone())
    }

    async fn upsert(&self, credential: AthleteCredential) -> Result<(), ChallengeError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ChallengeError::StorageWriteFailed {
                source: std::io::Error::other("writes disabled"),
            });
        }
        let mut roster = self.roster.write().await;
        match roster
            .iter_mut()
            .find(|existing| existing.athlete_id == credential.athlete_id)
        {
            Some(slot) => *slot = credential,
            None => roster.push(credential),
        }
        Ok(())
    }
}
