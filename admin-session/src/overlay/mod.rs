//! Staged bulk edits over a server-authoritative list.
//!
//! The overlay holds the last fetched baseline and a map of pending toggles keyed by record id.
//! Reads go through [`EditOverlay::effective_value`]; nothing is sent until
//! [`EditOverlay::commit`], which submits the full list in one request and then replaces the
//! baseline with a fresh fetch. The baseline only ever comes from the server.
//!
//! There is no version token: two overlapping commits race at the server and the one whose
//! refetch resolves last decides the local baseline.

pub mod features;

use crate::failure::Failure;
use crate::types::TogglePatch;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

//--------------------------------------------------------------------------------------------------
// Records and sources
//--------------------------------------------------------------------------------------------------

pub trait OverlayRecord: Clone + Send + Sync {
    fn id(&self) -> &str;
    /// Name the bulk endpoint addresses the record by.
    fn key(&self) -> &str;
    fn enabled(&self) -> bool;
}

#[async_trait]
pub trait BulkSource<R: OverlayRecord>: Send + Sync {
    async fn fetch(&self) -> Result<Vec<R>, Failure>;
    async fn submit(&self, patches: &[TogglePatch]) -> Result<(), Failure>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OverlayError {
    #[error("no record with id {0} in the current list")]
    UnknownId(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Banner {
    Success(String),
    Error(String),
}

pub const SAVED_MESSAGE: &str = "Changes saved";

//--------------------------------------------------------------------------------------------------
// Overlay
//--------------------------------------------------------------------------------------------------

struct State<R> {
    baseline: Vec<R>,
    edits: BTreeMap<String, bool>,
    banner: Option<Banner>,
}

impl<R: OverlayRecord> State<R> {
    fn baseline_value(&self, id: &str) -> Option<bool> {
        self.baseline.iter().find(|r| r.id() == id).map(R::enabled)
    }

    fn effective_value(&self, id: &str) -> Option<bool> {
        self.edits
            .get(id)
            .copied()
            .or_else(|| self.baseline_value(id))
    }

    fn patch_list(&self) -> Vec<TogglePatch> {
        self.baseline
            .iter()
            .map(|record| TogglePatch {
                key: record.key().to_string(),
                enabled: self.effective_value(record.id()).unwrap_or(record.enabled()),
            })
            .collect()
    }
}

/// The lock is never held across an await.
pub struct EditOverlay<R: OverlayRecord> {
    state: Mutex<State<R>>,
}

impl<R: OverlayRecord> Default for EditOverlay<R> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<R: OverlayRecord> EditOverlay<R> {
    pub fn new(baseline: Vec<R>) -> Self {
        Self {
            state: Mutex::new(State {
                baseline,
                edits: BTreeMap::new(),
                banner: None,
            }),
        }
    }

    pub fn baseline(&self) -> Vec<R> {
        self.state.lock().baseline.clone()
    }

    /// Staged value if any, else the baseline value. `None` for ids not in the baseline.
    pub fn effective_value(&self, id: &str) -> Option<bool> {
        self.state.lock().effective_value(id)
    }

    pub fn pending(&self) -> BTreeMap<String, bool> {
        self.state.lock().edits.clone()
    }

    /// True when at least one staged value differs from the baseline.
    pub fn is_dirty(&self) -> bool {
        let state = self.state.lock();
        state
            .edits
            .iter()
            .any(|(id, value)| state.baseline_value(id) != Some(*value))
    }

    pub fn banner(&self) -> Option<Banner> {
        self.state.lock().banner.clone()
    }

    pub fn stage(&self, id: &str, enabled: bool) -> Result<(), OverlayError> {
        let mut state = self.state.lock();
        if state.baseline_value(id).is_none() {
            return Err(OverlayError::UnknownId(id.to_string()));
        }
        state.edits.insert(id.to_string(), enabled);
        state.banner = None;
        Ok(())
    }

    /// Drops every staged edit. No network access.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.edits.clear();
        state.banner = None;
    }

    /// One entry per baseline record with its effective value.
    pub fn patch_list(&self) -> Vec<TogglePatch> {
        self.state.lock().patch_list()
    }

    /// Baseline and edits change together under one lock.
    pub fn replace_baseline(&self, baseline: Vec<R>) {
        let mut state = self.state.lock();
        state.baseline = baseline;
        state.edits.clear();
    }

    //----------------------------------------------------------------------------------------------
    // Network operations
    //----------------------------------------------------------------------------------------------

    /// Loads the baseline. On failure the current state and edits are kept and an error banner
    /// is shown; retrying is up to the caller.
    pub async fn refresh<S>(&self, source: &S) -> Result<(), Failure>
    where
        S: BulkSource<R> + ?Sized,
    {
        match source.fetch().await {
            Ok(baseline) => {
                self.replace_baseline(baseline);
                Ok(())
            }
            Err(failure) => {
                warn!("Failed to load records: {}", failure);
                self.state.lock().banner = Some(Banner::Error(failure.message().to_string()));
                Err(failure)
            }
        }
    }

    /// Sends the full patch list, then refetches. Submitted edits are only dropped once the
    /// refetched baseline is in place; any failure leaves them staged. Edits staged after the
    /// request went out survive a successful commit.
    pub async fn commit<S>(&self, source: &S) -> Result<(), Failure>
    where
        S: BulkSource<R> + ?Sized,
    {
        let (patches, submitted) = {
            let state = self.state.lock();
            (state.patch_list(), state.edits.clone())
        };
        info!("Committing {} record(s)", patches.len());

        let result = match source.submit(&patches).await {
            Ok(()) => source.fetch().await,
            Err(failure) => Err(failure),
        };

        let mut state = self.state.lock();
        match result {
            Ok(baseline) => {
                state.baseline = baseline;
                // Edits staged while the request was in flight were not sent; keep them
                let State { baseline, edits, .. } = &mut *state;
                edits.retain(|id, value| {
                    submitted.get(id) != Some(&*value) && baseline.iter().any(|r| r.id() == id)
                });
                state.banner = Some(Banner::Success(SAVED_MESSAGE.to_string()));
                Ok(())
            }
            Err(failure) => {
                warn!("Commit failed: {}", failure);
                state.banner = Some(Banner::Error(failure.message().to_string()));
                Err(failure)
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
