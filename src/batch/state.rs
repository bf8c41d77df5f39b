//! Batch state container and its reducer

use crate::types::BackgroundEntry;
use crate::upload::UploadOutcome;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Identity of one batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RunId(Uuid);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-background status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResultStatus {
    Processing,
    Done { url: String },
    Error { message: String },
}

impl ResultStatus {
    #[must_use]
    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing)
    }
}

impl From<UploadOutcome> for ResultStatus {
    fn from(outcome: UploadOutcome) -> Self {
        match outcome {
            Ok(url) => Self::Done { url },
            Err(message) => Self::Error { message },
        }
    }
}

/// Outcome slot for one background of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedResult {
    pub background: BackgroundEntry,
    pub status: ResultStatus,
}

/// One source image against a frozen catalog snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRun {
    pub id: RunId,
    pub source_name: String,
    /// Catalog order
    pub results: Vec<ProcessedResult>,
}

impl BatchRun {
    #[must_use]
    pub fn result(&self, background: &str) -> Option<&ProcessedResult> {
        self.results.iter().find(|r| r.background.name() == background)
    }

    #[must_use]
    pub fn backgrounds(&self) -> Vec<BackgroundEntry> {
        self.results.iter().map(|r| r.background.clone()).collect()
    }

    #[must_use]
    pub fn settled_count(&self) -> usize {
        self.results.iter().filter(|r| !r.status.is_processing()).count()
    }
}

/// Everything that can happen to a [`BatchState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    CatalogLoaded(Vec<BackgroundEntry>),
    CatalogFailed(String),
    RunStarted {
        run_id: RunId,
        source_name: String,
    },
    ItemSettled {
        run_id: RunId,
        background: BackgroundEntry,
        outcome: UploadOutcome,
    },
}

/// Catalog, current run and error banner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchState {
    pub catalog: Vec<BackgroundEntry>,
    pub run: Option<BatchRun>,
    /// Most recent error message
    pub error: Option<String>,
}

impl BatchState {
    /// Apply `event`; returns whether anything changed
    pub fn apply(&mut self, event: BatchEvent) -> bool {
        match event {
            BatchEvent::CatalogLoaded(entries) => {
                if self.catalog == entries {
                    return false;
                }
                self.catalog = entries;
                true
            },
            BatchEvent::CatalogFailed(message) => {
                self.catalog.clear();
                self.error = Some(message);
                true
            },
            BatchEvent::RunStarted { run_id, source_name } => {
                if self.run.as_ref().is_some_and(|run| run.id == run_id) {
                    return false;
                }
                let results = self
                    .catalog
                    .iter()
                    .map(|background| ProcessedResult {
                        background: background.clone(),
                        status: ResultStatus::Processing,
                    })
                    .collect();
                self.run = Some(BatchRun {
                    id: run_id,
                    source_name,
                    results,
                });
                self.error = None;
                true
            },
            BatchEvent::ItemSettled {
                run_id,
                background,
                outcome,
            } => {
                let Some(run) = self.run.as_mut().filter(|run| run.id == run_id) else {
                    return false;
                };
                let Some(slot) = run
                    .results
                    .iter_mut()
                    .find(|r| r.background == background && r.status.is_processing())
                else {
                    return false;
                };
                if let Err(message) = &outcome {
                    self.error = Some(message.clone());
                }
                slot.status = outcome.into();
                true
            },
        }
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| run.results.iter().any(|r| r.status.is_processing()))
    }

    /// A run exists and none of its entries is still processing
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.run.is_some() && !self.is_processing()
    }

    /// Overlay shown while a selected file still has work in flight
    #[must_use]
    pub fn shows_spinner(&self) -> bool {
        match &self.run {
            Some(run) if !self.catalog.is_empty() => {
                run.results.is_empty() || self.is_processing()
            },
            _ => false,
        }
    }

    #[must_use]
    pub fn result(&self, background: &str) -> Option<&ProcessedResult> {
        self.run.as_ref().and_then(|run| run.result(background))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(names: &[&str]) -> Vec<BackgroundEntry> {
        names.iter().map(|n| BackgroundEntry::new(*n).unwrap()).collect()
    }

    fn started(names: &[&str]) -> (BatchState, RunId) {
        let mut state = BatchState::default();
        state.apply(BatchEvent::CatalogLoaded(entries(names)));
        let run_id = RunId::new();
        assert!(state.apply(BatchEvent::RunStarted {
            run_id,
            source_name: "photo.jpg".to_string(),
        }));
        (state, run_id)
    }

    fn settle(run_id: RunId, name: &str, outcome: UploadOutcome) -> BatchEvent {
        BatchEvent::ItemSettled {
            run_id,
            background: BackgroundEntry::new(name).unwrap(),
            outcome,
        }
    }

    #[test]
    fn test_run_started_creates_processing_entries() {
        let (state, _) = started(&["a.png", "b.png", "c.png"]);
        let run = state.run.as_ref().unwrap();
        assert_eq!(run.results.len(), 3);
        assert!(run.results.iter().all(|r| r.status == ResultStatus::Processing));
        assert!(state.is_processing());
        assert!(!state.is_settled());
        assert!(state.shows_spinner());
    }

    #[test]
    fn test_item_settles_exactly_once() {
        let (mut state, run_id) = started(&["a.png", "b.png"]);

        assert!(state.apply(settle(run_id, "a.png", Ok("data:one".to_string()))));
        assert!(!state.apply(settle(run_id, "a.png", Err("late".to_string()))));
        assert_eq!(
            state.result("a.png").unwrap().status,
            ResultStatus::Done {
                url: "data:one".to_string()
            }
        );
        assert_eq!(state.result("b.png").unwrap().status, ResultStatus::Processing);
        assert!(state.error.is_none());

        assert!(state.apply(settle(run_id, "b.png", Err("boom".to_string()))));
        assert!(state.is_settled());
        assert!(!state.shows_spinner());
        assert_eq!(state.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_stale_and_unknown_settlements_discarded() {
        let (mut state, old_run) = started(&["a.png"]);
        let new_run = RunId::new();
        assert!(state.apply(BatchEvent::RunStarted {
            run_id: new_run,
            source_name: "second.jpg".to_string(),
        }));

        assert!(!state.apply(settle(old_run, "a.png", Ok("data:old".to_string()))));
        assert!(!state.apply(settle(new_run, "zzz.png", Ok("data:x".to_string()))));
        assert_eq!(state.result("a.png").unwrap().status, ResultStatus::Processing);
        assert_eq!(state.run.as_ref().unwrap().source_name, "second.jpg");
    }

    #[test]
    fn test_banner_is_last_write_and_cleared_by_new_run() {
        let (mut state, run_id) = started(&["a.png", "b.png"]);
        state.apply(settle(run_id, "a.png", Err("first".to_string())));
        state.apply(settle(run_id, "b.png", Err("second".to_string())));
        assert_eq!(state.error.as_deref(), Some("second"));

        state.apply(BatchEvent::RunStarted {
            run_id: RunId::new(),
            source_name: "again.jpg".to_string(),
        });
        assert!(state.error.is_none());
    }

    #[test]
    fn test_catalog_snapshot_frozen_for_run() {
        let (mut state, _) = started(&["a.png"]);
        state.apply(BatchEvent::CatalogLoaded(entries(&["a.png", "b.png"])));
        assert_eq!(state.run.as_ref().unwrap().results.len(), 1);
    }

    #[test]
    fn test_empty_catalog_shows_no_spinner() {
        let (state, _) = started(&[]);
        assert!(state.run.as_ref().unwrap().results.is_empty());
        assert!(state.is_settled());
        assert!(!state.shows_spinner());
    }

    #[test]
    fn test_catalog_failure_sets_banner() {
        let mut state = BatchState::default();
        state.apply(BatchEvent::CatalogLoaded(entries(&["a.png"])));
        assert!(state.apply(BatchEvent::CatalogFailed("offline".to_string())));
        assert!(state.catalog.is_empty());
        assert_eq!(state.error.as_deref(), Some("offline"));
        assert!(!state.shows_spinner());
    }
}
