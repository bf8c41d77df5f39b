//! Fan-out of one source image across the whole background catalog

use super::state::{BatchEvent, BatchState, RunId};
use crate::catalog::CatalogSource;
use crate::error::Result;
use crate::types::{CatalogListing, SourceImage};
use crate::upload::UploadService;
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, Instrument};

/// Tasks of one started run
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    tasks: Vec<JoinHandle<()>>,
}

impl RunHandle {
    #[must_use]
    pub fn id(&self) -> RunId {
        self.run_id
    }

    /// Number of upload invocations launched
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every invocation to settle or be cancelled
    pub async fn join(self) {
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!(run_id = %self.run_id, error = %e, "Batch item task failed");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("Upload failed unexpectedly: {}", detail)
}

/// Drives [`BatchState`] through an [`UploadService`]
pub struct BatchOrchestrator {
    uploads: Arc<dyn UploadService>,
    state: Arc<watch::Sender<BatchState>>,
    current: Mutex<Option<CancellationToken>>,
}

impl BatchOrchestrator {
    pub fn new(uploads: Arc<dyn UploadService>) -> Self {
        let (state, _) = watch::channel(BatchState::default());
        Self {
            uploads,
            state: Arc::new(state),
            current: Mutex::new(None),
        }
    }

    /// Observe every applied transition
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BatchState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> BatchState {
        self.state.borrow().clone()
    }

    fn apply(&self, event: BatchEvent) -> bool {
        self.state.send_if_modified(|state| state.apply(event))
    }

    /// Fetch the catalog and record it
    ///
    /// # Errors
    /// The catalog failure; the banner carries the same message
    #[instrument(skip(self, source))]
    pub async fn load_catalog(&self, source: &dyn CatalogSource) -> Result<CatalogListing> {
        match source.fetch().await {
            Ok(listing) => {
                info!(count = listing.count, "Background catalog loaded");
                self.apply(BatchEvent::CatalogLoaded(listing.backgrounds.clone()));
                Ok(listing)
            },
            Err(e) => {
                error!(error = %e, "Error fetching backgrounds");
                self.apply(BatchEvent::CatalogFailed(e.to_string()));
                Err(e)
            },
        }
    }

    /// Start a run for `image`, superseding any run still in flight
    pub fn start(&self, image: SourceImage) -> RunHandle {
        let run_id = RunId::new();
        let token = CancellationToken::new();
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let mut backgrounds = Vec::new();
        self.state.send_if_modified(|state| {
            let changed = state.apply(BatchEvent::RunStarted {
                run_id,
                source_name: image.file_name().to_string(),
            });
            if let Some(run) = &state.run {
                backgrounds = run.backgrounds();
            }
            changed
        });
        info!(%run_id, file = %image.file_name(), backgrounds = backgrounds.len(), "Batch run started");

        let image = Arc::new(image);
        let tasks = backgrounds
            .into_iter()
            .map(|background| {
                let uploads = Arc::clone(&self.uploads);
                let state = Arc::clone(&self.state);
                let image = Arc::clone(&image);
                let token = token.clone();
                let span = info_span!("batch_item", %run_id, background = %background);

                tokio::spawn(
                    async move {
                        let outcome = tokio::select! {
                            () = token.cancelled() => {
                                debug!("Run superseded; dropping upload");
                                return;
                            }
                            outcome = AssertUnwindSafe(uploads.upload(&image, &background)).catch_unwind() => {
                                outcome.unwrap_or_else(|panic| Err(panic_message(panic.as_ref())))
                            }
                        };

                        match &outcome {
                            Ok(_) => info!("Background processed"),
                            Err(message) => error!(error = %message, "Background failed"),
                        }
                        let applied = state.send_if_modified(|state| {
                            state.apply(BatchEvent::ItemSettled {
                                run_id,
                                background,
                                outcome,
                            })
                        });
                        if !applied {
                            debug!("Discarded stale settlement");
                        }
                    }
                    .instrument(span),
                )
            })
            .collect();

        RunHandle { run_id, tasks }
    }

    /// Start a run and wait until every entry has settled
    pub async fn run(&self, image: SourceImage) -> BatchState {
        let handle = self.start(image);
        handle.join().await;
        self.snapshot()
    }
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
