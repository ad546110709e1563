//! Shared application state.

use legalseg_core::{CaseRecord, LegalSegConfig, PredictionRecord};
use legalseg_infer::InferenceClient;
use legalseg_store::CaseStore;
use tokio::sync::mpsc;

/// One queued write of an analysis outcome, handed off after the response
/// has been built.
pub struct PersistRequest {
    pub user_id: String,
    pub case: CaseRecord,
    pub prediction: PredictionRecord,
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: LegalSegConfig,
    pub store: CaseStore,
    pub client: InferenceClient,
    pub persist_tx: mpsc::UnboundedSender<PersistRequest>,
    persist_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<PersistRequest>>>,
}

impl AppState {
    pub fn new(config: LegalSegConfig, store: CaseStore, client: InferenceClient) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            store,
            client,
            persist_tx: tx,
            persist_rx: parking_lot::Mutex::new(Some(rx)),
        }
    }

    /// Take the persistence receiver (can only be called once, by the worker).
    pub fn take_persist_rx(&self) -> Option<mpsc::UnboundedReceiver<PersistRequest>> {
        self.persist_rx.lock().take()
    }
}
