//! Background persistence queue — writes analysis outcomes after the
//! response has gone out.
//!
//! A failed write must never reach the caller: it gets one attempt, an
//! error log, and a line in the dead-letter file for operator replay.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::state::{AppState, PersistRequest};

/// Start the background persistence worker task.
pub fn start_persist_worker(state: Arc<AppState>) {
    let mut rx = match state.take_persist_rx() {
        Some(rx) => rx,
        None => {
            error!("Persistence worker already started");
            return;
        }
    };

    tokio::spawn(async move {
        info!("Background persistence worker started");
        while let Some(request) = rx.recv().await {
            persist_outcome(&state, request);
        }
    });
}

fn persist_outcome(state: &AppState, request: PersistRequest) {
    match try_persist(state, &request) {
        Ok(()) => debug!(
            "Persisted case {} for user {}",
            request.case.id, request.user_id
        ),
        Err(e) => {
            error!("Failed to persist case {}: {}", request.case.id, e);
            dead_letter(state, &request, &e);
        }
    }
}

fn try_persist(state: &AppState, request: &PersistRequest) -> legalseg_core::Result<()> {
    state.store.append_case(&request.user_id, &request.case)?;
    state
        .store
        .create_prediction(&request.user_id, &request.prediction)?;
    Ok(())
}

/// Append the failed request to the dead-letter file. Single attempt; a
/// failure here is logged and the record is dropped.
fn dead_letter(state: &AppState, request: &PersistRequest, err: &legalseg_core::Error) {
    let line = serde_json::json!({
        "userId": request.user_id,
        "caseId": request.case.id,
        "error": err.to_string(),
        "case": request.case,
        "prediction": request.prediction,
    });

    let path = &state.config.data_paths.dead_letter_file;
    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{}", line));

    if let Err(io_err) = result {
        error!(
            "Dead-letter write failed for case {}: {}",
            request.case.id, io_err
        );
    }
}
