//! The upload-and-analyze route: extract → infer → normalize → respond,
//! with persistence queued after the response is built.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::routes::ApiError;
use crate::state::{AppState, PersistRequest};
use legalseg_core::{AnalysisResult, CaseRecord, Error, PredictionRecord, Result};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/analyze", post(analyze))
}

/// A file part spooled to the uploads directory.
struct StoredUpload {
    path: PathBuf,
    extension: String,
    original_name: String,
}

/// What the caller sent: an identity, and a file or pasted text.
#[derive(Default)]
struct UploadInput {
    identity: Option<String>,
    text: Option<String>,
    file: Option<StoredUpload>,
}

impl UploadInput {
    /// Drop a spooled file that never reached extraction.
    fn discard_spooled(&self) {
        if let Some(upload) = &self.file {
            let _ = std::fs::remove_file(&upload.path);
        }
    }
}

/// POST /api/analyze — classify one document and return the case record.
///
/// The 201 response is built before any persistence I/O; the write itself
/// runs on the background queue.
async fn analyze(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
) -> std::result::Result<(StatusCode, Json<Value>), ApiError> {
    let input = read_input(&state, request).await?;

    // Resolve the acting user before touching the document.
    let identity = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| input.identity.clone());
    let identity = match identity {
        Some(id) if !id.trim().is_empty() => id,
        _ => {
            input.discard_spooled();
            return Err(Error::Auth("no user identity on the request".to_string()).into());
        }
    };
    let user = match state.store.find_user_by_identity(&identity)? {
        Some(user) => user,
        None => {
            input.discard_spooled();
            return Err(Error::NotFound(format!("user '{}'", identity)).into());
        }
    };

    // Resolve the text to classify.
    let (text, source, stored_filename, title) = match input.file {
        Some(upload) => {
            let text = legalseg_extract::extract_and_discard(&upload.path, &upload.extension)?;
            (
                text,
                upload.original_name.clone(),
                Some(upload.original_name.clone()),
                upload.original_name,
            )
        }
        None => {
            let text = input
                .text
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| Error::Validation("provide a file or a text field".to_string()))?
                .to_string();
            let title = title_from_text(&text);
            (text, "text".to_string(), None, title)
        }
    };

    // Remote inference and normalization.
    let payload = state.client.classify(&text).await?;
    reject_remote_error(&payload)?;
    let sentences = legalseg_infer::normalize(&payload);

    let results = AnalysisResult::from_sentences(sentences);
    let now = chrono::Utc::now().to_rfc3339();
    let case = CaseRecord::completed(
        uuid::Uuid::new_v4().to_string(),
        title,
        stored_filename,
        now.clone(),
        results,
    );
    let prediction = PredictionRecord {
        id: uuid::Uuid::new_v4().to_string(),
        source,
        sentence_count: case.results.sentences.len(),
        avg_confidence: case.results.avg_confidence,
        sentences: case.results.sentences.clone(),
        created_at: now,
    };

    info!(
        "Analyzed case {} for user {}: {} sentences",
        case.id, user.id, case.sentence_count
    );

    let body = serde_json::json!({ "document": &case, "results": &case.results });

    // Queue the write; the response never waits on storage.
    let queued = state.persist_tx.send(PersistRequest {
        user_id: user.id,
        case,
        prediction,
    });
    if let Err(e) = queued {
        error!("Persistence queue closed; case {} dropped", e.0.case.id);
    }

    Ok((StatusCode::CREATED, Json(body)))
}

/// Read either a multipart form (`file` / `text` / `userId` parts) or a JSON
/// body (`{ text, userId }`).
async fn read_input(state: &AppState, request: Request) -> Result<UploadInput> {
    let is_multipart = request
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if is_multipart {
        read_multipart(state, request).await
    } else {
        read_json(request).await
    }
}

async fn read_multipart(state: &AppState, request: Request) -> Result<UploadInput> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| Error::Validation(format!("malformed multipart body: {}", e)))?;

    let mut input = UploadInput::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let original_name = sanitize_filename(field.file_name().unwrap_or("upload"));
                let extension = Path::new(&original_name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::Validation(format!("file read failed: {}", e)))?;

                let spooled_name = format!("{}_{}", uuid::Uuid::new_v4(), original_name);
                let path = state.config.data_paths.uploads.join(spooled_name);
                std::fs::write(&path, &bytes)?;

                input.file = Some(StoredUpload {
                    path,
                    extension,
                    original_name,
                });
            }
            "text" => {
                input.text = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| Error::Validation(format!("text read failed: {}", e)))?,
                );
            }
            "userId" => {
                input.identity = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| Error::Validation(format!("userId read failed: {}", e)))?,
                );
            }
            _ => {}
        }
    }
    Ok(input)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    text: Option<Value>,
    user_id: Option<String>,
}

async fn read_json(request: Request) -> Result<UploadInput> {
    let bytes = axum::body::to_bytes(request.into_body(), 2 * 1024 * 1024)
        .await
        .map_err(|e| Error::Validation(format!("body read failed: {}", e)))?;
    if bytes.is_empty() {
        return Ok(UploadInput::default());
    }
    let body: AnalyzeBody = serde_json::from_slice(&bytes)
        .map_err(|e| Error::Validation(format!("malformed JSON body: {}", e)))?;

    // A non-string `text` value is coerced to its JSON representation
    // rather than rejected.
    let text = body.text.map(|v| match v {
        Value::String(s) => s,
        other => other.to_string(),
    });

    Ok(UploadInput {
        identity: body.user_id,
        text,
        file: None,
    })
}

/// The model's own failure paths surface as a sole `{"error": ...}` payload
/// element; that is a remote failure, not an empty result.
fn reject_remote_error(payload: &[Value]) -> Result<()> {
    if let [Value::Object(fields)] = payload {
        if fields.len() == 1 {
            if let Some(message) = fields.get("error").and_then(|v| v.as_str()) {
                return Err(Error::RemoteService(message.to_string()));
            }
        }
    }
    Ok(())
}

/// Sanitize a filename to prevent path traversal.
fn sanitize_filename(name: &str) -> String {
    let name = name.replace('/', "").replace('\\', "").replace("..", "");
    Path::new(&name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string()
}

/// Title for pasted text: the leading characters, ellipsized.
fn title_from_text(text: &str) -> String {
    let title: String = text.chars().take(60).collect();
    if text.chars().count() > 60 {
        format!("{}…", title.trim_end())
    } else {
        title
    }
}
