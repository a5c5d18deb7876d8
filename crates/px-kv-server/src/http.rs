//! JSON API over a `KvStore`
//!
//! Routes:
//! - `GET /kv?key=<k>`: `{"<k>": value}`, or 404 if the key is absent
//! - `GET /kv`: every entry as one JSON object
//! - `PUT /kv` with `{"key": ..., "value": ...}`: store a scalar value
//! - `DELETE /kv` with `{"key": ...}`: remove a key, 404 if it was absent
//!
//! Every other path answers 404 `{"error": "Invalid path"}` and other methods
//! on `/kv` answer 405, both with JSON bodies. Writes run on the blocking
//! pool since a persistent store fsyncs before returning.

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use px_kv::{DynStore, KvError, KvKey, KvStore, KvValue};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Errors returned to HTTP clients as `{"error": "<message>"}`
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Missing key or value")]
    MissingKeyOrValue,

    #[error("Missing key")]
    MissingKey,

    #[error("Key not found")]
    KeyNotFound,

    #[error("Invalid path")]
    InvalidPath,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Invalid query string")]
    InvalidQuery,

    #[error(transparent)]
    Store(#[from] KvError),

    #[error("Store task failed: {0}")]
    Task(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidJson
            | ApiError::MissingKeyOrValue
            | ApiError::MissingKey
            | ApiError::InvalidQuery => StatusCode::BAD_REQUEST,
            ApiError::KeyNotFound | ApiError::InvalidPath => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Store(e) if e.is_invalid_input() => StatusCode::BAD_REQUEST,
            ApiError::Store(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router serving `store`
pub fn build_router(store: DynStore) -> Router {
    let kv = get(read)
        .put(write)
        .delete(remove)
        .fallback(method_not_allowed);

    Router::new()
        .route("/kv", kv.clone())
        .route("/kv/", kv)
        .fallback(invalid_path)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn read(
    State(store): State<DynStore>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = query.map_err(|_| ApiError::InvalidQuery)?;
    // First `key` wins when repeated; `?key=` with nothing after it lists everything
    let key = params
        .into_iter()
        .find_map(|(name, value)| (name == "key").then_some(value));
    match key.filter(|k| !k.is_empty()) {
        Some(key) => {
            let key = KvKey::new(key)?;
            debug!("GET {}", key);
            let value = store.get(&key).ok_or(ApiError::KeyNotFound)?;
            Ok(Json(entry(key, value)).into_response())
        }
        None => {
            let all = store.all();
            debug!("GET all ({} entries)", all.len());
            Ok(Json(all).into_response())
        }
    }
}

async fn write(State(store): State<DynStore>, body: Bytes) -> Result<Response, ApiError> {
    let mut payload = parse_object(&body)?;
    let (key, value) = match (payload.remove("key"), payload.remove("value")) {
        (Some(Value::String(key)), Some(value)) if !key.is_empty() && !value.is_null() => {
            (key, value)
        }
        _ => return Err(ApiError::MissingKeyOrValue),
    };

    let key = KvKey::new(key)?;
    let value = KvValue::try_from(value)?;
    debug!("PUT {} ({})", key, value.type_name());

    let stored = value.clone();
    let key = run_blocking(store, move |store| store.set(&key, stored).map(|()| key)).await?;
    Ok(Json(entry(key, value)).into_response())
}

async fn remove(State(store): State<DynStore>, body: Bytes) -> Result<Response, ApiError> {
    let mut payload = parse_object(&body)?;
    let key = match payload.remove("key") {
        Some(Value::String(key)) if !key.is_empty() => KvKey::new(key)?,
        _ => return Err(ApiError::MissingKey),
    };
    debug!("DELETE {}", key);

    match run_blocking(store, move |store| store.delete(&key)).await? {
        Some(_) => Ok(Json(json!({ "result": "Key deleted" })).into_response()),
        None => Err(ApiError::KeyNotFound),
    }
}

async fn invalid_path() -> ApiError {
    ApiError::InvalidPath
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApiError::InvalidJson),
    }
}

fn entry(key: KvKey, value: KvValue) -> Value {
    let mut map = Map::new();
    map.insert(key.into_string(), value.into());
    Value::Object(map)
}

async fn run_blocking<T, F>(store: DynStore, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn KvStore) -> px_kv::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| ApiError::Task(e.to_string()))?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::InvalidJson.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingKey.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::KeyNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::InvalidPath.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::InvalidQuery.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::from(KvError::KeyTooLong(300)).status(),
            StatusCode::BAD_REQUEST
        );

        let durability = KvError::Durability {
            path: PathBuf::from("file_store.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(
            ApiError::from(durability).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_parse_object() {
        assert!(parse_object(br#"{"key": "a"}"#).is_ok());
        assert!(matches!(parse_object(b"{nope"), Err(ApiError::InvalidJson)));
        assert!(matches!(parse_object(b"[1, 2]"), Err(ApiError::InvalidJson)));
        assert!(matches!(parse_object(b""), Err(ApiError::InvalidJson)));
    }

    #[test]
    fn test_entry_shape() {
        let key = KvKey::new("a").unwrap();
        assert_eq!(entry(key, KvValue::Int(1)), json!({ "a": 1 }));
    }
}
