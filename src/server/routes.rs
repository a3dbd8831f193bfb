//! Endpoint handlers shared by the producer and the relay
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | `/stream[?delay=ms]` | GET | SSE stream of chunk events |
//! | `/set-delay` | POST | Change a listener's delay |
//! | `/status` | GET | Status document |

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::broadcast::{LoopMonitor, LoopStatus};
use crate::error::Result;
use crate::hub::StreamHub;
use crate::registry::{parse_delay_ms, DeliveryRecord, ListenerId, RegistryError, Subscription};
use crate::relay::{EventSource, Relay};
use crate::wire::{encode_chunk, encode_delivery};

/// Delay given to relay listeners that do not ask for one
pub const DEFAULT_LISTENER_DELAY_MS: i64 = 2_000;

/// What the HTTP layer needs from a producer or relay
pub trait StreamService: Send + Sync + 'static {
    /// Hub listeners attach to
    fn hub(&self) -> &Arc<StreamHub>;

    /// Delay used when `/stream` carries no `delay` parameter
    fn default_delay_ms(&self) -> i64;

    /// Events written before the first record
    fn preamble(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Serialize one record for the wire
    fn encode(&self, record: &DeliveryRecord) -> Result<String>;

    /// Status document
    fn status(&self) -> impl Future<Output = Result<serde_json::Value>> + Send;
}

/// Producer status: loop state plus listener count
#[derive(Debug, Clone, Serialize)]
pub struct ProducerStatus {
    #[serde(flatten)]
    pub state: LoopStatus,
    pub listeners: usize,
}

/// Producer endpoints: real-time chunk events
pub struct ProducerService {
    hub: Arc<StreamHub>,
    monitor: LoopMonitor,
}

impl ProducerService {
    pub fn new(hub: Arc<StreamHub>, monitor: LoopMonitor) -> Self {
        Self { hub, monitor }
    }

    pub async fn producer_status(&self) -> ProducerStatus {
        ProducerStatus {
            state: self.monitor.status(),
            listeners: self.hub.listeners().len().await,
        }
    }
}

impl StreamService for ProducerService {
    fn hub(&self) -> &Arc<StreamHub> {
        &self.hub
    }

    fn default_delay_ms(&self) -> i64 {
        0
    }

    async fn preamble(&self) -> Result<Vec<String>> {
        let status = serde_json::to_string(&self.producer_status().await)
            .map_err(crate::wire::EventError::from)?;
        Ok(vec![status])
    }

    fn encode(&self, record: &DeliveryRecord) -> Result<String> {
        Ok(encode_chunk(&record.chunk)?)
    }

    async fn status(&self) -> Result<serde_json::Value> {
        let status = self.producer_status().await;
        Ok(serde_json::to_value(status).map_err(crate::wire::EventError::from)?)
    }
}

/// Relay endpoints: delayed delivery records
pub struct RelayService<S: EventSource> {
    relay: Arc<Relay<S>>,
}

impl<S: EventSource> RelayService<S> {
    pub fn new(relay: Arc<Relay<S>>) -> Self {
        Self { relay }
    }
}

impl<S: EventSource> StreamService for RelayService<S> {
    fn hub(&self) -> &Arc<StreamHub> {
        self.relay.hub()
    }

    fn default_delay_ms(&self) -> i64 {
        DEFAULT_LISTENER_DELAY_MS
    }

    async fn preamble(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn encode(&self, record: &DeliveryRecord) -> Result<String> {
        Ok(encode_delivery(record)?)
    }

    async fn status(&self) -> Result<serde_json::Value> {
        let status = self.relay.status().await;
        Ok(serde_json::to_value(status).map_err(crate::wire::EventError::from)?)
    }
}

/// Handler state
struct AppState<S> {
    service: Arc<S>,
    keepalive: Duration,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            keepalive: self.keepalive,
        }
    }
}

/// Routes for `service`; `keepalive` paces comments on idle streams
pub fn router<S: StreamService>(service: Arc<S>, keepalive: Duration) -> Router {
    Router::new()
        .route("/stream", get(stream_events::<S>))
        .route("/set-delay", post(set_delay::<S>))
        .route("/status", get(status::<S>))
        .fallback(not_found)
        .with_state(AppState { service, keepalive })
}

/// `{"status": "error", "message": ...}` with the given status
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "status": "error", "message": message.into() });
    (status, Json(body)).into_response()
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}

async fn status<S: StreamService>(State(state): State<AppState<S>>) -> Response {
    match state.service.status().await {
        Ok(document) => Json(document).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct StreamParams {
    delay: Option<String>,
}

/// Detaches its listener when the response body is dropped
struct Attachment {
    hub: Arc<StreamHub>,
    subscription: Subscription,
}

impl Drop for Attachment {
    fn drop(&mut self) {
        let hub = Arc::clone(&self.hub);
        let id = self.subscription.id();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                hub.detach(id).await;
                tracing::debug!(listener = id, "Stream closed");
            });
        }
    }
}

async fn stream_events<S: StreamService>(
    State(state): State<AppState<S>>,
    Query(params): Query<StreamParams>,
) -> Response {
    let delay_ms = match params.delay.as_deref() {
        None => state.service.default_delay_ms(),
        Some(raw) => match parse_delay_ms(raw) {
            Ok(delay_ms) => delay_ms,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
    };

    let hub = Arc::clone(state.service.hub());
    let subscription = hub.attach(delay_ms).await;
    tracing::debug!(
        listener = subscription.id(),
        delay_ms = subscription.initial_delay_ms(),
        "Stream opened"
    );
    let attachment = Attachment { hub, subscription };

    let preamble = match state.service.preamble().await {
        Ok(events) => events,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let first = stream::iter(preamble).map(|data| Ok::<_, Infallible>(Event::default().data(data)));
    let records = stream::unfold((attachment, state.service), |(attachment, service)| async move {
        loop {
            let record = attachment.subscription.recv().await?;
            match service.encode(&record) {
                Ok(data) => {
                    return Some((Ok::<_, Infallible>(Event::default().data(data)), (attachment, service)))
                }
                Err(e) => tracing::warn!(
                    listener = attachment.subscription.id(),
                    error = %e,
                    "Dropping record that failed to encode"
                ),
            }
        }
    });

    let keepalive = KeepAlive::new().interval(state.keepalive).text("keep-alive");
    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Sse::new(first.chain(records)).keep_alive(keepalive),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct SetDelayRequest {
    delay_ms: Option<serde_json::Value>,
    listener_id: Option<ListenerId>,
}

#[derive(Debug, Serialize)]
struct SetDelayResponse {
    status: &'static str,
    delay_ms: u32,
    listener_id: Option<ListenerId>,
}

async fn set_delay<S: StreamService>(State(state): State<AppState<S>>, body: Bytes) -> Response {
    let body: SetDelayRequest = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid request body: {}", e)),
    };

    let requested = match body.delay_ms {
        None => state.service.default_delay_ms(),
        Some(value) => match delay_from_json(&value) {
            Ok(delay_ms) => delay_ms,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
    };

    let hub = state.service.hub();
    let target = match body.listener_id {
        Some(id) => Some(id),
        None => hub.listeners().latest().await,
    };

    let delay_ms = match target {
        Some(id) => match hub.set_delay(id, requested).await {
            Ok(delay_ms) => delay_ms,
            Err(e @ RegistryError::ListenerNotFound(_)) => {
                return error_response(StatusCode::NOT_FOUND, e.to_string())
            }
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
        // Nobody to update; report what would have applied
        None => hub.listeners().config().clamp_delay(requested),
    };

    Json(SetDelayResponse {
        status: "ok",
        delay_ms,
        listener_id: target,
    })
    .into_response()
}

/// Accept an integer, a float (truncated) or a numeric string
fn delay_from_json(value: &serde_json::Value) -> std::result::Result<i64, RegistryError> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| RegistryError::InvalidDelay(n.to_string())),
        serde_json::Value::String(s) => parse_delay_ms(s),
        other => Err(RegistryError::InvalidDelay(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::history::buffer::tests::make_chunk;
    use crate::relay::link::tests::ScriptedSource;
    use crate::relay::RelayConfig;

    fn relay_service() -> Arc<RelayService<ScriptedSource>> {
        let relay = Relay::with_source(RelayConfig::default(), ScriptedSource::default());
        Arc::new(RelayService::new(Arc::new(relay)))
    }

    async fn call<S: StreamService>(service: &Arc<S>, method: &str, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router(Arc::clone(service), Duration::from_secs(15))
            .oneshot(request)
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_stream_delay_param() {
        let service = relay_service();
        let request = Request::builder().uri("/stream?delay=750").body(Body::empty()).unwrap();
        let response = router(Arc::clone(&service), Duration::from_secs(15))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        let listeners = service.hub().listeners().snapshot().await;
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].delay_ms(), 750);

        // Dropping the body detaches the listener
        drop(response);
        for _ in 0..100 {
            if service.hub().listeners().is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(service.hub().listeners().is_empty().await);
    }

    #[tokio::test]
    async fn test_stream_default_and_invalid_delay() {
        let service = relay_service();

        let request = Request::builder().uri("/stream").body(Body::empty()).unwrap();
        let response = router(Arc::clone(&service), Duration::from_secs(15))
            .oneshot(request)
            .await
            .unwrap();
        let listeners = service.hub().listeners().snapshot().await;
        assert_eq!(listeners[0].delay_ms(), 2_000);
        drop(response);

        let (status, json) = call(&service, "GET", "/stream?delay=soon", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn test_stream_delivers_encoded_records() {
        let service = relay_service();
        let request = Request::builder().uri("/stream?delay=0").body(Body::empty()).unwrap();
        let response = router(Arc::clone(&service), Duration::from_secs(15))
            .oneshot(request)
            .await
            .unwrap();

        service.hub().publish(make_chunk(3)).await;

        let mut body = response.into_body().into_data_stream();
        let frame = body.next().await.unwrap().unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        let data = text.strip_prefix("data: ").unwrap().trim_end();
        let json: serde_json::Value = serde_json::from_str(data).unwrap();

        assert_eq!(json["position"], 3);
        assert_eq!(json["relay_id"], "relay-buffered");
        assert_eq!(json["configured_delay_ms"], 0);
    }

    #[tokio::test]
    async fn test_set_delay_latest_listener() {
        let service = relay_service();
        let first = service.hub().attach(1_000).await;
        let second = service.hub().attach(1_000).await;

        let (status, json) = call(&service, "POST", "/set-delay", r#"{"delay_ms": 99999}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["delay_ms"], 15_000);
        assert_eq!(json["listener_id"], second.id());

        let listeners = service.hub().listeners();
        assert_eq!(listeners.get(first.id()).await.unwrap().delay_ms(), 1_000);
        assert_eq!(listeners.get(second.id()).await.unwrap().delay_ms(), 15_000);
    }

    #[tokio::test]
    async fn test_set_delay_explicit_listener() {
        let service = relay_service();
        let first = service.hub().attach(1_000).await;
        let _second = service.hub().attach(1_000).await;

        let body = format!(r#"{{"delay_ms": "-5", "listener_id": {}}}"#, first.id());
        let (status, json) = call(&service, "POST", "/set-delay", &body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["delay_ms"], 0);
        assert!(service.hub().listeners().get(first.id()).await.unwrap().is_realtime());
    }

    #[tokio::test]
    async fn test_set_delay_errors() {
        let service = relay_service();
        service.hub().attach(0).await;

        let (status, _) = call(&service, "POST", "/set-delay", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = call(&service, "POST", "/set-delay", r#"{"delay_ms": "abc"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().contains("abc"));

        let (status, _) = call(&service, "POST", "/set-delay", r#"{"delay_ms": 10, "listener_id": 42}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_set_delay_without_listeners() {
        let service = relay_service();

        let (status, json) = call(&service, "POST", "/set-delay", "{}").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["delay_ms"], 2_000);
        assert!(json["listener_id"].is_null());
    }

    #[tokio::test]
    async fn test_relay_status_route() {
        let service = relay_service();
        service.hub().attach(500).await;

        let (status, json) = call(&service, "GET", "/status", "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["relay_id"], "relay-buffered");
        assert_eq!(json["is_connected"], false);
        assert_eq!(json["listeners"], 1);
        assert_eq!(json["buffer_stats"]["size"], 0);
    }

    #[tokio::test]
    async fn test_unknown_routes() {
        let service = relay_service();

        let (status, json) = call(&service, "GET", "/nope", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["status"], "error");

        let (status, _) = call(&service, "DELETE", "/status", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_relay_encoding() {
        let service = relay_service();
        let record = DeliveryRecord::new(make_chunk(1), Arc::from("relay-buffered"), 0, Default::default());

        let json: serde_json::Value = serde_json::from_str(&service.encode(&record).unwrap()).unwrap();
        assert_eq!(json["relay_id"], "relay-buffered");
        assert_eq!(json["position"], 1);
    }
}
