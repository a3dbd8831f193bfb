//! HTTP server listener
//!
//! Binds the TCP listener and serves the shared routes. Stream responses
//! hold their connection slot and listener attachment until the client goes
//! away and the response body is dropped.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use futures::stream::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use super::config::ServerConfig;
use super::routes::{error_response, router, StreamService};
use crate::error::Result;

/// HTTP front end for a producer or relay
pub struct HttpServer<S: StreamService> {
    config: ServerConfig,
    service: Arc<S>,
}

/// Shared by every request passing the connection limit
#[derive(Clone)]
struct Admission {
    semaphore: Arc<Semaphore>,
    next_session_id: Arc<AtomicU64>,
}

impl<S: StreamService> HttpServer<S> {
    /// Create a new server with the given configuration and service
    pub fn new(config: ServerConfig, service: S) -> Self {
        Self::with_service(config, Arc::new(service))
    }

    /// Create a server around a shared service
    pub fn with_service(config: ServerConfig, service: Arc<S>) -> Self {
        Self { config, service }
    }

    /// Get a reference to the service
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Routes plus body limit and connection limit layers
    pub fn router(&self) -> Router {
        let app = router(Arc::clone(&self.service), self.config.keepalive_interval)
            .layer(DefaultBodyLimit::max(self.config.max_request_size));

        if self.config.max_connections == 0 {
            return app;
        }

        let admission = Admission {
            semaphore: Arc::new(Semaphore::new(self.config.max_connections)),
            next_session_id: Arc::new(AtomicU64::new(1)),
        };
        app.layer(middleware::from_fn_with_state(admission, admit))
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from an already bound listener
    ///
    /// Shutdown stops accepting; open streams end when their clients leave
    /// or their hub goes quiet.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "HTTP server listening");

        let app = self.router();
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = axum::serve(listener, app).into_future() => Ok(result?),
        }
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

/// Reject with 503 once every slot is taken; a streamed response keeps its
/// permit until the body is dropped
async fn admit(State(admission): State<Admission>, request: Request, next: Next) -> Response {
    let permit = match Arc::clone(&admission.semaphore).try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Request rejected: limit reached");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "connection limit reached");
        }
    };

    let session_id = admission.next_session_id.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(
        session_id = session_id,
        method = %request.method(),
        path = %request.uri().path(),
        "Request"
    );

    let (parts, body) = next.run(request).await.into_parts();
    if body.size_hint().exact().is_some() {
        return Response::from_parts(parts, body);
    }
    let body = body.into_data_stream().map(move |frame| {
        let _held = &permit;
        frame
    });
    Response::from_parts(parts, Body::from_stream(body))
}
