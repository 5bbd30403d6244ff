//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Create the Axum router with the stub handler and middleware
//! - Serve each accepted connection with hyper, closing it after one response
//! - Close connections without writing anything when a rule drops them
//! - Drain open connections on shutdown, then abort whatever is left
//!
//! # Design Decisions
//! - Connections are served by hyper directly; a service error aborts the
//!   connection before any bytes are written
//! - Keep-alive is disabled; every response closes its connection

use std::any::Any;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::http::dispatcher::RequestDispatcher;
use crate::http::response;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};

/// Returned by the connection service to make hyper close the socket unanswered.
#[derive(Debug, thiserror::Error)]
#[error("connection dropped by rule")]
pub struct ConnectionDropped;

/// The stub HTTP server.
pub struct StubServer {
    router: Router,
    tracker: ConnectionTracker,
    shutdown_grace: Duration,
}

impl StubServer {
    pub fn new(dispatcher: RequestDispatcher, shutdown_grace: Duration) -> Self {
        Self {
            router: Self::build_router(dispatcher),
            tracker: ConnectionTracker::new(),
            shutdown_grace,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(dispatcher: RequestDispatcher) -> Router {
        Router::new()
            .fallback(stub_handler)
            .with_state(dispatcher)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Accept and serve connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let router = self.router.clone();
                        let guard = self.tracker.open(peer);
                        let span = tracing::info_span!("connection", id = %guard.id(), peer = %peer);
                        let conn_shutdown = shutdown.resubscribe();
                        connections.spawn(
                            async move {
                                serve_connection(stream, router, conn_shutdown, permit).await;
                                drop(guard);
                            }
                            .instrument(span),
                        );
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                    Err(e) => return Err(e),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = shutdown.recv() => break,
            }
        }

        drop(listener);
        tracing::info!(
            open_connections = self.tracker.open_count(),
            grace_secs = self.shutdown_grace.as_secs_f64(),
            "Listener closed, draining connections"
        );

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "Grace period elapsed, aborting remaining connections"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }

        tracing::info!(
            accepted = self.tracker.accepted_count(),
            "HTTP server stopped"
        );
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
    _permit: ConnectionPermit,
) {
    let service = hyper::service::service_fn(move |request: hyper::Request<Incoming>| {
        let router = router.clone();
        async move {
            let response = match router.oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            if response::is_dropped(&response) {
                Err(ConnectionDropped)
            } else {
                Ok::<_, ConnectionDropped>(response)
            }
        }
    });

    let conn = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    match result {
        Ok(()) => {}
        Err(e) if is_drop(&e) => tracing::debug!("Connection closed without response"),
        Err(e) => tracing::debug!(error = %e, "Connection ended with error"),
    }
}

fn is_drop(error: &hyper::Error) -> bool {
    std::error::Error::source(error).is_some_and(|source| source.is::<ConnectionDropped>())
}

/// Fallback handler for every request.
async fn stub_handler(State(dispatcher): State<RequestDispatcher>, request: Request) -> Response {
    match *request.method() {
        Method::OPTIONS => response::preflight(),
        Method::GET | Method::POST | Method::PUT | Method::PATCH | Method::DELETE => {
            dispatcher.handle(request).await
        }
        ref other => {
            tracing::warn!(method = %other, "Unsupported method");
            response::error(
                StatusCode::NOT_IMPLEMENTED,
                format!("Unsupported method ({})", other),
            )
        }
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Request handler panicked");
    response::error(StatusCode::INTERNAL_SERVER_ERROR, "Unknown Error")
}
