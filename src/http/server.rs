//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router sending every path and method to the dispatcher
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Serve on a bound listener until shutdown is signalled

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::TimeoutConfig;
use crate::dispatcher::Dispatcher;
use crate::lifecycle::ShutdownSignal;

/// HTTP front end for the balancer.
pub struct BalancerServer {
    router: Router,
    dispatcher: Arc<Dispatcher>,
}

impl BalancerServer {
    /// Create a new server around `dispatcher`.
    pub fn new(dispatcher: Dispatcher, timeouts: &TimeoutConfig) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let router = Self::build_router(dispatcher.clone(), timeouts);
        Self { router, dispatcher }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(dispatcher: Arc<Dispatcher>, timeouts: &TimeoutConfig) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(dispatcher)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                Duration::from_secs(timeouts.request_secs),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            strategy = self.dispatcher.strategy(),
            backends = self.dispatcher.backends().len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every request goes through the dispatcher.
async fn proxy_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    dispatcher.handle(request, peer).await
}
