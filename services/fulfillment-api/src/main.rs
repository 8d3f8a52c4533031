//! MilkWay Fulfillment API
//!
//! Fulfillment microservice exposing the subscription, reconciliation, and
//! reporting command surface over REST.
//!
//! ## REST Endpoints
//!
//! - `POST /api/v1/subscriptions` - Create a subscription
//! - `GET /api/v1/subscriptions/{id}` - Get a subscription
//! - `GET /api/v1/subscriptions/{id}/occurrences` - Derived occurrences
//! - `POST /api/v1/subscriptions/{id}/pause` - Pause (bounded window)
//! - `POST /api/v1/subscriptions/{id}/resume` - Resume
//! - `POST /api/v1/subscriptions/{id}/cancel` - Cancel (terminal)
//! - `GET /api/v1/customers/{id}/subscriptions` - Customer's subscriptions
//! - `GET /api/v1/vendors/{id}/subscriptions` - Vendor's subscriptions
//! - `POST /api/v1/deliveries` - Record a milkman delivery report
//! - `GET /api/v1/reconciliation/unmatched` - Manual reconciliation queue
//! - `POST /api/v1/reconciliation/unmatched/{id}/resolve` - Force-resolve
//! - `POST /api/v1/reconciliation/sweep` - End-of-day sweep
//! - `GET /api/v1/vendors/{id}/holidays` - Vendor calendar
//! - `PUT /api/v1/vendors/{id}/holidays` - Declare a holiday
//! - `DELETE /api/v1/vendors/{id}/holidays/{date}` - Remove a holiday
//! - `GET /api/v1/reports/fulfillment` - Fulfillment summary
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics
//!
//! Caller identity arrives in `x-actor-id` / `x-actor-role` headers, set by
//! the authenticating proxy in front of this service.

mod config;
mod error;
mod extractors;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use milkway_core::{ChannelSink, FulfillmentFacade, FulfillmentService};
use milkway_db::Repositories;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::handlers::{health, ready};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("fulfillment_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MilkWay Fulfillment API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        grace_window_days = config.fulfillment.grace_window_days,
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Create database pool and repositories
    let pool = milkway_db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");
    let repos = Repositories::new(pool.clone());

    // Notification sink: notices drain to the log until the notification
    // service consumes them from a real transport
    let (sink, mut notices) = ChannelSink::new(config.notice_queue_depth);
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            tracing::info!(?notice, "dispatching fulfillment notice");
        }
    });

    // Wire the fulfillment engine
    let service: state::Service = FulfillmentService::new(
        Arc::new(repos.subscriptions),
        Arc::new(repos.calendars),
        Arc::new(repos.events),
        Arc::new(repos.resolutions),
        Arc::new(repos.unmatched),
        Arc::new(repos.audit),
        Arc::new(repos.directory),
        Arc::new(sink),
        config.fulfillment.clone(),
    );
    let facade = FulfillmentFacade::new(Arc::new(service));

    // Create application state
    let state = AppState::new(facade, pool, config.clone());

    // Build HTTP router and serve
    let app = build_router(state, metrics_handle);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // API v1 fulfillment routes
    let api_v1 = Router::new()
        // Subscription routes
        .route("/subscriptions", post(handlers::create_subscription))
        .route("/subscriptions/{id}", get(handlers::get_subscription))
        .route(
            "/subscriptions/{id}/occurrences",
            get(handlers::get_occurrences),
        )
        .route(
            "/subscriptions/{id}/pause",
            post(handlers::pause_subscription),
        )
        .route(
            "/subscriptions/{id}/resume",
            post(handlers::resume_subscription),
        )
        .route(
            "/subscriptions/{id}/cancel",
            post(handlers::cancel_subscription),
        )
        .route(
            "/customers/{id}/subscriptions",
            get(handlers::list_customer_subscriptions),
        )
        .route(
            "/vendors/{id}/subscriptions",
            get(handlers::list_vendor_subscriptions),
        )
        // Reconciliation routes
        .route("/deliveries", post(handlers::record_delivery))
        .route("/reconciliation/unmatched", get(handlers::list_unmatched))
        .route(
            "/reconciliation/unmatched/{id}/resolve",
            post(handlers::force_resolve),
        )
        .route("/reconciliation/sweep", post(handlers::run_sweep))
        // Calendar routes
        .route("/vendors/{id}/holidays", get(handlers::list_holidays))
        .route("/vendors/{id}/holidays", put(handlers::add_holiday))
        .route(
            "/vendors/{id}/holidays/{date}",
            delete(handlers::remove_holiday),
        )
        // Report routes
        .route("/reports/fulfillment", get(handlers::fulfillment_report));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        // Request ID propagation (outermost)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        // Tracing with request details
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Request timeout (innermost - closest to handler)
        .layer(TimeoutLayer::new(request_timeout));

    // Combine all routes
    Router::new()
        .nest("/api/v1", api_v1)
        .layer(middleware)
        .merge(health_routes) // Health routes without timeout
        .merge(metrics_route) // Metrics route without timeout
        .with_state(state)
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
