//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures the middleware stack, and defines the
//! shared application state injected into handlers.
//!
//! # Notes
//! The RPC routes sit behind three layers applied in order: JWT
//! authentication, caller-ip resolution, request timing. The health route
//! is merged in outside those layers so probes need no credentials.
use crate::api;
use crate::auth;
use crate::config::PluginConfig;
use crate::peers::OrdersApi;
use crate::postoffice::PostOfficeService;
use crate::snapshot::SnapshotStore;
use crate::store::PluginStore;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use portage_canpost::CarrierApi;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: PluginConfig,
    pub store: Arc<dyn PluginStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub carrier: Arc<dyn CarrierApi>,
    pub orders: Arc<dyn OrdersApi>,
    pub post_offices: PostOfficeService,
}

pub fn build_router(state: AppState) -> Router {
    let rpc = Router::new()
        .route("/v1/shipping/rates", post(api::rates::get_shipping_rate))
        .route("/v1/shipping/labels", post(api::labels::create_label))
        .route("/v1/shipping/refunds", post(api::refunds::refund_shipment))
        .route(
            "/v1/shipping/labels/refund",
            post(api::refunds::refund_shipment),
        )
        .route(
            "/v1/shipping/label-options",
            get(api::options::list_label_shipping_options),
        )
        .layer(axum::middleware::from_fn(auth::time_request))
        .layer(axum::middleware::from_fn(auth::resolve_caller_ip))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    let system = Router::new().route("/v1/system/health", get(system_health));

    rpc.merge(system)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: String,
    store_backend: String,
    store_durable: bool,
}

async fn system_health(State(state): State<AppState>) -> axum::Json<HealthStatus> {
    let status = match state.store.health_check().await {
        Ok(()) => "ok".to_string(),
        Err(err) => {
            tracing::error!(error = %err, "store health check failed");
            "degraded".to_string()
        }
    };
    axum::Json(HealthStatus {
        status,
        store_backend: state.store.backend_name().to_string(),
        store_durable: state.store.is_durable(),
    })
}
