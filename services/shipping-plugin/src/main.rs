// Canada Post shipping plugin
// ---------------------------
// Connects the host commerce platform to Canada Post's non-contract
// shipping web services. Exposes a carrier-agnostic RPC surface (rate
// quoting, label creation, refunds, option discovery) and speaks the
// carrier's XML REST dialect outbound.
//
// Storage model:
// - Pluggable `PluginStore`: in-memory (default) or Postgres when
//   PORTAGE_DATABASE_URL / DATABASE_URL is set. The Postgres schema is
//   ensured idempotently at startup.
// - Rate snapshots live in a TTL'd in-process store keyed by unguessable
//   rate ids; they bridge the quote and label calls.
use anyhow::Context;
use shipping_plugin::app::{AppState, build_router};
use shipping_plugin::config::PluginConfig;
use shipping_plugin::observability;
use shipping_plugin::peers::{HttpOrdersClient, OrdersApi};
use shipping_plugin::postoffice::PostOfficeService;
use shipping_plugin::snapshot::{SnapshotStore, TtlSnapshotStore};
use shipping_plugin::store::PluginStore;
use shipping_plugin::store::memory::InMemoryStore;
use shipping_plugin::store::postgres::PostgresStore;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PluginConfig::from_env_or_yaml().context("load configuration")?;

    let metrics_handle = observability::init_observability("shipping-plugin");
    tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let store: Arc<dyn PluginStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(
            PostgresStore::connect(url)
                .await
                .context("connect postgres store")?,
        ),
        None => Arc::new(InMemoryStore::new()),
    };
    tracing::info!(
        backend = store.backend_name(),
        durable = store.is_durable(),
        "plugin store ready"
    );

    let snapshots: Arc<dyn SnapshotStore> = Arc::new(TtlSnapshotStore::with_ttl_minutes(
        config.rate_snapshot_ttl_minutes,
    ));
    let carrier = Arc::new(
        portage_canpost::Client::new(
            config.canpost_username.clone(),
            config.canpost_password.clone(),
            config.canpost_customer_number.clone(),
            config.canpost_base_url.clone(),
        )
        .context("build canada post client")?,
    );
    let orders: Arc<dyn OrdersApi> = Arc::new(
        HttpOrdersClient::new(config.orders_base_url.clone()).context("build orders client")?,
    );
    let post_offices = PostOfficeService::new(store.clone(), carrier.clone());

    let bind_addr = config.bind_addr;
    let state = AppState {
        config,
        store,
        snapshots,
        carrier,
        orders,
        post_offices,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "shipping plugin listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serve plugin api")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
