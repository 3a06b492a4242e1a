//! Binary entry point: env, logging, state, router, serve.

use std::net::SocketAddr;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stockalert::{config::Config, routes, scheduler, state::build_state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("stockalert=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(
        r#"

  ╔════════════════════════════════════════════════════╗
  ║        STOCKALERT — Scan Ingress Gateway           ║
  ║  Webhook · Enrich · Notify · Track · Digest        ║
  ╚════════════════════════════════════════════════════╝"#
    );

    // ── 3. Shared state ───────────────────────────────────────────────────
    let config = Config::from_env();
    let port = config.port;
    let state = build_state(config).await?;

    // ── 4. Background loops ───────────────────────────────────────────────
    tokio::spawn(scheduler::digest_loop(state.clone()));
    tokio::spawn(scheduler::checkpoint_loop(state.clone()));

    // ── 5. Router + middleware ────────────────────────────────────────────
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = routes::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // ── 6. Bind & serve with graceful shutdown ────────────────────────────
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(?addr, "🚀 stock alert gateway starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    if state.sink.is_enabled() {
        let notice = format!(
            "🟢 Stock alert gateway is up on port {port} (cache TTL {}s)",
            state.config.cache_ttl.as_secs()
        );
        if let Err(e) = state.sink.send(&notice).await {
            warn!(error = %format!("{e:#}"), "startup notice failed");
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Bounded teardown: flush state, but never hang the exit.
    if tokio::time::timeout(Duration::from_secs(10), state.shutdown())
        .await
        .is_err()
    {
        warn!("shutdown flush exceeded 10s — exiting anyway");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("ctrl-c received — shutting down"),
        _ = terminate => info!("SIGTERM received — shutting down"),
    }
}
