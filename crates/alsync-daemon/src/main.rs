//! alsync-daemon entry point.
//!
//! Composition root: load config, build the scheduler transport, the HTTP
//! surface and the one `AlarmSync`, then run until ctrl-c.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use alsync_config::{report_unused_keys, secrets::resolve_secrets, SyncConfig, UnusedKeyPolicy};
use alsync_daemon::{
    routes,
    scheduler_client::{run_forwarder, scheduler_channel, ForwardTarget, HttpScheduler},
    service::{AlarmSync, SyncMode},
    state,
};
use alsync_reconcile::{FallbackZone, RingTimeParser};
use alsync_store::JsonFileStore;
use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

#[derive(Parser)]
#[command(name = "alsync-daemon")]
#[command(about = "Keeps an alarm scheduler in sync with the settings alarm list", long_about = None)]
struct Cli {
    /// Layered config paths in merge order
    #[arg(long = "config")]
    config_paths: Vec<String>,

    /// Schedule two synthetic alarms instead of reading the settings store
    #[arg(long, default_value_t = false)]
    simulate: bool,

    /// Refuse config keys the active mode never reads
    #[arg(long, default_value_t = false)]
    strict_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // Config
    // -----------------------------------------------------------------------

    let path_refs: Vec<&str> = cli.config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = alsync_config::load_layered_yaml(&path_refs)?;
    let cfg = SyncConfig::from_config_json(&loaded.config_json)
        .context("invalid config")?
        .with_simulate(cli.simulate);
    cfg.validate()?;

    let policy = if cli.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(cfg.mode(), &loaded.config_json, policy)?;
    if !report.is_clean() {
        warn!(
            mode = %report.mode,
            unused = ?report.unused_leaf_pointers,
            "CONFIG_UNUSED_KEYS"
        );
    }

    let secrets = resolve_secrets(&cfg)?;
    let mode = SyncMode::from(cfg.mode());
    info!(
        config_hash = %loaded.config_hash,
        mode = mode.as_str(),
        "config loaded"
    );

    let shared = Arc::new(state::AppState::new(mode));
    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    // -----------------------------------------------------------------------
    // Scheduler transport
    // -----------------------------------------------------------------------

    let target = match cfg.scheduler_base_url.as_deref() {
        Some(url) => ForwardTarget::Http(HttpScheduler::new(
            url,
            cfg.scheduler_timeout,
            secrets.scheduler_token.clone(),
        )?),
        None => {
            warn!("scheduler.base_url not set; commands are logged, not sent");
            ForwardTarget::DryRun
        }
    };
    let (scheduler, commands) = scheduler_channel();
    let forwarder = tokio::spawn(run_forwarder(commands, target, Arc::clone(&shared)));

    // -----------------------------------------------------------------------
    // HTTP status surface
    // -----------------------------------------------------------------------

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or(cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("alsync-daemon listening on http://{}", addr);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "http server stopped");
        }
    });

    // -----------------------------------------------------------------------
    // Alarm sync
    // -----------------------------------------------------------------------

    let parser = RingTimeParser::new(match cfg.timezone {
        Some(tz) => FallbackZone::Named(tz),
        None => FallbackZone::Local,
    });

    let mut sync = match (mode, cfg.settings_path.clone()) {
        (SyncMode::Registry, Some(path)) => {
            info!(path = %path.display(), "watching settings file");
            AlarmSync::registry(
                JsonFileStore::new(path, cfg.poll_interval),
                scheduler,
                Arc::clone(&shared),
            )
        }
        (SyncMode::Registry, None) => anyhow::bail!("CONFIG_MISSING mode=REGISTRY: settings.path"),
        (SyncMode::Simulate, _) => AlarmSync::simulate(scheduler, Arc::clone(&shared)),
    }
    .with_parser(parser)
    .with_retry_interval(cfg.retry_interval);

    sync.start().await.context("alarm sync failed to start")?;
    sync.run(shutdown_signal()).await;
    sync.shutdown().await;

    // The sync owned the last scheduler handle; the forwarder drains and exits.
    match forwarder.await {
        Ok(stats) => info!(
            delivered = stats.delivered,
            failed = stats.failed,
            "scheduler commands flushed"
        ),
        Err(e) => error!(error = %e, "scheduler forwarder task failed"),
    }
    server.abort();

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("ALSYNC_DAEMON_ADDR").ok()?.parse().ok()
}

/// Resolves on ctrl-c. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers(tower_http::cors::Any)
}
