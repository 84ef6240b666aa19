/*
 * Responsibility
 * - tracing / panic hook 初期化 → Config 読み込み → 依存生成 (token store, identity provider)
 * - expired token の sweeper を起動し、shutdown 時に止める
 * - Router 組み立て + middleware (http / cors) 適用 → axum::serve()
 */
use std::{panic, process, time::Duration};

use anyhow::Result;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::middleware;
use crate::services::auth::{build_authenticator, build_identity_provider, build_token_store};
use crate::services::token_store::TokenSweeper;
use crate::{api, state::AppState};

fn init_tracing() {
    // RUST_LOG=info,blog_auth=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: crash the whole process so it gets noticed.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let shutdown = CancellationToken::new();
    let (state, sweeper) = build_state(&config).await?;
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let app = build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(err) = sweeper_handle.await {
        tracing::warn!(error = %err, "token sweeper task failed");
    }

    tracing::info!("server stopped");
    Ok(())
}

async fn build_state(config: &Config) -> Result<(AppState, TokenSweeper)> {
    let store = build_token_store(config).await?;
    let verifier = build_identity_provider(&config.firebase)?;

    let sweeper = TokenSweeper::new(
        store.clone(),
        Duration::from_secs(config.token_sweep_interval_seconds),
    );
    let auth = build_authenticator(store, verifier);

    Ok((AppState::new(auth), sweeper))
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router, config)
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    tracing::info!("shutdown signal received");
    shutdown.cancel();
}
