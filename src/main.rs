// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use tracing::info;
use tracing_subscriber::EnvFilter;

use meridian_neobank_server::{
    api::router,
    auth::{AuthService, EvmSignatureVerifier, TokenIssuer},
    blockchain::{ChainGateway, EvmChainClient},
    config::{
        env_optional, env_or_default, AUTH_TOKEN_SECRET_ENV, AUTH_TOKEN_TTL_ENV, DATA_DIR_ENV,
        DEFAULT_AUTH_TOKEN_TTL_SECS, DEFAULT_DATA_DIR, DEFAULT_SWAP_ASSET_SYMBOL,
        SWAP_ASSET_SYMBOL_ENV,
    },
    deposit::DepositWorkflow,
    ledger::LedgerDb,
    providers::{CachedPriceSource, PaymentApiClient, PriceFeedClient},
    state::AppState,
    swap::SwapWorkflow,
};

#[tokio::main]
async fn main() {
    init_tracing();

    // Ledger database
    let data_dir = env_or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR);
    let db_path = PathBuf::from(&data_dir).join("ledger.redb");
    let ledger = Arc::new(LedgerDb::open(&db_path).expect("Failed to open ledger database"));
    info!(path = %db_path.display(), "ledger database opened");

    // Authentication
    let token_secret =
        env_optional(AUTH_TOKEN_SECRET_ENV).expect("AUTH_TOKEN_SECRET must be set");
    let token_ttl: i64 = env_or_default(
        AUTH_TOKEN_TTL_ENV,
        &DEFAULT_AUTH_TOKEN_TTL_SECS.to_string(),
    )
    .parse()
    .expect("AUTH_TOKEN_TTL_SECS must be an integer");
    let auth = Arc::new(AuthService::new(
        Arc::new(EvmSignatureVerifier),
        TokenIssuer::new(&token_secret, token_ttl),
    ));

    // External services
    let gateway =
        Arc::new(PaymentApiClient::from_env().expect("Payment processor configuration"));
    let webhook_secret =
        env_optional("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET must be set");
    let chain: Arc<dyn ChainGateway> =
        Arc::new(EvmChainClient::from_env().expect("Chain configuration"));
    let prices = Arc::new(CachedPriceSource::new(Arc::new(
        PriceFeedClient::from_env().expect("Price feed configuration"),
    )));

    // Workflows
    let deposits = Arc::new(DepositWorkflow::new(Arc::clone(&ledger), gateway));
    let asset_symbol = env_or_default(SWAP_ASSET_SYMBOL_ENV, DEFAULT_SWAP_ASSET_SYMBOL);
    let swaps = Arc::new(SwapWorkflow::new(
        Arc::clone(&ledger),
        Arc::clone(&chain),
        prices,
        asset_symbol,
    ));

    let state = AppState {
        ledger,
        auth,
        deposits,
        swaps,
        chain,
        webhook_secret,
    };
    let app = router(state);

    // Bind and serve
    let host = env_or_default("HOST", "0.0.0.0");
    let port: u16 = env_or_default("PORT", "8080")
        .parse()
        .expect("PORT must be a valid port number");
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    info!(%addr, "server listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    if env_or_default("LOG_FORMAT", "pretty") == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolve on SIGINT or SIGTERM so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
