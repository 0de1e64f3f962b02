#[tokio::main]
async fn main() {
    use linkgate_core::{Clock, SystemClock};
    use linkgate_link_token::{LinkSecret, TokenVerifier};
    use linkgate_server::{
        auth::{AppState, LineIdTokenVerifier, db::PgStore},
        config::ServerConfig,
    };
    use linkgate_session::{
        AuthLogSink, IdentityStore, InMemoryStore, SessionManager, SessionStore, spawn_sweeper,
    };
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // A missing secret is fatal here, never per request
    let secret = LinkSecret::new(&config.link_secret).expect("LINK_SECRET must be non-empty");
    let policy = config
        .session
        .policy()
        .expect("invalid session configuration");

    let (sessions, identities, auth_log): (
        Arc<dyn SessionStore>,
        Arc<dyn IdentityStore>,
        Arc<dyn AuthLogSink>,
    ) = match &config.database_url {
        Some(url) => {
            let pool = linkgate_server::auth::db::connect_lazy(url, &config.database)
                .expect("invalid DATABASE_URL");
            let store = PgStore::new(pool);

            tracing::info!("Running database migrations...");
            store.migrate().await.expect("failed to run migrations");

            let store = Arc::new(store);
            (store.clone(), store.clone(), store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; sessions are kept in memory");
            let store = Arc::new(InMemoryStore::new());
            (store.clone(), store.clone(), store)
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = Arc::new(SessionManager::new(sessions, policy).with_clock(clock.clone()));

    // Cleanup expired sessions on startup, then periodically
    let _sweeper = spawn_sweeper(manager.clone(), config.session.sweep_interval());

    let verifier = TokenVerifier::new(secret)
        .with_window(config.session.link_window())
        .with_clock(clock.clone());

    let mut app_state = AppState::new(
        manager,
        identities,
        auth_log,
        verifier,
        clock,
        config.frontend_url.clone(),
        config.session.clone(),
    );
    match &config.line_channel_id {
        Some(channel_id) => {
            let id_tokens = LineIdTokenVerifier::new(channel_id, &config.line_verify_url)
                .expect("failed to build LINE verifier");
            app_state = app_state.with_id_token_verifier(Arc::new(id_tokens));
        }
        None => tracing::warn!("LINE_CHANNEL_ID not set; LIFF sign-in is disabled"),
    }
    let app_state = Arc::new(app_state);

    let app = linkgate_server::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
