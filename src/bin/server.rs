use std::{fs::OpenOptions, net::SocketAddr, process::exit, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use personal_finance::{AppState, AuthConfig, build_router, graceful_shutdown, logging_middleware};

/// The REST API server for personal finances.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// How many seconds a token may sit unused before its session expires.
    #[arg(long, env = "SESSION_EXPIRATION_SECS", default_value_t = 1800)]
    session_expiration_secs: u64,

    /// How many seconds between sweeps of expired sessions.
    #[arg(long, env = "SESSION_SWEEP_INTERVAL_SECS", default_value_t = 600)]
    session_sweep_interval_secs: u64,

    /// The issuer written into and required of every token.
    #[arg(long, env = "TOKEN_ISSUER", default_value = "personal")]
    token_issuer: String,

    /// The number of failed log-ins in a row after which a client IP is blocked.
    #[arg(long, env = "MAX_LOGIN_ATTEMPTS")]
    max_login_attempts: u32,

    /// How many seconds a client IP stays blocked after its latest failed log-in.
    #[arg(long, env = "LOGIN_BLOCK_SECS")]
    login_block_secs: u64,

    /// Take the client IP from the `X-Forwarded-For` header set by a reverse proxy.
    #[arg(long, env = "TRUST_FORWARDED_FOR")]
    trust_forwarded_for: bool,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            session_expiration: Duration::from_secs(self.session_expiration_secs),
            sweep_interval: Duration::from_secs(self.session_sweep_interval_secs),
            token_issuer: self.token_issuer.clone(),
            max_login_attempts: self.max_login_attempts,
            login_block_duration: Duration::from_secs(self.login_block_secs),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    if args.max_login_attempts == 0 {
        tracing::error!("--max-login-attempts must be at least 1");
        exit(1);
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let conn = match Connection::open(&args.db_path) {
        Ok(conn) => conn,
        Err(error) => {
            tracing::error!("Could not open the database at {}: {error}", args.db_path);
            exit(1);
        }
    };

    let auth_config = args.auth_config();
    let sweep_interval = auth_config.sweep_interval;
    let state = match AppState::new(conn, auth_config) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not initialize the database: {error}");
            exit(1);
        }
    };

    let sweeper = state.session_manager.spawn_sweeper(sweep_interval);

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(state).layer(middleware::from_fn(logging_middleware)),
    );

    tracing::info!("HTTP server listening on {}", addr);
    let result = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await;

    sweeper.stop().await;

    if let Err(error) = result {
        tracing::error!("Server stopped with an error: {error}");
        exit(1);
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
    {
        Ok(log_file) => log_file,
        Err(error) => {
            eprintln!("Could not create log file: {error}");
            exit(1);
        }
    };

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(filter::LevelFilter::DEBUG.into())
                        .from_env_lossy(),
                ),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged where they are mapped to responses.
        .on_failure(());

    router.layer(tracing_layer)
}
