use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tipjar::config::Config;
use tipjar::csrf::OriginGuard;
use tipjar::db::{create_pool, init_db, queries, AppState};
use tipjar::gateway::GatewayClient;
use tipjar::handlers;
use tipjar::models::{CreateCreator, CreateUser};
use tipjar::rate_limit::{spawn_sweep_task, RateLimiter};

/// Default gateway API endpoint; override for sandbox/self-hosted gateways.
const DEFAULT_GATEWAY_URL: &str = "https://api.gateway.example.com";

#[derive(Parser, Debug)]
#[command(name = "tipjar")]
#[command(about = "Creator-monetization payment backend")]
struct Cli {
    /// Seed the database with dev data (user, session, creator)
    #[arg(long)]
    seed: bool,
}

/// Seeds a supporter, a creator, and a session token for local testing.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .expect("Failed to count users");
    if existing > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    let supporter = queries::create_user(
        &conn,
        &CreateUser {
            email: "supporter@tipjar.local".to_string(),
            name: "Dev Supporter".to_string(),
        },
    )
    .expect("Failed to create dev supporter");

    let creator_user = queries::create_user(
        &conn,
        &CreateUser {
            email: "creator@tipjar.local".to_string(),
            name: "Dev Creator".to_string(),
        },
    )
    .expect("Failed to create dev creator user");

    let creator = queries::create_creator(
        &conn,
        &CreateCreator {
            user_id: creator_user.id.clone(),
            display_name: "Dev Creator".to_string(),
            webhook_secret: Some("dev_webhook_secret".to_string()),
        },
    )
    .expect("Failed to create dev creator");

    let session = queries::create_session(&conn, &supporter.id, 30 * 86400)
        .expect("Failed to create dev session");

    tracing::info!("============================================");
    tracing::info!("SEEDED DEV DATA");
    tracing::info!("Supporter session token: {}", session.token);
    tracing::info!("Creator id: {}", creator.id);
    tracing::info!("Webhook secret: dev_webhook_secret");
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tipjar=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.gateway_key_secret.is_empty() {
        tracing::warn!("GATEWAY_KEY_SECRET is not set; signature verification will reject everything");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let gateway_url =
        std::env::var("GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());

    let state = AppState {
        db: db_pool,
        gateway: GatewayClient::new(
            &gateway_url,
            &config.gateway_key_id,
            &config.gateway_key_secret,
        ),
        limiter: RateLimiter::new(config.rate_limit),
        origin_guard: OriginGuard::new(&config.app_url, &config.production_url),
        max_amount_minor: config.max_amount_minor,
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set TIPJAR_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // Periodic sweep keeps the in-memory rate limit map bounded.
    spawn_sweep_task(state.limiter.clone());

    let app: Router = handlers::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Tipjar server listening on {}", addr);

    // Connect-info is required for IP-keyed webhook rate limiting.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
