//! Estate Ledger API
//!
//! Record-management backend for properties, insured vehicles and insurance
//! policies. Every resource route sits behind bearer-token authentication and
//! a role permission matrix.

mod auth;
mod config;
mod db;
mod error;
mod models;
mod routes;
mod state;
mod store;
mod users;

use crate::auth::Role;
use crate::config::Settings;
use crate::db::service::{PgCredentialStore, PgDocumentStore};
use crate::routes::create_router;
use crate::state::AppState;
use crate::store::{CredentialStore, DocumentStore, MemoryCredentialStore, MemoryDocumentStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting Estate Ledger API...");

    // Load configuration; a missing JWT_SECRET stops startup here
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let (credentials, records): (Arc<dyn CredentialStore>, Arc<dyn DocumentStore>) =
        match &settings.database {
            Some(database) => {
                let pool = db::init_pool(database).await?;
                info!("✅ Database pool created successfully");

                db::create_tables(&pool).await?;

                (
                    Arc::new(PgCredentialStore::new(pool.clone())),
                    Arc::new(PgDocumentStore::new(pool)),
                )
            }
            None => {
                warn!("⚠️  No database configured, using the in-memory store (data is lost on restart)");
                (
                    Arc::new(MemoryCredentialStore::new()),
                    Arc::new(MemoryDocumentStore::new()),
                )
            }
        };

    let state = Arc::new(AppState::new(credentials, records, &settings.auth));
    for role in Role::ALL {
        let ops: Vec<_> = state.permissions.allowed(role).map(|op| op.verb()).collect();
        debug!("🔐 {} may {}", role, ops.join(", "));
    }

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Authentication ───");
    info!("   POST /api/auth/register        - Register new account");
    info!("   POST /api/auth/login           - Login with email/password");
    info!("   GET  /api/auth/me              - Get current user");
    info!("");
    info!("   ─── Records (bearer token required) ───");
    info!("   GET|POST|PUT|DELETE /api/properties");
    info!("   GET|POST|PUT|DELETE /api/insuredcars");
    info!("   GET|POST|PUT|DELETE /api/propertyinsured");
    info!("   GET|POST|PUT|DELETE /api/insuredcover");
    info!("   GET  /api/insurance            - All insurance records with counts");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,estate_ledger=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
