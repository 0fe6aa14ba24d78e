use std::{
    io::{BufRead, IsTerminal},
    sync::Arc,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use clap::Parser;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

mod auth;
mod config;
mod db;
mod models;
pub mod observability;
mod retention;
mod routes;
pub mod services;

#[cfg(test)]
mod tests;

const DEFAULT_CONFIG_PATH: &str = "cinebaby.toml";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub db: Option<Arc<db::DbPool>>,
    pub services: Option<services::Services>,
    /// Video store. Only built when a database is configured.
    pub blobs: Option<Arc<dyn services::BlobStore>>,
    pub cleanup: Option<retention::VideoCleanup>,
    /// Signs and verifies session cookies.
    pub signer: auth::CookieSigner,
    /// Task tracker for background tasks.
    /// Ensures spawned tasks complete during graceful shutdown.
    pub task_tracker: TaskTracker,
    /// Cancelled when the server starts shutting down.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub async fn new(config: config::AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let signer = auth::CookieSigner::new(config.auth.session_secret.as_bytes())?;

        let db = if config.database.is_none() {
            tracing::warn!("No database configured, clinic and patient APIs are disabled");
            None
        } else {
            let pool = db::DbPool::from_config(&config.database).await?;
            if config.database.run_migrations() {
                pool.run_migrations().await?;
            }
            Some(Arc::new(pool))
        };

        let (services, blobs, cleanup) = match &db {
            Some(db) => {
                let blobs = services::create_blob_store(
                    &config.storage.videos,
                    config.server.public_base_url(),
                )
                .await?;
                tracing::info!(backend = blobs.backend_name(), "Video storage ready");

                let services = services::Services::new(db.clone(), blobs.clone());
                let cleanup = retention::VideoCleanup::new(
                    db.videos(),
                    blobs.clone(),
                    config.retention.clone(),
                );
                (Some(services), Some(blobs), Some(cleanup))
            }
            None => (None, None, None),
        };

        Ok(Self {
            config: Arc::new(config),
            db,
            services,
            blobs,
            cleanup,
            signer,
            task_tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "CineBaby clinic video backend", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./cinebaby.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Delete old videos once and print the report as JSON
    Cleanup,
    /// Print an argon2 hash for `auth.admin.password_hash`
    ///
    /// Reads the password from stdin when not given.
    HashPassword {
        #[arg(long)]
        password: Option<String>,
    },
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

pub fn build_app(config: &config::AppConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .route("/health/ready", get(routes::health::readiness))
        .nest("/api", routes::api_routes());

    // Scheduler functions answer their own preflight with a fixed CORS policy,
    // so they are merged after the configurable CORS layer.
    let functions = Router::new().route(
        "/functions/cleanup-old-videos",
        post(routes::cleanup::cleanup_old_videos).options(routes::cleanup::preflight),
    );

    // Filesystem-backed videos are published by this server
    if state.blobs.is_some()
        && config.storage.videos.backend == config::VideoStorageBackend::Filesystem
    {
        let fs = config.storage.videos.filesystem_or_default();
        tracing::debug!(path = %fs.path, "Serving videos at /media/videos");
        app = app.nest_service("/media/videos", ServeDir::new(fs.path));
    }

    app = app.layer(tower_cookies::CookieManagerLayer::new());

    // Applied in reverse order, so CORS runs before the cookie layer
    if let Some(cors_layer) = config.server.cors.clone().into_layer() {
        app = app.layer(cors_layer);
    }

    app.merge(functions)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Migrate) => run_migrate(args.config.as_deref()).await,
        Some(Command::Cleanup) => run_cleanup(args.config.as_deref()).await,
        Some(Command::HashPassword { password }) => run_hash_password(password),
        Some(Command::Schema { output }) => {
            #[cfg(feature = "json-schema")]
            run_schema_export(output);
            #[cfg(not(feature = "json-schema"))]
            {
                let _ = output;
                eprintln!("Error: JSON schema export requires the 'json-schema' feature");
                std::process::exit(1);
            }
        }
        Some(Command::Serve) | None => run_server(args.config.as_deref()).await,
    }
}

/// Load the config file or exit with a message.
fn load_config(explicit_config_path: Option<&str>) -> config::AppConfig {
    let path = explicit_config_path.unwrap_or(DEFAULT_CONFIG_PATH);
    match config::AppConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn init_tracing_or_exit(config: &config::AppConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Failed to initialize tracing: {e}");
        std::process::exit(1);
    }
}

async fn build_state_or_exit(config: config::AppConfig) -> AppState {
    match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            eprintln!("Error: Failed to initialize application state: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_server(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);
    init_tracing_or_exit(&config);

    tracing::info!(
        config_file = explicit_config_path.unwrap_or(DEFAULT_CONFIG_PATH),
        "Starting CineBaby"
    );
    if config.auth.admin.is_none() {
        tracing::warn!("auth.admin is not configured, admin login is disabled");
    }
    if !config.auth.secure_cookies {
        tracing::warn!("Session cookies are not marked Secure; use only behind plain-HTTP development setups");
    }

    let state = build_state_or_exit(config.clone()).await;

    if let Some(cleanup) = state.cleanup.clone() {
        let retention_config = config.retention.clone();
        let shutdown = state.shutdown.clone();
        state.task_tracker.spawn(async move {
            retention::start_retention_worker(cleanup, retention_config, shutdown).await;
        });
    }

    let task_tracker = state.task_tracker.clone();
    let shutdown = state.shutdown.clone();
    let app = build_app(&config, state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, address = %bind_addr, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on http://{}", bind_addr);

    // Graceful shutdown: wait for SIGINT/SIGTERM, then wait for all background tasks
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(task_tracker, shutdown))
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal(task_tracker: TaskTracker, shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, waiting for background tasks to complete...");

    shutdown.cancel();
    task_tracker.close();

    let wait_result =
        tokio::time::timeout(std::time::Duration::from_secs(30), task_tracker.wait()).await;

    match wait_result {
        Ok(()) => tracing::info!("All background tasks completed"),
        Err(_) => {
            tracing::warn!("Timeout waiting for background tasks, some may not have completed")
        }
    }

    tracing::info!("Shutdown complete");
}

async fn run_migrate(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);
    init_tracing_or_exit(&config);

    if config.database.is_none() {
        eprintln!("Error: Database is not configured. Nothing to migrate.");
        std::process::exit(1);
    }

    match db::DbPool::from_config(&config.database).await {
        Ok(pool) => match pool.run_migrations().await {
            Ok(()) => {
                tracing::info!("Database migrations completed successfully");
            }
            Err(e) => {
                tracing::error!(error = %e, "Database migrations failed");
                eprintln!("Error: Database migrations failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    }
}

/// One retention run, for cron-style schedulers without HTTP access.
async fn run_cleanup(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);
    init_tracing_or_exit(&config);

    let state = build_state_or_exit(config).await;
    let Some(cleanup) = state.cleanup else {
        eprintln!("Error: Database is not configured. Nothing to clean up.");
        std::process::exit(1);
    };

    let (body, ok) = match cleanup.run().await {
        Ok(report) => (serde_json::to_value(report.to_response()), true),
        Err(e) => (
            Ok(serde_json::json!({ "success": false, "error": e.to_string() })),
            false,
        ),
    };

    match body.and_then(|b| serde_json::to_string_pretty(&b)) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error: Failed to serialize cleanup report: {e}");
            std::process::exit(1);
        }
    }
    if !ok {
        std::process::exit(1);
    }
}

fn run_hash_password(password: Option<String>) {
    let password = match password {
        Some(p) => p,
        None => {
            if std::io::stdin().is_terminal() {
                eprintln!("Password:");
            }
            let mut line = String::new();
            if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
                eprintln!("Error: Failed to read password: {e}");
                std::process::exit(1);
            }
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        eprintln!("Error: Password cannot be empty");
        std::process::exit(1);
    }

    match auth::hash_password(&password) {
        Ok(hash) => println!("{hash}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "json-schema")]
fn run_schema_export(output: Option<String>) {
    let content = match config::AppConfig::json_schema_string() {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: Failed to serialize schema: {e}");
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &content) {
                eprintln!("Error: Failed to write to {}: {}", path, e);
                std::process::exit(1);
            }
            eprintln!("Config JSON schema written to {}", path);
        }
        None => {
            println!("{}", content);
        }
    }
}
