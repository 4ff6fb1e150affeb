use std::sync::Arc;

use axum::http::HeaderValue;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brokerdesk::config::Config;
use brokerdesk::crypto::hash_password;
use brokerdesk::db::{AppState, DbPool, create_pool, init_db, queries};
use brokerdesk::email::EmailService;
use brokerdesk::error::{AppError, Result};
use brokerdesk::feed::ChangeFeed;
use brokerdesk::handlers;
use brokerdesk::icons::IconSuggester;
use brokerdesk::jwt::SessionKeys;
use brokerdesk::models::{
    CreateCategory, CreateService, CreateServicePackage, CreateUser, UserRole,
};
use brokerdesk::payments::StripeClient;
use brokerdesk::reminders::spawn_reminder_task;

/// Stripe retries failed deliveries for about three days.
const WEBHOOK_EVENT_RETENTION_DAYS: i64 = 7;

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "brokerdesk")]
#[command(about = "Client and admin portal backend for an AI brokerage")]
struct Cli {
    /// Seed the database with dev data (admin, client, workspace, catalog)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

const DEV_PASSWORD: &str = "brokerdesk-dev";

/// Seeds the database with dev data for local testing.
/// Only runs in dev mode and when no accounts exist.
fn seed_dev_data(db: &DbPool) -> Result<()> {
    let mut conn = db.get()?;

    let (accounts, _) = queries::list_accounts_paginated(&conn, 1, 0)?;
    if !accounts.is_empty() {
        tracing::info!("Database already has data, skipping seed");
        return Ok(());
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let password_hash = hash_password(DEV_PASSWORD)?;
    let admin = queries::create_user(
        &mut conn,
        &CreateUser {
            email: "admin@brokerdesk.local".to_string(),
            password: DEV_PASSWORD.to_string(),
            full_name: "Dev Admin".to_string(),
            phone: None,
            role: UserRole::Admin,
            email_confirmed: true,
        },
        Some(&password_hash),
    )?;
    let client = queries::create_user(
        &mut conn,
        &CreateUser {
            email: "client@brokerdesk.local".to_string(),
            password: DEV_PASSWORD.to_string(),
            full_name: "Dev Client".to_string(),
            phone: Some("+10000000000".to_string()),
            role: UserRole::Client,
            email_confirmed: true,
        },
        Some(&password_hash),
    )?;
    let workspace = queries::ensure_workspace(&mut conn, &client.id, "Dev Client's workspace")?;

    let category = queries::create_category(
        &conn,
        &CreateCategory {
            name_en: "AI Consulting".to_string(),
            name_ar: Some("استشارات الذكاء الاصطناعي".to_string()),
            description_en: Some("Strategy and implementation advice".to_string()),
            description_ar: None,
            icon: None,
            is_active: true,
        },
        "Brain",
    )?;
    let service = queries::create_service(
        &conn,
        &CreateService {
            category_id: Some(category.id.clone()),
            name_en: "Discovery session".to_string(),
            name_ar: Some("جلسة استكشاف".to_string()),
            description_en: Some("One hour with a senior consultant".to_string()),
            description_ar: None,
            price_cents: 15000,
            currency: "usd".to_string(),
            is_active: true,
        },
    )?;
    let package = queries::create_package(
        &conn,
        &CreateServicePackage {
            service_id: service.id.clone(),
            name_en: "Starter".to_string(),
            name_ar: Some("المبتدئ".to_string()),
            description_en: Some("Discovery plus a written roadmap".to_string()),
            description_ar: None,
            price_cents: 50000,
            currency: "usd".to_string(),
            features: vec!["Discovery session".to_string(), "Roadmap document".to_string()],
            is_active: true,
        },
    )?;
    queries::upsert_site_setting(
        &conn,
        "hero.title",
        &serde_json::json!("Put AI to work for your business"),
        &admin.id,
    )?;

    tracing::info!("Admin: {} / {}", admin.email, DEV_PASSWORD);
    tracing::info!("Client: {} / {}", client.email, DEV_PASSWORD);
    tracing::info!("Workspace: {} (id: {})", workspace.name, workspace.owner_id);
    tracing::info!("Service: {} (id: {})", service.name_en, service.id);
    tracing::info!("Package: {} (id: {})", package.name_en, package.id);
    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");
    Ok(())
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origins.is_empty() && config.dev_mode {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn stripe_client(config: &Config) -> Option<Arc<StripeClient>> {
    match (&config.stripe_secret_key, &config.stripe_webhook_secret) {
        (Some(secret), Some(webhook_secret)) => {
            Some(Arc::new(StripeClient::new(secret, webhook_secret)))
        }
        (Some(_), None) => {
            tracing::warn!("STRIPE_SECRET_KEY set without STRIPE_WEBHOOK_SECRET, payments disabled");
            None
        }
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brokerdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });
    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    if config.resend_api_key.is_none() {
        tracing::warn!("RESEND_API_KEY not set, emails will be skipped");
    }
    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        sessions: Arc::new(SessionKeys::new(
            config.jwt_secret.as_bytes(),
            config.session_ttl_hours,
        )),
        email_service: Arc::new(EmailService::new(
            config.resend_api_key.clone(),
            config.email_from.clone(),
        )),
        stripe: stripe_client(&config),
        icons: Arc::new(IconSuggester::new(
            &config.ai_api_url,
            config.ai_api_key.clone(),
            &config.ai_model,
        )),
        feed: ChangeFeed::new(),
        invite_expiry_days: config.invite_expiry_days,
    };

    // Purge old webhook dedupe records on startup
    match state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| queries::purge_old_webhook_events(&conn, WEBHOOK_EVENT_RETENTION_DAYS))
    {
        Ok(count) if count > 0 => tracing::info!("Purged {} old webhook event records", count),
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to purge webhook events: {}", e),
    }

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set BROKERDESK_ENV=dev)");
        } else if let Err(e) = seed_dev_data(&state.db) {
            tracing::error!("Failed to seed dev data: {}", e);
        }
    }

    spawn_reminder_task(state.clone(), config.reminder_interval_secs);

    let app = handlers::app_router(state.clone(), config.rate_limit)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Brokerdesk server listening on {}", addr);

    // Connect info feeds the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
