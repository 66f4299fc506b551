use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use blog_service::config::{Config, StorageBackend};
use blog_service::db::{create_pool, Store};
use blog_service::media::LocalMediaStorage;
use blog_service::middleware::{issue_token, AuthMiddleware};
use blog_service::{handlers, metrics, AppState};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEV_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    store: &'static str,
    message: String,
    latency_ms: u64,
    timestamp: String,
}

async fn health_summary(state: web::Data<AppState>) -> HttpResponse {
    match state.store.health_check().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "blog-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("store check failed: {}", e),
            "service": "blog-service"
        })),
    }
}

async fn readiness_summary(state: web::Data<AppState>) -> HttpResponse {
    let start = Instant::now();
    let result = state.store.health_check().await;
    let response = ReadinessResponse {
        ready: result.is_ok(),
        store: if result.is_ok() { "healthy" } else { "unhealthy" },
        message: match &result {
            Ok(()) => "store reachable".to_string(),
            Err(e) => e.to_string(),
        },
        latency_ms: start.elapsed().as_millis() as u64,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    if response.ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Blog Service
///
/// Serves the blogging pages at `/` and the REST API at `/api/v1/`.
///
/// # Subcommands
///
/// - `healthcheck`: call `/health` on the configured port (container healthcheck)
/// - `issue-token <user_id>`: print a bearer token signed with `JWT_SECRET`
#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    {
        let mut args = std::env::args();
        let _bin = args.next();
        match args.next().as_deref() {
            Some("healthcheck") => {
                let url = format!("http://127.0.0.1:{}/health", config.app.port);
                return match reqwest::Client::new().get(&url).send().await {
                    Ok(resp) if resp.status().is_success() => Ok(()),
                    Ok(resp) => {
                        eprintln!("healthcheck HTTP status: {}", resp.status());
                        Err(io::Error::new(io::ErrorKind::Other, "healthcheck failed"))
                    }
                    Err(e) => {
                        eprintln!("healthcheck HTTP error: {}", e);
                        Err(io::Error::new(io::ErrorKind::Other, "healthcheck error"))
                    }
                };
            }
            Some("issue-token") => {
                let user_id = args
                    .next()
                    .and_then(|raw| raw.parse::<i64>().ok())
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidInput, "usage: issue-token <user_id>")
                    })?;
                let token = issue_token(&config.auth.jwt_secret, user_id, DEV_TOKEN_TTL_SECS)
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                println!("{}", token);
                return Ok(());
            }
            _ => {}
        }
    }

    init_tracing();

    tracing::info!("Starting blog-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);
    if config.app.is_production() && config.database.backend == StorageBackend::Memory {
        tracing::warn!("In-memory store selected in production");
    }

    let store = match config.database.backend {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database).await.map_err(|e| {
                tracing::error!("Database connection failed: {}", e);
                io::Error::new(io::ErrorKind::Other, e.to_string())
            })?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    tracing::error!("Database migration failed: {}", e);
                    io::Error::new(io::ErrorKind::Other, e.to_string())
                })?;
            Store::postgres(pool)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Store::in_memory()
        }
    };

    let media = Arc::new(LocalMediaStorage::new(&config.media.root));
    tracing::info!(root = %media.root().display(), "Media storage ready");

    let state = web::Data::new(AppState::from_config(store, media, &config));
    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    let allowed_origins = config.cors.allowed_origins.clone();
    let jwt_secret: Arc<str> = config.auth.jwt_secret.clone().into();

    tracing::info!("Starting HTTP server on {}", bind_address);

    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else if !origin.is_empty() {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(AuthMiddleware::new(jwt_secret.clone()))
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .route("/health", web::get().to(health_summary))
            .route("/health/ready", web::get().to(readiness_summary))
            .route("/health/live", web::get().to(liveness_check))
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .run();

    let server_handle = server.handle();
    let mut server_task = tokio::spawn(server);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => tracing::info!("HTTP server stopped"),
                Ok(Err(e)) => {
                    tracing::error!("HTTP server failed: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("HTTP server task join error: {}", e);
                    return Err(io::Error::new(io::ErrorKind::Other, e.to_string()));
                }
            }
        }
        _ = &mut shutdown => {
            tracing::info!("Shutdown signal received");
            server_handle.stop(true).await;
            if let Err(e) = server_task.await {
                tracing::error!("HTTP server task join error: {}", e);
            }
        }
    }

    tracing::info!("Blog-service shutting down");
    Ok(())
}
