use std::net::SocketAddr;
use std::time::Duration;

use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glou::{alerts, config, db, server, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (embedded defaults -> glou.toml -> env/.env)
    let app_cfg = config::load()?;

    // Logging (stdout + daily file rotation under ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "glou.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| app_cfg.logging.level.clone().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Keep the guards alive so the non-blocking writers flush on exit
    let _log_guards = (stdout_guard, file_guard);

    for warning in config::warnings(&app_cfg) {
        tracing::warn!("{}", warning);
    }

    let db_url = &app_cfg.database.url;
    config::ensure_sqlite_parent_dir(db_url)?;
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        info!("Creating SQLite database at {}", db_url);
        Sqlite::create_database(db_url).await?;
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                let _ = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect(db_url)
        .await?;

    db::init_db(&pool).await?;

    let state = AppState::new(pool.clone(), app_cfg.clone())?;

    let shutdown = CancellationToken::new();
    let generator = alerts::spawn_alert_generator(
        pool.clone(),
        Duration::from_secs(app_cfg.alerts.interval_seconds.max(1)),
        shutdown.clone(),
    );

    let app = server::build_app(state);

    let addr: SocketAddr = format!("{}:{}", app_cfg.server.host, app_cfg.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", app_cfg.server.host, app_cfg.server.port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Glou listening on http://{}", listener.local_addr()?);
    let signal_token = shutdown.clone();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = generator.await {
        tracing::warn!("Alert generator did not stop cleanly: {}", e);
    }
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
