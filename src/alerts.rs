//! Periodic stock and drinking-window alerts.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::store::{
    alerts::{self, AlertType},
    wines::{self, Wine},
};

pub const LOW_STOCK_THRESHOLD: i64 = 2;

fn parse_stored_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
}

/// Alerts a wine qualifies for on `today`, with their messages.
fn due_alerts(wine: &Wine, today: NaiveDate) -> Vec<(AlertType, String)> {
    let mut due = Vec::new();
    if wine.quantity < LOW_STOCK_THRESHOLD {
        due.push((AlertType::LowStock, format!("Low stock: {} ({} left)", wine.name, wine.quantity)));
    }
    if let Some(min) = parse_stored_date(wine.min_apogee_date.as_deref()) {
        if min <= today {
            due.push((AlertType::ApogeeReached, format!("{} has reached its drinking window", wine.name)));
        }
    }
    if let Some(max) = parse_stored_date(wine.max_apogee_date.as_deref()) {
        if max < today {
            due.push((AlertType::ApogeeEnded, format!("{} is past its drinking window", wine.name)));
        }
    }
    due
}

/// Creates every due alert that is not already active. Returns how many were created.
pub async fn generate_alerts(pool: &SqlitePool, today: NaiveDate) -> AppResult<usize> {
    let mut created = 0;
    for wine in wines::list_wines(pool).await? {
        for (alert_type, message) in due_alerts(&wine, today) {
            if alerts::has_active(pool, wine.id, alert_type).await? {
                continue;
            }
            alerts::create_alert(pool, wine.id, alert_type, &message).await?;
            created += 1;
        }
    }
    Ok(created)
}

/// Runs [`generate_alerts`] immediately and then on every tick until `cancel` fires.
pub fn spawn_alert_generator(pool: SqlitePool, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Alert generator stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match generate_alerts(&pool, Utc::now().date_naive()).await {
                        Ok(0) => tracing::debug!("Alert generation: nothing new"),
                        Ok(n) => tracing::info!(created = n, "Alert generation finished"),
                        Err(e) => tracing::error!("Alert generation failed: {}", e),
                    }
                }
            }
        }
    })
}
