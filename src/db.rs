use sqlx::SqlitePool;

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS setup_wizard (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            completed INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    // single row, id = 1
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            document TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS password_reset_tokens (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            token TEXT NOT NULL UNIQUE,
            expires_at TEXT NOT NULL,
            used INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS caves (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            model TEXT NULL,
            location TEXT NOT NULL DEFAULT '',
            capacity INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS cells (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cave_id INTEGER NOT NULL,
            location TEXT NOT NULL,
            capacity INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(cave_id) REFERENCES caves(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS wines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            producer TEXT NULL,
            region TEXT NOT NULL,
            vintage INTEGER NULL,
            wine_type TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0,
            min_apogee_date TEXT NULL,
            max_apogee_date TEXT NULL,
            comments TEXT NULL,
            cell_id INTEGER NULL REFERENCES cells(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    // Databases created before wines had a location
    if let Err(e) =
        sqlx::query("ALTER TABLE wines ADD COLUMN cell_id INTEGER NULL REFERENCES cells(id) ON DELETE SET NULL")
            .execute(pool)
            .await
    {
        match &e {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_lowercase();
                if !msg.contains("duplicate") && !msg.contains("already exists") {
                    tracing::error!("Failed to add cell_id column to wines: {}", e);
                    return Err(anyhow::anyhow!("Migration failed: {}", e));
                }
            }
            _ => return Err(anyhow::anyhow!("Migration failed: {}", e)),
        }
    }

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS alerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wine_id INTEGER NOT NULL,
            alert_type TEXT NOT NULL,
            message TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            dismissed_at TEXT NULL,
            FOREIGN KEY(wine_id) REFERENCES wines(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS consumption_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wine_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            rating REAL NULL,
            comment TEXT NULL,
            reason TEXT NULL,
            date TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(wine_id) REFERENCES wines(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_setup_wizard_created", "CREATE INDEX IF NOT EXISTS idx_setup_wizard_created ON setup_wizard(created_at DESC, id DESC)"),
        ("idx_reset_tokens_user", "CREATE INDEX IF NOT EXISTS idx_reset_tokens_user ON password_reset_tokens(user_id)"),
        ("idx_wines_name", "CREATE INDEX IF NOT EXISTS idx_wines_name ON wines(name)"),
        ("idx_wines_cell", "CREATE INDEX IF NOT EXISTS idx_wines_cell ON wines(cell_id)"),
        ("idx_cells_cave", "CREATE INDEX IF NOT EXISTS idx_cells_cave ON cells(cave_id)"),
        ("idx_consumption_wine_date", "CREATE INDEX IF NOT EXISTS idx_consumption_wine_date ON consumption_history(wine_id, date DESC)"),
        ("idx_alerts_wine_type_status", "CREATE INDEX IF NOT EXISTS idx_alerts_wine_type_status ON alerts(wine_id, alert_type, status)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if msg.contains("already exists") || msg.contains("duplicate") {
                        tracing::debug!("Index {} already exists, skipping", name);
                    } else {
                        tracing::warn!("Failed to create index {}: {}", name, e);
                    }
                }
                _ => {
                    tracing::warn!("Failed to create index {}: {}", name, e);
                }
            }
        }
    }

    Ok(())
}
