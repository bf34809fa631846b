//! Database layer: migrations and the append-only event log.

use qf_settlement::LedgerEvent;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use crate::errors::Result;
use crate::events::EventRecord;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    // Create the file on first start.
    let url = if url.contains('?') || url == "sqlite::memory:" {
        url
    } else {
        format!("{url}?mode=rwc")
    };

    // Every in-memory connection is its own database.
    let max_connections = if url == "sqlite::memory:" { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Event writes
// ─────────────────────────────────────────────────────────

/// Persist `events`, the first of which sits at position `first_seq` in the
/// log. Rows whose `seq` already exists are ignored, so re-persisting after
/// a partial failure is safe.
pub async fn insert_events(
    pool: &SqlitePool,
    first_seq: usize,
    events: &[LedgerEvent],
) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;
    for (offset, event) in events.iter().enumerate() {
        let record = EventRecord::from_event(first_seq + offset, event)?;
        let rows_affected = sqlx::query(
            r#"
            INSERT OR IGNORE INTO events
                (seq, event_type, project_id, payload, ledger_timestamp, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(record.seq)
        .bind(&record.event_type)
        .bind(record.project_id)
        .bind(&record.payload)
        .bind(record.ledger_timestamp)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        count += rows_affected as usize;
    }
    tx.commit().await?;
    Ok(count)
}

// ─────────────────────────────────────────────────────────
// Event reads
// ─────────────────────────────────────────────────────────

/// Load and decode the whole log in `seq` order, for replay.
pub async fn load_all_events(pool: &SqlitePool) -> Result<Vec<LedgerEvent>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT seq, event_type, project_id, payload, ledger_timestamp, created_at
        FROM   events
        ORDER  BY seq ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(EventRecord::decode).collect()
}

/// Fetch all events for a given project, ordered by `seq` ascending.
pub async fn get_events_for_project(pool: &SqlitePool, project_id: u64) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT seq, event_type, project_id, payload, ledger_timestamp, created_at
        FROM   events
        WHERE  project_id = ?1
        ORDER  BY seq ASC
        "#,
    )
    .bind(project_id as i64)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch one page of the log, ordered by `seq` ascending.
pub async fn get_events_page(pool: &SqlitePool, offset: u32, limit: u32) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT seq, event_type, project_id, payload, ledger_timestamp, created_at
        FROM   events
        ORDER  BY seq ASC
        LIMIT  ?1 OFFSET ?2
        "#,
    )
    .bind(i64::from(limit))
    .bind(i64::from(offset))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
