use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per push endpoint. The endpoint is the natural key and is
        -- unique across all owners; re-registration under a different owner
        -- reassigns the row.
        CREATE TABLE IF NOT EXISTS push_devices (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            endpoint    TEXT NOT NULL UNIQUE,
            p256dh      TEXT NOT NULL,
            auth_secret TEXT NOT NULL,
            browser     TEXT NOT NULL DEFAULT 'unknown',
            active      INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_push_devices_owner
            ON push_devices(user_id, active);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
