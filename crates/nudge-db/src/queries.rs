use crate::Database;
use crate::models::{DeviceRow, UserRow};
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use tracing::warn;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Push devices --

    /// Atomic create-or-replace keyed by endpoint. `id` is only used when the
    /// endpoint has never been seen; an existing row keeps its original id.
    /// Returns the stored row and whether this call performed the first insert.
    pub fn upsert_device(
        &self,
        id: &str,
        user_id: &str,
        endpoint: &str,
        p256dh: &str,
        auth_secret: &str,
        browser: &str,
    ) -> Result<(DeviceRow, bool)> {
        self.with_conn_mut(|conn| {
            let existing: Option<(String, String)> = conn
                .query_row(
                    "SELECT id, user_id FROM push_devices WHERE endpoint = ?1",
                    [endpoint],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let created = match existing {
                Some((_, ref prev_owner)) => {
                    if prev_owner != user_id {
                        // A browser normally revokes and reissues its own
                        // endpoint; the same endpoint showing up under a new
                        // owner is unusual enough to leave a trace.
                        warn!(
                            "Endpoint reassigned from user {} to user {}",
                            prev_owner, user_id
                        );
                    }
                    conn.execute(
                        "UPDATE push_devices
                         SET user_id = ?1, p256dh = ?2, auth_secret = ?3, browser = ?4,
                             active = 1, updated_at = datetime('now')
                         WHERE endpoint = ?5",
                        rusqlite::params![user_id, p256dh, auth_secret, browser, endpoint],
                    )?;
                    false
                }
                None => {
                    conn.execute(
                        "INSERT INTO push_devices (id, user_id, endpoint, p256dh, auth_secret, browser)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        rusqlite::params![id, user_id, endpoint, p256dh, auth_secret, browser],
                    )?;
                    true
                }
            };

            let row = query_device_by_endpoint(conn, endpoint)?
                .ok_or_else(|| anyhow!("Device row vanished after upsert: {}", endpoint))?;
            Ok((row, created))
        })
    }

    /// All delivery-eligible devices for a user. Unordered.
    pub fn list_active_devices(&self, user_id: &str) -> Result<Vec<DeviceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, endpoint, p256dh, auth_secret, browser, active, created_at, updated_at
                 FROM push_devices
                 WHERE user_id = ?1 AND active = 1",
            )?;

            let rows = stmt
                .query_map([user_id], device_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Ownership-scoped delete. Removes nothing when the stored owner does
    /// not match, so the count never reveals who else holds the endpoint.
    pub fn delete_device(&self, endpoint: &str, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let count = conn.execute(
                "DELETE FROM push_devices WHERE endpoint = ?1 AND user_id = ?2",
                [endpoint, user_id],
            )?;
            Ok(count)
        })
    }

    /// Soft-disable a device, typically after the push service reported the
    /// subscription expired. The row stays for auditing; it just stops being
    /// targeted.
    pub fn deactivate_device(&self, endpoint: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let count = conn.execute(
                "UPDATE push_devices SET active = 0, updated_at = datetime('now')
                 WHERE endpoint = ?1",
                [endpoint],
            )?;
            Ok(count)
        })
    }

    #[cfg(test)]
    fn get_device_by_endpoint(&self, endpoint: &str) -> Result<Option<DeviceRow>> {
        self.with_conn(|conn| query_device_by_endpoint(conn, endpoint))
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_device_by_endpoint(conn: &Connection, endpoint: &str) -> Result<Option<DeviceRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, endpoint, p256dh, auth_secret, browser, active, created_at, updated_at
         FROM push_devices WHERE endpoint = ?1",
    )?;

    let row = stmt.query_row([endpoint], device_from_row).optional()?;
    Ok(row)
}

fn device_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<DeviceRow, rusqlite::Error> {
    Ok(DeviceRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        endpoint: row.get(2)?,
        p256dh: row.get(3)?,
        auth_secret: row.get(4)?,
        browser: row.get(5)?,
        active: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
