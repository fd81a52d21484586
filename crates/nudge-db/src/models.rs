/// Database row types — these map directly to SQLite rows.
/// Distinct from the nudge-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct DeviceRow {
    pub id: String,
    pub user_id: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth_secret: String,
    pub browser: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}
