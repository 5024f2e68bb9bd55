/// Database row types — these map directly to SQLite rows.
/// Distinct from pmap-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct MarkerRow {
    pub id: i64,
    pub user_id: i64,
    pub user_email: Option<String>,
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CommentRow {
    pub id: i64,
    pub marker_id: i64,
    pub user_id: i64,
    pub user_email: Option<String>,
    pub text: String,
    pub created_at: String,
}

/// Per-user marker counts for the profile page.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MarkerStats {
    pub total: u64,
    pub pending: u64,
    pub resolved: u64,
}
