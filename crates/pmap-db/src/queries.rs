use crate::models::{CommentRow, MarkerRow, MarkerStats, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};

const MARKER_COLUMNS: &str =
    "m.id, m.user_id, u.email, m.text, m.latitude, m.longitude, m.image_url, m.status, m.created_at, m.updated_at";

const COMMENT_COLUMNS: &str = "c.id, c.marker_id, c.user_id, u.email, c.text, c.created_at";

impl Database {
    // -- Users --

    /// Insert a user and return its id, or `None` when the email is taken.
    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (email, password) VALUES (?1, ?2)",
                (email, password_hash),
            ) {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, email, password, created_at FROM users WHERE email = ?1", email)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, email, password, created_at FROM users WHERE id = ?1", id)
        })
    }

    // -- Markers --

    /// Insert a marker with status `pending` and return its id.
    pub fn insert_marker(
        &self,
        user_id: i64,
        text: &str,
        latitude: f64,
        longitude: f64,
        image_url: Option<&str>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO markers (user_id, text, latitude, longitude, image_url, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
                rusqlite::params![user_id, text, latitude, longitude, image_url],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// All markers, newest first, with the author's email joined in.
    pub fn get_markers(&self) -> Result<Vec<MarkerRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MARKER_COLUMNS}
                 FROM markers m
                 LEFT JOIN users u ON m.user_id = u.id
                 ORDER BY m.created_at DESC, m.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], marker_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_marker(&self, id: i64) -> Result<Option<MarkerRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MARKER_COLUMNS}
                 FROM markers m
                 LEFT JOIN users u ON m.user_id = u.id
                 WHERE m.id = ?1"
            );
            conn.query_row(&sql, [id], marker_from_row).optional()
        })
    }

    /// Returns false when no such marker existed.
    pub fn delete_marker(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM markers WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    pub fn marker_stats_for_user(&self, user_id: i64) -> Result<MarkerStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT COUNT(*),
                        COUNT(CASE WHEN status = 'pending' THEN 1 END),
                        COUNT(CASE WHEN status = 'resolved' THEN 1 END)
                 FROM markers
                 WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(MarkerStats {
                        total: row.get::<_, i64>(0)? as u64,
                        pending: row.get::<_, i64>(1)? as u64,
                        resolved: row.get::<_, i64>(2)? as u64,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    /// Change a marker's review status. No HTTP route exposes this.
    #[doc(hidden)]
    pub fn set_marker_status(&self, id: i64, status: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE markers SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
                rusqlite::params![id, status],
            )?;
            Ok(())
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, marker_id: i64, user_id: i64, text: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (marker_id, user_id, text) VALUES (?1, ?2, ?3)",
                rusqlite::params![marker_id, user_id, text],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COMMENT_COLUMNS}
                 FROM comments c
                 LEFT JOIN users u ON c.user_id = u.id
                 WHERE c.id = ?1"
            );
            conn.query_row(&sql, [id], comment_from_row).optional()
        })
    }

    pub fn get_comments(&self, marker_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COMMENT_COLUMNS}
                 FROM comments c
                 LEFT JOIN users u ON c.user_id = u.id
                 WHERE c.marker_id = ?1
                 ORDER BY c.created_at DESC, c.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([marker_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, sql: &str, param: impl rusqlite::ToSql) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(sql)?;

    let row = stmt
        .query_row([param], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn marker_from_row(row: &Row<'_>) -> rusqlite::Result<MarkerRow> {
    Ok(MarkerRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_email: row.get(2)?,
        text: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        image_url: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        marker_id: row.get(1)?,
        user_id: row.get(2)?,
        user_email: row.get(3)?,
        text: row.get(4)?,
        created_at: row.get(5)?,
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
