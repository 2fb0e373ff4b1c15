use crate::model::Submission;
use anyhow::Context;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Durable store for users and scored submissions.
///
/// The mutex only serializes use of this handle's connection. Separate
/// handles on the same file coordinate through SQLite itself: the busy
/// timeout for locking and the `UNIQUE(username, problem_id)` constraint for
/// exactly-once scoring.
#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

/// Fields for a new submission row.
#[derive(Debug, Clone)]
pub struct NewSubmission<'a> {
    pub username: &'a str,
    pub problem_id: i64,
    pub marks: i64,
    pub timestamp: i64,
    pub query_sha256: Option<&'a str>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("store connection mutex poisoned"))
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(crate::storage::schema::DDL)?;

        migrate_v02(&conn)?;

        // stores created before the table-level constraint existed
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_submissions_user_problem
             ON submissions(username, problem_id)",
            [],
        )
        .context("failed to enforce one submission per user and problem")?;

        Ok(())
    }

    pub fn upsert_user(&self, username: &str, name: &str) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (username, name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(username) DO UPDATE SET name = excluded.name",
            params![username, name, chrono::Utc::now().timestamp()],
        )
        .context("upsert user")?;
        Ok(())
    }

    pub fn user_name(&self, username: &str) -> anyhow::Result<Option<String>> {
        let conn = self.lock()?;
        let name = conn
            .query_row(
                "SELECT name FROM users WHERE username = ?1",
                params![username],
                |r| r.get(0),
            )
            .optional()?;
        Ok(name)
    }

    /// Inserts one submission in a single statement. Returns `None` when the
    /// user already holds a submission for the problem.
    pub fn insert_submission(&self, s: &NewSubmission<'_>) -> anyhow::Result<Option<Submission>> {
        let conn = self.lock()?;
        let res = conn.query_row(
            "INSERT INTO submissions (username, name, problem_id, marks, timestamp, query_sha256)
             VALUES (?1, COALESCE((SELECT name FROM users WHERE username = ?1), ?1), ?2, ?3, ?4, ?5)
             RETURNING id, name",
            params![s.username, s.problem_id, s.marks, s.timestamp, s.query_sha256],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)),
        );
        match res {
            Ok((id, name)) => Ok(Some(Submission {
                id,
                username: s.username.to_string(),
                name,
                problem_id: s.problem_id,
                marks: s.marks,
                timestamp: s.timestamp,
                query_sha256: s.query_sha256.map(str::to_string),
            })),
            Err(e) if is_duplicate(&e) => Ok(None),
            Err(e) => Err(e).context("insert submission"),
        }
    }

    pub fn get_submission(
        &self,
        username: &str,
        problem_id: i64,
    ) -> anyhow::Result<Option<Submission>> {
        let conn = self.lock()?;
        let sub = conn
            .query_row(
                &format!("{} WHERE username = ?1 AND problem_id = ?2", SELECT_SUBMISSION),
                params![username, problem_id],
                submission_from_row,
            )
            .optional()?;
        Ok(sub)
    }

    /// A user's submissions, newest first.
    pub fn submissions_for_user(&self, username: &str) -> anyhow::Result<Vec<Submission>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE username = ?1 ORDER BY timestamp DESC, id DESC",
            SELECT_SUBMISSION
        ))?;
        let rows = stmt.query_map(params![username], submission_from_row)?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn count_submissions(&self) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM submissions", [], |r| r.get(0))?;
        Ok(n)
    }
}

const SELECT_SUBMISSION: &str =
    "SELECT id, username, name, problem_id, marks, timestamp, query_sha256 FROM submissions";

fn submission_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        problem_id: row.get(3)?,
        marks: row.get(4)?,
        timestamp: row.get(5)?,
        query_sha256: row.get(6)?,
    })
}

fn is_duplicate(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && matches!(
                    err.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        }
        _ => false,
    }
}

fn migrate_v02(conn: &Connection) -> anyhow::Result<()> {
    let cols = get_columns(conn, "submissions")?;
    add_column_if_missing(conn, &cols, "submissions", "query_sha256", "TEXT")?;
    Ok(())
}

fn get_columns(
    conn: &Connection,
    table: &str,
) -> anyhow::Result<std::collections::HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut out = std::collections::HashSet::new();
    for r in rows {
        out.insert(r?);
    }
    Ok(out)
}

fn add_column_if_missing(
    conn: &Connection,
    cols: &std::collections::HashSet<String>,
    table: &str,
    col: &str,
    ty: &str,
) -> anyhow::Result<()> {
    if !cols.contains(col) {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, col, ty);
        conn.execute(&sql, [])?;
    }
    Ok(())
}
