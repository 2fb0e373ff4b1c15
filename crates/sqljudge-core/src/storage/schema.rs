pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  username    TEXT PRIMARY KEY,
  name        TEXT NOT NULL,
  created_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS submissions (
  id            INTEGER PRIMARY KEY AUTOINCREMENT,
  username      TEXT NOT NULL,
  name          TEXT NOT NULL,
  problem_id    INTEGER NOT NULL,
  marks         INTEGER NOT NULL,
  timestamp     INTEGER NOT NULL,
  query_sha256  TEXT,
  UNIQUE(username, problem_id)
);

CREATE INDEX IF NOT EXISTS idx_submissions_timestamp ON submissions(timestamp);
"#;
