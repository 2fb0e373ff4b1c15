use super::{ExecutionBackend, Sandbox};
use crate::errors::EvalError;
use crate::model::Row;
use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::limits::Limit;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_DB: AtomicU64 = AtomicU64::new(1);

/// VM steps between deadline checks.
const DEADLINE_CHECK_OPS: i32 = 1_000;

/// How long a timed-out statement gets to hand its connection back.
const RECLAIM_GRACE: Duration = Duration::from_millis(500);

/// Each sandbox is a uniquely named shared-cache in-memory database. It lives
/// as long as one of its two connections is open.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    max_rows: usize,
}

impl SqliteBackend {
    pub fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }
}

impl Default for SqliteBackend {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_ROWS)
    }
}

#[async_trait]
impl ExecutionBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn provision(&self, label: &str) -> Result<Box<dyn Sandbox>, EvalError> {
        let namespace = format!(
            "sqljudge-{}-{}-{}",
            std::process::id(),
            NEXT_DB.fetch_add(1, Ordering::Relaxed),
            sanitize(label)
        );
        let max_rows = self.max_rows;
        tokio::task::spawn_blocking(move || SqliteSandbox::open(namespace, max_rows))
            .await
            .map_err(|e| EvalError::Setup(format!("provision task failed: {}", e)))?
            .map(|s| Box::new(s) as Box<dyn Sandbox>)
            .map_err(|e| EvalError::Setup(e.to_string()))
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .take(40)
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn namespace_uri(namespace: &str) -> String {
    format!("file:{}?mode=memory&cache=shared", namespace)
}

/// Full-rights connection. Loading the fixture consumes it.
pub struct ProvisionHandle {
    conn: Connection,
}

impl ProvisionHandle {
    /// Schema then data in one transaction; nothing is left behind on error.
    fn load(mut self, schema: &str, data: &str) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(schema)?;
        tx.execute_batch(data)?;
        tx.commit()
    }
}

/// Connection the user's statements run on: no `ATTACH`, untrusted schema,
/// every statement bounded by its own deadline.
pub struct ExecHandle {
    conn: Connection,
    max_rows: usize,
}

impl ExecHandle {
    fn open(uri: &str, flags: OpenFlags, max_rows: usize) -> rusqlite::Result<Self> {
        let conn = Connection::open_with_flags(uri, flags)?;
        conn.set_limit(Limit::SQLITE_LIMIT_ATTACHED, 0);
        conn.pragma_update(None, "trusted_schema", "OFF")?;
        register_math_functions(&conn)?;
        Ok(Self { conn, max_rows })
    }

    /// Runs one statement. The progress handler aborts it once `until` has
    /// passed, including when the blocking pool picks it up late.
    fn query(&self, sql: &str, until: Instant, after_ms: u64) -> Result<Vec<Row>, EvalError> {
        if Instant::now() >= until {
            return Err(EvalError::Timeout { after_ms });
        }
        self.conn
            .progress_handler(DEADLINE_CHECK_OPS, Some(move || Instant::now() >= until));
        let res = query_rows(&self.conn, sql, self.max_rows);
        self.conn.progress_handler(DEADLINE_CHECK_OPS, None::<fn() -> bool>);

        res.map_err(|e| match e {
            QueryError::Sqlite(e) if is_interrupt(&e) => EvalError::Timeout { after_ms },
            QueryError::Sqlite(e) => EvalError::Execution(e.to_string()),
            QueryError::TooManyRows(max) => {
                EvalError::Execution(format!("result set exceeds {} rows", max))
            }
        })
    }
}

/// MySQL math functions that SQLite only ships behind a compile-time option.
fn register_math_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8
        | FunctionFlags::SQLITE_DETERMINISTIC
        | FunctionFlags::SQLITE_INNOCUOUS;
    conn.create_scalar_function("POWER", 2, flags, |ctx| {
        let base: Option<f64> = ctx.get(0)?;
        let exp: Option<f64> = ctx.get(1)?;
        Ok(base
            .zip(exp)
            .map(|(b, e)| b.powf(e))
            .filter(|v| v.is_finite()))
    })?;
    conn.create_scalar_function("SQRT", 1, flags, |ctx| {
        let x: Option<f64> = ctx.get(0)?;
        Ok(x.filter(|x| *x >= 0.0).map(f64::sqrt))
    })?;
    Ok(())
}

pub struct SqliteSandbox {
    namespace: String,
    /// `None` once the fixture has been loaded.
    provision: Option<ProvisionHandle>,
    /// `None` only while a statement is in flight, or after a timed-out
    /// statement failed to hand it back.
    exec: Option<ExecHandle>,
}

impl SqliteSandbox {
    fn open(namespace: String, max_rows: usize) -> rusqlite::Result<Self> {
        let uri = namespace_uri(&namespace);
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let provision = ProvisionHandle {
            conn: Connection::open_with_flags(&uri, flags)?,
        };
        let exec = ExecHandle::open(&uri, flags, max_rows)?;

        Ok(Self {
            namespace,
            provision: Some(provision),
            exec: Some(exec),
        })
    }

    async fn run_one(&mut self, sql: String, deadline: Duration) -> Result<Vec<Row>, EvalError> {
        let handle = self
            .exec
            .take()
            .ok_or_else(|| EvalError::Execution("execution handle unavailable".into()))?;
        let interrupt = handle.conn.get_interrupt_handle();
        let after_ms = deadline.as_millis() as u64;
        let until = Instant::now() + deadline;

        let mut task = tokio::task::spawn_blocking(move || {
            let res = handle.query(&sql, until, after_ms);
            (handle, res)
        });

        match tokio::time::timeout(deadline, &mut task).await {
            Ok(joined) => {
                let (handle, res) = joined
                    .map_err(|e| EvalError::Execution(format!("execution task failed: {}", e)))?;
                self.exec = Some(handle);
                res
            }
            Err(_) => {
                interrupt.interrupt();
                // a task still queued behind a busy pool aborts on its own
                // deadline check; it drops the handle if it misses the grace
                if let Ok(Ok((handle, _))) = tokio::time::timeout(RECLAIM_GRACE, task).await {
                    self.exec = Some(handle);
                }
                tracing::debug!(
                    event = "sandbox.interrupted",
                    namespace = %self.namespace,
                    after_ms
                );
                Err(EvalError::Timeout { after_ms })
            }
        }
    }
}

#[async_trait]
impl Sandbox for SqliteSandbox {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn load(&mut self, schema: &str, data: &str) -> Result<(), EvalError> {
        let handle = self
            .provision
            .take()
            .ok_or_else(|| EvalError::Setup("fixture already loaded".into()))?;
        let schema = schema.to_string();
        let data = data.to_string();

        tokio::task::spawn_blocking(move || handle.load(&schema, &data))
            .await
            .map_err(|e| EvalError::Setup(format!("load task failed: {}", e)))?
            .map_err(|e| EvalError::Setup(e.to_string()))
    }

    async fn run(
        &mut self,
        statements: &[String],
        deadline: Duration,
    ) -> Result<Vec<Row>, EvalError> {
        let mut last = Vec::new();
        for sql in statements {
            last = self.run_one(sql.clone(), deadline).await?;
        }
        Ok(last)
    }

    fn teardown(self: Box<Self>) -> anyhow::Result<()> {
        let SqliteSandbox {
            namespace,
            provision,
            exec,
        } = *self;
        let conns = exec
            .map(|h| h.conn)
            .into_iter()
            .chain(provision.map(|h| h.conn));

        let mut failures = Vec::new();
        for conn in conns {
            if let Err((_, e)) = conn.close() {
                failures.push(e.to_string());
            }
        }
        if !failures.is_empty() {
            anyhow::bail!("closing {}: {}", namespace, failures.join("; "));
        }
        Ok(())
    }
}

enum QueryError {
    Sqlite(rusqlite::Error),
    TooManyRows(usize),
}

impl From<rusqlite::Error> for QueryError {
    fn from(e: rusqlite::Error) -> Self {
        QueryError::Sqlite(e)
    }
}

fn is_interrupt(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::OperationInterrupted
    )
}

fn query_rows(conn: &Connection, sql: &str, max_rows: usize) -> Result<Vec<Row>, QueryError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        if out.len() >= max_rows {
            return Err(QueryError::TooManyRows(max_rows));
        }
        let mut obj = Row::new();
        for (i, name) in columns.iter().enumerate() {
            obj.insert(name.clone(), to_json(row.get_ref(i)?));
        }
        out.push(obj);
    }
    Ok(out)
}

fn to_json(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{execute, CaseInput};
    use serde_json::json;

    fn stmts(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    const RUNAWAY: &str =
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c";

    async fn run_case(
        schema: &str,
        data: &str,
        statements: &[&str],
    ) -> Result<Vec<Row>, EvalError> {
        let backend = SqliteBackend::default();
        let statements = stmts(statements);
        execute(
            &backend,
            CaseInput {
                label: "unit",
                schema,
                data,
                statements: &statements,
                deadline: Duration::from_secs(5),
            },
        )
        .await
    }

    #[tokio::test]
    async fn test_rows_render_as_json() -> anyhow::Result<()> {
        let rows = run_case(
            "CREATE TABLE t (i INTEGER, r REAL, s TEXT, b BLOB, n TEXT);",
            "INSERT INTO t VALUES (1, 2.5, 'x', x'0aff', NULL);",
            &["SELECT * FROM t"],
        )
        .await?;
        assert_eq!(
            serde_json::to_value(&rows)?,
            json!([{ "i": 1, "r": 2.5, "s": "x", "b": "0aff", "n": null }])
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_last_statement_is_judged() -> anyhow::Result<()> {
        let rows = run_case(
            "CREATE TABLE t (v INTEGER);",
            "INSERT INTO t VALUES (1);",
            &["UPDATE t SET v = 2", "SELECT v FROM t"],
        )
        .await?;
        assert_eq!(rows[0]["v"], json!(2));

        let rows = run_case("CREATE TABLE t (v INTEGER);", "", &["DELETE FROM t"]).await?;
        assert!(rows.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_fixture_is_setup_error() {
        let err = run_case(
            "CREATE TABLE t (v INTEGER);",
            "INSERT INTO nope VALUES (1);",
            &["SELECT 1"],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EvalError::Setup(ref m) if m.contains("nope")), "{:?}", err);
    }

    #[tokio::test]
    async fn test_unknown_column_is_execution_error() {
        let err = run_case("CREATE TABLE t (v INTEGER);", "", &["SELECT missing FROM t"])
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Execution(ref m) if m.contains("missing")), "{:?}", err);
    }

    #[tokio::test]
    async fn test_attach_refused_on_exec_handle() {
        let err = run_case("", "", &["ATTACH DATABASE ':memory:' AS other"])
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Execution(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_runaway_query_times_out() {
        let backend = SqliteBackend::default();
        let statements = stmts(&[RUNAWAY]);
        let err = execute(
            &backend,
            CaseInput {
                label: "slow",
                schema: "",
                data: "",
                statements: &statements,
                deadline: Duration::from_millis(100),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err, EvalError::Timeout { after_ms: 100 });
    }

    #[tokio::test]
    async fn test_row_cap() {
        let backend = SqliteBackend::new(3);
        let statements = stmts(&["WITH RECURSIVE c(x) AS \
             (SELECT 1 UNION ALL SELECT x + 1 FROM c LIMIT 10) SELECT x FROM c"]);
        let err = execute(
            &backend,
            CaseInput {
                label: "cap",
                schema: "",
                data: "",
                statements: &statements,
                deadline: Duration::from_secs(5),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("exceeds 3 rows"));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() -> anyhow::Result<()> {
        let backend = SqliteBackend::default();
        let mut a = backend.provision("same").await?;
        let mut b = backend.provision("same").await?;
        assert_ne!(a.namespace(), b.namespace());

        a.load("CREATE TABLE t (v INTEGER);", "INSERT INTO t VALUES (1);").await?;
        b.load("CREATE TABLE t (v INTEGER);", "").await?;
        let rows = b.run(&stmts(&["SELECT v FROM t"]), Duration::from_secs(5)).await?;
        assert!(rows.is_empty());

        a.teardown()?;
        b.teardown()?;
        Ok(())
    }

    #[test]
    fn test_deadline_holds_when_blocking_pool_is_busy() -> anyhow::Result<()> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .max_blocking_threads(1)
            .enable_all()
            .build()?;
        rt.block_on(async {
            let backend = SqliteBackend::default();
            let mut sb = backend.provision("busy").await?;
            sb.load("CREATE TABLE t (v INTEGER);", "").await?;

            // the statement is queued behind this until well past its deadline
            let hog =
                tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_millis(300)));
            let statements = stmts(&[RUNAWAY]);
            let started = Instant::now();
            let out = tokio::time::timeout(
                Duration::from_secs(5),
                sb.run(&statements, Duration::from_millis(100)),
            )
            .await?;
            hog.await?;

            assert_eq!(out, Err(EvalError::Timeout { after_ms: 100 }));
            assert!(started.elapsed() < Duration::from_secs(2));
            sb.teardown()?;
            Ok::<_, anyhow::Error>(())
        })
    }

    #[tokio::test]
    async fn test_sandbox_usable_after_timeout() -> anyhow::Result<()> {
        let backend = SqliteBackend::default();
        let mut sb = backend.provision("again").await?;
        sb.load("CREATE TABLE t (v INTEGER);", "INSERT INTO t VALUES (7);").await?;

        let err = sb.run(&stmts(&[RUNAWAY]), Duration::from_millis(50)).await;
        assert_eq!(err, Err(EvalError::Timeout { after_ms: 50 }));
        let rows = sb.run(&stmts(&["SELECT v FROM t"]), Duration::from_secs(5)).await?;
        assert_eq!(rows[0]["v"], json!(7));
        sb.teardown()?;
        Ok(())
    }

    #[tokio::test]
    async fn test_teardown_destroys_namespace() -> anyhow::Result<()> {
        let backend = SqliteBackend::default();
        let mut sb = backend.provision("gone").await?;
        let uri = namespace_uri(sb.namespace());
        sb.load("CREATE TABLE t (v INTEGER);", "INSERT INTO t VALUES (1);").await?;

        let tables = |conn: &Connection| -> rusqlite::Result<i64> {
            conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 't'",
                [],
                |r| r.get(0),
            )
        };
        {
            let observer = Connection::open(&uri)?;
            assert_eq!(tables(&observer)?, 1);
        }

        sb.teardown()?;
        let reopened = Connection::open(&uri)?;
        assert_eq!(tables(&reopened)?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_fixture_loads_once() -> anyhow::Result<()> {
        let backend = SqliteBackend::default();
        let mut sb = backend.provision("once").await?;
        sb.load("CREATE TABLE t (v INTEGER);", "").await?;
        let err = sb.load("CREATE TABLE u (v INTEGER);", "").await;
        assert!(matches!(err, Err(EvalError::Setup(_))));
        sb.teardown()?;
        Ok(())
    }

    #[tokio::test]
    async fn test_math_functions_registered() -> anyhow::Result<()> {
        let rows = run_case(
            "",
            "",
            &["SELECT POWER(2, 3) AS p, SQRT(16) AS s, SQRT(-1) AS n, POWER(NULL, 2) AS z"],
        )
        .await?;
        assert_eq!(
            serde_json::to_value(&rows)?,
            json!([{ "p": 8.0, "s": 4.0, "n": null, "z": null }])
        );
        Ok(())
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize("p1-tc2"), "p1-tc2");
        assert_eq!(sanitize("a/b?c"), "a_b_c");
    }
}
