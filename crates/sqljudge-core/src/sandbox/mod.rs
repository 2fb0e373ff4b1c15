//! Per-test-case execution contexts.
//!
//! Every test case walks `PROVISION -> LOAD -> RUN -> TEARDOWN`. Teardown runs
//! on every exit path and its failures are logged, never returned.

use crate::errors::EvalError;
use crate::model::Row;
use async_trait::async_trait;
use std::time::{Duration, Instant};

pub mod sqlite;

pub use sqlite::SqliteBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Provision,
    Load,
    Run,
    Teardown,
}

/// Creates isolated sandboxes. One backend is shared by every evaluation.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Creates a fresh, empty namespace. `label` only decorates its name.
    async fn provision(&self, label: &str) -> Result<Box<dyn Sandbox>, EvalError>;
}

/// One isolated namespace with two capabilities: a provisioning handle used
/// by `load` and a restricted execution handle used by `run`.
#[async_trait]
pub trait Sandbox: Send {
    fn namespace(&self) -> &str;

    /// Applies the translated schema then the translated fixture data
    /// atomically. Failures map to `EvalError::Setup`.
    async fn load(&mut self, schema: &str, data: &str) -> Result<(), EvalError>;

    /// Runs translated statements in order, each bounded by `deadline`, and
    /// returns the rows of the last one.
    async fn run(&mut self, statements: &[String], deadline: Duration)
        -> Result<Vec<Row>, EvalError>;

    fn teardown(self: Box<Self>) -> anyhow::Result<()>;
}

/// Everything one test case needs, already translated.
#[derive(Debug, Clone, Copy)]
pub struct CaseInput<'a> {
    pub label: &'a str,
    pub schema: &'a str,
    pub data: &'a str,
    pub statements: &'a [String],
    pub deadline: Duration,
}

/// Drives one test case through the full lifecycle.
pub async fn execute(
    backend: &dyn ExecutionBackend,
    case: CaseInput<'_>,
) -> Result<Vec<Row>, EvalError> {
    let started = Instant::now();
    let mut sandbox = backend.provision(case.label).await.map_err(|e| {
        trace_failure(case.label, Phase::Provision, &e);
        e
    })?;
    let namespace = sandbox.namespace().to_string();

    let outcome = async {
        sandbox.load(case.schema, case.data).await.map_err(|e| {
            trace_failure(&namespace, Phase::Load, &e);
            e
        })?;
        sandbox.run(case.statements, case.deadline).await.map_err(|e| {
            trace_failure(&namespace, Phase::Run, &e);
            e
        })
    }
    .await;

    if let Err(e) = sandbox.teardown() {
        tracing::warn!(
            event = "sandbox.teardown_failed",
            namespace = %namespace,
            phase = ?Phase::Teardown,
            error = %e,
            "sandbox teardown failed"
        );
    }
    tracing::debug!(
        event = "sandbox.done",
        backend = backend.name(),
        namespace = %namespace,
        ok = outcome.is_ok(),
        elapsed_ms = started.elapsed().as_millis() as u64
    );
    outcome
}

fn trace_failure(namespace: &str, phase: Phase, err: &EvalError) {
    tracing::debug!(
        event = "sandbox.phase_failed",
        namespace = %namespace,
        phase = ?phase,
        error = %err
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Records lifecycle calls so the driver can be checked without SQLite.
    struct Recording {
        fail_at: Option<Phase>,
        teardowns: Arc<AtomicUsize>,
    }

    struct RecordingSandbox {
        fail_at: Option<Phase>,
        teardowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExecutionBackend for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn provision(&self, _label: &str) -> Result<Box<dyn Sandbox>, EvalError> {
            if self.fail_at == Some(Phase::Provision) {
                return Err(EvalError::Setup("no capacity".into()));
            }
            Ok(Box::new(RecordingSandbox {
                fail_at: self.fail_at,
                teardowns: self.teardowns.clone(),
            }))
        }
    }

    #[async_trait]
    impl Sandbox for RecordingSandbox {
        fn namespace(&self) -> &str {
            "rec"
        }

        async fn load(&mut self, _schema: &str, _data: &str) -> Result<(), EvalError> {
            match self.fail_at {
                Some(Phase::Load) => Err(EvalError::Setup("bad fixture".into())),
                _ => Ok(()),
            }
        }

        async fn run(&mut self, _s: &[String], _d: Duration) -> Result<Vec<Row>, EvalError> {
            match self.fail_at {
                Some(Phase::Run) => Err(EvalError::Execution("boom".into())),
                _ => Ok(vec![Row::new()]),
            }
        }

        fn teardown(self: Box<Self>) -> anyhow::Result<()> {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(Phase::Teardown) {
                anyhow::bail!("close failed");
            }
            Ok(())
        }
    }

    fn case(statements: &[String]) -> CaseInput<'_> {
        CaseInput {
            label: "t",
            schema: "",
            data: "",
            statements,
            deadline: Duration::from_secs(1),
        }
    }

    async fn drive(fail_at: Option<Phase>) -> (Result<Vec<Row>, EvalError>, usize) {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let backend = Recording {
            fail_at,
            teardowns: teardowns.clone(),
        };
        let stmts = vec!["SELECT 1".to_string()];
        let out = execute(&backend, case(&stmts)).await;
        (out, teardowns.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_teardown_runs_on_every_path() {
        let (out, n) = drive(None).await;
        assert_eq!(out.unwrap().len(), 1);
        assert_eq!(n, 1);

        let (out, n) = drive(Some(Phase::Load)).await;
        assert!(matches!(out, Err(EvalError::Setup(_))));
        assert_eq!(n, 1);

        let (out, n) = drive(Some(Phase::Run)).await;
        assert!(matches!(out, Err(EvalError::Execution(_))));
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn test_teardown_failure_is_swallowed() {
        let (out, n) = drive(Some(Phase::Teardown)).await;
        assert!(out.is_ok());
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn test_provision_failure_skips_teardown() {
        let (out, n) = drive(Some(Phase::Provision)).await;
        assert_eq!(out, Err(EvalError::Setup("no capacity".into())));
        assert_eq!(n, 0);
    }
}
