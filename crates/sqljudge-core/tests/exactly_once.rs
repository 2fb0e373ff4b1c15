use serde_json::json;
use sqljudge_core::config::EvalSettings;
use sqljudge_core::engine::Evaluator;
use sqljudge_core::model::{EvaluationRequest, Problem, SubmissionStatus, TestCase};
use sqljudge_core::registry::ProblemRegistry;
use sqljudge_core::sandbox::SqliteBackend;
use sqljudge_core::storage::{RecordOutcome, Store, SubmissionRecorder};
use sqljudge_core::{Judge, JudgeError};
use std::sync::Arc;
use tempfile::tempdir;

fn registry() -> Arc<ProblemRegistry> {
    Arc::new(ProblemRegistry::new([Problem {
        id: 7,
        title: None,
        description: None,
        marks: 25,
        schema: "CREATE TABLE t (id INT AUTO_INCREMENT PRIMARY KEY, v INT);".into(),
        test_cases: vec![TestCase {
            sample_data: "INSERT INTO t (v) VALUES (3), (4);".into(),
            expected_output: serde_json::from_value(json!([{ "total": 7 }])).unwrap(),
        }],
    }]))
}

fn judge(store: Store) -> Judge {
    Judge::new(
        registry(),
        Evaluator::new(Arc::new(SqliteBackend::default()), EvalSettings::default()),
        SubmissionRecorder::new(store),
    )
}

fn request(query: &str) -> EvaluationRequest {
    EvaluationRequest {
        problem_id: 7,
        user_query: query.into(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_submissions_score_once() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    store.upsert_user("alice", "Alice")?;
    let judge = judge(store.clone());

    let spawn_submit = |judge: Judge| {
        tokio::spawn(async move {
            judge
                .submit("alice", &request("SELECT SUM(v) AS total FROM t"))
                .await
        })
    };
    let a = spawn_submit(judge.clone());
    let b = spawn_submit(judge.clone());
    let (a, b) = (a.await??, b.await??);
    assert!(a.correct && b.correct);

    let mut statuses = vec![a.submission, b.submission];
    statuses.sort_by_key(|s| format!("{:?}", s));
    assert_eq!(
        statuses,
        vec![Some(SubmissionStatus::AlreadySolved), Some(SubmissionStatus::Recorded)]
    );
    assert_eq!(store.count_submissions()?, 1);

    let subs = store.submissions_for_user("alice")?;
    assert_eq!(subs[0].name, "Alice");
    assert_eq!(subs[0].marks, 25);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_store_handles_on_one_file() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("judge.db");
    let first = Store::open(&path)?;
    first.init_schema()?;
    let second = Store::open(&path)?;

    let recorders = [
        SubmissionRecorder::new(first.clone()),
        SubmissionRecorder::new(second),
    ];
    let mut handles = Vec::new();
    for i in 0..8 {
        let rec = recorders[i % 2].clone();
        handles.push(tokio::spawn(async move {
            rec.record("bob", 1, 10, "SELECT 1").await
        }));
    }

    let mut recorded = 0;
    for h in handles {
        if let RecordOutcome::Recorded(_) = h.await?? {
            recorded += 1;
        }
    }
    assert_eq!(recorded, 1);
    assert_eq!(first.count_submissions()?, 1);
    Ok(())
}

#[tokio::test]
async fn test_incorrect_submission_is_not_recorded() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let judge = judge(store.clone());

    let resp = judge
        .submit("carol", &request("SELECT COUNT(*) AS total FROM t"))
        .await?;
    assert!(!resp.correct);
    assert!(resp.submission.is_none());
    assert_eq!(store.count_submissions()?, 0);
    Ok(())
}

#[tokio::test]
async fn test_request_level_errors() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let judge = judge(store);

    let err = judge
        .submit(
            "carol",
            &EvaluationRequest {
                problem_id: 99,
                user_query: "SELECT 1".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, JudgeError::UnknownProblem(99)));

    let err = judge.evaluate(&request("   ")).await.unwrap_err();
    assert!(matches!(err, JudgeError::EmptyQuery));
    Ok(())
}
