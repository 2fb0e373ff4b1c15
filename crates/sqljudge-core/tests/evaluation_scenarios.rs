use serde_json::json;
use sqljudge_core::config::EvalSettings;
use sqljudge_core::engine::Evaluator;
use sqljudge_core::model::{Problem, TestCase};
use sqljudge_core::sandbox::SqliteBackend;
use std::sync::Arc;

fn evaluator(settings: EvalSettings) -> Evaluator {
    Evaluator::new(Arc::new(SqliteBackend::default()), settings)
}

fn case(data: &str, expected: serde_json::Value) -> TestCase {
    TestCase {
        sample_data: data.into(),
        expected_output: serde_json::from_value(expected).unwrap(),
    }
}

fn people_problem(cases: Vec<TestCase>) -> Problem {
    Problem {
        id: 1,
        title: Some("People".into()),
        description: None,
        marks: 10,
        schema: "CREATE TABLE t(id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(10));".into(),
        test_cases: cases,
    }
}

#[tokio::test]
async fn test_autoincrement_fixture_select() -> anyhow::Result<()> {
    let p = people_problem(vec![case(
        "INSERT INTO t(name) VALUES ('a');",
        json!([{ "name": "a" }]),
    )]);
    let eval = evaluator(EvalSettings::default())
        .evaluate(&p, "SELECT name FROM t WHERE id=1;")
        .await;
    assert!(eval.correct, "{:?}", eval.test_results);
    assert_eq!(eval.test_results[0].test_case_number, 1);
    Ok(())
}

#[tokio::test]
async fn test_update_then_select_judges_last_statement() -> anyhow::Result<()> {
    let p = people_problem(vec![case(
        "INSERT INTO t(name) VALUES ('a');",
        json!([{ "name": "b" }]),
    )]);
    let eval = evaluator(EvalSettings::default())
        .evaluate(&p, "UPDATE t SET name='b' WHERE id=1; SELECT name FROM t;")
        .await;
    assert!(eval.correct, "{:?}", eval.test_results);
    Ok(())
}

#[tokio::test]
async fn test_unknown_column_fails_case_but_siblings_run() -> anyhow::Result<()> {
    let p = people_problem(vec![
        case("INSERT INTO t(name) VALUES ('a');", json!([{ "name": "a" }])),
        case("INSERT INTO t(name) VALUES ('b');", json!([{ "name": "b" }])),
        case("", json!([])),
    ]);
    let eval = evaluator(EvalSettings::default())
        .evaluate(&p, "SELECT nonexistent FROM t;")
        .await;
    assert!(!eval.correct);
    assert_eq!(eval.test_results.len(), 3);
    for (i, r) in eval.test_results.iter().enumerate() {
        assert_eq!(r.test_case_number, i + 1);
        assert!(!r.passed);
        assert!(r.user_output.is_none());
        let err = r.error.as_deref().unwrap_or_default();
        assert!(err.contains("nonexistent"), "{}", err);
    }
    Ok(())
}

#[tokio::test]
async fn test_mysql_dialect_end_to_end() -> anyhow::Result<()> {
    let p = Problem {
        id: 2,
        title: None,
        description: None,
        marks: 5,
        schema: "CREATE TABLE `emp` (\n  `id` INT(11) NOT NULL AUTO_INCREMENT,\n  `fname` VARCHAR(20),\n  `lname` VARCHAR(20),\n  `hired` DATE,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;".into(),
        test_cases: vec![case(
            "INSERT INTO emp (fname, lname, hired) VALUES (\"Ada\", 'Lovelace', '2020-03-01'), ('Alan', 'Turing', '2021-07-15');",
            json!([{ "full_name": "Alan Turing", "yr": 2021, "later": "2021-07-22" }]),
        )],
    };
    let eval = evaluator(EvalSettings::default())
        .evaluate(
            &p,
            "SELECT CONCAT(fname, ' ', lname) AS full_name, YEAR(hired) AS yr, DATE_ADD(hired, INTERVAL 1 WEEK) AS later FROM emp ORDER BY hired DESC LIMIT 0, 1;",
        )
        .await;
    assert!(eval.correct, "{:?}", eval.test_results);
    Ok(())
}

#[tokio::test]
async fn test_mysql_math_and_calendar_functions() -> anyhow::Result<()> {
    let p = people_problem(vec![case(
        "",
        json!([{
            "c": 2, "f": -2, "p": 8, "m": 1, "r": 1,
            "l": "2024-02-29", "q": 2, "w": 1
        }]),
    )]);
    let eval = evaluator(EvalSettings::default())
        .evaluate(
            &p,
            "SELECT CEIL(1.2) AS c, FLOOR(-1.5) AS f, POW(2, 3) AS p, MOD(5, 2) AS m, \
             RAND() < 1 AS r, LAST_DAY('2024-02-10') AS l, QUARTER('2024-05-01') AS q, \
             DAYOFWEEK('2024-02-11') AS w;",
        )
        .await;
    assert!(eval.correct, "{:?}", eval.test_results);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_are_isolated() -> anyhow::Result<()> {
    let p = Arc::new(people_problem(vec![
        case("INSERT INTO t(name) VALUES ('x');", json!([{ "n": 1 }])),
        case("INSERT INTO t(name) VALUES ('x');", json!([{ "n": 1 }])),
    ]));
    let ev = evaluator(EvalSettings {
        parallel: Some(2),
        ..EvalSettings::default()
    });

    // every submission inserts a row; a leak between namespaces would raise the count
    let mut handles = Vec::new();
    for i in 0..16 {
        let ev = ev.clone();
        let p = p.clone();
        handles.push(tokio::spawn(async move {
            let q = format!(
                "INSERT INTO t(name) VALUES ('u{}'); DELETE FROM t WHERE name = 'x'; SELECT COUNT(*) AS n FROM t;",
                i
            );
            ev.evaluate(&p, &q).await
        }));
    }
    for h in handles {
        let eval = h.await?;
        assert!(eval.correct, "{:?}", eval.test_results);
    }
    Ok(())
}

#[tokio::test]
async fn test_runaway_query_times_out_and_siblings_finish() -> anyhow::Result<()> {
    let p = people_problem(vec![case("", json!([])), case("", json!([]))]);
    let ev = evaluator(EvalSettings {
        statement_timeout_ms: Some(150),
        ..EvalSettings::default()
    });
    let eval = ev
        .evaluate(
            &p,
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT COUNT(*) FROM c;",
        )
        .await;
    assert!(!eval.correct);
    for r in &eval.test_results {
        let err = r.error.as_deref().unwrap_or_default();
        assert!(err.contains("150ms"), "{}", err);
    }
    Ok(())
}
