use crate::compare::diff;
use crate::config::EvalSettings;
use crate::errors::EvalError;
use crate::model::{Evaluation, Problem, TestResult};
use crate::sandbox::{execute, CaseInput, ExecutionBackend};
use crate::translate::{split_statements, translate};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Runs a user query against every test case of a problem.
#[derive(Clone)]
pub struct Evaluator {
    pub backend: Arc<dyn ExecutionBackend>,
    pub settings: EvalSettings,
}

impl Evaluator {
    pub fn new(backend: Arc<dyn ExecutionBackend>, settings: EvalSettings) -> Self {
        Self { backend, settings }
    }

    pub async fn evaluate(&self, problem: &Problem, user_query: &str) -> Evaluation {
        let started = Instant::now();
        let statements: Arc<Vec<String>> = Arc::new(
            split_statements(user_query)
                .iter()
                .map(|s| translate(s))
                .collect(),
        );

        let test_results = if statements.is_empty() {
            problem
                .test_cases
                .iter()
                .enumerate()
                .map(|(i, tc)| {
                    TestResult::failed(
                        i + 1,
                        tc.expected_output.clone(),
                        EvalError::Execution("query contains no SQL statements".into()).to_string(),
                    )
                })
                .collect()
        } else {
            self.run_cases(problem, statements).await
        };

        let correct = !test_results.is_empty() && test_results.iter().all(|r| r.passed);
        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            event = "evaluation.done",
            problem_id = problem.id,
            cases = test_results.len(),
            passed = test_results.iter().filter(|r| r.passed).count(),
            correct,
            elapsed_ms = duration_ms
        );
        Evaluation {
            correct,
            test_results,
            duration_ms,
        }
    }

    async fn run_cases(&self, problem: &Problem, statements: Arc<Vec<String>>) -> Vec<TestResult> {
        let schema = Arc::new(translate(&problem.schema));
        let sem = Arc::new(Semaphore::new(self.settings.parallel()));
        let deadline = self.settings.statement_timeout();
        let mut handles = Vec::new();

        for (i, tc) in problem.test_cases.iter().enumerate() {
            let number = i + 1;
            let backend = self.backend.clone();
            let sem = sem.clone();
            let schema = schema.clone();
            let statements = statements.clone();
            let data = translate(&tc.sample_data);
            let expected = tc.expected_output.clone();
            let label = format!("p{}-tc{}", problem.id, number);

            let h = tokio::spawn(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(p) => p,
                    Err(e) => return TestResult::failed(number, expected, e.to_string()),
                };
                let outcome = execute(
                    backend.as_ref(),
                    CaseInput {
                        label: &label,
                        schema: &schema,
                        data: &data,
                        statements: &statements,
                        deadline,
                    },
                )
                .await;
                judge_case(number, expected, outcome, &label)
            });
            handles.push((number, tc.expected_output.clone(), h));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (number, expected, h) in handles {
            let row = match h.await {
                Ok(row) => row,
                Err(e) => {
                    tracing::error!(
                        event = "evaluation.task_failed",
                        problem_id = problem.id,
                        test_case = number,
                        error = %e
                    );
                    TestResult::failed(number, expected, format!("internal error: {}", e))
                }
            };
            results.push(row);
        }
        results
    }
}

fn judge_case(
    number: usize,
    expected: Vec<crate::model::Row>,
    outcome: Result<Vec<crate::model::Row>, EvalError>,
    label: &str,
) -> TestResult {
    match outcome {
        Ok(actual) => {
            let mismatch = diff(&actual, &expected);
            if let Some(m) = &mismatch {
                tracing::debug!(event = "evaluation.mismatch", case = %label, detail = %m);
            }
            TestResult {
                test_case_number: number,
                passed: mismatch.is_none(),
                user_output: Some(actual),
                expected_output: expected,
                error: None,
            }
        }
        Err(e) => TestResult::failed(number, expected, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestCase;
    use crate::sandbox::SqliteBackend;
    use serde_json::json;

    fn evaluator() -> Evaluator {
        Evaluator::new(Arc::new(SqliteBackend::default()), EvalSettings::default())
    }

    fn problem(cases: Vec<TestCase>) -> Problem {
        Problem {
            id: 9,
            title: None,
            description: None,
            marks: 10,
            schema: "CREATE TABLE `emp` (`id` INT AUTO_INCREMENT PRIMARY KEY, `name` VARCHAR(20), `salary` DECIMAL(10,2)) ENGINE=InnoDB;".into(),
            test_cases: cases,
        }
    }

    fn case(data: &str, expected: serde_json::Value) -> TestCase {
        TestCase {
            sample_data: data.into(),
            expected_output: serde_json::from_value(expected).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_all_cases_pass() {
        let p = problem(vec![
            case(
                "INSERT INTO emp (name, salary) VALUES ('Ann', 10), ('Bo', 20);",
                json!([{ "name": "Bo" }]),
            ),
            case(
                "INSERT INTO emp (name, salary) VALUES (\"Cy\", 50);",
                json!([{ "name": "Cy" }]),
            ),
        ]);
        let eval = evaluator()
            .evaluate(&p, "SELECT name FROM `emp` ORDER BY salary DESC LIMIT 0, 1;")
            .await;
        assert!(eval.correct, "{:?}", eval.test_results);
        assert_eq!(eval.test_results.len(), 2);
        assert_eq!(eval.test_results[1].test_case_number, 2);
    }

    #[tokio::test]
    async fn test_one_failing_case_fails_verdict() {
        let p = problem(vec![
            case("INSERT INTO emp (name) VALUES ('Ann');", json!([{ "name": "Ann" }])),
            case("INSERT INTO emp (name) VALUES ('Bo');", json!([{ "name": "Ann" }])),
        ]);
        let eval = evaluator().evaluate(&p, "SELECT name FROM emp").await;
        assert!(!eval.correct);
        assert!(eval.test_results[0].passed);
        assert!(!eval.test_results[1].passed);
        assert!(eval.test_results[1].error.is_none());
        assert_eq!(
            eval.test_results[1].user_output,
            Some(serde_json::from_value(json!([{ "name": "Bo" }])).unwrap())
        );
    }

    #[tokio::test]
    async fn test_empty_query_fails_every_case() {
        let p = problem(vec![case("", json!([])), case("", json!([]))]);
        let eval = evaluator().evaluate(&p, "  -- nothing here\n ; ").await;
        assert!(!eval.correct);
        assert!(eval
            .test_results
            .iter()
            .all(|r| r.error.as_deref() == Some("query contains no SQL statements")));
    }

    #[tokio::test]
    async fn test_zero_cases_is_not_correct() {
        let eval = evaluator().evaluate(&problem(vec![]), "SELECT 1").await;
        assert!(!eval.correct);
        assert!(eval.test_results.is_empty());
    }

    #[tokio::test]
    async fn test_bad_fixture_reports_setup_error() {
        let p = problem(vec![case("INSERT INTO missing VALUES (1);", json!([]))]);
        let eval = evaluator().evaluate(&p, "SELECT 1").await;
        let err = eval.test_results[0].error.clone().unwrap_or_default();
        assert!(err.starts_with("setup failed:"), "{}", err);
        assert!(eval.test_results[0].user_output.is_none());
    }
}
