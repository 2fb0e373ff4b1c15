use serde::{Deserialize, Serialize};

/// One result row: column name to scalar JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub marks: i64,
    /// DDL in the source dialect, shared by every test case.
    pub schema: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default)]
    pub sample_data: String,
    #[serde(default)]
    pub expected_output: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub problem_id: i64,
    pub user_query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_case_number: usize,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_output: Option<Vec<Row>>,
    pub expected_output: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    pub fn failed(test_case_number: usize, expected_output: Vec<Row>, error: String) -> Self {
        Self {
            test_case_number,
            passed: false,
            user_output: None,
            expected_output,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub correct: bool,
    pub test_results: Vec<TestResult>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Recorded,
    AlreadySolved,
}

/// Wire shape returned to the request-handling layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResponse {
    pub correct: bool,
    pub test_results: Vec<TestResult>,
    /// Wall time as `"<n>ms"`.
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionStatus>,
}

impl From<Evaluation> for EvaluationResponse {
    fn from(e: Evaluation) -> Self {
        Self {
            correct: e.correct,
            test_results: e.test_results,
            duration: format!("{}ms", e.duration_ms),
            submission: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub problem_id: i64,
    pub marks: i64,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_sha256: Option<String>,
}
