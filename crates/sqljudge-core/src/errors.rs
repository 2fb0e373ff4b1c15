use std::fmt;

/// Failure of a single test case. Attached to its `TestResult`, never
/// propagated past the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Provisioning or fixture loading failed; RUN never started.
    Setup(String),
    /// The user's statements were rejected by the backend.
    Execution(String),
    Timeout { after_ms: u64 },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Setup(msg) => write!(f, "setup failed: {}", msg),
            EvalError::Execution(msg) => write!(f, "{}", msg),
            EvalError::Timeout { after_ms } => {
                write!(f, "query exceeded the {}ms execution deadline", after_ms)
            }
        }
    }
}

impl std::error::Error for EvalError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceError(pub String);

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to record submission: {}", self.0)
    }
}

impl std::error::Error for PersistenceError {}

impl From<anyhow::Error> for PersistenceError {
    fn from(e: anyhow::Error) -> Self {
        PersistenceError(format!("{:#}", e))
    }
}

/// Request-level failures of the judge facade.
#[derive(Debug)]
pub enum JudgeError {
    UnknownProblem(i64),
    EmptyQuery,
    Persistence(PersistenceError),
}

impl fmt::Display for JudgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JudgeError::UnknownProblem(id) => write!(f, "problem {} not found", id),
            JudgeError::EmptyQuery => write!(f, "query is empty"),
            JudgeError::Persistence(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for JudgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JudgeError::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PersistenceError> for JudgeError {
    fn from(e: PersistenceError) -> Self {
        JudgeError::Persistence(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}
