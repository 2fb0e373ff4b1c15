use crate::errors::PersistenceError;
use crate::fingerprint::query_fingerprint;
use crate::model::Submission;
use crate::storage::store::{NewSubmission, Store};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded(Submission),
    /// The user already holds credit for this problem. Not an error.
    AlreadySolved,
}

/// Persists scored results exactly once per (user, problem).
#[derive(Clone)]
pub struct SubmissionRecorder {
    store: Store,
}

impl SubmissionRecorder {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// One `INSERT` on the blocking pool; the uniqueness constraint decides
    /// between concurrent attempts.
    pub async fn record(
        &self,
        username: &str,
        problem_id: i64,
        marks: i64,
        query: &str,
    ) -> Result<RecordOutcome, PersistenceError> {
        let store = self.store.clone();
        let username = username.to_string();
        let sha = query_fingerprint(query);

        let inserted = tokio::task::spawn_blocking(move || {
            store.insert_submission(&NewSubmission {
                username: &username,
                problem_id,
                marks,
                timestamp: chrono::Utc::now().timestamp(),
                query_sha256: Some(&sha),
            })
        })
        .await
        .map_err(|e| PersistenceError(format!("record task failed: {}", e)))??;

        let outcome = match inserted {
            Some(sub) => {
                tracing::info!(
                    event = "submission.recorded",
                    username = %sub.username,
                    problem_id,
                    marks
                );
                RecordOutcome::Recorded(sub)
            }
            None => {
                tracing::info!(event = "submission.already_solved", problem_id);
                RecordOutcome::AlreadySolved
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_record_is_already_solved() -> anyhow::Result<()> {
        let store = Store::memory()?;
        store.init_schema()?;
        let rec = SubmissionRecorder::new(store.clone());

        let first = rec.record("alice", 3, 20, "SELECT 1").await?;
        assert!(matches!(
            first,
            RecordOutcome::Recorded(ref s) if s.marks == 20 && s.problem_id == 3
        ));
        let second = rec.record("alice", 3, 20, "SELECT 2").await?;
        assert_eq!(second, RecordOutcome::AlreadySolved);
        assert_eq!(store.count_submissions()?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_schema_is_persistence_error() -> anyhow::Result<()> {
        let rec = SubmissionRecorder::new(Store::memory()?);
        let err = rec.record("alice", 1, 1, "SELECT 1").await.unwrap_err();
        assert!(err.to_string().contains("failed to record submission"), "{}", err);
        Ok(())
    }
}
