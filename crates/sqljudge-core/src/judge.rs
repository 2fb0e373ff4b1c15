//! In-process entry point for the request-handling layer.

use crate::engine::Evaluator;
use crate::errors::JudgeError;
use crate::model::{EvaluationRequest, EvaluationResponse, Problem, SubmissionStatus};
use crate::registry::ProblemRegistry;
use crate::storage::{RecordOutcome, SubmissionRecorder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Judge {
    pub registry: Arc<ProblemRegistry>,
    pub evaluator: Evaluator,
    pub recorder: SubmissionRecorder,
}

impl Judge {
    pub fn new(
        registry: Arc<ProblemRegistry>,
        evaluator: Evaluator,
        recorder: SubmissionRecorder,
    ) -> Self {
        Self {
            registry,
            evaluator,
            recorder,
        }
    }

    /// Evaluates without recording anything.
    pub async fn evaluate(
        &self,
        req: &EvaluationRequest,
    ) -> Result<EvaluationResponse, JudgeError> {
        let problem = self.problem_for(req)?;
        let evaluation = self.evaluator.evaluate(&problem, &req.user_query).await;
        Ok(evaluation.into())
    }

    /// Evaluates and, when every test case passes, records the score once.
    pub async fn submit(
        &self,
        username: &str,
        req: &EvaluationRequest,
    ) -> Result<EvaluationResponse, JudgeError> {
        let problem = self.problem_for(req)?;
        let evaluation = self.evaluator.evaluate(&problem, &req.user_query).await;
        let correct = evaluation.correct;
        let mut response = EvaluationResponse::from(evaluation);
        if correct {
            let outcome = self
                .recorder
                .record(username, problem.id, problem.marks, &req.user_query)
                .await?;
            response.submission = Some(match outcome {
                RecordOutcome::Recorded(_) => SubmissionStatus::Recorded,
                RecordOutcome::AlreadySolved => SubmissionStatus::AlreadySolved,
            });
        }
        Ok(response)
    }

    fn problem_for(&self, req: &EvaluationRequest) -> Result<Arc<Problem>, JudgeError> {
        let problem = self
            .registry
            .get(req.problem_id)
            .ok_or(JudgeError::UnknownProblem(req.problem_id))?;
        if req.user_query.trim().is_empty() {
            return Err(JudgeError::EmptyQuery);
        }
        Ok(problem)
    }
}
