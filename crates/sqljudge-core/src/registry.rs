use crate::model::Problem;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable problem set, built once and shared by `Arc`.
#[derive(Debug, Default)]
pub struct ProblemRegistry {
    problems: BTreeMap<i64, Arc<Problem>>,
}

impl ProblemRegistry {
    /// Later entries with a duplicate id replace earlier ones; the loader
    /// rejects duplicates before this point.
    pub fn new(problems: impl IntoIterator<Item = Problem>) -> Self {
        Self {
            problems: problems
                .into_iter()
                .map(|p| (p.id, Arc::new(p)))
                .collect(),
        }
    }

    pub fn get(&self, id: i64) -> Option<Arc<Problem>> {
        self.problems.get(&id).cloned()
    }

    /// Problems in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Problem>> {
        self.problems.values()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}
