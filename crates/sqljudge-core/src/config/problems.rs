//! Problem-set files, owned by the outer surface. The engine only sees the
//! resulting `ProblemRegistry`.

use crate::errors::ConfigError;
use crate::model::Problem;
use crate::registry::ProblemRegistry;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// A file holds either a bare list of problems or `{ problems: [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProblemFile {
    List(Vec<Problem>),
    Wrapped { problems: Vec<Problem> },
}

impl ProblemFile {
    fn into_problems(self) -> Vec<Problem> {
        match self {
            ProblemFile::List(p) | ProblemFile::Wrapped { problems: p } => p,
        }
    }
}

pub fn load_problem_set(path: &Path) -> Result<ProblemRegistry, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ConfigError(format!("failed to read problem set {}: {}", path.display(), e))
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let problems = parse_problems(&raw, is_json)
        .map_err(|e| ConfigError(format!("{} (file: {})", e.0, path.display())))?;
    tracing::debug!(
        event = "problems.loaded",
        count = problems.len(),
        path = %path.display()
    );
    Ok(ProblemRegistry::new(problems))
}

pub fn parse_problems(raw: &str, is_json: bool) -> Result<Vec<Problem>, ConfigError> {
    let file: ProblemFile = if is_json {
        serde_json::from_str(raw).map_err(|e| ConfigError(format!("failed to parse JSON: {}", e)))?
    } else {
        serde_yaml::from_str(raw).map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?
    };
    let problems = file.into_problems();

    let mut seen = BTreeSet::new();
    for p in &problems {
        if !seen.insert(p.id) {
            return Err(ConfigError(format!("duplicate problem id {}", p.id)));
        }
        if p.test_cases.is_empty() {
            return Err(ConfigError(format!("problem {} has no test cases", p.id)));
        }
    }
    Ok(problems)
}
