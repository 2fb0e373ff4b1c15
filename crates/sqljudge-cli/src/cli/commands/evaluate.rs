use super::{build_judge, exit_codes, open_store};
use crate::cli::args::{EvaluateArgs, QueryArgs, SubmitArgs};
use anyhow::Context;
use sqljudge_core::config::problems::load_problem_set;
use sqljudge_core::config::JudgeConfig;
use sqljudge_core::model::{EvaluationRequest, EvaluationResponse, SubmissionStatus};
use sqljudge_core::registry::ProblemRegistry;
use sqljudge_core::storage::Store;
use sqljudge_core::JudgeError;

pub async fn cmd_evaluate(args: EvaluateArgs, cfg: &JudgeConfig) -> anyhow::Result<i32> {
    let Some((registry, req)) = prepare(&args.query)? else {
        return Ok(exit_codes::CONFIG_ERROR);
    };
    // nothing is recorded, so a scratch store is enough
    let store = Store::memory()?;
    store.init_schema()?;
    let judge = build_judge(registry, &cfg.settings, store);

    let res = judge.evaluate(&req).await;
    finish(res, &args.query.format)
}

pub async fn cmd_submit(args: SubmitArgs, cfg: &JudgeConfig) -> anyhow::Result<i32> {
    let Some((registry, req)) = prepare(&args.query)? else {
        return Ok(exit_codes::CONFIG_ERROR);
    };
    let store = match open_store(args.db.as_deref(), cfg) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("store error: {:#}", e);
            return Ok(exit_codes::PERSISTENCE_ERROR);
        }
    };
    let judge = build_judge(registry, &cfg.settings, store);

    let res = judge.submit(&args.user, &req).await;
    finish(res, &args.query.format)
}

fn prepare(q: &QueryArgs) -> anyhow::Result<Option<(ProblemRegistry, EvaluationRequest)>> {
    let registry = match load_problem_set(&q.problems) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(None);
        }
    };
    let user_query = match (&q.query, &q.query_file) {
        (Some(s), _) => s.clone(),
        (None, Some(p)) => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read query file {}", p.display()))?,
        (None, None) => anyhow::bail!("one of --query or --query-file is required"),
    };
    Ok(Some((
        registry,
        EvaluationRequest {
            problem_id: q.problem,
            user_query,
        },
    )))
}

fn finish(res: Result<EvaluationResponse, JudgeError>, format: &str) -> anyhow::Result<i32> {
    let resp = match res {
        Ok(r) => r,
        Err(e @ JudgeError::Persistence(_)) => {
            eprintln!("{}", e);
            return Ok(exit_codes::PERSISTENCE_ERROR);
        }
        Err(e) => {
            eprintln!("{}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&resp)?);
    } else {
        print!("{}", render_text(&resp));
    }
    Ok(if resp.correct {
        exit_codes::OK
    } else {
        exit_codes::TEST_FAILED
    })
}

fn render_text(resp: &EvaluationResponse) -> String {
    let mut s = String::new();
    for r in &resp.test_results {
        let status = if r.passed { "PASS" } else { "FAIL" };
        s.push_str(&format!("test case {}: {}", r.test_case_number, status));
        if let Some(err) = &r.error {
            s.push_str(&format!(" ({})", err));
        }
        s.push('\n');
    }
    s.push_str(&format!(
        "{} in {}\n",
        if resp.correct { "correct" } else { "incorrect" },
        resp.duration
    ));
    match resp.submission {
        Some(SubmissionStatus::Recorded) => s.push_str("submission recorded\n"),
        Some(SubmissionStatus::AlreadySolved) => s.push_str("already solved\n"),
        None => {}
    }
    s
}
