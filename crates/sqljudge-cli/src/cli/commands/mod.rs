use super::args::{Cli, Command};
use sqljudge_core::config::{EvalSettings, JudgeConfig};
use sqljudge_core::engine::Evaluator;
use sqljudge_core::registry::ProblemRegistry;
use sqljudge_core::sandbox::SqliteBackend;
use sqljudge_core::storage::{Store, SubmissionRecorder};
use sqljudge_core::Judge;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod evaluate;
pub mod init;
pub mod submissions;
pub mod translate;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const TEST_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const PERSISTENCE_ERROR: i32 = 3;
}

pub async fn dispatch(cli: Cli, cfg: JudgeConfig) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Translate(args) => translate::run(args).await,
        Command::Evaluate(args) => evaluate::cmd_evaluate(args, &cfg).await,
        Command::Submit(args) => evaluate::cmd_submit(args, &cfg).await,
        Command::Submissions(args) => submissions::cmd_list(args, &cfg),
        Command::User(args) => submissions::cmd_user(args, &cfg),
        Command::Init(args) => init::run(args, &cli.config),
        Command::Version => {
            println!("sqljudge {}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

pub(crate) fn build_judge(
    registry: ProblemRegistry,
    settings: &EvalSettings,
    store: Store,
) -> Judge {
    let backend = Arc::new(SqliteBackend::new(settings.max_rows()));
    Judge::new(
        Arc::new(registry),
        Evaluator::new(backend, settings.clone()),
        SubmissionRecorder::new(store),
    )
}

/// Opens the durable store, `--db` taking precedence over the config.
pub(crate) fn open_store(db: Option<&Path>, cfg: &JudgeConfig) -> anyhow::Result<Store> {
    let path: PathBuf = db.map(Path::to_path_buf).unwrap_or_else(|| cfg.store.path.clone());
    let store = Store::open(&path)?;
    store.init_schema()?;
    tracing::debug!(event = "store.opened", path = %path.display());
    Ok(store)
}
