use super::{exit_codes, open_store};
use crate::cli::args::{SubmissionsArgs, UserArgs, UserSub};
use sqljudge_core::config::JudgeConfig;

pub fn cmd_list(args: SubmissionsArgs, cfg: &JudgeConfig) -> anyhow::Result<i32> {
    let store = match open_store(args.db.as_deref(), cfg) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("store error: {:#}", e);
            return Ok(exit_codes::PERSISTENCE_ERROR);
        }
    };
    let subs = store.submissions_for_user(&args.user)?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&subs)?);
        return Ok(exit_codes::OK);
    }
    if subs.is_empty() {
        println!("no submissions for {}", args.user);
    }
    for s in &subs {
        let when = chrono::DateTime::from_timestamp(s.timestamp, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| s.timestamp.to_string());
        println!("problem {:>4}  marks {:>4}  {}", s.problem_id, s.marks, when);
    }
    Ok(exit_codes::OK)
}

pub fn cmd_user(args: UserArgs, cfg: &JudgeConfig) -> anyhow::Result<i32> {
    match args.cmd {
        UserSub::Add { username, name, db } => {
            let store = match open_store(db.as_deref(), cfg) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("store error: {:#}", e);
                    return Ok(exit_codes::PERSISTENCE_ERROR);
                }
            };
            store.upsert_user(&username, &name)?;
            eprintln!("user {} saved", username);
            Ok(exit_codes::OK)
        }
    }
}
