use super::exit_codes;
use crate::cli::args::TranslateArgs;
use anyhow::Context;
use tokio::io::AsyncReadExt;

pub async fn run(args: TranslateArgs) -> anyhow::Result<i32> {
    let sql = match &args.file {
        Some(p) => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("failed to read {}", p.display()))?,
        None => {
            let mut s = String::new();
            tokio::io::stdin()
                .read_to_string(&mut s)
                .await
                .context("failed to read stdin")?;
            s
        }
    };
    println!("{}", sqljudge_core::translate::translate(&sql));
    Ok(exit_codes::OK)
}
