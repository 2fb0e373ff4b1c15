use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sqljudge",
    version,
    about = "Grades MySQL-dialect SQL answers against reference problems"
)]
pub struct Cli {
    /// Judge configuration; a missing file means defaults
    #[arg(long, global = true, default_value = "sqljudge.yaml")]
    pub config: PathBuf,

    /// Reject unknown configuration keys
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the SQLite form of MySQL-dialect SQL
    Translate(TranslateArgs),
    /// Evaluate a query against a problem without recording anything
    Evaluate(EvaluateArgs),
    /// Evaluate a query and record the score once when it is correct
    Submit(SubmitArgs),
    /// List a user's recorded submissions
    Submissions(SubmissionsArgs),
    User(UserArgs),
    /// Write a sample config and problem set
    Init(InitArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TranslateArgs {
    /// Read SQL from this file instead of stdin
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    /// Problem set file (.json or .yaml)
    #[arg(long)]
    pub problems: PathBuf,

    #[arg(long)]
    pub problem: i64,

    #[arg(long, conflicts_with = "query_file", required_unless_present = "query_file")]
    pub query: Option<String>,

    #[arg(long)]
    pub query_file: Option<PathBuf>,

    #[arg(long, default_value = "json")]
    pub format: String, // json|text
}

#[derive(clap::Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub query: QueryArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    #[arg(long)]
    pub user: String,

    /// Overrides `store.path` from the config
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SubmissionsArgs {
    #[arg(long)]
    pub user: String,

    #[arg(long)]
    pub db: Option<PathBuf>,

    #[arg(long, default_value = "text")]
    pub format: String, // text|json
}

#[derive(Parser, Clone)]
pub struct UserArgs {
    #[command(subcommand)]
    pub cmd: UserSub,
}

#[derive(Subcommand, Clone)]
pub enum UserSub {
    /// Register a user or update their display name
    Add {
        #[arg(long)]
        username: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = "problems.yaml")]
    pub problems: PathBuf,
}
