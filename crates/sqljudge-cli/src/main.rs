use clap::Parser;

mod cli;
mod templates;

use cli::args::Cli;
use cli::commands::{dispatch, exit_codes};
use sqljudge_core::config::{load_config, JudgeConfig};
use tracing_subscriber::{fmt, EnvFilter};

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();

    // a missing config file means defaults; a broken one is fatal
    let cfg = if cli.config.exists() {
        load_config(&cli.config, cli.strict)
    } else {
        Ok(JudgeConfig::default())
    };
    let cfg = match cfg {
        Ok(cfg) => cfg.with_env_overrides(),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };
    init_logging(&cfg.log_level);

    let code = match dispatch(cli, cfg).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}
