use anyhow::Result;
use clap::Parser;
use cli::{Cli, TraceLevel};
use dotenv::dotenv;
use gongmo_core::{sync, Config};
use gongmo_naver::NaverClient;
use gongmo_sheets::{SheetsClient, SheetsConfig};
use tracing::{error, info, subscriber, trace, Level};
use tracing_subscriber::FmtSubscriber;

mod cli;

fn preprocess(trace_level: Level) {
    dotenv().ok();
    let my_subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level)
        .finish();
    subscriber::set_global_default(my_subscriber).expect("Set subscriber");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.trace {
        TraceLevel::DEBUG => Level::DEBUG,
        TraceLevel::INFO => Level::INFO,
        TraceLevel::WARN => Level::WARN,
        TraceLevel::ERROR => Level::ERROR,
    };

    preprocess(log_level);
    trace!("Command line input recorded: {cli:#?}");

    // anything that bubbles up here is fatal: bad config, missing
    // credentials, or a sheet write that failed
    if let Err(e) = run(&cli).await {
        error!("run failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = Config::from_env()?;
    let naver = NaverClient::new(&config.user_agent)?;
    let sheets = SheetsClient::connect(SheetsConfig::from_env()?)?;

    if cli.full_refresh {
        info!("starting a full refresh");
        sync::run_full_refresh(&config, &naver, &naver, &sheets).await?;
    } else {
        info!("starting an incremental sync");
        sync::run_incremental(&config, &naver, &naver, &sheets).await?;
    }

    info!("done");
    Ok(())
}
