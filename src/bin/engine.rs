use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use spot_clob::config::Settings;
use spot_clob::driver;
use spot_clob::engine;
use spot_clob::metrics::install_recorder;
use spot_clob::MatchingEngine;

#[derive(Parser, Debug)]
#[command(name = "engine")]
struct Args {
    /// Settings file; the built-in two-user directory is used when omitted.
    #[arg(long)]
    config: Option<String>,
    /// Request file with one JSON request per line; stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Print Prometheus metrics to stderr once the input is exhausted.
    #[arg(long)]
    dump_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load_or_default(args.config.as_deref())?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if settings.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    let prom = install_recorder()?;

    info!(
        base = %settings.market.base_asset,
        quote = %settings.market.quote_asset,
        users = settings.users.len(),
        "starting engine"
    );
    let (handle, task) = engine::spawn(MatchingEngine::from_settings(&settings), settings.engine.channel_capacity);

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let served = driver::run(&handle, reader, tokio::io::stdout()).await?;

    drop(handle);
    let engine = task.await?;
    info!(served, resting = engine.book().len(), "input exhausted");

    if args.dump_metrics {
        eprintln!("{}", prom.render());
    }
    Ok(())
}
