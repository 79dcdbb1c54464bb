use clap::Parser;
use tp_dashboard::{
    app,
    config::{load_config, Args},
    logging::init_logging,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let _log_guard = init_logging(&config);
    app::run(config).await
}
