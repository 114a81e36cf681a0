use clap::Parser;
use devcamper_api::cli::{self, Cli};
use devcamper_api::config::{self, AppConfig};
use devcamper_api::database::PgStore;
use devcamper_api::models;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    AppConfig::load_env_files();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = config::config();

    let store = PgStore::connect(&config.database, &models::ALL).await?;
    store.migrate().await?;

    if let Err(e) = cli::run(cli, &store, &config.security).await {
        match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
            _ => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }

    Ok(())
}
