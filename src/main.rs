use anyhow::Result;
use tracing::info;

use university_catalog::config::Config;
use university_catalog::pipeline::{self, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables are already exported)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("university_catalog=info".parse()?),
        )
        .init();

    let command = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<Command>()?,
        None => Command::All,
    };

    // Load configuration from environment
    let config = Config::from_env()?;

    pipeline::run(command, &config).await?;

    info!("'{}' finished", command);
    Ok(())
}
