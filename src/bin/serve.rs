use std::path::PathBuf;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use clap::Parser;
use color_eyre::{Result, eyre::eyre};
use console::style;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use service_prompt::{
    config::AppConfig,
    credentials::{CachedExchange, CognitoExchange, CredentialExchange},
    flow::Submitter,
    invoke::LambdaInvoker,
    server::{self, AppState},
};

#[derive(Parser)]
#[command(version, about = "Serve the service prompt form")]
struct Args {
    /// Config file. Defaults to the OS config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn default_config_path() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| eyre!("OS user config directory missing"))?
        .join("service_prompt")
        .join("config.toml"))
}

async fn serve_with<E>(config: AppConfig, sdk_config: SdkConfig, exchange: E) -> Result<()>
where
    E: CredentialExchange + Send + Sync + 'static,
{
    let invoker = LambdaInvoker::new(sdk_config, config.aws.region.clone());
    let submitter = Submitter::new(config.aws.clone(), exchange, invoker);

    server::run(AppState::new(config, submitter)).await
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    println!(
        "{}",
        style(concat!("Service prompt v", env!("CARGO_PKG_VERSION"))).white()
    );

    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    info!("Loading config from {}", config_path.to_string_lossy());
    let config = AppConfig::load(&config_path)?;

    // Identity calls are unsigned; invocations get per-submission credentials.
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws.region.clone()))
        .no_credentials()
        .load()
        .await;

    let exchange = CognitoExchange::new(&sdk_config, config.cognito.clone());

    if config.credentials.cache {
        info!("Credential cache enabled");
        let exchange = CachedExchange::new(exchange, config.credentials.refresh_margin());
        serve_with(config, sdk_config, exchange).await
    } else {
        serve_with(config, sdk_config, exchange).await
    }
}
