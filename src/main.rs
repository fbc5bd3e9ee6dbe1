use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use ecrscan::config::ConfigError;
use ecrscan::{
    CancellationToken, Client, ClientConfig, ImageScanningConfiguration,
    PutImageScanningConfigurationInput,
};

#[derive(Parser, Debug)]
#[command(name = "ecrscan", version, about = "Manage repository image scanning settings")]
struct Cli {
    /// Region to send requests to (overrides config and environment)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Custom endpoint, e.g. a local emulator
    #[arg(long, global = true)]
    endpoint_url: Option<String>,

    /// JSON client config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Total attempts per call, including the first
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Log filter, e.g. `info` or `ecrscan=debug`
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn scan-on-push on or off for a repository
    PutImageScanningConfiguration {
        #[arg(long)]
        repository_name: String,

        #[arg(long)]
        registry_id: Option<String>,

        #[arg(long, action = ArgAction::Set)]
        scan_on_push: bool,
    },
}

fn load_config(cli: &Cli) -> Result<ClientConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;

    if let Some(region) = &cli.region {
        config.region = region.clone();
    }
    if let Some(endpoint) = &cli.endpoint_url {
        config.base_endpoint = Some(endpoint.clone());
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };
    let client = match Client::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Command::PutImageScanningConfiguration {
            repository_name,
            registry_id,
            scan_on_push,
        } => {
            let mut input = PutImageScanningConfigurationInput::new(
                repository_name,
                ImageScanningConfiguration::new(scan_on_push),
            );
            input.registry_id = registry_id;

            match client
                .put_image_scanning_configuration(&cancel, input, &[])
                .await
            {
                Ok(output) => match serde_json::to_string_pretty(&output) {
                    Ok(json) => {
                        println!("{}", json);
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        error!("Failed to encode output: {}", e);
                        ExitCode::FAILURE
                    }
                },
                Err(e) if e.is_canceled() => {
                    eprintln!("{}", e);
                    ExitCode::from(130)
                }
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
