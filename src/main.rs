use std::process::ExitCode;

use amazon_vl::{AuthConfig, Cli, LogFormat, ServerConfig, Shutdown, run_server};
use clap::Parser as _;
use tracing::{Level, error, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::builder()
        .with_default_directive(if cli.debug {
            Level::DEBUG.into()
        } else {
            Level::INFO.into()
        })
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_ansi(!cli.no_color)
        .with_env_filter(filter)
        .with_target(false);
    match cli.log_format {
        LogFormat::Full => builder.init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version land here too
            let code = if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = err.print();
            return code;
        }
    };
    init_tracing(&cli);

    let config = match ServerConfig::new(cli.directory, cli.port, AuthConfig::from_env()) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run_server(&config).await {
        Ok(Shutdown::Graceful) => ExitCode::SUCCESS,
        Ok(Shutdown::Forced) => {
            warn!("server closed with requests still in flight");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "server failed");
            ExitCode::FAILURE
        }
    }
}
