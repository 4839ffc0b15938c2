pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod state;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware, routing::get};
use http::StatusCode;
use clap::{Parser, ValueEnum, builder::FalseyValueParser};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

pub use auth::AuthConfig;
pub use config::ServerConfig;
pub use error::{AppError, AppResult, Error};
pub use handlers::Healthz;
pub use server::{Shutdown, Timeouts, serve, shutdown_signal};

use crate::auth::auth_middleware_fn;
use crate::handlers::{healthz_route, serve_files};
use crate::logging::{log_response, make_request_span};
use crate::state::AppState;

pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit: ",
    env!("GIT_COMMIT"),
    ")"
);

const AFTER_HELP: &str = "\
Environment variables:
  AUTH_USER   Username for authentication (default: joaquim)
  AUTH_HASH   Crypt hash of the password, MD5/SHA crypt or bcrypt (default: hash for 'amazon')
  AUTH_REALM  Authentication realm (default: amazon-server-logs.com)

Examples:
  amazon-vl /var/log 9000
  AUTH_USER=admin AUTH_HASH='$1$xyz...' amazon-vl /var/log 8080
  openssl passwd -1 -salt \"$(openssl rand -base64 6)\" \"your_password\"";

#[derive(Parser, Debug)]
#[command(name = "amazon-vl", author, version = VERSION, about, long_about = None, after_help = AFTER_HELP)]
pub struct Cli {
    /// Path to the directory containing files to serve
    pub directory: PathBuf,

    /// Port number to listen on (e.g. 8080, 9000)
    pub port: u16,

    /// Debug mode
    #[arg(long, short = 'd', env = "DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// Log format
    #[arg(long, env = "LOG_FORMAT", default_value = "full")]
    pub log_format: LogFormat,

    /// No color <https://no-color.org/>
    #[arg(long, env = "NO_COLOR", value_parser = FalseyValueParser::new())]
    pub no_color: bool,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Full,
    Compact,
    Pretty,
    Json,
}

/// `/healthz` is public, every other path goes through Basic auth into the file server
pub fn init_route(config: &ServerConfig) -> Router {
    let state = Arc::new(AppState::new(
        config.auth.clone(),
        config.directory.clone(),
    ));

    let protected = Router::new()
        .fallback(serve_files)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware_fn,
        ))
        .with_state(state);

    Router::new()
        .route("/healthz", get(healthz_route))
        .fallback_service(protected)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.timeouts.write,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span)
                .on_response(log_response),
        )
}

pub async fn run_server(config: &ServerConfig) -> Result<Shutdown, Error> {
    let addr = config.addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;
    let version = VERSION;
    info!(addr = %local_addr, dir = %config.directory.display(), %version, "server started");
    if config.auth.uses_default_credentials() {
        warn!("serving with built-in default credentials, set AUTH_USER and AUTH_HASH");
    }
    serve(listener, init_route(config), config.timeouts, shutdown_signal()).await
}
