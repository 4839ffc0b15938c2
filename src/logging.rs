use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::{ConnectInfo, Request},
    response::Response,
};
use tracing::{Span, info, info_span};

/// Span wrapping a single request, carrying who asked for what
pub fn make_request_span(request: &Request) -> Span {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| String::from("-"), |ConnectInfo(addr)| addr.to_string());
    info_span!(
        "request",
        %remote_addr,
        method = %request.method(),
        path = %request.uri().path()
    )
}

pub fn log_response(response: &Response, latency: Duration, _span: &Span) {
    info!(status = response.status().as_u16(), ?latency, "request completed");
}

