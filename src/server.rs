use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, extract::ConnectInfo};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::{TokioIo, TokioTimer};
use parking_lot::Mutex;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::JoinSet,
    time::Instant,
};
use tower::ServiceExt as _;
use tracing::{debug, error, info, warn};

use crate::error::Error;

/// Fixed per-connection and shutdown durations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Request headers must arrive within this window
    pub read: Duration,
    /// Handlers must produce a response within this window
    pub write: Duration,
    /// Keep-alive connections without a request in flight are closed after this
    pub idle: Duration,
    /// Upper bound on waiting for in-flight requests during shutdown
    pub drain: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(15),
            write: Duration::from_secs(15),
            idle: Duration::from_secs(60),
            drain: Duration::from_secs(30),
        }
    }
}

/// How the server stopped after a shutdown signal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    Graceful,
    Forced,
}

struct ActivityState {
    in_flight: usize,
    last_seen: Instant,
}

/// Request bookkeeping of a single connection
struct Activity {
    state: Mutex<ActivityState>,
}

struct ActivityGuard(Arc<Activity>);

impl Activity {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ActivityState {
                in_flight: 0,
                last_seen: Instant::now(),
            }),
        })
    }

    fn begin(self: &Arc<Self>) -> ActivityGuard {
        let mut state = self.state.lock();
        state.in_flight += 1;
        state.last_seen = Instant::now();
        ActivityGuard(Arc::clone(self))
    }

    fn idle_deadline(&self, idle: Duration) -> Instant {
        let state = self.state.lock();
        if state.in_flight > 0 {
            Instant::now() + idle
        } else {
            state.last_seen + idle
        }
    }

    fn is_idle(&self, idle: Duration) -> bool {
        let state = self.state.lock();
        state.in_flight == 0 && state.last_seen.elapsed() >= idle
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.last_seen = Instant::now();
    }
}

const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Process or system ran out of descriptors or buffers, accepting again later may succeed
#[cfg(unix)]
fn is_resource_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_err: &io::Error) -> bool {
    false
}

fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

async fn serve_connection(
    builder: http1::Builder,
    stream: TcpStream,
    remote_addr: SocketAddr,
    router: Router,
    idle_timeout: Duration,
    mut close_rx: watch::Receiver<()>,
) {
    let activity = Activity::new();
    let service = service_fn({
        let activity = Arc::clone(&activity);
        move |mut request: hyper::Request<Incoming>| {
            request.extensions_mut().insert(ConnectInfo(remote_addr));
            let guard = activity.begin();
            let router = router.clone();
            async move {
                let response = router.oneshot(request).await;
                drop(guard);
                response
            }
        }
    });
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut closing = false;
    loop {
        let idle_deadline = activity.idle_deadline(idle_timeout);
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(err) = result {
                    debug!(%err, %remote_addr, "connection closed with error");
                }
                break;
            }
            _ = close_rx.changed(), if !closing => {
                closing = true;
                conn.as_mut().graceful_shutdown();
            }
            () = tokio::time::sleep_until(idle_deadline), if !closing => {
                if activity.is_idle(idle_timeout) {
                    debug!(%remote_addr, "closing idle connection");
                    closing = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }
    }
}

/// Accept connections on `listener` until `signal` resolves, then drain.
///
/// In-flight requests get `timeouts.drain` to finish once the signal fires.
/// Connections still open after that are aborted and [`Shutdown::Forced`] is
/// returned. Running out of descriptors pauses accepting for a second; any other
/// non-recoverable accept error ends the loop with [`Error::Accept`].
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    timeouts: Timeouts,
    signal: F,
) -> Result<Shutdown, Error>
where
    F: Future<Output = ()>,
{
    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(timeouts.read)
        .keep_alive(true);

    let (close_tx, close_rx) = watch::channel(());
    let mut connections = JoinSet::new();
    tokio::pin!(signal);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            () = &mut signal => break,
        };
        let (stream, remote_addr) = match accepted {
            Ok(accepted) => accepted,
            Err(err) if is_connection_error(&err) => {
                debug!(%err, "failed to accept connection");
                continue;
            }
            Err(err) if is_resource_exhaustion(&err) => {
                warn!(%err, backoff = ?ACCEPT_BACKOFF, "failed to accept connection, retrying");
                tokio::select! {
                    () = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                    () = &mut signal => break,
                }
            }
            Err(err) => return Err(Error::Accept(err)),
        };
        while connections.try_join_next().is_some() {}
        connections.spawn(serve_connection(
            builder.clone(),
            stream,
            remote_addr,
            router.clone(),
            timeouts.idle,
            close_rx.clone(),
        ));
    }

    drop(listener);
    info!(active = connections.len(), "initiating graceful shutdown");
    close_tx.send_replace(());

    let drained = tokio::time::timeout(timeouts.drain, async {
        while connections.join_next().await.is_some() {}
    })
    .await
    .is_ok();
    if drained {
        info!("server stopped gracefully");
        return Ok(Shutdown::Graceful);
    }

    warn!(
        abandoned = connections.len(),
        drain = ?timeouts.drain,
        "could not stop server gracefully, closing connections"
    );
    connections.shutdown().await;
    Ok(Shutdown::Forced)
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to install interrupt handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(%err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!(signal = "interrupt", "shutdown signal received"),
        () = terminate => info!(signal = "terminate", "shutdown signal received"),
    }
}
