use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::LISTEN_BACKLOG;
use crate::error::ServerError;
use crate::http::connection::{Connection, ConnectionContext};
use crate::server::barrier::InFlight;

/// Pause after a failed accept, e.g. when the process is out of descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Creates a listening socket with `SO_REUSEADDR` and the fixed backlog.
///
/// IPv6 sockets are v6-only so they can share a port with the IPv4
/// any-address listener instead of colliding with it as dual-stack.
pub fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let bind_error = |source| ServerError::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_error)?;

    if addr.is_ipv6() {
        socket.set_only_v6(true).map_err(bind_error)?;
    }
    socket.set_reuse_address(true).map_err(bind_error)?;
    socket.set_nonblocking(true).map_err(bind_error)?;
    socket.bind(&addr.into()).map_err(bind_error)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_error)?;

    TcpListener::from_std(socket.into()).map_err(bind_error)
}

/// Accepts connections until `shutdown` fires, spawning one task per socket.
///
/// Each connection enters `in_flight` before its task is spawned and leaves
/// when the task ends, so a stop that joins this loop and then waits on the
/// barrier sees every connection accepted here.
pub async fn run(
    listener: TcpListener,
    context: Arc<ConnectionContext>,
    mut shutdown: broadcast::Receiver<()>,
    in_flight: InFlight,
) {
    let local = listener.local_addr().ok();

    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((socket, peer)) => {
                debug!("Accepted connection from {}", peer);

                let guard = in_flight.enter();
                let context = Arc::clone(&context);
                tokio::spawn(async move {
                    let mut conn = Connection::new(socket, peer.to_string(), context);
                    if let Err(e) = conn.run().await {
                        warn!("Connection error from {}: {:#}", peer, e);
                    }
                    drop(guard);
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }

    if let Some(addr) = local {
        info!("Stopped accepting on {}", addr);
    }
}
