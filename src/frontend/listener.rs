//! Frontend listener implementation.
//!
//! Accepts incoming connections and serves each one with HTTP/1.1, relaying
//! every request to a backend.

use crate::config::normalize_listen_address;
use crate::proxy::relay_request;
use crate::state::AppContext;
use crate::util::ShutdownListener;
use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};

/// Frontend listener that accepts and handles connections.
pub struct FrontendListener {
    /// Address as configured.
    address: String,
    /// Shared selector and timeouts.
    ctx: AppContext,
    /// TCP listener.
    listener: TcpListener,
}

impl FrontendListener {
    /// Bind a listener to a configured address.
    ///
    /// `:port` binds every interface.
    pub async fn bind(address: &str, ctx: AppContext) -> std::io::Result<Self> {
        let listener = TcpListener::bind(normalize_listen_address(address)).await?;

        info!(
            listen = %address,
            local_addr = ?listener.local_addr().ok(),
            algorithm = %ctx.selector().algorithm(),
            backends = ctx.selector().backends().len(),
            "frontend listener bound"
        );

        Ok(Self {
            address: address.to_string(),
            ctx,
            listener,
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the listener, accepting connections until shutdown.
    #[instrument(skip_all, fields(listen = %self.address))]
    pub async fn run(self, mut shutdown: ShutdownListener) {
        info!("frontend listener starting");

        loop {
            tokio::select! {
                // Accept new connections
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                // Handle shutdown signal
                _ = shutdown.recv() => {
                    info!("frontend listener shutting down");
                    break;
                }
            }
        }
    }

    /// Serve an accepted connection on its own task.
    fn handle_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY on client connection");
        }

        let ctx = self.ctx.clone();
        let read_timeout = ctx.read_timeout();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let io = TokioIo::new(stream);

            let service = service_fn(move |req: Request<Incoming>| {
                relay_request(req, Some(client_addr), ctx.clone())
            });

            let mut builder = http1::Builder::new();
            builder.keep_alive(true);
            if let Some(timeout) = read_timeout {
                builder.timer(TokioTimer::new()).header_read_timeout(timeout);
            }

            let result = builder.serve_connection(io, service).await;
            let duration = start_time.elapsed();

            match result {
                Ok(()) => {
                    debug!(
                        client = %client_addr,
                        duration_ms = duration.as_millis(),
                        "connection completed"
                    );
                }
                Err(e) => {
                    warn!(
                        client = %client_addr,
                        duration_ms = duration.as_millis(),
                        error = %e,
                        "connection handling failed"
                    );
                }
            }
        });
    }
}
