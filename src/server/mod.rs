//! Server lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig
//!     → WebServer::new (validate, build AppState, assemble pipeline)
//!     → listen() / listen_on(port, host) (bind, spawn the accept loop)
//!     → close() (stop accepting, drain, resolve once the port is free)
//! ```
//!
//! # Design Decisions
//! - `listen` resolves only after the socket is bound, so a returned
//!   address is immediately connectable
//! - `close` joins the serve task instead of firing a shutdown signal
//!   and returning, so callers can rebind the port right away
//! - TLS listeners advertise h2 + http/1.1 via ALPN; plain listeners
//!   speak HTTP/1.1

mod tls;

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use tokio::net::TcpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{Protocol, ServerConfig};
use crate::error::{Error, Result};
use crate::pipeline::{self, state::AppState, Stage};
use crate::store::CacheStore;

/// How long `close` waits for in-flight connections before cutting them.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// An assembled server: config validated, pipeline built, ready to bind.
pub struct WebServer {
    state: Arc<AppState>,
    router: Router,
    shutdown_grace: Duration,
    active: Option<Active>,
}

/// A bound listener and the task draining it.
struct Active {
    handle: Handle,
    task: JoinHandle<io::Result<()>>,
    addr: SocketAddr,
}

impl WebServer {
    /// Validate the configuration and assemble the middleware pipeline.
    ///
    /// No sockets are touched here; the instance is inert until
    /// [`listen`](Self::listen).
    pub fn new(config: ServerConfig) -> Result<Self> {
        let state = Arc::new(AppState::from_config(config)?);

        let stages = pipeline::plan(&state.config);
        let names: Vec<&str> = stages.iter().map(Stage::name).collect();
        info!(
            stages = names.len(),
            protocol = ?state.config.protocol,
            "Pipeline assembled"
        );
        debug!(plan = ?names, "Enabled stages in order");

        let router = pipeline::assemble(state.clone());

        Ok(Self {
            state,
            router,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            active: None,
        })
    }

    /// The assembled router, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The shared cache store backing sessions, rate limiting and caching.
    pub fn store(&self) -> Arc<dyn CacheStore> {
        self.state.store.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// The bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.active.as_ref().map(|a| a.addr)
    }

    /// Override the drain deadline used by [`close`](Self::close).
    pub fn set_shutdown_grace(&mut self, grace: Duration) {
        self.shutdown_grace = grace;
    }

    /// Bind the configured host and port and start serving.
    pub async fn listen(&mut self) -> Result<SocketAddr> {
        let host = self.state.config.host.clone();
        let port = self.state.config.port;
        self.listen_on(port, &host).await
    }

    /// Bind an explicit port and host, overriding the configured pair.
    ///
    /// Resolves once the socket is bound; port 0 picks an ephemeral port
    /// and the returned address carries the real one.
    pub async fn listen_on(&mut self, port: u16, host: &str) -> Result<SocketAddr> {
        if self.active.is_some() {
            return Err(Error::AlreadyListening);
        }

        let addr = resolve(host, port)?;
        let listener = bind_listener(addr)?;
        let bound = listener.local_addr()?;

        let tls = match (&self.state.config.protocol, &self.state.config.ssl) {
            (Protocol::Https, Some(ssl)) => {
                Some(tls::load_tls_config(&ssl.cert_path, &ssl.key_path).await?)
            }
            _ => None,
        };

        let handle = Handle::new();
        let app = self
            .router
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>();

        let task = match tls {
            Some(tls_config) => tokio::spawn(
                axum_server::from_tcp_rustls(listener, tls_config)
                    .handle(handle.clone())
                    .serve(app),
            ),
            None => tokio::spawn(
                axum_server::from_tcp(listener)
                    .handle(handle.clone())
                    .serve(app),
            ),
        };

        info!(
            address = %bound,
            protocol = ?self.state.config.protocol,
            "Server listening"
        );

        self.active = Some(Active {
            handle,
            task,
            addr: bound,
        });
        Ok(bound)
    }

    /// Stop accepting, drain in-flight connections and release the port.
    ///
    /// Resolves only after the serve task has finished, so the port is
    /// free for rebinding when this returns.
    pub async fn close(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Err(Error::NotListening);
        };

        info!(address = %active.addr, "Server shutting down");
        active.handle.graceful_shutdown(Some(self.shutdown_grace));

        match active.task.await {
            Ok(Ok(())) => {
                info!(address = %active.addr, "Server stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(e) => Err(Error::Io(io::Error::new(io::ErrorKind::Other, e))),
        }
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| Error::config("host", format!("cannot resolve {host}")))
}

fn bind_listener(addr: SocketAddr) -> Result<std::net::TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    // Connections closed by the server linger in TIME_WAIT; without
    // reuseaddr a close-then-rebind on the same port can spuriously fail.
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;
    Ok(listener.into_std()?)
}
