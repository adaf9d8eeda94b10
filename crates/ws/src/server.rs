//! Path routing and the accept loop.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use bytes::Bytes;
use http::{Response, StatusCode};
use matchit::Router;
use micro_http::connection::HttpConnection;
use micro_http::handler::Handler;
use micro_http::protocol::{Reply, RequestHeader};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::WsConfig;
use crate::connection::Preflight;
use crate::handler::{HandlerFactory, UpgradeRequest};
use crate::handshake;
use crate::response::WebSocketResponse;

type Fallback = Arc<dyn Fn(&RequestHeader) -> Response<Bytes> + Send + Sync>;

/// Path to handler-factory bindings, compiled into a router when the server is built.
///
/// Registering a path again replaces the earlier factory.
#[derive(Default)]
pub struct PathTable {
    entries: HashMap<String, Arc<dyn HandlerFactory>>,
}

impl fmt::Debug for PathTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl PathTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_path(&mut self, path: impl Into<String>, factory: impl HandlerFactory + 'static) {
        self.entries.insert(path.into(), Arc::new(factory));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compiles the table; `{name}` segments become path parameters.
    pub fn build(self) -> Result<Router<Arc<dyn HandlerFactory>>, ServerBuildError> {
        let mut entries = self.entries.into_iter().collect::<Vec<_>>();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut router = Router::new();
        for (path, factory) in entries {
            router.insert(path.as_str(), factory).map_err(|e| ServerBuildError::InvalidPath { path, reason: e.to_string() })?;
        }
        Ok(router)
    }
}

pub struct ServerBuilder {
    address: Option<io::Result<Vec<SocketAddr>>>,
    paths: PathTable,
    preflight: Option<Arc<dyn Preflight>>,
    fallback: Option<Fallback>,
    config: WsConfig,
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder").field("paths", &self.paths).field("config", &self.config).finish_non_exhaustive()
    }
}

impl ServerBuilder {
    fn new() -> Self {
        Self { address: None, paths: PathTable::new(), preflight: None, fallback: None, config: WsConfig::default() }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn register_path(mut self, path: impl Into<String>, factory: impl HandlerFactory + 'static) -> Self {
        self.paths.register_path(path, factory);
        self
    }

    pub fn preflight(mut self, preflight: impl Preflight + 'static) -> Self {
        self.preflight = Some(Arc::new(preflight));
        self
    }

    /// Answers every request that is not a websocket upgrade to a registered path.
    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&RequestHeader) -> Response<Bytes> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    pub fn config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(|source| ServerBuildError::InvalidAddress { source })?;
        let router = self.paths.build()?;
        let fallback: Fallback = match self.fallback {
            Some(fallback) => fallback,
            None => Arc::new(not_found),
        };

        Ok(Server {
            router,
            preflight: self.preflight,
            fallback,
            config: self.config,
            address,
            shutdown: CancellationToken::new(),
        })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,

    #[error("invalid address: {source}")]
    InvalidAddress { source: io::Error },

    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
}

pub struct Server {
    router: Router<Arc<dyn HandlerFactory>>,
    preflight: Option<Arc<dyn Preflight>>,
    fallback: Fallback,
    config: WsConfig,
    address: Vec<SocketAddr>,
    shutdown: CancellationToken,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").field("address", &self.address).field("config", &self.config).finish_non_exhaustive()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Serves until the process ends.
    pub async fn start(self) {
        self.start_with_shutdown(std::future::pending()).await;
    }

    /// Serves until `signal` resolves, then closes every live websocket with 1001.
    pub async fn start_with_shutdown<S>(self, signal: S)
    where
        S: Future<Output = ()>,
    {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            warn!(cause = %e, "tracing subscriber already installed");
        }

        info!("start listening at {:?}", self.address);
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return;
            }
        };

        self.serve(tcp_listener, signal).await;
    }

    /// Runs the accept loop on an already bound listener.
    pub async fn serve<S>(self, tcp_listener: TcpListener, signal: S)
    where
        S: Future<Output = ()>,
    {
        let shutdown = self.shutdown.clone();
        let close_timeout = self.config.get_close_timeout();
        let tracker = TaskTracker::new();
        let handler = Arc::new(self);

        tokio::pin!(signal);
        loop {
            let (tcp_stream, _remote_addr) = tokio::select! {
                () = &mut signal => break,
                accepted = tcp_listener.accept() => match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            let handler = handler.clone();

            tracker.spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::new(reader, writer);
                match connection.process(handler).await {
                    Ok(()) => {
                        info!("finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!("service has error, cause {}, connection shutdown", e);
                    }
                }
            });
        }

        info!(live = tracker.len(), "shutting down, closing live connections");
        shutdown.cancel();
        tracker.close();

        // websockets get the close timeout to finish their closing handshake; idle
        // http keep-alive connections are not waited for beyond it
        if tokio::time::timeout(close_timeout, tracker.wait()).await.is_err() {
            warn!(live = tracker.len(), "connections still open after shutdown");
        }
    }

    fn route(&self, header: RequestHeader) -> Reply {
        if handshake::is_upgrade_request(&header) {
            let matched = self.router.at(header.uri().path()).ok().map(|matched| {
                let params = matched.params.iter().map(|(key, value)| (key.to_owned(), value.to_owned())).collect::<Vec<_>>();
                (matched.value.clone(), params)
            });

            if let Some((factory, params)) = matched {
                let response = WebSocketResponse::new(UpgradeRequest::new(header, params), factory, self.config.clone())
                    .preflight(self.preflight.clone())
                    .shutdown(self.shutdown.clone());
                return Reply::upgrade(response);
            }
        }

        Reply::Response((self.fallback)(&header))
    }
}

impl Handler for Server {
    type Error = Infallible;

    async fn call(&self, req: RequestHeader) -> Result<Reply, Self::Error> {
        Ok(self.route(req))
    }
}

fn not_found(_header: &RequestHeader) -> Response<Bytes> {
    handshake::plain_text(StatusCode::NOT_FOUND, "not found\n")
}
