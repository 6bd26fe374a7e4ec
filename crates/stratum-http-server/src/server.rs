//! Stratum HTTP server with SessionStorage integration
//!
//! Binds a listener, serves one HTTP/1.1 exchange per connection on its own
//! task, and shuts down when the `stop` method or the owner cancels the
//! shutdown token.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use stratum_json_rpc::{
    DispatcherConfig, FunctionHandler, JsonRpcDispatcher, JsonRpcHandler, JsonRpcRequest,
    MethodError, MethodRegistry, RegistryError, SessionContext,
};
use stratum_session_storage::{BoxedSessionStorage, InMemorySessionStorage};

use crate::{HttpRpcError, Result, SessionDispatcher, SessionHttpHandler};

/// Name of the always-present method that shuts the server down
pub const STOP_METHOD: &str = "stop";

/// Smallest connection read buffer hyper accepts
pub const MIN_READ_BUFFER_SIZE: usize = 8192;

/// Configuration for the HTTP RPC server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Paths answering RPC traffic; everything else is 404
    pub rpc_paths: Vec<String>,
    /// Per-connection read buffer: the most hyper pulls off the socket at once,
    /// and the cap on the request head. Raised to [`MIN_READ_BUFFER_SIZE`] if smaller.
    pub max_chunk_size: usize,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Deadline for reading a whole request body
    pub body_read_timeout: Duration,
    /// Session expiry time in minutes (default: 30 minutes)
    pub session_expiry_minutes: u64,
    /// How often idle sessions are swept
    pub session_cleanup_interval: Duration,
    /// How long in-flight connections may finish after shutdown starts
    pub shutdown_grace: Duration,
    /// Include handler diagnostics in internal-error faults
    pub expose_internal_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8081)),
            rpc_paths: vec!["/".to_string(), "/RPC2".to_string()],
            max_chunk_size: 10 * 1024 * 1024, // 10MB per read
            max_body_size: 64 * 1024 * 1024,  // 64MB
            body_read_timeout: Duration::from_secs(30),
            session_expiry_minutes: 30,
            session_cleanup_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
            expose_internal_errors: false,
        }
    }
}

/// Builder for the HTTP RPC server with pluggable storage
pub struct HttpRpcServerBuilder {
    config: ServerConfig,
    registry: MethodRegistry<MethodError>,
    registry_error: Option<RegistryError>,
    session_storage: Arc<BoxedSessionStorage>,
    shutdown: CancellationToken,
}

impl HttpRpcServerBuilder {
    /// Create a new builder with in-memory storage (zero-configuration)
    pub fn new() -> Self {
        Self::with_storage(Arc::new(InMemorySessionStorage::new()))
    }

    /// Create a new builder with specific session storage
    pub fn with_storage(session_storage: Arc<BoxedSessionStorage>) -> Self {
        Self {
            config: ServerConfig::default(),
            registry: MethodRegistry::new().reserve(STOP_METHOD),
            registry_error: None,
            session_storage,
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Set the paths that answer RPC traffic
    pub fn rpc_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.rpc_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-connection read buffer size
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.config.max_chunk_size = size;
        self
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    pub fn body_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.body_read_timeout = timeout;
        self
    }

    /// Set session expiry time in minutes
    pub fn session_expiry_minutes(mut self, minutes: u64) -> Self {
        self.config.session_expiry_minutes = minutes;
        self
    }

    pub fn session_cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.session_cleanup_interval = interval;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.config.expose_internal_errors = expose;
        self
    }

    /// Use an externally owned shutdown token
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Register a JSON-RPC handler for specific methods.
    /// Registration errors surface from [`HttpRpcServerBuilder::build`].
    pub fn register_handler<H, I, S>(mut self, methods: I, handler: H) -> Self
    where
        H: JsonRpcHandler<Error = MethodError> + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.registry_error.is_none()
            && let Err(err) = self.registry.register_methods(methods, handler)
        {
            self.registry_error = Some(err);
        }
        self
    }

    /// Build the server. Installs the `stop` method.
    pub fn build(mut self) -> Result<HttpRpcServer> {
        if let Some(err) = self.registry_error.take() {
            return Err(err.into());
        }
        if self.config.session_cleanup_interval.is_zero() {
            return Err(HttpRpcError::Config(
                "session_cleanup_interval must be non-zero".to_string(),
            ));
        }

        let token = self.shutdown.clone();
        self.registry.register_reserved(
            STOP_METHOD,
            FunctionHandler::new(move |_request: JsonRpcRequest, session: SessionContext| {
                let token = token.clone();
                Box::pin(async move {
                    info!("Stop requested by session {}", session.session_id);
                    token.cancel();
                    Ok(json!("ok"))
                }) as BoxFuture<'static, std::result::Result<Value, MethodError>>
            }),
        )?;

        let methods = self.registry.methods();
        let dispatcher = Arc::new(JsonRpcDispatcher::new(
            self.registry,
            DispatcherConfig {
                expose_internal_errors: self.config.expose_internal_errors,
            },
        ));

        let config = Arc::new(self.config);
        let handler = SessionHttpHandler::new(
            Arc::clone(&config),
            SessionDispatcher::new(dispatcher, Arc::clone(&self.session_storage)),
            Arc::clone(&self.session_storage),
        );

        Ok(HttpRpcServer {
            config,
            handler,
            session_storage: self.session_storage,
            shutdown: self.shutdown,
            methods,
        })
    }
}

impl Default for HttpRpcServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP RPC server with SessionStorage integration
#[derive(Clone)]
pub struct HttpRpcServer {
    config: Arc<ServerConfig>,
    handler: SessionHttpHandler,
    session_storage: Arc<BoxedSessionStorage>,
    shutdown: CancellationToken,
    methods: Vec<String>,
}

impl HttpRpcServer {
    /// Create a new builder with default in-memory storage
    pub fn builder() -> HttpRpcServerBuilder {
        HttpRpcServerBuilder::new()
    }

    /// Create a new builder with specific session storage
    pub fn builder_with_storage(
        session_storage: Arc<BoxedSessionStorage>,
    ) -> HttpRpcServerBuilder {
        HttpRpcServerBuilder::with_storage(session_storage)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registered method names, `stop` included
    pub fn registered_methods(&self) -> &[String] {
        &self.methods
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request handler, for embedding in another hyper service
    pub fn handler(&self) -> &SessionHttpHandler {
        &self.handler
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("Stratum HTTP server listening on {}", local_addr);
        info!("RPC endpoints: {}", self.config.rpc_paths.join(", "));
        info!("Session storage: {}", self.session_storage.backend_name());
        debug!("Registered methods: {}", self.methods.join(", "));

        let tracker = TaskTracker::new();
        self.start_session_cleanup(&tracker);
        let read_buffer = self.config.max_chunk_size.max(MIN_READ_BUFFER_SIZE);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!("Failed to accept connection: {}", err);
                            continue;
                        }
                    };
                    debug!("New connection from {}", peer_addr);

                    let handler = self.handler.clone();
                    tracker.spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let handler = handler.clone();
                            async move { Ok::<_, Infallible>(handler.serve(req).await) }
                        });

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(false)
                            .max_buf_size(read_buffer)
                            .serve_connection(io, service)
                            .await
                        {
                            if err.is_incomplete_message() {
                                debug!("Client disconnected early: {}", err);
                            } else {
                                error!("Error serving connection: {}", err);
                            }
                        }
                    });
                }
            }
        }

        drop(listener);
        info!("Shutting down, waiting for {} tasks", tracker.len());
        tracker.close();
        if tokio::time::timeout(self.config.shutdown_grace, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "{} connections still open after {:?}",
                tracker.len(),
                self.config.shutdown_grace
            );
        }
        info!("Stratum HTTP server stopped");
        Ok(())
    }

    /// Start background session cleanup task
    fn start_session_cleanup(&self, tracker: &TaskTracker) {
        let storage = Arc::clone(&self.session_storage);
        let token = self.shutdown.clone();
        let session_expiry_minutes = self.config.session_expiry_minutes;
        let period = self.config.session_cleanup_interval;
        tracker.spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let expire_time = expiry_cutoff(SystemTime::now(), session_expiry_minutes);
                match storage.expire_sessions(expire_time).await {
                    Ok(expired) => {
                        for session_id in expired {
                            debug!("Expired session: {}", session_id);
                        }
                    }
                    Err(err) => {
                        error!("Session cleanup error: {}", err);
                    }
                }
            }
        });
    }

    /// Get server statistics
    pub async fn get_stats(&self) -> ServerStats {
        let session_count = self.session_storage.session_count().await.unwrap_or(0);
        let pending_count = self.session_storage.pending_count().await.unwrap_or(0);

        ServerStats {
            sessions: session_count,
            pending: pending_count,
            storage_type: self.session_storage.backend_name().to_string(),
        }
    }
}

/// Oldest activity time a session may have and still be kept
fn expiry_cutoff(now: SystemTime, expiry_minutes: u64) -> SystemTime {
    let ttl = Duration::from_secs(expiry_minutes.saturating_mul(60));
    now.checked_sub(ttl).unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Server statistics
#[derive(Debug, Clone)]
pub struct ServerStats {
    pub sessions: usize,
    pub pending: usize,
    pub storage_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};

    struct Banner;

    #[async_trait]
    impl JsonRpcHandler for Banner {
        type Error = MethodError;

        async fn handle(
            &self,
            _request: &JsonRpcRequest,
            _session: &SessionContext,
        ) -> std::result::Result<Value, Self::Error> {
            Ok(json!("Welcome"))
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.rpc_paths, vec!["/", "/RPC2"]);
        assert_eq!(config.max_chunk_size, 10 * 1024 * 1024);
        assert_eq!(config.session_expiry_minutes, 30);
        assert!(!config.expose_internal_errors);
    }

    #[test]
    fn test_builder() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 3000);
        let server = HttpRpcServer::builder()
            .bind_address(addr)
            .rpc_paths(["/rpc"])
            .max_body_size(2048)
            .register_handler(["server.banner"], Banner)
            .build()
            .unwrap();

        assert_eq!(server.config().bind_address, addr);
        assert_eq!(server.config().rpc_paths, vec!["/rpc"]);
        assert_eq!(server.config().max_body_size, 2048);
        assert_eq!(server.registered_methods(), ["server.banner", "stop"]);
    }

    #[test]
    fn test_stop_is_reserved() {
        let result = HttpRpcServer::builder()
            .register_handler([STOP_METHOD], Banner)
            .build();
        assert!(matches!(
            result,
            Err(crate::HttpRpcError::Registry(RegistryError::Reserved(_)))
        ));
    }

    #[test]
    fn test_duplicate_registration_fails_build() {
        let result = HttpRpcServer::builder()
            .register_handler(["server.banner"], Banner)
            .register_handler(["server.banner"], Banner)
            .build();
        assert!(matches!(
            result,
            Err(crate::HttpRpcError::Registry(RegistryError::Duplicate(_)))
        ));
    }

    #[test]
    fn test_zero_cleanup_interval_is_rejected() {
        let result = HttpRpcServer::builder()
            .session_cleanup_interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(HttpRpcError::Config(_))));
    }

    #[test]
    fn test_expiry_cutoff() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(3600);
        assert_eq!(
            expiry_cutoff(now, 30),
            SystemTime::UNIX_EPOCH + Duration::from_secs(1800)
        );
        assert_eq!(expiry_cutoff(now, 120), SystemTime::UNIX_EPOCH);
        assert_eq!(expiry_cutoff(now, u64::MAX), SystemTime::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_huge_expiry_keeps_cleanup_running() {
        let server = HttpRpcServer::builder()
            .session_expiry_minutes(u64::MAX)
            .session_cleanup_interval(Duration::from_millis(10))
            .build()
            .unwrap();
        let tracker = TaskTracker::new();
        server.start_session_cleanup(&tracker);
        server.session_storage.create_session().await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.len(), 1);
        assert_eq!(server.get_stats().await.sessions, 1);

        server.shutdown_token().cancel();
        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test]
    async fn test_server_stats() {
        let server = HttpRpcServer::builder().build().unwrap();

        let stats = server.get_stats().await;
        assert_eq!(stats.sessions, 0);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.storage_type, "InMemory");
    }
}
