//! One named service: its bound addresses, its controllers and its accept
//! loops.
//!
//! Lifecycle: `Created ─► Started ─► Stopped` (a stopped service may be
//! started again). Controllers and addresses can only change while the
//! service is `Created`; the registry is frozen from the first start on.
//!
//! Each bound address gets its own accept loop (an `axum::serve` task).
//! Every accepted connection is served on its own task, so a slow
//! operation never holds up the accept loop or any other request.
//! [`WebService::stop`] stops the accept loops without draining: requests
//! already dispatched keep running to completion on their own.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{HeaderValue, CONNECTION, CONTENT_TYPE};
use axum::http::{Method, StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use resthost_core::{
    Controller, ControllerRegistry, Dispatcher, EventLog, IncomingRequest, RegistryError,
    ResponseWriter,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Service '{0}' is already started")]
    AlreadyStarted(String),

    #[error("Service '{0}' is not started")]
    NotStarted(String),

    /// Controllers and addresses are fixed once the service has started.
    #[error("Service '{0}' can no longer be reconfigured")]
    Frozen(String),

    #[error("Service '{0}' has no addresses to bind")]
    NoAddresses(String),

    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to bind '{address}': {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Where a service is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Started,
    Stopped,
}

struct Running {
    shutdown: watch::Sender<bool>,
    local_addrs: Vec<SocketAddr>,
}

/// A named REST service.
pub struct WebService {
    name: String,
    addresses: Vec<String>,
    registry: Arc<ControllerRegistry>,
    log: EventLog,
    state: ServiceState,
    running: Option<Running>,
}

impl WebService {
    pub fn new<I, S>(name: impl Into<String>, addresses: I, log: EventLog) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        WebService {
            name: name.into(),
            addresses: addresses.into_iter().map(Into::into).collect(),
            registry: Arc::new(ControllerRegistry::new()),
            log,
            state: ServiceState::Created,
            running: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == ServiceState::Started
    }

    /// Configured addresses, as written.
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Actually bound socket addresses while started. Useful with port `0`.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        self.running
            .as_ref()
            .map(|running| running.local_addrs.as_slice())
            .unwrap_or_default()
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn add_address(&mut self, address: impl Into<String>) -> Result<(), ServiceError> {
        self.ensure_created()?;
        self.addresses.push(address.into());
        Ok(())
    }

    pub fn register_controller(
        &mut self,
        name: &str,
        controller: Arc<dyn Controller>,
    ) -> Result<(), ServiceError> {
        self.registry_mut()?.register(name, controller)?;
        Ok(())
    }

    pub fn unregister_controller(&mut self, name: &str) -> Result<(), ServiceError> {
        self.registry_mut()?.unregister(name)?;
        Ok(())
    }

    /// Bind every address and start accepting.
    ///
    /// All addresses are bound before any accept loop starts, so a bind
    /// failure leaves nothing running.
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        if self.state == ServiceState::Started {
            return Err(ServiceError::AlreadyStarted(self.name.clone()));
        }
        if self.addresses.is_empty() {
            return Err(ServiceError::NoAddresses(self.name.clone()));
        }

        self.log.info(format!("[{}] Starting service", self.name));

        let mut listeners = Vec::with_capacity(self.addresses.len());
        for address in &self.addresses {
            match bind(address).await {
                Ok(listener) => listeners.push(listener),
                Err(e) => {
                    self.log.error(format!("[{}] {}", self.name, e));
                    return Err(e);
                }
            }
        }

        let dispatcher = Arc::new(Dispatcher::new(
            self.name.clone(),
            Arc::clone(&self.registry),
            self.log.clone(),
        ));
        // Bodies of any size reach the dispatcher; there is no 413 path.
        let app = Router::new()
            .fallback(handle_request)
            .layer(DefaultBodyLimit::disable())
            .with_state(dispatcher);

        let (shutdown, stopped) = watch::channel(false);
        let mut local_addrs = Vec::with_capacity(listeners.len());
        for listener in listeners {
            if let Ok(addr) = listener.local_addr() {
                local_addrs.push(addr);
            }
            tokio::spawn(accept_loop(
                listener,
                app.clone(),
                stopped.clone(),
                self.name.clone(),
                self.log.clone(),
            ));
        }

        self.running = Some(Running {
            shutdown,
            local_addrs,
        });
        self.state = ServiceState::Started;
        Ok(())
    }

    /// Stop accepting new connections. In-flight requests are not waited for.
    pub fn stop(&mut self) -> Result<(), ServiceError> {
        let Some(running) = self.running.take() else {
            return Err(ServiceError::NotStarted(self.name.clone()));
        };
        self.log.info(format!("[{}] Stopping service", self.name));
        running.shutdown.send_replace(true);
        self.state = ServiceState::Stopped;
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), ServiceError> {
        if self.state == ServiceState::Created {
            Ok(())
        } else {
            Err(ServiceError::Frozen(self.name.clone()))
        }
    }

    fn registry_mut(&mut self) -> Result<&mut ControllerRegistry, ServiceError> {
        self.ensure_created()?;
        Arc::get_mut(&mut self.registry).ok_or_else(|| ServiceError::Frozen(self.name.clone()))
    }
}

impl fmt::Debug for WebService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebService")
            .field("name", &self.name)
            .field("addresses", &self.addresses)
            .field("controllers", &self.registry.len())
            .field("state", &self.state)
            .finish()
    }
}

// ── Accept loop ──────────────────────────────────────────────────────────────

/// Serve one bound listener until the service is stopped or dropped.
async fn accept_loop(
    listener: TcpListener,
    app: Router,
    mut stopped: watch::Receiver<bool>,
    name: String,
    log: EventLog,
) {
    let shutdown = async move {
        // A dropped sender (service dropped) also ends the loop.
        let _ = stopped.wait_for(|stopped| *stopped).await;
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        log.error(format!("[{}] Listener failed: {}", name, e));
    }
}

/// Every request, whatever its method or path, goes through the dispatcher.
async fn handle_request(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let request = IncomingRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body: body.to_vec(),
    };
    let (mut writer, response) = ConnectionWriter::new();

    // A client that disconnects drops this handler, never the dispatch task,
    // so the failed write still reaches the log.
    tokio::spawn(async move {
        dispatcher.dispatch(&request, &mut writer).await;
    });

    into_response(response.await.unwrap_or_default())
}

/// Status is always 200; failures travel inside the envelope.
fn into_response(parts: ResponseParts) -> Response {
    let mut response = Response::new(Body::from(parts.body));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    if let Some(content_type) = parts.content_type {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}

// ── Response stream ──────────────────────────────────────────────────────────

/// A finished response, handed from the dispatch task to the connection.
#[derive(Debug, Default)]
struct ResponseParts {
    content_type: Option<&'static str>,
    body: Vec<u8>,
}

/// The [`ResponseWriter`] of one live connection.
///
/// Writes fail once the connection's handler is gone. `close` hands the
/// response over to the connection.
struct ConnectionWriter {
    content_type: Option<&'static str>,
    body: Vec<u8>,
    connection: Option<oneshot::Sender<ResponseParts>>,
}

impl ConnectionWriter {
    fn new() -> (Self, oneshot::Receiver<ResponseParts>) {
        let (connection, response) = oneshot::channel();
        let writer = ConnectionWriter {
            content_type: None,
            body: Vec::new(),
            connection: Some(connection),
        };
        (writer, response)
    }
}

#[async_trait]
impl ResponseWriter for ConnectionWriter {
    fn set_content_type(&mut self, content_type: &'static str) {
        self.content_type = Some(content_type);
    }

    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match &self.connection {
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "response stream already closed",
            )),
            Some(connection) if connection.is_closed() => Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "client disconnected",
            )),
            Some(_) => {
                self.body.extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let parts = ResponseParts {
            content_type: self.content_type,
            body: std::mem::take(&mut self.body),
        };
        // Nothing is left to report for a connection lost after the last write.
        let _ = connection.send(parts);
    }
}

// ── Addresses ────────────────────────────────────────────────────────────────

async fn bind(address: &str) -> Result<TcpListener, ServiceError> {
    let target = bind_target(address)?;
    TcpListener::bind(&target)
        .await
        .map_err(|source| ServiceError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Accept either `host:port` or an `http://host:port/path` prefix, where
/// `+` and `*` mean every interface. The prefix path is ignored.
fn bind_target(address: &str) -> Result<String, ServiceError> {
    let invalid = |reason: String| ServiceError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    if !address.contains("://") {
        return Ok(address.to_string());
    }

    let normalized = address.replacen("://+", "://0.0.0.0", 1).replacen("://*", "://0.0.0.0", 1);
    let url = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    let host = url
        .host_str()
        .ok_or_else(|| invalid("missing host".to_string()))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid("missing port".to_string()))?;
    Ok(format!("{}:{}", host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use resthost_core::{OperationDescriptor, OperationTable};

    fn ping() -> Arc<dyn Controller> {
        Arc::new(
            OperationTable::new().operation(OperationDescriptor::new("Ping"), |_| async {
                Ok("pong")
            }),
        )
    }

    #[test]
    fn bind_target_accepts_socket_addresses() {
        assert_eq!(bind_target("127.0.0.1:8080").unwrap(), "127.0.0.1:8080");
    }

    #[test]
    fn bind_target_accepts_http_prefixes() {
        assert_eq!(
            bind_target("http://localhost:8080/api/").unwrap(),
            "localhost:8080"
        );
        assert_eq!(bind_target("http://+:9000/").unwrap(), "0.0.0.0:9000");
        assert_eq!(bind_target("http://*:9001/").unwrap(), "0.0.0.0:9001");
        assert_eq!(bind_target("http://example.com/").unwrap(), "example.com:80");
    }

    #[test]
    fn bind_target_rejects_other_schemes() {
        assert!(matches!(
            bind_target("https://localhost:8443/"),
            Err(ServiceError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn blank_controller_name_registers_default() {
        let mut service = WebService::new("api", ["127.0.0.1:0"], EventLog::silent("api"));
        service.register_controller("", ping()).unwrap();
        assert!(service.registry().get("Default").is_some());
    }

    #[test]
    fn duplicate_controller_is_a_registry_error() {
        let mut service = WebService::new("api", ["127.0.0.1:0"], EventLog::silent("api"));
        service.register_controller("Foo", ping()).unwrap();
        assert!(matches!(
            service.register_controller("Foo", ping()),
            Err(ServiceError::Registry(RegistryError::AlreadyRegistered(_)))
        ));
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let mut service = WebService::new("api", ["127.0.0.1:0"], EventLog::silent("api"));
        assert_eq!(service.state(), ServiceState::Created);
        assert!(matches!(service.stop(), Err(ServiceError::NotStarted(_))));

        service.start().await.unwrap();
        assert!(service.is_listening());
        assert_eq!(service.local_addrs().len(), 1);
        assert!(matches!(
            service.start().await,
            Err(ServiceError::AlreadyStarted(_))
        ));
        assert!(matches!(
            service.register_controller("Late", ping()),
            Err(ServiceError::Frozen(_))
        ));

        service.stop().unwrap();
        assert_eq!(service.state(), ServiceState::Stopped);
        assert!(service.local_addrs().is_empty());

        service.start().await.unwrap();
        assert!(service.is_listening());
        service.stop().unwrap();
    }

    #[tokio::test]
    async fn start_without_addresses_fails() {
        let mut service = WebService::new("api", Vec::<String>::new(), EventLog::silent("api"));
        assert!(matches!(
            service.start().await,
            Err(ServiceError::NoAddresses(_))
        ));
    }

    #[tokio::test]
    async fn connection_writer_hands_over_on_close() {
        let (mut writer, response) = ConnectionWriter::new();
        writer.set_content_type("application/json");
        writer.write_all(b"{}").await.unwrap();
        writer.close();
        writer.close();

        let parts = response.await.unwrap();
        assert_eq!(parts.content_type, Some("application/json"));
        assert_eq!(parts.body, b"{}");
        assert!(writer.write_all(b"more").await.is_err());
    }

    #[tokio::test]
    async fn connection_writer_fails_once_the_client_is_gone() {
        let (mut writer, response) = ConnectionWriter::new();
        drop(response);
        let err = writer.write_all(b"{}").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[tokio::test]
    async fn bind_failure_leaves_service_created() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let mut service = WebService::new(
            "api",
            ["127.0.0.1:0".to_string(), format!("127.0.0.1:{}", port)],
            EventLog::silent("api"),
        );
        assert!(matches!(service.start().await, Err(ServiceError::Bind { .. })));
        assert_eq!(service.state(), ServiceState::Created);
    }
}
