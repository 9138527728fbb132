//! HTTP API server
//!
//! JSON request/response mapping onto [`LockService`] operations, served
//! over HTTP/1.1 with hyper. Routes:
//!
//! | Method | Path            | Operation          |
//! |--------|-----------------|--------------------|
//! | POST   | `/lock/{name}`  | try-once acquire   |
//! | POST   | `/unlock/{name}`| owner release      |
//! | POST   | `/renew/{name}` | owner renew        |
//! | GET    | `/status/{name}`| single lock state  |
//! | GET    | `/locks`        | held locks by name |
//! | GET    | `/log`          | recent audit trail |
//! | GET    | `/metrics`      | Prometheus text    |
//! | GET    | `/health`       | liveness           |
//!
//! [`LockService`]: leasehold_core::usecases::LockService

use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use leasehold_core::api::{
    AcquireResponse, ErrorBody, LeaseRequest, LogEntry, ReleaseRequest, ReleaseResponse,
    RenewResponse, StatusResponse,
};
use leasehold_core::domain::{DomainError, LockError, LockName, Owner, Ttl};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::ServiceContext;

type HttpResponse = Response<Full<Bytes>>;

/// Largest request body accepted on the lease routes
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Successful handler result: metric outcome label plus the response
type Handled = Result<(&'static str, HttpResponse), ApiError>;

/// HTTP server bound to a socket and serving the lock API.
pub struct ApiServer {
    ctx: Arc<ServiceContext>,
    listener: TcpListener,
    addr: SocketAddr,
}

impl ApiServer {
    /// Binds the listening socket.
    ///
    /// # Arguments
    /// * `ctx` - Shared service context
    /// * `listen` - Address to bind, e.g. `"127.0.0.1:8000"`; port `0`
    ///   picks a free port (see [`ApiServer::local_addr`])
    pub async fn bind(ctx: Arc<ServiceContext>, listen: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = listen.parse()?;
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            ctx,
            listener,
            addr,
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts connections until the cancellation token is triggered.
    ///
    /// On shutdown the listener stops accepting and every open connection
    /// is asked to close gracefully; in-flight requests finish before this
    /// returns.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(addr = %self.addr, "API server listening");

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        Arc::clone(&self.ctx),
                        shutdown.clone(),
                    ));
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = shutdown.cancelled() => {
                    info!(open = connections.len(), "API server shutting down");
                    break;
                }
            }
        }

        drop(self.listener);
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Connection task failed");
            }
        }
        info!("API server stopped");
        Ok(())
    }
}

/// Serves one connection, switching to graceful close once `shutdown` fires
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ServiceContext>,
    shutdown: CancellationToken,
) {
    let service = service_fn(move |req| {
        let ctx = Arc::clone(&ctx);
        async move { Ok::<_, Infallible>(handle_request(req, &ctx).await) }
    });
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        debug!(peer = %peer, error = %e, "HTTP connection error");
    }
}

// ============================================================================
// Routing
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Lock(&'a str),
    Unlock(&'a str),
    Renew(&'a str),
    Status(&'a str),
    Locks,
    Log,
    Metrics,
    Health,
}

impl Route<'_> {
    fn method(&self) -> Method {
        match self {
            Route::Lock(_) | Route::Unlock(_) | Route::Renew(_) => Method::POST,
            _ => Method::GET,
        }
    }
}

/// Matches a raw (still percent-encoded) path against the route table
fn route(path: &str) -> Option<Route<'_>> {
    let path = path.strip_prefix('/')?;
    match path.split_once('/') {
        None => match path {
            "locks" => Some(Route::Locks),
            "log" => Some(Route::Log),
            "metrics" => Some(Route::Metrics),
            "health" => Some(Route::Health),
            _ => None,
        },
        Some((_, name)) if name.is_empty() || name.contains('/') => None,
        Some(("lock", name)) => Some(Route::Lock(name)),
        Some(("unlock", name)) => Some(Route::Unlock(name)),
        Some(("renew", name)) => Some(Route::Renew(name)),
        Some(("status", name)) => Some(Route::Status(name)),
        Some(_) => None,
    }
}

/// Handles a single HTTP request.
///
/// Generic over the body so it can be driven without a socket.
pub async fn handle_request<B>(req: Request<B>, ctx: &ServiceContext) -> HttpResponse
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let Some(route) = route(&path) else {
        debug!(method = %method, path = %path, "No route");
        return json_response(StatusCode::NOT_FOUND, &ErrorBody::new("Not Found"));
    };

    if method != route.method() {
        let mut response = json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorBody::new("Method Not Allowed"),
        );
        if let Ok(allow) = HeaderValue::from_str(route.method().as_str()) {
            response.headers_mut().insert(ALLOW, allow);
        }
        return response;
    }

    let (operation, result) = match route {
        Route::Lock(raw) => ("acquire", acquire(ctx, raw, req.into_body()).await),
        Route::Unlock(raw) => ("release", release(ctx, raw, req.into_body()).await),
        Route::Renew(raw) => ("renew", renew(ctx, raw, req.into_body()).await),
        Route::Status(raw) => ("status", status(ctx, raw).await),
        Route::Locks => ("list", list(ctx).await),
        Route::Log => return log(ctx).await.unwrap_or_else(ApiError::into_response),
        Route::Metrics => return metrics(ctx),
        Route::Health => {
            return json_response(StatusCode::OK, &serde_json::json!({"status": "ok"}));
        }
    };

    let (outcome, response) = match result {
        Ok(handled) => handled,
        Err(e) => (e.outcome(), e.into_response()),
    };
    ctx.metrics().record_operation(operation, outcome);

    debug!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        outcome,
        "Handled request"
    );
    response
}

// ============================================================================
// Handlers
// ============================================================================

async fn acquire<B>(ctx: &ServiceContext, raw_name: &str, body: B) -> Handled
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let name = decode_name(raw_name)?;
    let request: LeaseRequest = read_json(body).await?;
    let owner = Owner::new(request.owner)?;
    let ttl = ttl_or_default(request.ttl, ctx)?;

    let outcome = ctx.service().try_acquire(&name, &owner, ttl).await?;
    let label = if outcome.is_locked() {
        "locked"
    } else {
        "already_locked"
    };
    Ok((
        label,
        json_response(StatusCode::OK, &AcquireResponse::from(&outcome)),
    ))
}

async fn release<B>(ctx: &ServiceContext, raw_name: &str, body: B) -> Handled
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let name = decode_name(raw_name)?;
    let request: ReleaseRequest = read_json(body).await?;
    let owner = Owner::new(request.owner)?;

    ctx.service().release(&name, &owner).await?;
    Ok((
        "unlocked",
        json_response(StatusCode::OK, &ReleaseResponse::Unlocked),
    ))
}

async fn renew<B>(ctx: &ServiceContext, raw_name: &str, body: B) -> Handled
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let name = decode_name(raw_name)?;
    let request: LeaseRequest = read_json(body).await?;
    let owner = Owner::new(request.owner)?;
    let ttl = ttl_or_default(request.ttl, ctx)?;

    let outcome = ctx.service().renew(&name, &owner, ttl).await?;
    Ok((
        "renewed",
        json_response(StatusCode::OK, &RenewResponse::from(outcome)),
    ))
}

async fn status(ctx: &ServiceContext, raw_name: &str) -> Handled {
    let name = decode_name(raw_name)?;
    let status = ctx.service().status(&name).await?;
    let response = StatusResponse::from(&status);
    let label = match response {
        StatusResponse::Free => "free",
        StatusResponse::Locked { .. } => "locked",
    };
    Ok((label, json_response(StatusCode::OK, &response)))
}

async fn list(ctx: &ServiceContext) -> Handled {
    let active = ctx.service().list_active().await?;
    ctx.metrics().set_active_locks(active.len() as u64);
    Ok(("ok", json_response(StatusCode::OK, &active)))
}

async fn log(ctx: &ServiceContext) -> Result<HttpResponse, ApiError> {
    let events = ctx
        .audit()
        .recent(ctx.settings().log_page_size)
        .await
        .map_err(|e| ApiError::from(LockError::Storage(e)))?;
    let entries: Vec<LogEntry> = events.iter().map(LogEntry::from).collect();
    Ok(json_response(StatusCode::OK, &entries))
}

fn metrics(ctx: &ServiceContext) -> HttpResponse {
    match ctx.metrics().encode() {
        Ok(body) => response(
            StatusCode::OK,
            body,
            "text/plain; version=0.0.4; charset=utf-8",
        ),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ErrorBody::new(format!("Failed to encode metrics: {e}")),
            )
        }
    }
}

// ============================================================================
// Request helpers
// ============================================================================

fn decode_name(raw: &str) -> Result<LockName, ApiError> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| ApiError::unprocessable("Lock name is not valid UTF-8"))?;
    Ok(LockName::new(decoded.into_owned())?)
}

fn ttl_or_default(ttl: Option<i64>, ctx: &ServiceContext) -> Result<Ttl, ApiError> {
    match ttl {
        Some(seconds) => Ok(Ttl::from_secs(seconds)?),
        None => Ok(ctx.settings().default_ttl),
    }
}

async fn read_json<T, B>(body: B) -> Result<T, ApiError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let bytes = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            return Err(ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request body exceeds {MAX_BODY_BYTES} bytes"),
            ));
        }
        Err(e) => {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("Failed to read body: {e}"),
            ));
        }
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::unprocessable(format!("Invalid request body: {e}")))
}

// ============================================================================
// Responses and errors
// ============================================================================

fn response(
    status: StatusCode,
    body: impl Into<Bytes>,
    content_type: &'static str,
) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => response(status, bytes, "application/json"),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"detail":"Internal Server Error"}"#,
                "application/json",
            )
        }
    }
}

/// Error mapped to an HTTP status and a `{detail}` body
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    /// Metric outcome label
    fn outcome(&self) -> &'static str {
        match self.status {
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::FORBIDDEN => "forbidden",
            s if s.is_client_error() => "invalid",
            _ => "error",
        }
    }

    fn into_response(self) -> HttpResponse {
        json_response(self.status, &ErrorBody::new(self.detail))
    }
}

impl From<LockError> for ApiError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "Lock not found"),
            LockError::Forbidden { .. } => {
                Self::new(StatusCode::FORBIDDEN, "You don't own the lock")
            }
            LockError::Invalid(e) => Self::from(e),
            LockError::Storage(e) => {
                error!(error = %format!("{e:#}"), "Store operation failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self::unprocessable(e.to_string())
    }
}
