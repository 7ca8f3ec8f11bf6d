//! HTTP relay implementation.
//!
//! Forwards one inbound request to the selected backend over HTTP/1.1 and
//! streams the response back.

use crate::backend::Backend;
use crate::proxy::StreamingBody;
use crate::state::AppContext;
use crate::util::RequestId;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::body::{Body, Incoming};
use hyper::header::{CONTENT_TYPE, HOST, HeaderMap, HeaderName, HeaderValue};
use hyper::{Request, Response, StatusCode, Version};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{Span, debug, error, instrument, warn};

/// Boxed error type carried by relayed bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body type returned to the client.
pub type RelayBody = BoxBody<Bytes, BoxError>;

/// Response headers that describe the backend connection rather than the
/// response, and so are not copied to the client.
const CONNECTION_HEADERS: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Relay timeouts.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Limit for the whole backend exchange, response body included.
    pub backend_timeout: Option<Duration>,
    /// Limit for writing the response body to the client.
    pub write_timeout: Option<Duration>,
}

/// How a relayed request ended. Each request ends in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Backend response fully streamed to the client.
    Succeeded,
    /// No backend could be chosen for the request.
    SelectionFailed,
    /// Backend did not answer within the backend timeout.
    TimedOut,
    /// Backend unreachable, refused the connection, or broke the exchange.
    DispatchFailed,
    /// Response body copy failed after the headers were sent.
    CopyFailed,
}

impl std::fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RelayOutcome::Succeeded => "succeeded",
            RelayOutcome::SelectionFailed => "selection_failed",
            RelayOutcome::TimedOut => "timed_out",
            RelayOutcome::DispatchFailed => "dispatch_failed",
            RelayOutcome::CopyFailed => "copy_failed",
        };
        f.write_str(name)
    }
}

/// HTTP relay error.
#[derive(Debug, thiserror::Error)]
pub enum HttpProxyError {
    #[error("failed to connect to backend: {0}")]
    BackendConnectError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] hyper::Error),

    #[error("failed to build backend request: {0}")]
    InvalidRequest(#[from] hyper::http::Error),

    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),
}

impl HttpProxyError {
    /// Outcome recorded for this failure.
    pub fn outcome(&self) -> RelayOutcome {
        match self {
            HttpProxyError::Timeout(_) => RelayOutcome::TimedOut,
            _ => RelayOutcome::DispatchFailed,
        }
    }

    /// Status returned to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            HttpProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            HttpProxyError::InvalidRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Relay a single HTTP request to a backend.
///
/// Never fails: selection and dispatch failures become error responses, and
/// body copy failures are logged by [`StreamingBody`].
#[instrument(skip_all, fields(
    request_id = tracing::field::Empty,
    method = %req.method(),
    uri = %req.uri(),
    client = ?client_addr,
    backend = tracing::field::Empty,
))]
pub async fn relay_request<B>(
    req: Request<B>,
    client_addr: Option<SocketAddr>,
    ctx: AppContext,
) -> Result<Response<RelayBody>, Infallible>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    let started = Instant::now();
    let dispatch_start = tokio::time::Instant::now();
    let request_id = RequestId::from_headers(req.headers());
    Span::current().record("request_id", request_id.as_str());

    debug!("request received");

    let backend = match ctx.selector().next(client_addr) {
        Ok(backend) => backend.clone(),
        Err(e) => {
            warn!(
                error = %e,
                outcome = %RelayOutcome::SelectionFailed,
                "backend selection failed"
            );
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "No backend could be selected",
            ));
        }
    };
    Span::current().record("backend", backend.url());

    let outbound = match build_outbound_request(req, &backend) {
        Ok(outbound) => outbound,
        Err(e) => {
            error!(
                error = %e,
                outcome = %e.outcome(),
                "failed to build backend request"
            );
            return Ok(error_response(e.status(), "Failed to create request"));
        }
    };

    debug!("dispatching request to backend");

    let backend_timeout = ctx.relay().backend_timeout;
    let exchange = send_to_backend(outbound, &backend);
    let result = match backend_timeout {
        Some(limit) => tokio::time::timeout(limit, exchange)
            .await
            .unwrap_or(Err(HttpProxyError::Timeout(limit))),
        None => exchange.await,
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            warn!(
                error = %e,
                duration_ms = started.elapsed().as_millis(),
                outcome = %e.outcome(),
                "backend request failed"
            );
            let message = match e.outcome() {
                RelayOutcome::TimedOut => format!("Backend {} didn't respond in time", backend),
                _ => format!("Backend {} is unavailable", backend),
            };
            return Ok(error_response(e.status(), &message));
        }
    };

    let (mut parts, body) = response.into_parts();
    remove_connection_headers(&mut parts.headers);

    debug!(status = parts.status.as_u16(), "backend response headers received");

    // The body must finish within what is left of the backend timeout and
    // within the write timeout, whichever ends first.
    let backend_deadline = backend_timeout.map(|t| dispatch_start + t);
    let write_deadline = ctx
        .relay()
        .write_timeout
        .map(|t| tokio::time::Instant::now() + t);
    let deadline = match (backend_deadline, write_deadline) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    let body = StreamingBody::new(
        body,
        deadline,
        backend.url(),
        request_id,
        parts.status.as_u16(),
        started,
    )
    .boxed();

    Ok(Response::from_parts(parts, body))
}

/// Build the request sent to the backend.
///
/// Keeps the method, the body and every header (repeated headers keep all
/// their values in order), points the URI at the backend's base path plus the
/// inbound path and query, and sets `Host` to the backend's authority.
pub fn build_outbound_request<B>(
    req: Request<B>,
    backend: &Backend,
) -> Result<Request<B>, HttpProxyError> {
    let (parts, body) = req.into_parts();

    let uri = backend
        .target_uri(parts.uri.path_and_query())
        .map_err(hyper::http::Error::from)?;

    let mut headers = parts.headers;
    headers.insert(HOST, backend.host_header().clone());

    let mut outbound = Request::new(body);
    *outbound.method_mut() = parts.method;
    *outbound.uri_mut() = uri;
    *outbound.version_mut() = Version::HTTP_11;
    *outbound.headers_mut() = headers;

    Ok(outbound)
}

/// Connect to the backend and send the request.
///
/// The connection is driven by its own task. Dropping the returned future,
/// or the response body later on, closes the backend connection, so a
/// client that disconnects does not leave the backend exchange running.
async fn send_to_backend<B>(
    req: Request<B>,
    backend: &Backend,
) -> Result<Response<Incoming>, HttpProxyError>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    let stream = TcpStream::connect(backend.connect_addr()).await?;
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "failed to set TCP_NODELAY on backend connection");
    }

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    let backend_url = backend.url().to_string();
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(backend = %backend_url, error = %e, "backend connection error");
        }
    });

    Ok(sender.send_request(req).await?)
}

fn remove_connection_headers(headers: &mut HeaderMap) {
    for name in CONNECTION_HEADERS {
        headers.remove(HeaderName::from_static(name));
    }
}

/// Create an error response.
pub fn error_response(status: StatusCode, message: &str) -> Response<RelayBody> {
    let body = Full::new(Bytes::from(format!("{}: {}\n", status, message)))
        .map_err(|never| match never {})
        .boxed();

    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
