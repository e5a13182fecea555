//! The hyper service loop
//!
//! Routes `POST`/`GET`/`DELETE`/`OPTIONS` on the MCP path, binds requests
//! to sessions via the `Mcp-Session-Id` header, and runs the idle-session
//! sweep on a fixed interval.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body::Body as _;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use tern_mcp_protocol::McpError;

use crate::service::McpService;
use crate::{Result, SESSION_HEADER, apply_cors_headers, sse};

type ResponseBody = http_body_util::combinators::BoxBody<Bytes, std::convert::Infallible>;

/// Configuration for the HTTP MCP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path for the MCP endpoint
    pub mcp_path: String,
    /// Apply permissive CORS headers
    pub enable_cors: bool,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Serve GET SSE streams for server-initiated messages
    pub enable_sse: bool,
    /// Idle-session sweep interval
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".parse().unwrap(),
            mcp_path: "/mcp".to_string(),
            enable_cors: true,
            max_body_size: 1024 * 1024,
            enable_sse: true,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// HTTP MCP server over a kernel-provided [`McpService`]
pub struct HttpMcpServer<S: McpService> {
    config: ServerConfig,
    service: Arc<S>,
}

impl<S: McpService> HttpMcpServer<S> {
    pub fn new(config: ServerConfig, service: Arc<S>) -> Self {
        Self { config, service }
    }

    /// Bind and serve until the future is dropped
    pub async fn run(&self) -> Result<()> {
        self.start_sweep_task();

        let listener = TcpListener::bind(&self.config.bind_address).await?;
        info!("HTTP MCP server listening on {}", self.config.bind_address);
        info!("MCP endpoint available at {}", self.config.mcp_path);

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!(%peer_addr, "connection accepted");

            let config = self.config.clone();
            let service = self.service.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let handler = service_fn(move |req| {
                    handle_request(req, config.clone(), service.clone())
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, handler).await {
                    let text = err.to_string();
                    if text.contains("connection closed before message completed") {
                        debug!("client disconnected: {}", err);
                    } else {
                        error!("connection error: {}", err);
                    }
                }
            });
        }
    }

    fn start_sweep_task(&self) {
        let service = self.service.clone();
        let interval = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let expired = service.sweep_idle();
                for session_id in expired {
                    debug!(%session_id, "expired idle session");
                }
            }
        });
    }
}

async fn handle_request<S: McpService>(
    req: Request<hyper::body::Incoming>,
    config: ServerConfig,
    service: Arc<S>,
) -> std::result::Result<Response<ResponseBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!(%method, %path, "handling request");

    let mut response = if path == config.mcp_path {
        match method {
            Method::OPTIONS => empty_response(StatusCode::NO_CONTENT),
            Method::POST => handle_post(req, &config, service).await?,
            Method::GET => handle_get_sse(req, &config, service),
            Method::DELETE => handle_delete(req, service),
            _ => text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
        }
    } else {
        text_response(StatusCode::NOT_FOUND, "not found")
    };

    if config.enable_cors {
        apply_cors_headers(response.headers_mut());
    }
    Ok(response)
}

async fn handle_post<S: McpService>(
    req: Request<hyper::body::Incoming>,
    config: &ServerConfig,
    service: Arc<S>,
) -> std::result::Result<Response<ResponseBody>, hyper::Error> {
    let supplied_session = header_value(&req, SESSION_HEADER);

    if let Some(length) = req.body().size_hint().exact() {
        if length as usize > config.max_body_size {
            return Ok(text_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "request body too large",
            ));
        }
    }

    let (session_id, fresh) = match service.resolve_session(supplied_session.as_deref()) {
        Ok(resolved) => resolved,
        Err(McpError::SessionNotFound(id)) => {
            warn!(session_id = %id, "unknown session header");
            return Ok(text_response(StatusCode::NOT_FOUND, "unknown session"));
        }
        Err(err) => {
            return Ok(text_response(StatusCode::BAD_REQUEST, err.to_string()));
        }
    };
    if fresh {
        debug!(%session_id, "allocated session");
    }

    let body = req.into_body().collect().await?.to_bytes();
    if body.len() > config.max_body_size {
        return Ok(text_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "request body too large",
        ));
    }
    let Ok(body) = std::str::from_utf8(&body) else {
        return Ok(text_response(StatusCode::BAD_REQUEST, "body is not UTF-8"));
    };

    let outcome = service.handle_body(&session_id, body).await;

    let mut response = if outcome.parse_failed {
        json_response(StatusCode::BAD_REQUEST, &outcome.replies[0])
    } else if outcome.is_empty() {
        // Notification-only body
        empty_response(StatusCode::ACCEPTED)
    } else if outcome.batch {
        json_response(StatusCode::OK, &outcome.replies)
    } else {
        json_response(StatusCode::OK, &outcome.replies[0])
    };

    if let Ok(value) = session_id.parse() {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    Ok(response)
}

fn handle_get_sse<S: McpService>(
    req: Request<hyper::body::Incoming>,
    config: &ServerConfig,
    service: Arc<S>,
) -> Response<ResponseBody> {
    if !config.enable_sse {
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "SSE is disabled");
    }

    let accepts_sse = header_value(&req, "accept")
        .map(|a| a.to_ascii_lowercase().contains("text/event-stream"))
        .unwrap_or(false);
    if !accepts_sse {
        return text_response(
            StatusCode::NOT_ACCEPTABLE,
            "Accept header must include text/event-stream",
        );
    }

    let Some(session_id) = header_value(&req, SESSION_HEADER) else {
        return text_response(
            StatusCode::BAD_REQUEST,
            "Mcp-Session-Id header required for streaming requests",
        );
    };
    let Some(mut events) = service.take_event_stream(&session_id) else {
        return text_response(
            StatusCode::BAD_REQUEST,
            "unknown session or stream already attached",
        );
    };

    let (tx, rx) = mpsc::channel::<std::result::Result<Frame<Bytes>, std::convert::Infallible>>(32);
    let disconnect_service = service.clone();
    let stream_session = session_id.clone();
    tokio::spawn(async move {
        let mut keep_alive = tokio::time::interval(Duration::from_secs(15));
        keep_alive.tick().await;
        loop {
            let frame: Option<String> = tokio::select! {
                message = events.recv() => match message {
                    Some(message) => serde_json::to_value(&message)
                        .ok()
                        .map(|v| sse::format_sse_data(&v)),
                    None => break,
                },
                _ = keep_alive.tick() => Some(sse::keep_alive_frame().to_string()),
            };
            let Some(frame) = frame else { continue };
            if tx
                .send(Ok(Frame::data(Bytes::from(frame))))
                .await
                .is_err()
            {
                // Client went away: abort the session's in-flight calls
                debug!(session_id = %stream_session, "SSE client disconnected");
                disconnect_service.cancel_session(&stream_session);
                break;
            }
        }
    });

    let body = StreamBody::new(ReceiverStream::new(rx)).boxed();
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .body(body)
        .expect("SSE response");
    if let Ok(value) = session_id.parse() {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

fn handle_delete<S: McpService>(
    req: Request<hyper::body::Incoming>,
    service: Arc<S>,
) -> Response<ResponseBody> {
    let Some(session_id) = header_value(&req, SESSION_HEADER) else {
        return text_response(StatusCode::BAD_REQUEST, "Mcp-Session-Id header required");
    };
    if service.end_session(&session_id) {
        empty_response(StatusCode::NO_CONTENT)
    } else {
        text_response(StatusCode::NOT_FOUND, "unknown session")
    }
}

fn header_value(req: &Request<hyper::body::Incoming>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn empty_response(status: StatusCode) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()).boxed())
        .expect("empty response")
}

fn text_response(status: StatusCode, message: impl Into<String>) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(message.into())).boxed())
        .expect("text response")
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<ResponseBody> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"null".to_vec());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)).boxed())
        .expect("json response")
}
