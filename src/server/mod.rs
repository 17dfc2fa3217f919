//! HTTP upload server
//!
//! Accepts `multipart/form-data` uploads and answers with a JSON summary of the
//! extracted file.
//!
//! # Endpoints
//!
//! * `GET /health` - Health check (returns "ok")
//! * `GET /metrics` - Prometheus metrics
//! * `POST {upload_path}` - Upload endpoint
//!
//! # Example
//!
//! ```no_run
//! use party::config::Config;
//! use party::server::UploadServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let server = UploadServer::new(config).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::metrics;
use crate::upload::{UploadError, UploadHandler, UploadLimits};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// JSON body returned for an accepted upload
#[derive(Debug, Serialize)]
struct UploadSummary {
    field: String,
    filename: String,
    size: u64,
    content_type: Option<String>,
    values: HashMap<String, Vec<String>>,
}

/// HTTP upload server
///
/// Binds on construction; each connection is served on its own tokio task.
pub struct UploadServer {
    config: Arc<Config>,
    handler: Arc<UploadHandler>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl UploadServer {
    /// Bind to the configured address
    ///
    /// Port 0 lets the OS pick a free port; see [`UploadServer::local_addr`].
    pub async fn new(config: Config) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        let handler = UploadHandler::new(UploadLimits::from(&config.upload));

        Ok(Self {
            config: Arc::new(config),
            handler: Arc::new(handler),
            listener,
            local_addr,
        })
    }

    /// The address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the process exits
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Accepting uploads on {}{}",
            self.local_addr, self.config.server.upload_path
        );

        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server");
                    return Ok(());
                }
                result = self.listener.accept() => match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let config = Arc::clone(&self.config);
            let handler = Arc::clone(&self.handler);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let config = Arc::clone(&config);
                    let handler = Arc::clone(&handler);
                    async move { handle_request(req, config, handler).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    }
}

/// Route a request to the health, metrics or upload handler
async fn handle_request(
    req: Request<Incoming>,
    config: Arc<Config>,
    handler: Arc<UploadHandler>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    info!("Handling {} {}", method, path);

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/health") => text_response(StatusCode::OK, "ok"),
        (&Method::GET, "/metrics") => metrics_response(),
        (&Method::POST, p) if p == config.server.upload_path => {
            upload_response(req, &handler).await
        }
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}

async fn upload_response(req: Request<Incoming>, handler: &UploadHandler) -> Response<Full<Bytes>> {
    let field = handler.limits().effective_file_field_name().to_string();

    match handler.handle(req).await {
        Ok(upload) => {
            let summary = UploadSummary {
                field,
                content_type: upload.content_type().map(str::to_string),
                filename: upload.filename,
                size: upload.size,
                values: upload.values,
            };

            match serde_json::to_vec(&summary) {
                Ok(body) => Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Full::new(Bytes::from(body)))
                    .expect("Failed to build upload response"),
                Err(e) => {
                    error!("Failed to encode upload summary: {}", e);
                    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                }
            }
        }
        Err(e) => {
            let status = match e {
                UploadError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                UploadError::FieldNotFound(_) | UploadError::Multipart(_) => {
                    StatusCode::BAD_REQUEST
                }
                UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            text_response(status, &e.to_string())
        }
    }
}

fn metrics_response() -> Response<Full<Bytes>> {
    match metrics::render() {
        Ok((body, content_type)) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .body(Full::new(Bytes::from(body)))
            .expect("Failed to build metrics response"),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
        }
    }
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from(body.to_string())))
        .expect("Failed to build text response")
}
