//! HTTP server exposing the file manager API.

pub mod api;
pub mod assets;
pub mod body;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use crate::error::FileboxError;

pub use api::{status_for, ApiHandler};
pub use assets::StaticAssets;
pub use body::{HttpResponse, ResponseBody};

/// HTTP/1 server, one task per connection.
pub struct HttpServer {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    handler: Arc<ApiHandler>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl HttpServer {
    /// Bind the server to `addr`.
    pub async fn bind(addr: &str, handler: Arc<ApiHandler>) -> Result<Self, FileboxError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| FileboxError::Server(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        tracing::debug!("HTTP server bound to {}", local_addr);

        Ok(Self {
            listener: Some(listener),
            local_addr,
            handler,
            shutdown_tx: None,
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start accepting connections in the background.
    pub fn start(&mut self) -> Result<(), FileboxError> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| FileboxError::Server("Server already started".to_string()))?;

        let handler = self.handler.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                let handler = handler.clone();
                                tokio::spawn(async move {
                                    if let Err(e) = handle_connection(stream, handler).await {
                                        tracing::debug!("Connection error from {}: {}", addr, e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("HTTP server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop accepting connections.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Serve a single client connection.
async fn handle_connection(
    stream: TcpStream,
    handler: Arc<ApiHandler>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let io = TokioIo::new(stream);

    http1::Builder::new()
        .serve_connection(
            io,
            service_fn(move |req| {
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(handler.handle(req).await) }
            }),
        )
        .await?;

    Ok(())
}
