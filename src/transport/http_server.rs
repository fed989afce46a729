//! Server-side HTTP transport.
//!
//! One POST per request, response body is the reply. The dispatcher sees
//! exactly the same payloads it would over TCP: the decoded request body,
//! or `null` when the body is not valid JSON.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Mutex;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::protocol::{ErrorObject, Response};
use crate::transport::{BoxFuture, Dispatcher, ServerTransport};

/// HTTP listener transport.
pub struct HttpServerTransport {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl HttpServerTransport {
    /// Bind the listen socket. Port 0 picks a free port.
    pub async fn bind(addr: impl Into<SocketAddr>) -> Result<Self> {
        let listener = TcpListener::bind(addr.into()).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            stop: Mutex::new(None),
        })
    }
}

impl ServerTransport for HttpServerTransport {
    fn start(&self, dispatch: Dispatcher) {
        let listener = match self.listener.lock().expect("listener lock").take() {
            Some(listener) => listener,
            None => {
                tracing::warn!("http server already started");
                return;
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        *self.stop.lock().expect("stop lock") = Some(stop_tx);

        tracing::info!("http server listening on {}", self.local_addr);
        tokio::spawn(accept_loop(listener, dispatch, stop_rx));
    }

    fn shutdown(&self) -> BoxFuture<'static, Result<()>> {
        if let Some(stop) = self.stop.lock().expect("stop lock").take() {
            let _ = stop.send(());
        }
        self.listener.lock().expect("listener lock").take();

        Box::pin(async { Ok(()) })
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }
}

async fn accept_loop(listener: TcpListener, dispatch: Dispatcher, mut stop: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!("accepted http connection from {}", peer);
                    let io = TokioIo::new(stream);
                    let dispatch = dispatch.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let dispatch = dispatch.clone();
                            async move { handle_request(dispatch, req).await }
                        });

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            tracing::debug!("http connection error: {}", err);
                        }
                    });
                }
                Err(err) => {
                    tracing::warn!("accept error: {}", err);
                }
            },
            _ = &mut stop => {
                tracing::debug!("http server accept loop stopping");
                return;
            }
        }
    }
}

async fn handle_request(
    dispatch: Dispatcher,
    req: hyper::Request<Incoming>,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::POST {
        let body = Response::failure(Value::Null, ErrorObject::invalid_request());
        return Ok(json_response(StatusCode::METHOD_NOT_ALLOWED, &body));
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            tracing::debug!("failed to read request body: {}", err);
            let body = Response::failure(Value::Null, ErrorObject::invalid_request());
            return Ok(json_response(StatusCode::BAD_REQUEST, &body));
        }
    };

    // Same rule as the TCP transport: undecodable bodies dispatch as null
    // so the core still answers with an invalid-request error.
    let payload = serde_json::from_slice(&body).unwrap_or(Value::Null);

    match dispatch(payload).await {
        Some(response) => Ok(json_response(StatusCode::OK, &response)),
        None => Ok(hyper::Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Full::new(Bytes::new()))
            .expect("static response parts")),
    }
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> hyper::Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(value).unwrap_or_else(|_| b"null".to_vec());

    hyper::Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(bytes)))
        .expect("static response parts")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_reports_resolved_addr() {
        let transport = HttpServerTransport::bind(([127, 0, 0, 1], 0)).await.unwrap();
        assert_ne!(transport.local_addr().unwrap().port(), 0);
    }
}
