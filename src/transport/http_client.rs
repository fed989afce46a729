//! Client-side HTTP transport.
//!
//! Stateless counterpart to the TCP transport: every request is one POST
//! with a JSON body, and the response body is the reply. Connection
//! pooling, timeouts, and retries at the socket level are the HTTP
//! client's concern, so there is no queue and no reconnect machinery here.

use serde_json::Value;

use crate::error::Result;
use crate::transport::{BoxFuture, Transport};

/// HTTP POST transport.
#[derive(Clone)]
pub struct HttpClientTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpClientTransport {
    /// Transport posting to the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// POST one payload and resolve with the response body.
    pub async fn request(&self, payload: Value) -> Result<Value> {
        post(self.client.clone(), self.url.clone(), payload).await
    }
}

impl Transport for HttpClientTransport {
    fn request(&self, payload: Value) -> BoxFuture<'static, Result<Value>> {
        Box::pin(post(self.client.clone(), self.url.clone(), payload))
    }

    fn shutdown(&self) -> BoxFuture<'static, Result<()>> {
        // Nothing persistent to tear down.
        Box::pin(async { Ok(()) })
    }
}

async fn post(client: reqwest::Client, url: String, payload: Value) -> Result<Value> {
    let response = client.post(&url).json(&payload).send().await?;
    let value = response.json().await?;
    Ok(value)
}
