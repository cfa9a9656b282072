//! HTTP transport: sends one signed request, buffers the response, and
//! enforces the client-side timeout (§4.3).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};

use crate::auth::SignedRequest;
use crate::error::{codes, Error};
use crate::pool::{Checkout, Pool};

/// A fully-buffered response: status, both header views required by the
/// decoder (§4.3), and the body decoded as UTF-8.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Lowercased header names for convenient lookup.
    pub headers: std::collections::BTreeMap<String, String>,
    /// Case-preserving header sequence, needed to recover original-case
    /// `x-ms-meta-*` names (§6, §8).
    pub raw_headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends `signed` over a pooled connection, aborting with `RequestTimeoutError`
/// if response headers don't arrive within `client_timeout_ms`.
pub async fn send(pool: &Arc<Pool>, signed: SignedRequest, client_timeout_ms: u64) -> Result<Response, Error> {
    let checkout = pool.checkout(&signed.host).await?;
    send_over(checkout, signed, client_timeout_ms).await
}

/// Like [`send`], but dials `addr` in plaintext instead of TLS-connecting
/// to the signed request's real host. Gated behind the `test-util` feature;
/// lets a façade operation be driven against a local `TcpListener`.
#[cfg(feature = "test-util")]
pub async fn send_plaintext(
    pool: &Arc<Pool>,
    addr: &str,
    signed: SignedRequest,
    client_timeout_ms: u64,
) -> Result<Response, Error> {
    let checkout = pool.checkout_plaintext(addr).await?;
    send_over(checkout, signed, client_timeout_ms).await
}

async fn send_over(mut checkout: Checkout, signed: SignedRequest, client_timeout_ms: u64) -> Result<Response, Error> {
    let mut builder = http::Request::builder()
        .method(signed.method.clone())
        .uri(signed.path_and_query.clone())
        .header(http::header::HOST, signed.host.clone());
    for (name, value) in &signed.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let body = Full::new(Bytes::from(signed.body.clone().unwrap_or_default()));
    let request = builder.body(body).map_err(|e| Error::usage(e.to_string()))?;

    let is_head = signed.method == http::Method::HEAD;

    let send_fut = checkout.sender_mut().send_request(request);
    let response = match tokio::time::timeout(Duration::from_millis(client_timeout_ms), send_fut).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => return Err(classify_send_error(err)),
        Err(_elapsed) => return Err(Error::new(codes::REQUEST_TIMEOUT_ERROR, "timed out waiting for response headers")),
    };

    let status = response.status().as_u16();
    let mut headers = std::collections::BTreeMap::new();
    let mut raw_headers = Vec::new();
    for (name, value) in response.headers() {
        let value_str = value.to_str().unwrap_or("").to_string();
        headers.insert(name.as_str().to_lowercase(), value_str.clone());
        raw_headers.push((name.as_str().to_string(), value_str));
    }
    let content_length: Option<usize> = headers.get("content-length").and_then(|v| v.parse().ok());

    let collected = response
        .into_body()
        .collect()
        .await
        .map_err(|_| Error::new(codes::REQUEST_ABORTED_ERROR, "connection closed while reading response body"))?;
    let bytes = collected.to_bytes();

    if let (Some(expected), false) = (content_length, is_head) {
        if bytes.len() != expected {
            return Err(Error::new(
                codes::REQUEST_CONTENT_LENGTH_ERROR,
                format!("expected {expected} bytes, got {}", bytes.len()),
            ));
        }
    }

    let body = String::from_utf8_lossy(&bytes).into_owned();
    Ok(Response { status, headers, raw_headers, body })
}

fn classify_send_error(err: hyper::Error) -> Error {
    if err.is_closed() || err.is_incomplete_message() {
        Error::new(codes::REQUEST_ABORTED_ERROR, err.to_string())
    } else {
        Error::new(codes::ECONNRESET, err.to_string())
    }
}
