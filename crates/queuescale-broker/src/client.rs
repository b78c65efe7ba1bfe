//! Bounded-timeout JSON GET over plain HTTP/1.1.
//!
//! Opens a fresh connection per request; the autoscaler polls every few
//! seconds, so pooling buys nothing and a stale pooled connection would
//! cost a whole tick.

use std::time::Duration;

use base64::prelude::*;
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, HOST, USER_AGENT};
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Empty};
use serde::de::DeserializeOwned;
use tracing::debug;

use queuescale_core::{ApiError, ApiResult, Credentials};

/// Fetch `uri` and decode the body as JSON.
///
/// The whole exchange (connect, request, body) is bounded by `timeout`.
pub async fn get_json<T: DeserializeOwned>(
    uri: &Uri,
    credentials: Option<&Credentials>,
    timeout: Duration,
) -> ApiResult<T> {
    let body = tokio::time::timeout(timeout, fetch(uri, credentials))
        .await
        .map_err(|_| ApiError::Timeout(timeout))??;

    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

async fn fetch(uri: &Uri, credentials: Option<&Credentials>) -> ApiResult<Bytes> {
    let authority = uri
        .authority()
        .ok_or_else(|| ApiError::Http(format!("no host in `{uri}`")))?;
    let address = match authority.port_u16() {
        Some(_) => authority.as_str().to_string(),
        None => format!("{}:80", authority.host()),
    };

    let stream = tokio::net::TcpStream::connect(&address)
        .await
        .map_err(|e| ApiError::Connect(format!("{address}: {e}")))?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| ApiError::Http(e.to_string()))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "http connection closed with error");
        }
    });

    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(HOST, authority.as_str())
        .header(USER_AGENT, "queuescale/0.1")
        .header(ACCEPT, "application/json");
    if let Some(creds) = credentials {
        builder = builder.header(AUTHORIZATION, basic_auth(creds));
    }
    let req = builder
        .body(Empty::<Bytes>::new())
        .map_err(|e| ApiError::Http(e.to_string()))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| ApiError::Http(e.to_string()))?;

    if !resp.status().is_success() {
        debug!(status = %resp.status(), %uri, "non-2xx response");
        return Err(ApiError::Status(resp.status().as_u16()));
    }

    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| ApiError::Http(e.to_string()))?
        .to_bytes();
    Ok(body)
}

/// `Authorization` header value for basic auth.
pub fn basic_auth(creds: &Credentials) -> String {
    let raw = format!("{}:{}", creds.username, creds.password);
    format!("Basic {}", BASE64_STANDARD.encode(raw))
}

/// Percent-encode a single path segment (RFC 3986 unreserved set kept).
pub fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
