// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Infrastructure types related to sending requests and reading their responses.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use hyper::client::HttpConnector;
use hyper::{Body, Request, Response};
use serde::de::DeserializeOwned;

use crate::error::{self, Error::*};

/// Future returned by an `HttpSend`, resolving to the response head and a streaming body.
pub type ResponseFuture = Pin<Box<dyn Future<Output = error::Result<Response<Body>>> + Send>>;

/// The wire underneath a `Client`.
///
/// An implementation sends one request and resolves once the response head arrives. It must
/// not retry on its own; retries and rate limiting are layered on top of it by the client.
pub trait HttpSend: Send + Sync {
    fn send(&self, request: Request<Body>) -> ResponseFuture;
}

#[cfg(feature = "native_tls")]
type HttpsConnector = hyper_tls::HttpsConnector<HttpConnector>;
#[cfg(all(not(feature = "native_tls"), any(feature = "rustls", feature = "rustls_webpki")))]
type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;

#[cfg(feature = "native_tls")]
fn new_https_connector() -> HttpsConnector {
    hyper_tls::HttpsConnector::new()
}

#[cfg(all(feature = "rustls", not(feature = "native_tls")))]
fn new_https_connector() -> HttpsConnector {
    hyper_rustls::HttpsConnector::with_native_roots()
}

#[cfg(all(
    feature = "rustls_webpki",
    not(feature = "rustls"),
    not(feature = "native_tls")
))]
fn new_https_connector() -> HttpsConnector {
    hyper_rustls::HttpsConnector::with_webpki_roots()
}

/// `HttpSend` over a pooled hyper client.
pub struct HyperTransport {
    client: hyper::Client<HttpsConnector>,
    timeout: Duration,
}

impl HyperTransport {
    /// Creates a pooled client. `timeout` bounds how long a request may wait for response
    /// headers.
    pub fn new(timeout: Duration, pool_idle_timeout: Duration, pool_max_idle_per_host: usize) -> Self {
        let client = hyper::Client::builder()
            .pool_idle_timeout(pool_idle_timeout)
            .pool_max_idle_per_host(pool_max_idle_per_host)
            .build(new_https_connector());

        HyperTransport { client, timeout }
    }
}

impl HttpSend for HyperTransport {
    fn send(&self, request: Request<Body>) -> ResponseFuture {
        let pending = self.client.request(request);
        let timeout = self.timeout;
        Box::pin(async move {
            match tokio::time::timeout(timeout, pending).await {
                Ok(resp) => Ok(resp?),
                Err(_) => Err(IOError(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "timed out waiting for response headers",
                ))),
            }
        })
    }
}

/// Reads the body of the given response, failing with `BadStatus` if the status code is not a
/// success.
pub async fn checked_body(resp: Response<Body>) -> error::Result<Vec<u8>> {
    let status = resp.status();
    if !status.is_success() {
        return Err(BadStatus(status));
    }
    let body = hyper::body::to_bytes(resp.into_body()).await?;
    Ok(body.to_vec())
}

/// Deserializes the value found at the given JSON pointer in `body`.
///
/// `what` names the value for the `MissingValue` error raised when the pointer does not resolve.
pub fn json_at_pointer<T: DeserializeOwned>(
    body: &[u8],
    pointer: &str,
    what: &'static str,
) -> error::Result<T> {
    let mut root: serde_json::Value = serde_json::from_slice(body)?;
    let value = root.pointer_mut(pointer).map(serde_json::Value::take);
    match value {
        Some(serde_json::Value::Null) | None => Err(MissingValue(what)),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Named {
        name: String,
    }

    #[test]
    fn pointer_lookup() {
        let body = br#"{"data":{"list":{"name":"artists"}}}"#;

        let named: Named = json_at_pointer(body, "/data/list", "list").unwrap();
        assert_eq!(named.name, "artists");

        match json_at_pointer::<Named>(body, "/data/user", "user") {
            Err(MissingValue("user")) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn bad_status_is_reported() {
        let resp = Response::builder()
            .status(hyper::StatusCode::FORBIDDEN)
            .body(Body::from("{}"))
            .unwrap();

        match checked_body(resp).await {
            Err(BadStatus(status)) => assert_eq!(status, hyper::StatusCode::FORBIDDEN),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
