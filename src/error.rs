// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A composite error type for errors that can occur while interacting with the timeline API.
//!
//! Any action that crosses the network to call the API returns an `error::Result`, so the
//! failure modes are laid out here in one place. They fall into a few groups:
//!
//! * Transport failures (`NetError`, `IOError`) mean the connection failed, either before the
//!   response head arrived or while its body was being read. A request that timed out waiting
//!   for response headers shows up as an `IOError` of kind `TimedOut`.
//! * `BadUrl` and `BadRequest` mean the request could not be assembled, and nothing was sent.
//! * `BadStatus` means a response arrived, but with a non-2xx status code.
//! * `InvalidResponse`, `MissingValue` and `DeserializeError` mean the response body did not
//!   have the shape this crate expects. These are never retried, since they point at a change
//!   in the API rather than a transient condition.
//! * `UserNotFound` and `UserUnavailable` come out of parsing a user record, and let callers
//!   tell "there is no such account" apart from "the request failed".
//!
//! Rate-limit backoff is not an error. When a path's budget runs out, requests to it wait until
//! the server-declared reset time instead of failing.

use hyper::StatusCode;

/// Convenient alias to a Result containing a local Error type
pub type Result<T> = std::result::Result<T, Error>;

/// A set of errors that can occur when interacting with the timeline API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A URL could not be assembled or parsed before sending the request.
    #[error("URL could not be built or parsed")]
    BadUrl,
    /// The request could not be assembled, usually because a credential holds characters that
    /// are not allowed in a header.
    #[error("Request could not be built: {0}")]
    BadRequest(#[from] hyper::http::Error),
    /// The response had an unexpected shape. The first field names what was wrong; the second
    /// optionally carries the offending fragment of the response.
    #[error("Invalid response received: {0} ({1:?})")]
    InvalidResponse(&'static str, Option<String>),
    /// The response was missing the named value.
    #[error("Value missing from response: {0}")]
    MissingValue(&'static str),
    /// The server answered with a non-success status code.
    #[error("Error status received: {0}")]
    BadStatus(StatusCode),
    /// The requested user does not exist.
    #[error("User does not exist")]
    UserNotFound,
    /// The user exists, but the server refused to describe it (suspended or deactivated
    /// accounts, for example). Contains the reason given, if any.
    #[error("User unavailable: {0}")]
    UserUnavailable(String),
    /// The network layer failed before a response was received.
    #[error("Network error: {0}")]
    NetError(#[from] hyper::Error),
    /// An I/O error occurred, including timeouts while waiting for a response.
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    /// The response body could not be deserialized into the expected shape.
    #[error("JSON deserialize error: {0}")]
    DeserializeError(#[from] serde_json::Error),
}

impl Error {
    /// Returns whether this error is a failure of the connection itself, which is the only kind
    /// of failure the request executor retries.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::NetError(_) | Error::IOError(_))
    }
}

impl From<url::ParseError> for Error {
    fn from(_: url::ParseError) -> Error {
        Error::BadUrl
    }
}
