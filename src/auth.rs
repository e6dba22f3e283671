// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Session credentials and request signing.
//!
//! The web timeline API authenticates a request with three pieces at once: the bearer token of
//! the web client itself (fixed, and the same for everyone), the two session cookies of a
//! logged-in browser (`auth_token` and `ct0`), and a CSRF header that must repeat the `ct0`
//! cookie. `Credentials` holds the two cookies; `get` assembles a GET request carrying all of it.
//!
//! To get the cookies, log in with a browser and copy them out of its cookie storage for
//! `x.com`. Hand them to [`Client::login`] to check that they're still valid.
//!
//! [`Client::login`]: crate::Client::login

use std::fmt;

use hyper::header::{AUTHORIZATION, COOKIE};
use hyper::{Body, Method, Request};
use serde::Deserialize;

use crate::error::{self, Error::MissingValue};

/// The bearer token of the web client.
pub const BEARER: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// The session cookies of a logged-in account.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    /// The `auth_token` cookie.
    pub auth_token: String,
    /// The `ct0` cookie, which doubles as the CSRF token.
    pub ct0: String,
}

impl Credentials {
    pub fn new(auth_token: impl Into<String>, ct0: impl Into<String>) -> Credentials {
        Credentials {
            auth_token: auth_token.into(),
            ct0: ct0.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_token", &"<redacted>")
            .field("ct0", &"<redacted>")
            .finish()
    }
}

/// Assemble an authenticated GET request to the given URL.
pub fn get(uri: &str, credentials: &Credentials) -> error::Result<Request<Body>> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {}", BEARER))
        .header(
            COOKIE,
            format!("auth_token={}; ct0={}", credentials.auth_token, credentials.ct0),
        )
        .header("x-csrf-token", credentials.ct0.as_str())
        .body(Body::empty())?;
    Ok(request)
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    screen_name: String,
}

/// Reads the screen name of the logged-in account out of an account settings response.
pub(crate) fn parse_settings(body: &[u8]) -> error::Result<String> {
    let settings: RawSettings = serde_json::from_slice(body)?;
    if settings.screen_name.is_empty() {
        return Err(MissingValue("screen_name"));
    }
    Ok(settings.screen_name)
}
