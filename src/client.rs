// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The authenticated client handle, and the request executor behind it.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::auth::{self, Credentials};
use crate::common::*;
use crate::error;
use crate::links;
use crate::ratelimit::RateLimiter;

/// Settings for a `Client`.
///
/// The defaults match what the web client does. Every field can be changed with a `with_*`
/// builder method, or the whole struct can be deserialized from a host application's own
/// configuration; missing fields take their default value.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Scheme and host of the GraphQL timeline endpoints.
    pub api_base: String,
    /// The endpoint used to check a login.
    pub settings_url: String,
    /// Hosts ending in this suffix are exempt from rate limiting and are never retried.
    pub cdn_suffix: String,
    /// How many times a request that failed at the network level is retried.
    pub retry_count: u32,
    /// How long to wait between retries.
    pub retry_wait: Duration,
    /// How long a request may wait for response headers.
    pub request_timeout: Duration,
    /// How long an idle pooled connection is kept open.
    pub pool_idle_timeout: Duration,
    /// How many idle connections are kept per host.
    pub pool_max_idle_per_host: usize,
    /// Page size for media timelines.
    pub media_page_size: u32,
    /// Page size for list member and following timelines.
    pub member_page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_base: links::api::API_BASE.to_string(),
            settings_url: links::auth::SETTINGS.to_string(),
            cdn_suffix: links::api::CDN_SUFFIX.to_string(),
            retry_count: 5,
            retry_wait: Duration::from_millis(100),
            request_timeout: Duration::from_secs(5),
            pool_idle_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 1000,
            media_page_size: 100,
            member_page_size: 200,
        }
    }
}

impl ClientConfig {
    /// Points the client at a different API host.
    pub fn with_api_base(self, api_base: impl Into<String>) -> Self {
        ClientConfig {
            api_base: api_base.into(),
            ..self
        }
    }

    /// Sets the login check endpoint.
    pub fn with_settings_url(self, settings_url: impl Into<String>) -> Self {
        ClientConfig {
            settings_url: settings_url.into(),
            ..self
        }
    }

    /// Sets how often, and how far apart, requests that failed at the network level are retried.
    pub fn with_retries(self, retry_count: u32, retry_wait: Duration) -> Self {
        ClientConfig {
            retry_count,
            retry_wait,
            ..self
        }
    }

    /// Sets how long a request may wait for response headers.
    pub fn with_request_timeout(self, request_timeout: Duration) -> Self {
        ClientConfig {
            request_timeout,
            ..self
        }
    }

    /// Sets the page sizes for media and member timelines.
    pub fn with_page_sizes(self, media_page_size: u32, member_page_size: u32) -> Self {
        ClientConfig {
            media_page_size,
            member_page_size,
            ..self
        }
    }
}

/// Everything needed to send a request on behalf of one login.
struct Session {
    transport: Box<dyn HttpSend>,
    credentials: Credentials,
    config: ClientConfig,
    limiter: RateLimiter,
}

impl Session {
    /// Sends an authenticated GET request through the rate limiter, retrying transport failures,
    /// and returns the body of a successful response.
    async fn get(&self, url: &str) -> error::Result<Vec<u8>> {
        let parsed = Url::parse(url)?;
        let retries = if self.limiter.applies_to(&parsed) {
            self.config.retry_count
        } else {
            0
        };

        let mut attempt = 0;
        loop {
            let request = auth::get(url, &self.credentials)?;
            let ticket = self.limiter.before_request(&parsed).await;

            let result = match self.transport.send(request).await {
                Ok(resp) => {
                    ticket.on_success(resp.headers());
                    checked_body(resp).await
                }
                Err(err) => {
                    ticket.on_error(None);
                    Err(err)
                }
            };

            match result {
                Err(err) if err.is_transport() && attempt < retries => {
                    attempt += 1;
                    warn!(url = %url, attempt, error = %err, "request failed, retrying");
                    tokio::time::sleep(self.config.retry_wait).await;
                }
                result => return result,
            }
        }
    }
}

/// An authenticated handle to the API.
///
/// Every request made through a `Client` passes through its own rate limiter, which is shared
/// by all clones of the handle. Two separate logins never share limiter state, even with the
/// same credentials.
#[derive(Clone)]
pub struct Client {
    session: Arc<Session>,
    screen_name: Arc<str>,
}

impl Client {
    /// Logs in with the given session cookies over a pooled HTTPS connection.
    ///
    /// The login is checked by loading the account settings of the session; a non-success
    /// status, or settings without a screen name, fail the login.
    pub async fn login(credentials: Credentials, config: ClientConfig) -> error::Result<Client> {
        let transport = HyperTransport::new(
            config.request_timeout,
            config.pool_idle_timeout,
            config.pool_max_idle_per_host,
        );
        Client::login_with(transport, credentials, config).await
    }

    /// Logs in with the given session cookies, sending requests through the given transport.
    pub async fn login_with(
        transport: impl HttpSend + 'static,
        credentials: Credentials,
        config: ClientConfig,
    ) -> error::Result<Client> {
        let limiter = RateLimiter::new(config.cdn_suffix.clone());
        let session = Session {
            transport: Box::new(transport),
            credentials,
            config,
            limiter,
        };

        let body = session.get(&session.config.settings_url).await?;
        let screen_name = auth::parse_settings(&body)?;

        Ok(Client {
            session: Arc::new(session),
            screen_name: screen_name.into(),
        })
    }

    /// The screen name of the logged-in account.
    pub fn screen_name(&self) -> &str {
        &self.screen_name
    }

    /// Returns whether any request of this client is currently held up by the rate limiter.
    pub fn is_blocked(&self) -> bool {
        self.session.limiter.blocked_callers() > 0
    }

    /// The rate limiter shared by all clones of this client.
    pub fn limiter(&self) -> &RateLimiter {
        &self.session.limiter
    }

    pub fn config(&self) -> &ClientConfig {
        &self.session.config
    }

    pub(crate) async fn get(&self, url: &str) -> error::Result<Vec<u8>> {
        self.session.get(url).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::common::tests::{load_file, Scripted, ScriptedTransport};
    use crate::error::Error;
    use crate::ratelimit::PathState;

    use hyper::StatusCode;

    pub(crate) const SETTINGS_PATH: &str = "/1.1/account/settings.json";

    /// A transport wrapper so tests can keep a handle on the script after the client owns it.
    pub(crate) struct Shared(pub Arc<ScriptedTransport>);

    impl HttpSend for Shared {
        fn send(&self, request: hyper::Request<hyper::Body>) -> ResponseFuture {
            self.0.send(request)
        }
    }

    pub(crate) fn test_config() -> ClientConfig {
        ClientConfig::default()
            .with_api_base("https://x.com")
            .with_settings_url("https://api.x.com/1.1/account/settings.json")
            .with_retries(2, Duration::from_millis(1))
    }

    pub(crate) async fn logged_in(script: &Arc<ScriptedTransport>) -> Client {
        script.push(
            SETTINGS_PATH,
            Scripted::ok(load_file("sample_payloads/account_settings.json")),
        );
        Client::login_with(
            Shared(script.clone()),
            Credentials::new("token", "ct0"),
            test_config(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn default_endpoints() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base, "https://x.com");
        assert_eq!(config.settings_url, "https://api.x.com/1.1/account/settings.json");
        assert_eq!(config.cdn_suffix, "twimg.com");
        assert_eq!(config.retry_count, 5);
    }

    #[tokio::test]
    async fn login_reads_screen_name() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;

        assert_eq!(client.screen_name(), "rustlang");
        assert!(!client.is_blocked());
        assert_eq!(script.calls_to(SETTINGS_PATH), 1);
    }

    #[tokio::test]
    async fn login_rejected() {
        let script = Arc::new(ScriptedTransport::new());
        script.push(SETTINGS_PATH, Scripted::status(StatusCode::UNAUTHORIZED));

        let result = Client::login_with(
            Shared(script.clone()),
            Credentials::new("token", "ct0"),
            test_config(),
        )
        .await;
        match result {
            Err(Error::BadStatus(StatusCode::UNAUTHORIZED)) => (),
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("login should fail"),
        }
    }

    #[tokio::test]
    async fn login_with_malformed_settings() {
        let script = Arc::new(ScriptedTransport::new());
        script.push(SETTINGS_PATH, Scripted::ok("not json"));

        let result = Client::login_with(
            Shared(script.clone()),
            Credentials::new("token", "ct0"),
            test_config(),
        )
        .await;
        assert!(matches!(result, Err(Error::DeserializeError(_))));
    }

    #[tokio::test]
    async fn logins_do_not_share_limiters() {
        let script = Arc::new(ScriptedTransport::new());
        script.push(
            SETTINGS_PATH,
            Scripted::ok(load_file("sample_payloads/account_settings.json"))
                .with_rate_limit(100, 99, chrono::Utc::now().timestamp() + 900),
        );

        let first = Client::login_with(
            Shared(script.clone()),
            Credentials::new("token", "ct0"),
            test_config(),
        )
        .await
        .unwrap();
        let second = Client::login_with(
            Shared(script.clone()),
            Credentials::new("token", "ct0"),
            test_config(),
        )
        .await
        .unwrap();

        first.get("https://api.x.com/1.1/account/settings.json").await.unwrap();

        let remaining = |client: &Client| match client.limiter().state(SETTINGS_PATH) {
            Some(PathState::Ready(limit)) => limit.remaining,
            other => panic!("unexpected state: {:?}", other),
        };
        assert_eq!(remaining(&first), 98);
        assert_eq!(remaining(&second), 99);
        assert_eq!(second.screen_name(), "rustlang");
    }

    #[tokio::test]
    async fn transport_failures_are_retried() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;

        let path = "/i/api/graphql/abc/UserMedia";
        script.push(path, Scripted::Fail);
        script.push(path, Scripted::Fail);
        script.push(path, Scripted::ok("{}"));

        let body = client.get("https://x.com/i/api/graphql/abc/UserMedia").await.unwrap();
        assert_eq!(body, b"{}");
        assert_eq!(script.calls_to(path), 3);
        assert_eq!(client.limiter().state(path), Some(PathState::Unlimited));
    }

    #[tokio::test]
    async fn broken_bodies_are_retried() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;

        let path = "/i/api/graphql/abc/UserMedia";
        script.push(path, Scripted::CutOff);
        script.push(path, Scripted::ok("{}"));

        let body = client.get("https://x.com/i/api/graphql/abc/UserMedia").await.unwrap();
        assert_eq!(body, b"{}");
        assert_eq!(script.calls_to(path), 2);
    }

    #[tokio::test]
    async fn broken_bodies_run_out_of_retries() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;

        let path = "/i/api/graphql/abc/UserMedia";
        script.push(path, Scripted::CutOff);

        let result = client.get("https://x.com/i/api/graphql/abc/UserMedia").await;
        assert!(matches!(result, Err(Error::NetError(_))));
        assert_eq!(script.calls_to(path), 3);
    }

    #[tokio::test]
    async fn unbuildable_request_keeps_budget() {
        let script = Arc::new(ScriptedTransport::new());
        let path = "/i/api/graphql/abc/UserMedia";
        let url = "https://x.com/i/api/graphql/abc/UserMedia";
        script.push(
            path,
            Scripted::ok("{}").with_rate_limit(50, 50, chrono::Utc::now().timestamp() + 900),
        );

        let config = test_config();
        let mut session = Session {
            transport: Box::new(Shared(script.clone())),
            credentials: Credentials::new("token", "ct0"),
            limiter: RateLimiter::new(config.cdn_suffix.clone()),
            config,
        };
        session.get(url).await.unwrap();

        let remaining = |session: &Session| match session.limiter.state(path) {
            Some(PathState::Ready(limit)) => limit.remaining,
            other => panic!("unexpected state: {:?}", other),
        };
        let before = remaining(&session);

        session.credentials = Credentials::new("token\nforged: header", "ct0");
        let result = session.get(url).await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
        assert_eq!(remaining(&session), before);
        assert_eq!(script.calls_to(path), 1);
    }

    #[tokio::test]
    async fn retries_run_out() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;

        let path = "/i/api/graphql/abc/UserMedia";
        script.push(path, Scripted::Fail);

        let result = client.get("https://x.com/i/api/graphql/abc/UserMedia").await;
        assert!(matches!(result, Err(Error::IOError(_))));
        assert_eq!(script.calls_to(path), 3);
        assert_eq!(client.limiter().state(path), Some(PathState::Vacant));
    }

    #[tokio::test]
    async fn media_hosts_are_not_retried() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;

        let path = "/media/abc.jpg";
        script.push(path, Scripted::Fail);

        let result = client.get("https://pbs.twimg.com/media/abc.jpg").await;
        assert!(matches!(result, Err(Error::IOError(_))));
        assert_eq!(script.calls_to(path), 1);
        assert_eq!(client.limiter().state(path), None);
    }

    #[tokio::test]
    async fn status_failure_keeps_limiter_state() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;

        let path = "/i/api/graphql/abc/UserMedia";
        let reset = chrono::Utc::now().timestamp() + 900;
        script.push(
            path,
            Scripted::status(StatusCode::INTERNAL_SERVER_ERROR).with_rate_limit(50, 40, reset),
        );

        let result = client.get("https://x.com/i/api/graphql/abc/UserMedia").await;
        assert!(matches!(result, Err(Error::BadStatus(StatusCode::INTERNAL_SERVER_ERROR))));
        assert_eq!(script.calls_to(path), 1);
        match client.limiter().state(path) {
            Some(PathState::Ready(limit)) => assert_eq!(limit.remaining, 40),
            other => panic!("unexpected state: {:?}", other),
        }
    }
}
