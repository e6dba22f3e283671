// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A crawler client for the private timeline API behind the X/Twitter web client.
//!
//! This crate logs in with the session cookies of a browser, looks up users and lists, walks
//! member and media timelines page by page, and turns the responses into typed `User`, `List`
//! and `Tweet` records for a downloader to consume.
//!
//! ## Logging in
//!
//! Everything starts with a `Client`, made from the two session cookies of a logged-in browser:
//!
//! ```rust,no_run
//! use xcrawl::{Client, ClientConfig, Credentials};
//! use xcrawl::list::MemberSource;
//! use xcrawl::tweet;
//!
//! # #[tokio::main]
//! # async fn main() -> xcrawl::error::Result<()> {
//! let creds = Credentials::new("<auth_token cookie>", "<ct0 cookie>");
//! let client = Client::login(creds, ClientConfig::default()).await?;
//! println!("logged in as @{}", client.screen_name());
//!
//! let list = xcrawl::list::show(&client, 1500).await?;
//! let members = MemberSource::List(list).members(&client).await?;
//! for (user, tweets) in tweet::collect_many(&client, members, None, 8).await {
//!     println!("{}: {} tweets", user.title(), tweets?.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A `Client` is cheap to clone, and all clones share one connection pool and one rate limiter.
//! Calling `Client::login` again makes a fully separate client.
//!
//! ## Rate limits
//!
//! The API grants each endpoint its own request budget, and reports it in the headers of every
//! response. Every request a `Client` makes first passes its `RateLimiter`, which learns each
//! endpoint's budget from the first response it sees and then holds requests back once the
//! budget runs low, until the server's reset time has passed. Hitting a rate limit is never an
//! error; it only makes calls slower. `Client::is_blocked` tells whether any call is waiting on
//! the limiter right now. See the `ratelimit` module for the details.
//!
//! ## Modules
//!
//! * `user`, `list` and `tweet` hold the record types and the calls that load them.
//! * `timeline` holds the GraphQL queries and the cursor walk shared by all timelines.
//! * `ratelimit` holds the per-endpoint rate limiter.
//! * `error` holds the error type shared by every call.
//!
//! This crate uses `tracing` for its diagnostics and never installs a subscriber itself.

mod auth;
mod client;
mod common;
pub mod error;
mod links;
pub mod list;
pub mod ratelimit;
pub mod timeline;
pub mod tweet;
pub mod user;

pub use crate::auth::Credentials;
pub use crate::client::{Client, ClientConfig};
pub use crate::common::{Headers, HttpSend, HyperTransport, ResponseFuture};
pub use crate::ratelimit::RateLimiter;
