// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Looking up users, and what the logged-in account may see of them.
//!
//! A `User` is read out of the `user_results` node the API attaches to user lookups, list
//! records, tweets, and member timelines. Two conditions come out of that parse as typed errors
//! instead of a `User`:
//!
//! * `UserNotFound`, when the lookup came back without a user at all.
//! * `UserUnavailable`, when the account exists but the server won't describe it, as happens
//!   with suspended accounts. The error carries the reason the server gave.
//!
//! A protected account only shows its timelines to its followers. `User::is_visible` tells
//! whether the logged-in account is one of them; the media collectors in `tweet` skip
//! invisible users without sending a request.

use serde_json::Value;

use crate::client::Client;
use crate::common::*;
use crate::error::{self, Error::*};
use crate::list::MemberSource;
use crate::timeline::QueryKind;

pub(crate) mod raw;

use raw::{RawUserResult, RawUserResults};

const USER_UNAVAILABLE: &str = "UserUnavailable";

/// The relationship between the logged-in account and another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    Unfollowed,
    Following,
    /// A follow request to a protected account is pending.
    Requested,
}

/// A user account, as seen by the logged-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Numeric ID of the account.
    pub id: u64,
    /// The display name.
    pub name: String,
    /// The handle, without the leading `@`.
    pub screen_name: String,
    /// Whether only approved followers may see this account's timelines.
    pub is_protected: bool,
    /// The number of accounts this user follows.
    pub friends_count: i32,
    pub follow_state: FollowState,
    /// The number of tweets with media this user has posted.
    pub media_count: i32,
}

impl User {
    /// Whether the logged-in account may see this user's timelines.
    pub fn is_visible(&self) -> bool {
        self.follow_state == FollowState::Following || !self.is_protected
    }

    /// A display title of the form `name(screen_name)`.
    pub fn title(&self) -> String {
        format!("{}({})", self.name, self.screen_name)
    }

    /// The accounts this user follows, as a source of members.
    pub fn following(&self) -> MemberSource {
        MemberSource::Following(self.clone())
    }
}

fn from_result(result: RawUserResult) -> error::Result<User> {
    if result.typename == USER_UNAVAILABLE {
        return Err(UserUnavailable(result.reason.unwrap_or_default()));
    }

    let rest_id = result.rest_id.ok_or(MissingValue("rest_id"))?;
    let id = rest_id
        .parse()
        .map_err(|_| InvalidResponse("user rest_id is not a number", Some(rest_id.clone())))?;

    let legacy = result.legacy;
    let follow_state = match (legacy.following, legacy.follow_request_sent) {
        (Some(true), _) => FollowState::Following,
        (None, Some(true)) => FollowState::Requested,
        _ => FollowState::Unfollowed,
    };

    Ok(User {
        id,
        name: legacy.name,
        screen_name: legacy.screen_name,
        is_protected: legacy.protected.unwrap_or(false),
        friends_count: legacy.friends_count,
        follow_state,
        media_count: legacy.media_count,
    })
}

pub(crate) fn from_results(results: RawUserResults) -> error::Result<User> {
    from_result(results.result.ok_or(UserNotFound)?)
}

/// Parses a `user_results` node.
pub(crate) fn parse_user_results(value: Value) -> error::Result<User> {
    from_results(serde_json::from_value(value)?)
}

/// Parses the response of a user lookup.
pub(crate) fn parse_lookup(body: &[u8]) -> error::Result<User> {
    match json_at_pointer::<RawUserResults>(body, "/data/user", "user") {
        Ok(results) => from_results(results),
        Err(MissingValue(_)) => Err(UserNotFound),
        Err(err) => Err(err),
    }
}

async fn lookup(client: &Client, query: QueryKind) -> error::Result<User> {
    let body = client.get(&query.url(&client.config().api_base)).await?;
    parse_lookup(&body)
}

/// Look up the user with the given numeric ID.
pub async fn show(client: &Client, id: u64) -> error::Result<User> {
    lookup(client, QueryKind::UserByRestId(id)).await
}

/// Look up the user with the given screen name.
pub async fn show_by_name(client: &Client, screen_name: impl Into<String>) -> error::Result<User> {
    lookup(client, QueryKind::UserByScreenName(screen_name.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::logged_in;
    use crate::common::tests::{load_file, Scripted, ScriptedTransport};

    use std::sync::Arc;

    use hyper::StatusCode;

    fn user(legacy: &str) -> error::Result<User> {
        let body = format!(
            r#"{{"data":{{"user":{{"result":{{"__typename":"User","rest_id":"7","legacy":{}}}}}}}}}"#,
            legacy
        );
        parse_lookup(body.as_bytes())
    }

    #[test]
    fn parse_lookup_response() {
        let user = parse_lookup(load_file("sample_payloads/user.json").as_bytes()).unwrap();

        assert_eq!(user.id, 42);
        assert_eq!(user.name, "Ferris");
        assert_eq!(user.screen_name, "ferris_crab");
        assert!(!user.is_protected);
        assert_eq!(user.friends_count, 2);
        assert_eq!(user.media_count, 340);
        assert_eq!(user.follow_state, FollowState::Following);
        assert_eq!(user.title(), "Ferris(ferris_crab)");
        assert!(user.is_visible());
    }

    #[test]
    fn missing_and_unavailable_users() {
        match parse_lookup(load_file("sample_payloads/user_unavailable.json").as_bytes()) {
            Err(UserUnavailable(reason)) => assert_eq!(reason, "Suspended"),
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(matches!(parse_lookup(br#"{"data":{}}"#), Err(UserNotFound)));
        assert!(matches!(parse_lookup(br#"{"data":{"user":{}}}"#), Err(UserNotFound)));
        assert!(matches!(parse_lookup(b"[1, 2"), Err(DeserializeError(_))));
    }

    #[test]
    fn follow_states() {
        let state = |legacy: &str| user(legacy).unwrap().follow_state;

        assert_eq!(state(r#"{"following":true}"#), FollowState::Following);
        assert_eq!(state(r#"{"following":false,"follow_request_sent":true}"#), FollowState::Unfollowed);
        assert_eq!(state(r#"{"follow_request_sent":true}"#), FollowState::Requested);
        assert_eq!(state(r#"{"follow_request_sent":false}"#), FollowState::Unfollowed);
        assert_eq!(state("{}"), FollowState::Unfollowed);
    }

    #[test]
    fn visibility() {
        let open = user(r#"{"protected":false}"#).unwrap();
        assert!(open.is_visible());

        let locked = user(r#"{"protected":true}"#).unwrap();
        assert!(!locked.is_visible());

        let requested = user(r#"{"protected":true,"follow_request_sent":true}"#).unwrap();
        assert!(!requested.is_visible());

        let followed = user(r#"{"protected":true,"following":true}"#).unwrap();
        assert!(followed.is_visible());
    }

    #[test]
    fn bad_rest_id() {
        let body = br#"{"data":{"user":{"result":{"rest_id":"ferris","legacy":{}}}}}"#;
        match parse_lookup(body) {
            Err(InvalidResponse(_, Some(id))) => assert_eq!(id, "ferris"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn show_users() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;
        script.push(
            "/i/api/graphql/tD8zKvQzwY3kdx5yz6YmOw/UserByRestId",
            Scripted::ok(load_file("sample_payloads/user.json")),
        );
        script.push(
            "/i/api/graphql/xmU6X_CKVnQ5lSrCbAmJsg/UserByScreenName",
            Scripted::status(StatusCode::NOT_FOUND),
        );

        let user = show(&client, 42).await.unwrap();
        assert_eq!(user.screen_name, "ferris_crab");

        let result = show_by_name(&client, "nobody").await;
        assert!(matches!(result, Err(BadStatus(StatusCode::NOT_FOUND))));
    }
}
