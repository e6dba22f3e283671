// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lists, and other sources of member accounts.
//!
//! A crawl usually starts from a group of accounts rather than a single one. `MemberSource`
//! names such a group: either a list, or the accounts some user follows. Both are walked the
//! same way, through a member timeline that is always paginated to its end.

use tracing::debug;

use crate::client::Client;
use crate::common::*;
use crate::error;
use crate::timeline::{ItemContent, QueryKind, Timeline};
use crate::user::{self, User};

mod raw;

/// A list of accounts, curated by its creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    /// Numeric ID of the list.
    pub id: u64,
    /// The number of accounts on the list.
    pub member_count: i32,
    /// The name the creator gave the list.
    pub name: String,
    /// The account that owns the list.
    pub creator: User,
}

pub(crate) fn parse_list(body: &[u8]) -> error::Result<List> {
    let raw: raw::RawList = json_at_pointer(body, "/data/list", "list")?;
    let creator = user::from_results(raw.user_results)?;

    Ok(List {
        id: raw.id_str,
        member_count: raw.member_count,
        name: raw.name,
        creator,
    })
}

/// Look up the list with the given numeric ID.
pub async fn show(client: &Client, id: u64) -> error::Result<List> {
    let query = QueryKind::ListByRestId(id);
    let body = client.get(&query.url(&client.config().api_base)).await?;
    parse_list(&body)
}

/// A group of accounts to crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberSource {
    /// The members of a list.
    List(List),
    /// The accounts the given user follows.
    Following(User),
}

impl MemberSource {
    /// An ID for this source that never collides between lists and following lists: a list uses
    /// its own ID, a following list the negated ID of its owner.
    pub fn id(&self) -> i64 {
        match self {
            MemberSource::List(list) => list.id as i64,
            MemberSource::Following(user) => (user.id as i64).wrapping_neg(),
        }
    }

    pub fn title(&self) -> String {
        match self {
            MemberSource::List(list) => format!("{}({})", list.name, list.id),
            MemberSource::Following(user) => format!("{}'s Following", user.screen_name),
        }
    }

    /// Loads every member of this source.
    ///
    /// Members the server reports as unavailable, and member entries that can't be parsed, are
    /// left out of the result.
    pub async fn members(&self, client: &Client) -> error::Result<Vec<User>> {
        let count = client.config().member_page_size;
        let query = match self {
            MemberSource::List(list) => QueryKind::ListMembers {
                list_id: list.id,
                count,
                cursor: String::new(),
            },
            MemberSource::Following(user) => QueryKind::Following {
                user_id: user.id,
                count,
                cursor: String::new(),
            },
        };

        let items = Timeline::new(client, query).collect_all().await?;
        Ok(items_to_users(items))
    }
}

fn items_to_users(items: Vec<ItemContent>) -> Vec<User> {
    items
        .into_iter()
        .filter_map(|item| {
            let results = item.into_user_results()?;
            if results.as_object().map_or(true, |obj| obj.is_empty()) {
                return None;
            }
            match user::parse_user_results(results) {
                Ok(user) => Some(user),
                Err(err) => {
                    debug!(error = %err, "skipping member entry");
                    None
                }
            }
        })
        .collect()
}
