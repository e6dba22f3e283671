// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! GraphQL queries and cursor-driven timeline pages.
//!
//! Every call this crate makes is one of the `QueryKind` variants. Three of them (`UserMedia`,
//! `ListMembers` and `Following`) are *timelines*: their responses hold one page of a
//! reverse-chronological feed, plus an opaque cursor that asks for the next page.
//!
//! A timeline response wraps its page in a few envelope layers. Somewhere under `data` sits an
//! `instructions` array; one instruction of type `TimelineAddEntries` holds the `entries` of
//! the page. Entries are either content, carrying an `itemContent` node with a user or tweet
//! result, or cursor markers. How the content is laid out depends on the timeline:
//!
//! * `EntryLayout::Flat`: every content entry carries its own `itemContent`.
//! * `EntryLayout::Grouped`: the first entry is a module whose `items` carry the
//!   `itemContent` nodes.
//!
//! `fetch_page` loads and unpacks a single page. `Timeline` walks a feed page by page,
//! following the bottom cursor until a page comes back empty or the cursor stops moving.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::Client;
use crate::common::*;
use crate::error::{self, Error::*};
use crate::links;

mod raw;

const TIMELINE_USER: &str = "TimelineUser";
const TIMELINE_TWEET: &str = "TimelineTweet";

/// How the content entries of a timeline page are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryLayout {
    /// Each content entry carries its own item.
    Flat,
    /// The first entry is a module grouping all items of the page.
    Grouped,
}

/// One call to the GraphQL API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Look up a user by numeric ID.
    UserByRestId(u64),
    /// Look up a user by screen name.
    UserByScreenName(String),
    /// Look up a list by numeric ID.
    ListByRestId(u64),
    /// One page of the tweets with media posted by a user.
    UserMedia {
        user_id: u64,
        count: u32,
        cursor: String,
    },
    /// One page of the members of a list.
    ListMembers {
        list_id: u64,
        count: u32,
        cursor: String,
    },
    /// One page of the accounts a user follows.
    Following {
        user_id: u64,
        count: u32,
        cursor: String,
    },
}

impl QueryKind {
    fn operation(&self) -> (&'static str, &'static str) {
        match self {
            QueryKind::UserByRestId(_) => links::graphql::USER_BY_REST_ID,
            QueryKind::UserByScreenName(_) => links::graphql::USER_BY_SCREEN_NAME,
            QueryKind::ListByRestId(_) => links::graphql::LIST_BY_REST_ID,
            QueryKind::UserMedia { .. } => links::graphql::USER_MEDIA,
            QueryKind::ListMembers { .. } => links::graphql::LIST_MEMBERS,
            QueryKind::Following { .. } => links::graphql::FOLLOWING,
        }
    }

    fn variables(&self) -> Value {
        let mut vars = match self {
            QueryKind::UserByRestId(id) => json!({
                "userId": id.to_string(),
                "withSafetyModeUserFields": true,
            }),
            QueryKind::UserByScreenName(screen_name) => json!({
                "screen_name": screen_name,
                "withSafetyModeUserFields": true,
            }),
            QueryKind::ListByRestId(id) => json!({
                "listId": id.to_string(),
            }),
            QueryKind::UserMedia { user_id, count, .. } => json!({
                "userId": user_id.to_string(),
                "count": count,
                "includePromotedContent": false,
                "withClientEventToken": false,
                "withBirdwatchNotes": false,
                "withVoice": true,
                "withV2Timeline": true,
            }),
            QueryKind::ListMembers { list_id, count, .. } => json!({
                "listId": list_id.to_string(),
                "count": count,
                "withSafetyModeUserFields": true,
            }),
            QueryKind::Following { user_id, count, .. } => json!({
                "userId": user_id.to_string(),
                "count": count,
                "includePromotedContent": false,
            }),
        };

        if let Some(cursor) = self.cursor() {
            if !cursor.is_empty() {
                vars["cursor"] = Value::from(cursor);
            }
        }
        vars
    }

    /// Builds the request URL for this query against the given API host.
    pub fn url(&self, api_base: &str) -> String {
        let (query_id, operation) = self.operation();
        let params = ParamList::new()
            .add_param("variables", self.variables().to_string())
            .add_param("features", links::FEATURES);

        format!(
            "{}/i/api/graphql/{}/{}?{}",
            api_base.trim_end_matches('/'),
            query_id,
            operation,
            params.to_urlencoded()
        )
    }

    /// The pagination cursor of a timeline query, or `None` for a single lookup.
    pub fn cursor(&self) -> Option<&str> {
        match self {
            QueryKind::UserMedia { cursor, .. }
            | QueryKind::ListMembers { cursor, .. }
            | QueryKind::Following { cursor, .. } => Some(cursor.as_str()),
            _ => None,
        }
    }

    /// Moves a timeline query to the page named by `next`. Lookups are left alone.
    pub fn set_cursor(&mut self, next: String) {
        match self {
            QueryKind::UserMedia { cursor, .. }
            | QueryKind::ListMembers { cursor, .. }
            | QueryKind::Following { cursor, .. } => *cursor = next,
            _ => (),
        }
    }

    /// Sets the page size of a timeline query. Lookups are left alone.
    pub fn set_count(&mut self, page_size: u32) {
        match self {
            QueryKind::UserMedia { count, .. }
            | QueryKind::ListMembers { count, .. }
            | QueryKind::Following { count, .. } => *count = page_size,
            _ => (),
        }
    }

    /// Where the `instructions` of a timeline response live, and how its entries are laid out.
    pub fn envelope(&self) -> Option<(&'static str, EntryLayout)> {
        match self {
            QueryKind::UserMedia { .. } => Some((links::instructions::USER_MEDIA, EntryLayout::Flat)),
            QueryKind::ListMembers { .. } => {
                Some((links::instructions::LIST_MEMBERS, EntryLayout::Grouped))
            }
            QueryKind::Following { .. } => Some((links::instructions::FOLLOWING, EntryLayout::Flat)),
            _ => None,
        }
    }
}

/// The payload of one timeline entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemContent {
    /// What the entry holds, e.g. `TimelineUser` or `TimelineTweet`.
    #[serde(rename = "itemType", default)]
    pub item_type: String,
    #[serde(default)]
    user_results: Option<Value>,
    #[serde(default)]
    tweet_results: Option<Value>,
}

impl ItemContent {
    /// The user result carried by a user entry.
    pub(crate) fn into_user_results(self) -> Option<Value> {
        if self.item_type == TIMELINE_USER {
            self.user_results
        } else {
            None
        }
    }

    /// The tweet result carried by a tweet entry.
    pub(crate) fn into_tweet_results(self) -> Option<Value> {
        if self.item_type == TIMELINE_TWEET {
            self.tweet_results
        } else {
            None
        }
    }
}

/// One unpacked timeline page.
#[derive(Debug, Clone)]
pub struct Page {
    /// The content of the page, in feed order.
    pub items: Vec<ItemContent>,
    /// The cursor of the next page, if the page carried one.
    pub next_cursor: Option<String>,
}

/// Unpacks a timeline response whose `instructions` sit at `pointer`.
///
/// A page without content is the end of the feed, with or without a cursor. A page with content
/// but no bottom cursor can't be continued, and is rejected as an invalid response.
pub fn parse_page(body: &[u8], pointer: &str, layout: EntryLayout) -> error::Result<Page> {
    let instructions: Vec<raw::RawInstruction> = json_at_pointer(body, pointer, "instructions")?;
    let entries = raw::add_entries(instructions).ok_or(MissingValue("TimelineAddEntries"))?;

    let next_cursor = raw::bottom_cursor(&entries);
    let items = raw::item_contents(entries, layout);
    if !items.is_empty() && next_cursor.is_none() {
        return Err(InvalidResponse("timeline entries without a bottom cursor", None));
    }

    Ok(Page { items, next_cursor })
}

/// Loads one page of the given timeline query.
pub async fn fetch_page(client: &Client, query: &QueryKind) -> error::Result<Page> {
    let (pointer, layout) = query
        .envelope()
        .ok_or(InvalidResponse("query does not load a timeline", None))?;
    let body = client.get(&query.url(&client.config().api_base)).await?;
    parse_page(&body, pointer, layout)
}

/// A cursor walk over one timeline.
///
/// Each call to `next_page` loads the page the cursor points at and advances the cursor. Once a
/// page comes back empty, or its bottom cursor is missing or the same as the one just used, the
/// walk is over and `next_page` returns empty pages without making further calls.
#[derive(Clone)]
pub struct Timeline {
    client: Client,
    query: QueryKind,
    exhausted: bool,
}

impl Timeline {
    pub fn new(client: &Client, query: QueryKind) -> Timeline {
        Timeline {
            client: client.clone(),
            query,
            exhausted: false,
        }
    }

    /// Helper builder function to set the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.query.set_count(page_size);
        self
    }

    /// Moves the walk back to the newest page.
    pub fn reset(&mut self) {
        self.query.set_cursor(String::new());
        self.exhausted = false;
    }

    /// The query the next call to `next_page` will send.
    pub fn query(&self) -> &QueryKind {
        &self.query
    }

    /// Whether the walk has reached the end of the feed.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Loads the next page and advances the cursor. An empty result means the feed is over.
    pub async fn next_page(&mut self) -> error::Result<Vec<ItemContent>> {
        if self.exhausted {
            return Ok(Vec::new());
        }

        let page = fetch_page(&self.client, &self.query).await?;
        if page.items.is_empty() {
            self.exhausted = true;
            return Ok(page.items);
        }

        match page.next_cursor {
            Some(next) if !next.is_empty() && self.query.cursor() != Some(next.as_str()) => {
                self.query.set_cursor(next);
            }
            _ => {
                debug!(query = ?self.query, "timeline cursor did not advance");
                self.exhausted = true;
            }
        }
        Ok(page.items)
    }

    /// Walks the rest of the feed and returns every item on the way.
    pub async fn collect_all(mut self) -> error::Result<Vec<ItemContent>> {
        let mut items = Vec::new();
        loop {
            let page = self.next_page().await?;
            if page.is_empty() {
                break;
            }
            items.extend(page);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::logged_in;
    use crate::common::tests::{load_file, Scripted, ScriptedTransport};

    use std::sync::Arc;

    const MEDIA_PATH: &str = "/i/api/graphql/MOLbHrtk8Ovu7DUNOLcXiA/UserMedia";

    fn variables(url: &str) -> Value {
        let url = url::Url::parse(url).unwrap();
        let (_, vars) = url
            .query_pairs()
            .find(|(key, _)| key == "variables")
            .unwrap();
        serde_json::from_str(&vars).unwrap()
    }

    fn media(cursor: &str) -> QueryKind {
        QueryKind::UserMedia {
            user_id: 42,
            count: 100,
            cursor: cursor.to_string(),
        }
    }

    #[test]
    fn query_urls() {
        let url = media("").url("https://x.com/");
        assert!(url.starts_with(&format!("https://x.com{}?features=", MEDIA_PATH)));

        let vars = variables(&url);
        assert_eq!(vars["userId"], "42");
        assert_eq!(vars["count"], 100);
        assert!(vars.get("cursor").is_none());

        let vars = variables(&media("DAABCgAB").url("https://x.com"));
        assert_eq!(vars["cursor"], "DAABCgAB");

        let vars = variables(&QueryKind::UserByScreenName("ferris_crab".into()).url("https://x.com"));
        assert_eq!(vars["screen_name"], "ferris_crab");
        assert!(vars.get("cursor").is_none());

        let url = url::Url::parse(&QueryKind::ListByRestId(1500).url("https://x.com")).unwrap();
        assert_eq!(url.path(), "/i/api/graphql/ZMQOSpxDo0cP5Cdt8MgEVA/ListByRestId");
        let (_, features) = url.query_pairs().find(|(key, _)| key == "features").unwrap();
        let features: Value = serde_json::from_str(&features).unwrap();
        assert!(features.is_object());
    }

    #[test]
    fn cursor_and_count_only_touch_timelines() {
        let mut lookup = QueryKind::UserByRestId(42);
        lookup.set_cursor("abc".into());
        lookup.set_count(5);
        assert_eq!(lookup, QueryKind::UserByRestId(42));
        assert_eq!(lookup.cursor(), None);
        assert_eq!(lookup.envelope(), None);

        let mut timeline = QueryKind::Following {
            user_id: 42,
            count: 200,
            cursor: String::new(),
        };
        timeline.set_cursor("abc".into());
        timeline.set_count(50);
        assert_eq!(
            timeline,
            QueryKind::Following {
                user_id: 42,
                count: 50,
                cursor: "abc".into()
            }
        );
    }

    #[test]
    fn flat_page() {
        let body = load_file("sample_payloads/media_page_1.json");
        let page = parse_page(body.as_bytes(), links::instructions::USER_MEDIA, EntryLayout::Flat)
            .unwrap();

        assert_eq!(page.items.len(), 4);
        assert!(page.items.iter().all(|item| item.item_type == TIMELINE_TWEET));
        assert_eq!(page.next_cursor.as_deref(), Some("cursor-page-2"));
    }

    #[test]
    fn grouped_page() {
        let body = load_file("sample_payloads/list_members.json");
        let page = parse_page(
            body.as_bytes(),
            links::instructions::LIST_MEMBERS,
            EntryLayout::Grouped,
        )
        .unwrap();

        assert_eq!(page.items.len(), 4);
        assert!(page.items.iter().all(|item| item.item_type == TIMELINE_USER));
        assert_eq!(page.next_cursor.as_deref(), Some("members-2"));
    }

    #[test]
    fn end_of_feed() {
        let body = load_file("sample_payloads/media_end.json");
        let page = parse_page(body.as_bytes(), links::instructions::USER_MEDIA, EntryLayout::Flat)
            .unwrap();
        assert!(page.items.is_empty());

        let bare = br#"{"data":{"user":{"result":{"timeline_v2":{"timeline":{"instructions":[
            {"type":"TimelineAddEntries","entries":[]}
        ]}}}}}}"#;
        let page = parse_page(bare, links::instructions::USER_MEDIA, EntryLayout::Flat).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn malformed_envelopes() {
        let no_cursor = br#"{"data":{"user":{"result":{"timeline_v2":{"timeline":{"instructions":[
            {"type":"TimelineAddEntries","entries":[
                {"content":{"entryType":"TimelineTimelineItem","itemContent":{"itemType":"TimelineTweet"}}},
                {"content":{"entryType":"TimelineTimelineCursor","cursorType":"Top","value":"top"}}
            ]}
        ]}}}}}}"#;
        match parse_page(no_cursor, links::instructions::USER_MEDIA, EntryLayout::Flat) {
            Err(InvalidResponse(_, None)) => (),
            other => panic!("unexpected result: {:?}", other),
        }

        let no_entries = br#"{"data":{"user":{"result":{"timeline_v2":{"timeline":{"instructions":[
            {"type":"TimelineClearCache"}
        ]}}}}}}"#;
        match parse_page(no_entries, links::instructions::USER_MEDIA, EntryLayout::Flat) {
            Err(MissingValue("TimelineAddEntries")) => (),
            other => panic!("unexpected result: {:?}", other),
        }

        match parse_page(br#"{"data":{}}"#, links::instructions::USER_MEDIA, EntryLayout::Flat) {
            Err(MissingValue("instructions")) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn walk_follows_cursors_to_the_end() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;
        script.push(MEDIA_PATH, Scripted::ok(load_file("sample_payloads/media_page_1.json")));
        script.push(MEDIA_PATH, Scripted::ok(load_file("sample_payloads/media_page_2.json")));
        script.push(MEDIA_PATH, Scripted::ok(load_file("sample_payloads/media_end.json")));

        let items = Timeline::new(&client, media("")).collect_all().await.unwrap();
        assert_eq!(items.len(), 6);

        let calls: Vec<_> = script
            .calls()
            .into_iter()
            .filter(|url| url.contains("/UserMedia"))
            .collect();
        assert_eq!(calls.len(), 3);
        assert!(variables(&calls[0]).get("cursor").is_none());
        assert_eq!(variables(&calls[1])["cursor"], "cursor-page-2");
        assert_eq!(variables(&calls[2])["cursor"], "cursor-page-3");
    }

    #[tokio::test]
    async fn repeated_cursor_ends_the_walk() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;
        script.push(MEDIA_PATH, Scripted::ok(load_file("sample_payloads/media_page_1.json")));

        let mut timeline = Timeline::new(&client, media(""));
        assert_eq!(timeline.next_page().await.unwrap().len(), 4);
        assert_eq!(timeline.next_page().await.unwrap().len(), 4);
        assert!(timeline.is_exhausted());
        assert!(timeline.next_page().await.unwrap().is_empty());
        assert_eq!(script.calls_to(MEDIA_PATH), 2);

        timeline.reset();
        assert!(!timeline.is_exhausted());
        assert_eq!(timeline.query().cursor(), Some(""));
    }

    #[tokio::test]
    async fn lookups_are_not_timelines() {
        let script = Arc::new(ScriptedTransport::new());
        let client = logged_in(&script).await;

        let result = fetch_page(&client, &QueryKind::UserByRestId(42)).await;
        assert!(matches!(result, Err(InvalidResponse(_, None))));
        assert_eq!(script.calls().len(), 1);
    }
}
