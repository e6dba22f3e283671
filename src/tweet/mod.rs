// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tweets with media, and collecting them from a user's media timeline.
//!
//! ## Time ranges
//!
//! A media timeline arrives newest first. `collect` walks it page by page and, given a
//! `TimeRange`, keeps only the tweets posted inside the range (both ends inclusive, either end
//! optional):
//!
//! * Tweets newer than `max` are skipped, but the walk goes on, since older pages may still hold
//!   tweets inside the range. This holds even when a whole page is newer than `max`.
//! * The first tweet older than `min` ends the walk. Everything from it onward is dropped, and no
//!   further page is loaded.
//!
//! `filter_by_time_range` applies those two cuts to a single page.
//!
//! ## Incremental crawls
//!
//! `collect_since` collects everything newer than a saved timestamp and hands back the
//! timestamp to save for next time. `collect_many` runs independent collections for many users
//! at once; they only ever wait on one another through the client's rate limiter.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::debug;

use crate::client::Client;
use crate::error;
use crate::timeline::{ItemContent, QueryKind, Timeline};
use crate::user::{self, User};

mod raw;

use raw::{RawMedia, RawTweetResult, RawTweetResults};

const VISIBILITY_WRAPPER: &str = "TweetWithVisibilityResults";
const TOMBSTONE: &str = "TweetTombstone";

/// A tweet, reduced to the parts a media crawl needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tweet {
    /// Numeric ID of the tweet.
    pub id: u64,
    /// The full text of the tweet.
    pub text: String,
    /// When the tweet was posted.
    pub created_at: DateTime<Utc>,
    /// The author, if the tweet carried a readable user record.
    pub creator: Option<User>,
    /// Download URLs of the attached media, in display order.
    ///
    /// Photos link to the original image. Videos and animated GIFs link to their variant with
    /// the highest bitrate.
    pub urls: Vec<String>,
}

/// A window of posting times. A missing bound leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// The oldest acceptable posting time.
    pub min: Option<DateTime<Utc>>,
    /// The newest acceptable posting time.
    pub max: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(min: Option<DateTime<Utc>>, max: Option<DateTime<Utc>>) -> TimeRange {
        TimeRange { min, max }
    }

    /// Everything posted at or after `min`.
    pub fn since(min: DateTime<Utc>) -> TimeRange {
        TimeRange {
            min: Some(min),
            max: None,
        }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.min.map_or(true, |min| time >= min) && self.max.map_or(true, |max| time <= max)
    }
}

fn media_url(media: RawMedia) -> Option<String> {
    match media.kind.as_str() {
        "photo" => Some(media.media_url_https).filter(|url| !url.is_empty()),
        "video" | "animated_gif" => media
            .video_info?
            .variants
            .into_iter()
            .filter(|variant| variant.bitrate.is_some())
            .max_by_key(|variant| variant.bitrate)
            .map(|variant| variant.url),
        _ => None,
    }
}

fn from_result(result: RawTweetResult) -> Option<Tweet> {
    match result.typename.as_str() {
        VISIBILITY_WRAPPER => return result.tweet.and_then(|tweet| from_result(*tweet)),
        TOMBSTONE => {
            debug!("skipping tombstone");
            return None;
        }
        _ => (),
    }

    let id = result.rest_id?.parse().ok()?;
    let legacy = result.legacy?;
    let creator = result
        .core
        .and_then(|core| user::from_results(core.user_results).ok());
    let urls = legacy
        .extended_entities
        .map(|entities| entities.media.into_iter().filter_map(media_url).collect())
        .unwrap_or_default();

    Some(Tweet {
        id,
        text: legacy.full_text,
        created_at: legacy.created_at,
        creator,
        urls,
    })
}

/// Parses a `tweet_results` node. Tombstones, and tweets that can't be parsed, yield `None`.
pub(crate) fn parse_tweet_results(value: Value) -> Option<Tweet> {
    match serde_json::from_value::<RawTweetResults>(value) {
        Ok(results) => results.result.and_then(from_result),
        Err(err) => {
            debug!(error = %err, "skipping tweet entry");
            None
        }
    }
}

fn items_to_tweets(items: Vec<ItemContent>) -> Vec<Tweet> {
    items
        .into_iter()
        .filter_map(ItemContent::into_tweet_results)
        .filter_map(parse_tweet_results)
        .collect()
}

/// Cuts a newest-first page of tweets down to the ones posted between `min` and `max`.
///
/// Returns whether any tweet was older than `min`, whether any tweet was newer than `max`, and
/// the contiguous run of tweets in between.
pub fn filter_by_time_range(
    tweets: &[Tweet],
    min: Option<DateTime<Utc>>,
    max: Option<DateTime<Utc>>,
) -> (bool, bool, &[Tweet]) {
    let n = tweets.len();
    let (mut begin, mut end) = (0, n);
    let (mut cut_min, mut cut_max) = (false, false);

    for (i, tweet) in tweets.iter().enumerate() {
        if let Some(min) = min {
            if end == n && tweet.created_at < min {
                end = i;
                cut_min = true;
            }
        }
        if let Some(max) = max {
            if tweet.created_at > max {
                begin = i + 1;
                cut_max = true;
            }
        }
    }

    if begin >= end {
        return (cut_min, cut_max, &tweets[..0]);
    }
    (cut_min, cut_max, &tweets[begin..end])
}

/// Collects the tweets with media posted by `user`, newest first.
///
/// Without a `range`, the whole media timeline is loaded. A user whose timelines the logged-in
/// account may not see yields no tweets, without any request being made. If any page fails to
/// load, the tweets collected so far are discarded and the error is returned.
pub async fn collect(
    client: &Client,
    user: &User,
    range: Option<TimeRange>,
) -> error::Result<Vec<Tweet>> {
    if !user.is_visible() {
        return Ok(Vec::new());
    }

    let query = QueryKind::UserMedia {
        user_id: user.id,
        count: client.config().media_page_size,
        cursor: String::new(),
    };
    let mut timeline = Timeline::new(client, query);
    let mut results = Vec::new();

    let min = range.and_then(|range| range.min);
    let mut max = range.and_then(|range| range.max);

    loop {
        let items = timeline.next_page().await?;
        if items.is_empty() {
            break;
        }
        let tweets = items_to_tweets(items);

        if range.is_none() {
            results.extend(tweets);
            continue;
        }

        let (cut_min, cut_max, kept) = filter_by_time_range(&tweets, min, max);
        results.extend_from_slice(kept);

        if cut_min {
            debug!(user = user.id, "reached the start of the time range");
            break;
        }
        if cut_max && !kept.is_empty() {
            max = None;
        }
    }

    Ok(results)
}

/// Collects the tweets with media `user` posted at or after `since`, and returns them along
/// with the posting time of the newest one.
///
/// Passing the returned time back in on the next crawl picks up where this one left off.
pub async fn collect_since(
    client: &Client,
    user: &User,
    since: Option<DateTime<Utc>>,
) -> error::Result<(Vec<Tweet>, Option<DateTime<Utc>>)> {
    let tweets = collect(client, user, Some(TimeRange::new(since, None))).await?;
    let newest = tweets.first().map(|tweet| tweet.created_at);
    Ok((tweets, newest))
}

/// Runs `collect` for each of the given users, with up to `concurrency` collections in flight
/// at once. Results come back in completion order, each paired with its user.
pub async fn collect_many<I>(
    client: &Client,
    users: I,
    range: Option<TimeRange>,
    concurrency: usize,
) -> Vec<(User, error::Result<Vec<Tweet>>)>
where
    I: IntoIterator<Item = User>,
{
    stream::iter(users)
        .map(|user| async move {
            let tweets = collect(client, &user, range).await;
            (user, tweets)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}
