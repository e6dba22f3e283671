// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::common::*;
use crate::user::raw::RawUserResults;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTweetResults {
    #[serde(default)]
    pub result: Option<RawTweetResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTweetResult {
    #[serde(rename = "__typename", default)]
    pub typename: String,
    #[serde(default)]
    pub rest_id: Option<String>,
    #[serde(default)]
    pub core: Option<RawTweetCore>,
    #[serde(default)]
    pub legacy: Option<RawTweetLegacy>,
    /// The wrapped tweet of a `TweetWithVisibilityResults`.
    #[serde(default)]
    pub tweet: Option<Box<RawTweetResult>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTweetCore {
    #[serde(default)]
    pub user_results: RawUserResults,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTweetLegacy {
    #[serde(deserialize_with = "deserialize_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub extended_entities: Option<RawExtendedEntities>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawExtendedEntities {
    #[serde(default)]
    pub media: Vec<RawMedia>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMedia {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub media_url_https: String,
    #[serde(default)]
    pub video_info: Option<RawVideoInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVideoInfo {
    #[serde(default)]
    pub variants: Vec<RawVariant>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVariant {
    /// Missing on streaming playlists.
    #[serde(default)]
    pub bitrate: Option<u64>,
    pub url: String,
}
