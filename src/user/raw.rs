// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::Deserialize;

/// The `user_results` wrapper found in lookups, list records, tweets, and member timelines.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawUserResults {
    #[serde(default)]
    pub result: Option<RawUserResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUserResult {
    #[serde(rename = "__typename", default)]
    pub typename: String,
    #[serde(default)]
    pub rest_id: Option<String>,
    #[serde(default)]
    pub legacy: RawUserLegacy,
    /// Why the user is unavailable, e.g. `Suspended`.
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawUserLegacy {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub screen_name: String,
    #[serde(default)]
    pub protected: Option<bool>,
    #[serde(default)]
    pub friends_count: i32,
    #[serde(default)]
    pub media_count: i32,
    #[serde(default)]
    pub following: Option<bool>,
    #[serde(default)]
    pub follow_request_sent: Option<bool>,
}
