// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::Deserialize;

use crate::common::*;
use crate::user::raw::RawUserResults;

#[derive(Debug, Deserialize)]
pub(crate) struct RawList {
    #[serde(deserialize_with = "deser_from_string")]
    pub id_str: u64,
    #[serde(default)]
    pub member_count: i32,
    #[serde(default)]
    pub name: String,
    /// The owner of the list.
    #[serde(default)]
    pub user_results: RawUserResults,
}
