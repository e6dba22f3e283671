// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Set of structs and methods that act as a sort of internal prelude.
//!
//! The elements available in this module and its children are fairly basic building blocks that
//! the other modules all glob-import to make available as a common language.
//!
//! ## `ParamList`
//!
//! `ParamList` collects the query parameters of a single call. The GraphQL endpoints this crate
//! talks to take exactly two parameters, `variables` and `features`, both of which are JSON
//! objects serialized into the query string, but the type doesn't care about that.
//!
//! ## Deserialization glue
//!
//! `deserialize_datetime` reads the timestamp format the API uses in every `created_at` field.
//! `deser_from_string` reads numbers the API sends as strings, like `rest_id` and `id_str`.
//!
//! ## Transport
//!
//! The `response` submodule holds the `HttpSend` trait that all web calls go through, the
//! hyper-backed implementation of it, and the helpers that turn a raw response into a checked
//! body or a JSON value.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hyper::header::{HeaderMap, HeaderValue};
use percent_encoding::{utf8_percent_encode, AsciiSet, PercentEncode};
use serde::de::Error;
use serde::{Deserialize, Deserializer};

mod response;

pub use crate::common::response::*;

/// A set of headers returned with a response.
pub type Headers = HeaderMap<HeaderValue>;
pub type CowStr = Cow<'static, str>;

/// Represents a list of parameters to an API call.
///
/// The parameters are kept sorted by key, so the query string rendered from a given set of
/// parameters is always the same.
#[derive(Debug, Clone, Default, derive_more::Deref, derive_more::DerefMut, derive_more::From)]
pub struct ParamList(BTreeMap<CowStr, CowStr>);

impl ParamList {
    /// Creates a new, empty `ParamList`.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds the given key/value parameter to this `ParamList`.
    pub fn add_param(mut self, key: impl Into<CowStr>, value: impl Into<CowStr>) -> Self {
        self.insert(key.into(), value.into());
        self
    }

    /// Renders this `ParamList` as an `application/x-www-form-urlencoded` string.
    pub fn to_urlencoded(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Percent-encodes the given string.
///
/// Every *byte* that is not an ASCII number or letter, or the ASCII characters `-`, `.`, `_`, or
/// `~` is replaced with a percent sign (`%`) and the byte value in hexadecimal. This is stricter
/// than the web client itself, and the API accepts it.
pub fn percent_encode(src: &str) -> PercentEncode {
    lazy_static::lazy_static! {
        static ref ENCODER: AsciiSet = percent_encoding::NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');
    }
    utf8_percent_encode(src, &*ENCODER)
}

/// The timestamp format used by `created_at` fields, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub const DATETIME_FORMAT: &str = "%a %b %d %T %z %Y";

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(s, DATETIME_FORMAT).map(|date| date.with_timezone(&Utc))
}

pub fn deserialize_datetime<'de, D>(ser: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(ser)?;
    parse_datetime(&s).map_err(|e| D::Error::custom(e))
}

pub fn deser_from_string<'de, D, T>(ser: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    let str = String::deserialize(ser)?;
    str.parse().map_err(|e| D::Error::custom(e))
}
