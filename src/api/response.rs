use std::collections::HashMap;

use chrono::{DateTime, Utc};
use strum::{Display, EnumString};
use url::Url;

/// Decoded result of one HTTP exchange plus its response metadata.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub result: T,
    /// Server `Date`, or the local time when the header was unusable.
    pub date: DateTime<Utc>,
    pub links: HashMap<LinkRelation, Url>,
    pub rate_info: Option<RateLimit>,
    pub request_id: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn link(&self, relation: LinkRelation) -> Option<&Url> {
        self.links.get(&relation)
    }
}

/// Relation names understood in a `Link` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LinkRelation {
    #[strum(serialize = "self")]
    Current,
    Next,
    #[strum(to_string = "prev", serialize = "previous")]
    Previous,
    First,
    Last,
}

/// Rate-limit snapshot taken from the `x-rate-limit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub remaining: Option<u32>,
    pub reset: Option<DateTime<Utc>>,
}
