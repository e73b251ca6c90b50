//! Fixed locations of the mangadex services.
//!
//! Paths are given as segment lists and appended to the configured API base,
//! so identifiers are percent-encoded instead of being spliced into a string.

pub const API_BASE: &str = "https://api.mangadex.org/";
pub const REPORT_URL: &str = "https://api.mangadex.network/report";

pub const FORCE_PORT_443: &str = "forcePort443";
pub const X_CACHE: &str = "X-Cache";
pub const CACHE_HIT_PREFIX: &str = "HIT";

pub(crate) fn at_home_server(chapter_id: &str) -> [&str; 3] {
    ["at-home", "server", chapter_id]
}

pub(crate) fn manga_list() -> [&'static str; 1] {
    ["manga"]
}

pub(crate) fn manga(id: &str) -> [&str; 2] {
    ["manga", id]
}

pub(crate) fn manga_aggregate(id: &str) -> [&str; 3] {
    ["manga", id, "aggregate"]
}

pub(crate) fn manga_feed(id: &str) -> [&str; 3] {
    ["manga", id, "feed"]
}

pub(crate) fn manga_read_markers(id: &str) -> [&str; 3] {
    ["manga", id, "read"]
}

pub(crate) fn manga_follow(id: &str) -> [&str; 3] {
    ["manga", id, "follow"]
}

pub(crate) fn user_follows_manga(id: &str) -> [&str; 4] {
    ["user", "follows", "manga", id]
}

pub(crate) fn chapter(id: &str) -> [&str; 2] {
    ["chapter", id]
}
