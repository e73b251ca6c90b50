//! Closed sets of values accepted by the API.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Sort direction of an `order[...]` parameter.
    Order {
        Asc => "asc",
        Desc => "desc",
    }
}

vocabulary! {
    /// How several tag filters combine. The API defaults to `AND`.
    TagMode {
        And => "AND",
        Or => "OR",
    }
}

vocabulary! {
    Demographic {
        Shounen => "shounen",
        Shoujo => "shoujo",
        Josei => "josei",
        Seinen => "seinen",
        None => "none",
    }
}

vocabulary! {
    PublicationStatus {
        Ongoing => "ongoing",
        Completed => "completed",
        Hiatus => "hiatus",
        Cancelled => "cancelled",
    }
}

vocabulary! {
    /// Reading status a user can set on a followed manga.
    ReadingStatus {
        Reading => "reading",
        OnHold => "on_hold",
        PlanToRead => "plan_to_read",
        Dropped => "dropped",
        ReReading => "re_reading",
        Completed => "completed",
    }
}

vocabulary! {
    ContentRating {
        Safe => "safe",
        Suggestive => "suggestive",
        Erotica => "erotica",
        Pornographic => "pornographic",
    }
}

/// Relationship types that can be expanded with `includes[]`.
pub mod includes {
    pub const AUTHOR: &str = "author";
    pub const ARTIST: &str = "artist";
    pub const COVER_ART: &str = "cover_art";
    pub const MANGA: &str = "manga";
    pub const SCANLATION_GROUP: &str = "scanlation_group";
    pub const TAG: &str = "tag";
    pub const USER: &str = "user";
}
