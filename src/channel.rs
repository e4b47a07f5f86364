//! Channel names and the static forum/feed schema.
//!
//! A forum is paginated by identity range; a feed aggregates several forums
//! and is paginated by a server-assigned tag plus a position.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

/// Forums grouped under each feed. "Home" aggregates every forum.
const FEEDS: &[(&str, &[&str])] = &[
    (
        "Entertainment",
        &[
            "Shows",
            "Movies",
            "People",
            "Sports",
            "Gaming",
            "Virtual Reality",
            "Tabletop Games",
            "Music",
            "Books",
        ],
    ),
    (
        "News",
        &[
            "World News",
            "Social Issues",
            "Politics",
            "Environment",
            "Business",
            "Economic",
            "Legal",
        ],
    ),
    (
        "Informative",
        &["Technology", "Science", "Education", "History"],
    ),
    (
        "Lifestyle",
        &[
            "Fashion",
            "Food",
            "Health",
            "Fitness",
            "Social Life",
            "Relationships",
            "Recipes",
            "Travel",
        ],
    ),
    ("Fun", &["Funny", "Ask", "Cute", "Forum Games", "Cosplay"]),
    ("Creative", &["Crafts", "Artwork", "Design", "Writing"]),
];

/// Name of the feed that spans all forums.
pub const HOME_FEED: &str = "Home";

/// forum -> feed it belongs to
static FORUM_TO_FEED: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    FEEDS
        .iter()
        .flat_map(|(feed, forums)| forums.iter().map(move |forum| (*forum, *feed)))
        .collect()
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("unknown forum: {0}")]
    UnknownForum(String),
    #[error("unknown feed: {0}")]
    UnknownFeed(String),
}

/// How a channel is paginated against the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// A single forum, paged by identity high/low watermarks.
    RangeScan,
    /// An aggregate feed, paged by generation tag and position.
    TokenScan,
}

impl ChannelKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RangeScan => "forum",
            Self::TokenScan => "feed",
        }
    }
}

/// A validated channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    name: String,
    kind: ChannelKind,
}

impl Channel {
    /// Look up a forum by name.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::UnknownForum` if the schema has no such forum.
    pub fn forum(name: &str) -> Result<Self, ChannelError> {
        if FORUM_TO_FEED.contains_key(name) {
            Ok(Self {
                name: name.to_string(),
                kind: ChannelKind::RangeScan,
            })
        } else {
            Err(ChannelError::UnknownForum(name.to_string()))
        }
    }

    /// Look up a feed by name.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::UnknownFeed` if the schema has no such feed.
    pub fn feed(name: &str) -> Result<Self, ChannelError> {
        if name == HOME_FEED || FEEDS.iter().any(|(feed, _)| *feed == name) {
            Ok(Self {
                name: name.to_string(),
                kind: ChannelKind::TokenScan,
            })
        } else {
            Err(ChannelError::UnknownFeed(name.to_string()))
        }
    }

    /// Resolve a channel of the given kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not in the schema for that kind.
    pub fn resolve(kind: ChannelKind, name: &str) -> Result<Self, ChannelError> {
        match kind {
            ChannelKind::RangeScan => Self::forum(name),
            ChannelKind::TokenScan => Self::feed(name),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.name)
    }
}

/// Feed a forum is listed under, for breadcrumb links.
#[must_use]
pub fn parent_feed(forum: &str) -> Option<&'static str> {
    FORUM_TO_FEED.get(forum).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forum_lookup() {
        let channel = Channel::forum("World News").unwrap();
        assert_eq!(channel.kind(), ChannelKind::RangeScan);
        assert_eq!(channel.name(), "World News");
        assert_eq!(
            Channel::forum("News"),
            Err(ChannelError::UnknownForum("News".to_string()))
        );
    }

    #[test]
    fn test_feed_lookup() {
        let channel = Channel::feed("News").unwrap();
        assert_eq!(channel.kind(), ChannelKind::TokenScan);
        assert!(Channel::feed("Gaming").is_err());
        assert!(Channel::feed("").is_err());
    }

    #[test]
    fn test_every_listed_forum_resolves() {
        assert!(Channel::feed(HOME_FEED).is_ok());
        for (feed, forums) in FEEDS {
            assert!(Channel::feed(feed).is_ok());
            for forum in *forums {
                assert!(Channel::forum(forum).is_ok());
                assert_eq!(parent_feed(forum), Some(*feed));
            }
        }
    }

    #[test]
    fn test_parent_feed() {
        assert_eq!(parent_feed("Recipes"), Some("Lifestyle"));
        assert_eq!(parent_feed("Cosplay"), Some("Fun"));
        assert_eq!(parent_feed("Home"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Channel::forum("Gaming").unwrap().to_string(), "forum/Gaming");
        assert_eq!(Channel::feed("Home").unwrap().to_string(), "feed/Home");
    }
}
