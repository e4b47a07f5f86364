//! Shared constants used across the crate.

/// User agent string sent with every API request.
pub const CLIENT_USER_AGENT: &str = concat!("forum-feed-cache/", env!("CARGO_PKG_VERSION"));

/// Number of posts sharing one image bucket on the CDN.
pub const IMAGE_BUCKET_SIZE: i64 = 1000;

/// Position value marking that a token-scan feed has no more pages.
pub const END_OF_FEED: i64 = -1;

/// Upper identity-range sentinel for a cache with no entries.
pub const EMPTY_HIGH: i64 = -1;
