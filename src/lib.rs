//! Forum feed cache library.
//!
//! A client that assembles forum and feed views from a paginated posts API,
//! merging each response into a locally persisted per-channel cache and
//! deciding from the cache's freshness whether to fetch newer posts, older
//! posts, or nothing at all.

pub mod autoload;
pub mod cache;
pub mod channel;
pub mod clock;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod display;
pub mod engine;
pub mod models;
pub mod scheduler;
pub mod source;
pub mod store;
