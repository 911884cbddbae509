//! Session state engine of an IPTV catalog bot.
//!
//! The chat front end resolves a user's Xtream-style account, then drives
//! everything through [`session::SessionEngine`]: rate-limited admission,
//! cached catalog queries, per-user selections, M3U export, downloads and
//! the periodic retention sweep.

pub mod account;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod playlist;
pub mod ratelimit;
pub mod retention;
pub mod selection;
pub mod session;
pub mod upstream;

/// Chat identity of a user.
pub type Identity = i64;
