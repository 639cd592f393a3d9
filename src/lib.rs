//! Caching relay between a media player's plugin protocol and a third-party
//! media-catalog account.
//!
//! The crate centres on [`cache::CacheFabric`], the per-user invalidation
//! index and the two-tier [`auth::CredentialManager`], tied together by one
//! [`context::RelayContext`].

pub mod application;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod domain;
pub mod infra;
