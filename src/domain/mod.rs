//! Domain types shared by the cache, credential and catalog layers.

pub mod catalog;
pub mod credentials;
pub mod films;
