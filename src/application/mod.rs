//! Application services and the ports they depend on.

pub mod catalog;
pub mod credentials;
pub mod error;
pub mod films;
pub mod upstream;
