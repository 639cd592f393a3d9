//! Infrastructure adapters and runtime bootstrap.

pub mod credentials;
pub mod error;
pub mod http;
pub mod telemetry;
pub mod upstream;
