//! Outbound clients used by handlers to reach sibling endpoints.

pub mod verify_client;

pub use verify_client::*;
