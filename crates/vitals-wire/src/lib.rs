//! Wire-level helpers shared by the agent and the server.

#![warn(clippy::all)]

pub mod gzip;
pub mod hash;

/// Header carrying the HMAC-SHA256 of the (uncompressed) body.
pub const HASH_HEADER: &str = "HashSHA256";
