//! Per-request middleware chain: decompression, logging, body hashing,
//! retry.

pub mod compression;
pub mod hashing;
pub mod logging;
pub mod retry;
