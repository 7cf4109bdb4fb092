//! Property-Based Tests Module
//!
//! Uses proptest for invariant verification.
//! Each test runs minimum 100 iterations.
//!
//! Test categories:
//! - snapshot_retention: Records always equal the latest successful fetch
//! - dedup: One record per name, last value wins
//! - expiry: Rendering is deterministic under a fixed clock
//! - error_sanitization: Credential material never leaks

pub mod dedup;
