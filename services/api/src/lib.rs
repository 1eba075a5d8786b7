//! services/api/src/lib.rs
//!
//! The library crate backing the `api` binary. Exposes the configuration,
//! error type, adapters and web layer so the binaries (and tests) can wire
//! them together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
