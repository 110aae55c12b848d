//! Traits shared by the sigbuf crates and the pipeline stages built on them.
//!
//! # Modules
//!
//! - [`memory_owner`]: Exposes the raw, aligned memory behind a sample buffer
//!   to stages that issue vector loads and stores against it.

pub mod memory_owner;
