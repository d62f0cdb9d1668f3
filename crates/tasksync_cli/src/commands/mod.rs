//! CLI command implementations.

pub mod backoff;
pub mod simulate;
