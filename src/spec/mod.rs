//! Specification loading and merging.
//!
//! A base Swagger 2.0 document supplies `definitions` and metadata. Each
//! registered route may carry a Swagger operation fragment in its
//! documentation text; [`build_spec`] merges those fragments into `paths`,
//! injects the default error responses and indexes the result by handler
//! name. The returned [`Specification`] is immutable and meant to be built
//! once at startup and shared behind an `Arc`.

mod build;
mod load;
mod types;

pub use build::*;
pub use load::*;
pub use types::*;
