//! Tool catalog and argument validation.
//!
//! Submodules:
//! - `registry`: `ToolKind`, `ToolRequest`, and the immutable `ToolRegistry`
//! - `guard`: Statement guard for verbatim SQL
//! - `errors`: Validation error types

pub mod errors;
pub mod guard;
pub mod registry;

pub use errors::ToolCallError;
pub use registry::{ToolKind, ToolRegistry, ToolRequest};
