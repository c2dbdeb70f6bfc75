//! Shared vocabulary for the Lumen compiler stages.
//!
//! - [`span`]: byte ranges into source text and file-qualified locations
//! - [`module_path`]: dotted module paths attached to every declaration
//! - [`access`]: declaration visibility levels

pub mod access;
pub mod module_path;
pub mod span;

pub use access::Access;
pub use module_path::ModulePath;
pub use span::{SourceLocation, TextRange};
