//! firefly/crates/ff-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Firefly.

pub mod auth;
pub mod error;
pub mod models;
pub mod pagination;
pub mod text;
pub mod traits;
pub mod views;

// Re-exporting for easier access in other crates
pub use auth::*;
pub use error::*;
pub use models::*;
pub use pagination::*;
pub use traits::*;
pub use views::*;
