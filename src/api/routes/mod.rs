//! API Routes
//!
//! Route handlers organized by functionality.

pub mod find;
pub mod health;
pub mod render;
