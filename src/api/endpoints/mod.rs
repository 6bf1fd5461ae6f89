//! API endpoint handlers.

pub mod diagnostics;
pub mod health;
pub mod info;
pub mod predict;
