//! HTTP handlers for all web routes.

pub mod aggregate;
pub mod system;
