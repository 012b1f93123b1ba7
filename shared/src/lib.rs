//! Shared types and models for the Plantation Management Platform
//!
//! This crate contains the entity shapes and the pure calculations shared
//! between the engine, the offline field app (via WASM), and other components
//! of the system. Nothing in here performs I/O.

pub mod lifecycle;
pub mod models;
pub mod types;
pub mod validation;

pub use lifecycle::*;
pub use models::*;
pub use types::*;
pub use validation::*;
