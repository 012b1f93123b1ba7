//! Domain models for the Plantation Management Platform

mod farm;
mod harvest;
mod planting;
mod plot;
mod prediction;
mod tree;

pub use farm::*;
pub use harvest::*;
pub use planting::*;
pub use plot::*;
pub use prediction::*;
pub use tree::*;
