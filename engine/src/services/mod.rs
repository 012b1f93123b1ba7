//! Domain services for the Plantation Management engine

pub mod cascade;
pub mod farm;
pub mod harvest;
pub mod hybrid_yield;
pub mod plot;
pub mod recompute;
pub mod tree;

pub use cascade::{
    register_default_handlers, CascadeBus, CascadeEvent, CascadeHandler, EventPayload,
};
pub use farm::FarmService;
pub use harvest::HarvestService;
pub use hybrid_yield::HybridYieldService;
pub use plot::PlotService;
pub use recompute::{recompute_farm, recompute_plot, RecomputeScope};
pub use tree::TreeService;
