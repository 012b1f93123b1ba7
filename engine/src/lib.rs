//! Plantation Management engine
//!
//! Keeps derived farm data consistent: plot and farm aggregates are
//! recomputed through the cascade bus whenever a planting, harvest or sampled
//! tree changes, plot lifecycle status only ever moves forward, and hybrid
//! yield predictions blend tree-level and farm-level estimates.
//!
//! The engine is synchronous and performs no I/O of its own. Every operation
//! takes the caller's [`Repository`].

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    EntityKind, EnvironmentalFactors, EventKind, HybridYieldResult, PlotLifecycle, PlotStatus,
};
use uuid::Uuid;

pub mod clock;
pub mod config;
pub mod error;
pub mod external;
pub mod services;
pub mod store;
pub mod telemetry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{AppError, AppResult, ErrorDetail};
pub use store::{with_transaction, InMemoryStore, Repository};

use external::{FarmYieldScorer, HeuristicFarmScorer, HeuristicTreeScorer, TreeYieldScorer};
use services::{
    register_default_handlers, CascadeBus, CascadeEvent, CascadeHandler, FarmService,
    HarvestService, HybridYieldService, PlotService, RecomputeScope, TreeService,
};

/// Entry point wiring the cascade bus, the clock and every service together
#[derive(Clone)]
pub struct Engine {
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    bus: Arc<CascadeBus>,
    farms: FarmService,
    plots: PlotService,
    harvests: HarvestService,
    trees: TreeService,
    yields: HybridYieldService,
}

impl Engine {
    /// Engine with the default handlers, heuristic scorers and system clock
    pub fn new(config: Config) -> Self {
        EngineBuilder::new(config).build()
    }

    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &CascadeBus {
        &self.bus
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn farms(&self) -> &FarmService {
        &self.farms
    }

    pub fn plots(&self) -> &PlotService {
        &self.plots
    }

    pub fn harvests(&self) -> &HarvestService {
        &self.harvests
    }

    pub fn trees(&self) -> &TreeService {
        &self.trees
    }

    pub fn yields(&self) -> &HybridYieldService {
        &self.yields
    }

    /// Lifecycle of a plot planted on `planted_date`, as of now
    pub fn derive_lifecycle(&self, planted_date: NaiveDate) -> PlotLifecycle {
        shared::derive_lifecycle(planted_date, self.clock.now())
    }

    pub fn apply_status_if_advances(&self, current: PlotStatus, derived: PlotStatus) -> PlotStatus {
        shared::apply_status_if_advances(current, derived)
    }

    /// Dispatch an event through the bus inside a unit of work
    pub fn dispatch(&self, repo: &mut dyn Repository, event: &CascadeEvent) -> AppResult<()> {
        with_transaction(repo, |repo| self.bus.dispatch(repo, event))
    }

    /// Recompute aggregates and lifecycle of one plot
    pub fn recompute_plot(&self, repo: &mut dyn Repository, plot_id: Uuid) -> AppResult<()> {
        services::recompute_plot(repo, plot_id, RecomputeScope::WithLifecycle, self.clock.now())
    }

    pub fn recompute_farm(&self, repo: &mut dyn Repository, farm_id: Uuid) -> AppResult<()> {
        services::recompute_farm(repo, farm_id, self.clock.now())
    }

    pub fn predict_hybrid_yield(
        &self,
        repo: &mut dyn Repository,
        plot_id: Uuid,
        total_trees: u32,
        environment: Option<EnvironmentalFactors>,
        force_recalculate: bool,
    ) -> AppResult<HybridYieldResult> {
        self.yields
            .predict_hybrid_yield(repo, plot_id, total_trees, environment, force_recalculate)
    }

    pub fn get_latest_prediction(
        &self,
        repo: &dyn Repository,
        plot_id: Uuid,
    ) -> AppResult<Option<HybridYieldResult>> {
        self.yields.get_latest_prediction(repo, plot_id)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("environment", &self.config.environment)
            .field("bus", &self.bus)
            .finish()
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    config: Config,
    clock: Arc<dyn Clock>,
    tree_scorer: Option<Arc<dyn TreeYieldScorer>>,
    farm_scorer: Option<Arc<dyn FarmYieldScorer>>,
    extra_handlers: Vec<(EntityKind, EventKind, CascadeHandler)>,
}

impl EngineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            tree_scorer: None,
            farm_scorer: None,
            extra_handlers: Vec::new(),
        }
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn tree_scorer(mut self, scorer: impl TreeYieldScorer + 'static) -> Self {
        self.tree_scorer = Some(Arc::new(scorer));
        self
    }

    pub fn farm_scorer(mut self, scorer: impl FarmYieldScorer + 'static) -> Self {
        self.farm_scorer = Some(Arc::new(scorer));
        self
    }

    /// Add a handler that runs after the default recompute handlers
    pub fn register_handler<F>(
        mut self,
        entity_kind: EntityKind,
        event_kind: EventKind,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut dyn Repository, &CascadeEvent) -> AppResult<()> + Send + Sync + 'static,
    {
        self.extra_handlers.push((entity_kind, event_kind, Box::new(handler)));
        self
    }

    pub fn build(self) -> Engine {
        let mut bus = CascadeBus::new();
        register_default_handlers(&mut bus, Arc::clone(&self.clock));
        for (entity_kind, event_kind, handler) in self.extra_handlers {
            bus.register(entity_kind, event_kind, handler);
        }
        let bus = Arc::new(bus);

        let tree_scorer = self.tree_scorer.unwrap_or_else(|| {
            Arc::new(HeuristicTreeScorer::new(self.config.tree_model.clone()))
        });
        let farm_scorer = self.farm_scorer.unwrap_or_else(|| {
            Arc::new(HeuristicFarmScorer::new(self.config.farm_model.clone()))
        });

        let clock = self.clock;
        Engine {
            farms: FarmService::new(Arc::clone(&bus), Arc::clone(&clock)),
            plots: PlotService::new(Arc::clone(&bus), Arc::clone(&clock)),
            harvests: HarvestService::new(Arc::clone(&bus), Arc::clone(&clock)),
            trees: TreeService::new(Arc::clone(&bus), Arc::clone(&clock)),
            yields: HybridYieldService::new(
                self.config.prediction.clone(),
                tree_scorer,
                farm_scorer,
                Arc::clone(&clock),
            ),
            config: Arc::new(self.config),
            clock,
            bus,
        }
    }
}

/// Load `.env`, configuration and logging, then build the default engine
pub fn bootstrap() -> anyhow::Result<Engine> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    telemetry::init(&config.logging)?;

    tracing::info!("Starting Plantation Management engine");
    tracing::info!("Environment: {}", config.environment);

    Ok(Engine::new(config))
}
