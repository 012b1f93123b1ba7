//! Cascade bus: in-process observer registry for derived-state updates
//!
//! Handlers are keyed by `(entity kind, event kind)` and run synchronously in
//! registration order. Dispatch stops at the first failing handler; effects
//! of handlers that already ran are left in place for the caller's unit of
//! work to commit or roll back.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::{EntityKind, EventKind};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::store::Repository;

use super::recompute::{recompute_farm, recompute_plot, RecomputeScope};

/// Notification that an entity was created, updated or deleted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CascadeEvent {
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub event_kind: EventKind,
    pub payload: EventPayload,
}

/// Data handlers need beyond the entity id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventPayload {
    /// Owning plot for plot children, owning farm for plots.
    /// Mandatory on delete since the entity is already gone from the store.
    pub parent_id: Option<Uuid>,
    /// Former parent when an update moved the entity
    pub previous_parent_id: Option<Uuid>,
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
}

impl EventPayload {
    /// Parents touched by the event, current first
    pub fn affected_parents(&self) -> Vec<Uuid> {
        let mut parents: Vec<Uuid> = self.parent_id.into_iter().collect();
        if let Some(previous) = self.previous_parent_id {
            if !parents.contains(&previous) {
                parents.push(previous);
            }
        }
        parents
    }
}

impl CascadeEvent {
    pub fn created<T: Serialize>(
        entity_kind: EntityKind,
        entity_id: Uuid,
        parent_id: Option<Uuid>,
        entity: &T,
    ) -> Self {
        Self {
            entity_kind,
            entity_id,
            event_kind: EventKind::Create,
            payload: EventPayload {
                parent_id,
                previous_parent_id: None,
                old: None,
                new: serde_json::to_value(entity).ok(),
            },
        }
    }

    pub fn updated<T: Serialize>(
        entity_kind: EntityKind,
        entity_id: Uuid,
        parent_id: Option<Uuid>,
        previous_parent_id: Option<Uuid>,
        old: &T,
        new: &T,
    ) -> Self {
        Self {
            entity_kind,
            entity_id,
            event_kind: EventKind::Update,
            payload: EventPayload {
                parent_id,
                previous_parent_id: previous_parent_id
                    .filter(|previous| Some(*previous) != parent_id),
                old: serde_json::to_value(old).ok(),
                new: serde_json::to_value(new).ok(),
            },
        }
    }

    pub fn deleted<T: Serialize>(
        entity_kind: EntityKind,
        entity_id: Uuid,
        parent_id: Option<Uuid>,
        entity: &T,
    ) -> Self {
        Self {
            entity_kind,
            entity_id,
            event_kind: EventKind::Delete,
            payload: EventPayload {
                parent_id,
                previous_parent_id: None,
                old: serde_json::to_value(entity).ok(),
                new: None,
            },
        }
    }
}

impl std::fmt::Display for CascadeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.event_kind, self.entity_kind, self.entity_id)
    }
}

/// A registered cascade handler
pub type CascadeHandler =
    Box<dyn Fn(&mut dyn Repository, &CascadeEvent) -> AppResult<()> + Send + Sync>;

/// Registry of handlers keyed by `(entity kind, event kind)`
#[derive(Default)]
pub struct CascadeBus {
    handlers: HashMap<(EntityKind, EventKind), Vec<CascadeHandler>>,
}

impl CascadeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `(entity_kind, event_kind)`
    pub fn register<F>(&mut self, entity_kind: EntityKind, event_kind: EventKind, handler: F)
    where
        F: Fn(&mut dyn Repository, &CascadeEvent) -> AppResult<()> + Send + Sync + 'static,
    {
        self.handlers
            .entry((entity_kind, event_kind))
            .or_default()
            .push(Box::new(handler));
    }

    pub fn handler_count(&self, entity_kind: EntityKind, event_kind: EventKind) -> usize {
        self.handlers
            .get(&(entity_kind, event_kind))
            .map_or(0, Vec::len)
    }

    /// Run every handler registered for the event, in registration order.
    ///
    /// The first failure aborts dispatch and is returned wrapped with the
    /// event and the failing handler's position.
    pub fn dispatch(&self, repo: &mut dyn Repository, event: &CascadeEvent) -> AppResult<()> {
        if event.event_kind == EventKind::Delete
            && event.entity_kind != EntityKind::Farm
            && event.payload.parent_id.is_none()
        {
            return Err(AppError::ValidationError(format!(
                "Delete event for {} {} must carry its parent id",
                event.entity_kind, event.entity_id
            )));
        }

        let Some(handlers) = self.handlers.get(&(event.entity_kind, event.event_kind)) else {
            tracing::debug!(%event, "No cascade handlers registered");
            return Ok(());
        };

        tracing::debug!(%event, handlers = handlers.len(), "Dispatching cascade event");
        for (handler_index, handler) in handlers.iter().enumerate() {
            handler(&mut *repo, event).map_err(|source| {
                tracing::warn!(%event, handler_index, "Cascade handler failed: {}", source);
                AppError::CascadeHandler {
                    event: Box::new(event.clone()),
                    handler_index,
                    source: Box::new(source),
                }
            })?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for CascadeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut registrations: Vec<_> = self
            .handlers
            .iter()
            .map(|((entity, event), handlers)| (format!("{event} {entity}"), handlers.len()))
            .collect();
        registrations.sort();
        f.debug_struct("CascadeBus")
            .field("registrations", &registrations)
            .finish()
    }
}

const ALL_EVENTS: [EventKind; 3] = [EventKind::Create, EventKind::Update, EventKind::Delete];

/// Wire the standard dependency graph:
/// planting/yield/tree → plot → farm, and plot → farm.
pub fn register_default_handlers(bus: &mut CascadeBus, clock: Arc<dyn Clock>) {
    for event_kind in ALL_EVENTS {
        for (entity_kind, scope) in [
            (EntityKind::PlantingRecord, RecomputeScope::WithLifecycle),
            (EntityKind::YieldRecord, RecomputeScope::Aggregates),
            (EntityKind::Tree, RecomputeScope::Aggregates),
        ] {
            let plot_clock = Arc::clone(&clock);
            bus.register(entity_kind, event_kind, move |repo, event| {
                for plot_id in event.payload.affected_parents() {
                    recompute_plot(repo, plot_id, scope, plot_clock.now())?;
                }
                Ok(())
            });

            let farm_clock = Arc::clone(&clock);
            bus.register(entity_kind, event_kind, move |repo, event| {
                let mut farm_ids = Vec::new();
                for plot_id in event.payload.affected_parents() {
                    if let Some(plot) = repo.get_plot(plot_id)? {
                        if !farm_ids.contains(&plot.farm_id) {
                            farm_ids.push(plot.farm_id);
                        }
                    }
                }
                for farm_id in farm_ids {
                    recompute_farm(repo, farm_id, farm_clock.now())?;
                }
                Ok(())
            });
        }

        let farm_clock = Arc::clone(&clock);
        bus.register(EntityKind::Plot, event_kind, move |repo, event| {
            for farm_id in event.payload.affected_parents() {
                recompute_farm(repo, farm_id, farm_clock.now())?;
            }
            Ok(())
        });
    }
}
