//! Harvest service for logging yield records

use std::sync::Arc;

use shared::{validate_yield_amount, CorrectHarvestInput, EntityKind, LogHarvestInput, YieldRecord};
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::store::{with_transaction, Repository};

use super::cascade::{CascadeBus, CascadeEvent};

/// Harvest service for managing yield records
#[derive(Clone)]
pub struct HarvestService {
    bus: Arc<CascadeBus>,
    clock: Arc<dyn Clock>,
}

impl HarvestService {
    /// Create a new HarvestService instance
    pub fn new(bus: Arc<CascadeBus>, clock: Arc<dyn Clock>) -> Self {
        Self { bus, clock }
    }

    /// Get a yield record by ID
    pub fn get_harvest(&self, repo: &dyn Repository, harvest_id: Uuid) -> AppResult<YieldRecord> {
        repo.get_yield_record(harvest_id)?
            .ok_or_else(|| AppError::NotFound("Harvest".to_string()))
    }

    /// List harvests for a plot, oldest first
    pub fn list_harvests(
        &self,
        repo: &dyn Repository,
        plot_id: Uuid,
    ) -> AppResult<Vec<YieldRecord>> {
        repo.list_yield_records(plot_id)
    }

    /// Log a new harvest
    pub fn log_harvest(
        &self,
        repo: &mut dyn Repository,
        input: LogHarvestInput,
    ) -> AppResult<YieldRecord> {
        input.validate()?;
        validate_yield_amount(input.yield_amount_kg)
            .map_err(|message| AppError::invalid("yield_amount_kg", message))?;

        if repo.get_plot(input.plot_id)?.is_none() {
            return Err(AppError::NotFound("Plot".to_string()));
        }

        let now = self.clock.now();
        let record = YieldRecord {
            id: Uuid::new_v4(),
            plot_id: input.plot_id,
            harvest_date: input.harvest_date,
            yield_amount_kg: input.yield_amount_kg,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };

        with_transaction(repo, |repo| {
            repo.save_yield_record(&record)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::created(
                    EntityKind::YieldRecord,
                    record.id,
                    Some(record.plot_id),
                    &record,
                ),
            )
        })?;

        tracing::info!(
            harvest_id = %record.id,
            plot_id = %record.plot_id,
            "Harvest logged: {} kg on {}",
            record.yield_amount_kg,
            record.harvest_date
        );
        Ok(record)
    }

    /// Correct a logged harvest
    pub fn correct_harvest(
        &self,
        repo: &mut dyn Repository,
        harvest_id: Uuid,
        input: CorrectHarvestInput,
    ) -> AppResult<YieldRecord> {
        input.validate()?;
        if let Some(amount) = input.yield_amount_kg {
            validate_yield_amount(amount)
                .map_err(|message| AppError::invalid("yield_amount_kg", message))?;
        }

        let existing = self.get_harvest(repo, harvest_id)?;
        let mut record = existing.clone();
        if let Some(harvest_date) = input.harvest_date {
            record.harvest_date = harvest_date;
        }
        if let Some(amount) = input.yield_amount_kg {
            record.yield_amount_kg = amount;
        }
        if input.notes.is_some() {
            record.notes = input.notes;
        }
        record.updated_at = self.clock.now();

        with_transaction(repo, |repo| {
            repo.save_yield_record(&record)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::updated(
                    EntityKind::YieldRecord,
                    harvest_id,
                    Some(record.plot_id),
                    None,
                    &existing,
                    &record,
                ),
            )
        })?;

        tracing::info!(%harvest_id, plot_id = %record.plot_id, "Harvest corrected");
        Ok(record)
    }

    /// Delete a logged harvest
    pub fn delete_harvest(&self, repo: &mut dyn Repository, harvest_id: Uuid) -> AppResult<()> {
        let record = self.get_harvest(repo, harvest_id)?;

        with_transaction(repo, |repo| {
            repo.delete_yield_record(harvest_id)?;
            self.bus.dispatch(
                repo,
                &CascadeEvent::deleted(
                    EntityKind::YieldRecord,
                    harvest_id,
                    Some(record.plot_id),
                    &record,
                ),
            )
        })?;

        tracing::info!(%harvest_id, plot_id = %record.plot_id, "Harvest deleted");
        Ok(())
    }
}
