use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::domain::{
    CustomerId, InstructionId, Lead, LeadId, PropertyId, PropertyRef, PropertyViewing,
    TransitionError, UserId,
};
use super::instruction::LettingInstruction;
use super::instruction_status::InstructionStatus;
use super::lead_status::LeadStatus;
use super::report::{InstructionBoard, InstructionSummary};
use super::repository::{InstructionRepository, RepositoryError};

/// Source of "now" for audit stamps and date-defaulting mutators.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Owner instruction captured at intake.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInstruction {
    pub property: PropertyRef,
    #[serde(default)]
    pub target_rent: Option<Decimal>,
    #[serde(default)]
    pub target_lease_length_months: Option<u16>,
    #[serde(default)]
    pub expected_vacancy_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaseConversion {
    pub tenant: CustomerId,
    pub lease_start: NaiveDate,
    pub lease_end: NaiveDate,
    pub rent: Decimal,
    pub deposit: Decimal,
}

/// Marketing details captured when a listing goes live.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvertisingDetails {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub key_features: Option<String>,
    #[serde(default)]
    pub marketing_notes: Option<String>,
}

/// Loads, mutates and saves letting instructions.
///
/// Every mutation re-reads the row and runs its guard against that fresh copy, and the
/// save is version-checked, so two writers racing from the same status cannot both win.
/// The one-active-instruction-per-property rule is checked up front for a readable error
/// and enforced again by the repository inside the write itself.
pub struct LettingInstructionService<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> LettingInstructionService<R>
where
    R: InstructionRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_clock(repository, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Opens a new instruction. A property may only have one instruction still being
    /// worked at a time.
    pub fn create(
        &self,
        request: NewInstruction,
    ) -> Result<LettingInstruction, LettingServiceError> {
        if let Some(rent) = request.target_rent {
            ensure_non_negative("target_rent", rent)?;
        }
        if request.target_lease_length_months == Some(0) {
            return Err(LettingServiceError::InvalidLeaseLength);
        }

        let property_id = request.property.id;
        if let Some(active) = self.active_for_property(property_id)? {
            return Err(LettingServiceError::ActiveInstructionExists {
                property: property_id,
                reference: active.instruction_reference.unwrap_or_default(),
            });
        }

        let now = self.clock.now();
        let mut instruction = LettingInstruction::new(
            self.repository.next_id()?,
            request.property,
            now.date(),
            request.target_rent,
            now,
        );
        instruction.target.lease_length_months = request.target_lease_length_months;
        instruction.target.description = request.description;
        instruction.expected_vacancy_date = request.expected_vacancy_date;
        instruction.created_by = request.created_by;
        instruction.instruction_reference = Some(self.unique_reference(&instruction)?);
        instruction.prepare_insert(now);

        let stored = self.repository.insert(instruction)?;
        info!(
            reference = stored.instruction_reference.as_deref().unwrap_or_default(),
            property = %stored.property().name,
            "created letting instruction"
        );
        Ok(stored)
    }

    fn unique_reference(
        &self,
        instruction: &LettingInstruction,
    ) -> Result<String, LettingServiceError> {
        let base = instruction.generate_reference(self.clock.today());
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.repository.fetch_by_reference(&candidate)?.is_some() {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        Ok(candidate)
    }

    pub fn get(&self, id: InstructionId) -> Result<LettingInstruction, LettingServiceError> {
        let instruction = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(instruction)
    }

    pub fn by_reference(
        &self,
        reference: &str,
    ) -> Result<LettingInstruction, LettingServiceError> {
        let instruction = self
            .repository
            .fetch_by_reference(reference)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(instruction)
    }

    /// Every letting cycle for the property, newest first.
    pub fn history(
        &self,
        property: PropertyId,
    ) -> Result<Vec<LettingInstruction>, LettingServiceError> {
        let mut instructions = self.repository.for_property(property)?;
        newest_first(&mut instructions);
        Ok(instructions)
    }

    pub fn active_for_property(
        &self,
        property: PropertyId,
    ) -> Result<Option<LettingInstruction>, LettingServiceError> {
        Ok(self
            .repository
            .for_property(property)?
            .into_iter()
            .find(|instruction| instruction.status().is_active_instruction()))
    }

    pub fn by_status(
        &self,
        status: InstructionStatus,
    ) -> Result<Vec<LettingInstruction>, LettingServiceError> {
        let mut instructions: Vec<_> = self
            .repository
            .all()?
            .into_iter()
            .filter(|instruction| instruction.status() == status)
            .collect();
        newest_first(&mut instructions);
        Ok(instructions)
    }

    /// Instructions still being worked, from intake through to an accepted offer.
    pub fn active_instructions(&self) -> Result<Vec<LettingInstruction>, LettingServiceError> {
        let mut instructions: Vec<_> = self
            .repository
            .all()?
            .into_iter()
            .filter(|instruction| instruction.status().is_active_instruction())
            .collect();
        newest_first(&mut instructions);
        Ok(instructions)
    }

    /// Case-insensitive match on property name or first address line. A blank term
    /// matches nothing.
    pub fn search(&self, term: &str) -> Result<Vec<LettingInstruction>, LettingServiceError> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut instructions: Vec<_> = self
            .repository
            .all()?
            .into_iter()
            .filter(|instruction| {
                let property = instruction.property();
                property.name.to_lowercase().contains(&needle)
                    || property
                        .address_line1
                        .as_deref()
                        .is_some_and(|line| line.to_lowercase().contains(&needle))
            })
            .collect();
        newest_first(&mut instructions);
        Ok(instructions)
    }

    pub fn can_transition(
        &self,
        id: InstructionId,
        target: InstructionStatus,
    ) -> Result<bool, LettingServiceError> {
        Ok(self.get(id)?.status().can_transition_to(target))
    }

    fn mutate<F>(
        &self,
        id: InstructionId,
        action: &'static str,
        apply: F,
    ) -> Result<LettingInstruction, LettingServiceError>
    where
        F: FnOnce(&mut LettingInstruction, NaiveDate) -> Result<(), LettingServiceError>,
    {
        let mut instruction = self.get(id)?;
        let previous = instruction.status();
        let now = self.clock.now();

        apply(&mut instruction, now.date())?;
        instruction.touch(now);

        let saved = self.repository.update(instruction)?;
        info!(
            reference = saved.instruction_reference.as_deref().unwrap_or_default(),
            from = %previous,
            to = %saved.status(),
            action,
            "letting instruction updated"
        );
        Ok(saved)
    }

    pub fn start_advertising(
        &self,
        id: InstructionId,
        start_date: Option<NaiveDate>,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.advertise(
            id,
            AdvertisingDetails {
                start_date,
                ..AdvertisingDetails::default()
            },
        )
    }

    /// Puts the listing live and records its marketing copy. Details left empty keep
    /// whatever the instruction already holds.
    pub fn advertise(
        &self,
        id: InstructionId,
        details: AdvertisingDetails,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "start_advertising", |instruction, today| {
            instruction.start_advertising(details.start_date.unwrap_or(today))?;
            if details.key_features.is_some() {
                instruction.target.key_features = details.key_features;
            }
            if details.marketing_notes.is_some() {
                instruction.marketing_notes = details.marketing_notes;
            }
            Ok(())
        })
    }

    pub fn move_to_viewings(
        &self,
        id: InstructionId,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "move_to_viewings", |instruction, _| {
            Ok(instruction.move_to_viewings()?)
        })
    }

    pub fn mark_offer_made(
        &self,
        id: InstructionId,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "mark_offer_made", |instruction, _| {
            Ok(instruction.mark_offer_made()?)
        })
    }

    pub fn accept_offer(
        &self,
        id: InstructionId,
        agreed_rent: Decimal,
        notes: Option<&str>,
    ) -> Result<LettingInstruction, LettingServiceError> {
        ensure_non_negative("agreed_rent", agreed_rent)?;
        self.mutate(id, "accept_offer", |instruction, today| {
            Ok(instruction.accept_offer(agreed_rent, notes, today)?)
        })
    }

    pub fn transition(
        &self,
        id: InstructionId,
        target: InstructionStatus,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "transition", |instruction, _| {
            Ok(instruction.transition_to(target)?)
        })
    }

    pub fn convert_to_active_lease(
        &self,
        id: InstructionId,
        lease: LeaseConversion,
    ) -> Result<LettingInstruction, LettingServiceError> {
        ensure_non_negative("rent", lease.rent)?;
        ensure_non_negative("deposit", lease.deposit)?;
        if lease.lease_end <= lease.lease_start {
            return Err(LettingServiceError::InvalidLeaseDates {
                start: lease.lease_start,
                end: lease.lease_end,
            });
        }

        self.mutate(id, "convert_to_active_lease", |instruction, today| {
            Ok(instruction.convert_to_active_lease(
                lease.tenant,
                lease.lease_start,
                lease.lease_end,
                lease.rent,
                lease.deposit,
                today,
            )?)
        })
    }

    pub fn close(
        &self,
        id: InstructionId,
        reason: &str,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "close", |instruction, today| {
            instruction.close_instruction(reason, today);
            Ok(())
        })
    }

    pub fn cancel(
        &self,
        id: InstructionId,
        reason: &str,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "cancel", |instruction, today| {
            Ok(instruction.cancel(reason, today)?)
        })
    }

    pub fn relist(&self, id: InstructionId) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "relist", |instruction, today| {
            Ok(instruction.relist(today)?)
        })
    }

    pub fn add_lead(
        &self,
        id: InstructionId,
        mut lead: Lead,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "add_lead", |instruction, _| {
            let status = instruction.status();
            if !status.can_accept_leads() {
                return Err(LettingServiceError::LeadsNotAccepted { status });
            }
            if instruction.leads().iter().any(|existing| existing.id == lead.id) {
                return Err(LettingServiceError::DuplicateLead(lead.id));
            }
            lead.property_id = Some(instruction.property().id);
            instruction.add_lead(lead);
            Ok(())
        })
    }

    pub fn remove_lead(
        &self,
        id: InstructionId,
        lead_id: LeadId,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "remove_lead", |instruction, _| {
            instruction
                .remove_lead(lead_id)
                .map(|_| ())
                .ok_or(LettingServiceError::LeadNotFound(lead_id))
        })
    }

    pub fn update_lead_status(
        &self,
        id: InstructionId,
        lead_id: LeadId,
        target: LeadStatus,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "update_lead_status", |instruction, _| {
            let lead = instruction
                .lead_mut(lead_id)
                .ok_or(LettingServiceError::LeadNotFound(lead_id))?;
            Ok(lead.transition_to(target)?)
        })
    }

    pub fn add_viewing(
        &self,
        id: InstructionId,
        viewing: PropertyViewing,
    ) -> Result<LettingInstruction, LettingServiceError> {
        self.mutate(id, "add_viewing", |instruction, _| {
            instruction.add_viewing(viewing);
            Ok(())
        })
    }

    pub fn summary(&self) -> Result<InstructionSummary, LettingServiceError> {
        let instructions = self.repository.all()?;
        Ok(InstructionSummary::from_instructions(&instructions))
    }

    pub fn board(&self) -> Result<InstructionBoard, LettingServiceError> {
        let instructions = self.repository.all()?;
        Ok(InstructionBoard::from_instructions(
            &instructions,
            self.clock.today(),
        ))
    }

    /// Listings still on the market that started advertising more than `days` ago.
    pub fn stale_listings(
        &self,
        days: i64,
    ) -> Result<Vec<LettingInstruction>, LettingServiceError> {
        let threshold = Duration::try_days(days)
            .and_then(|window| self.clock.today().checked_sub_signed(window))
            .ok_or(LettingServiceError::ReportWindowOutOfRange { days })?;
        Ok(self
            .repository
            .all()?
            .into_iter()
            .filter(|instruction| instruction.is_active())
            .filter(|instruction| {
                instruction
                    .advertising_start_date()
                    .is_some_and(|start| start < threshold)
            })
            .collect())
    }

    /// Active leases ending within the next `days` days.
    pub fn leases_expiring(
        &self,
        days: i64,
    ) -> Result<Vec<LettingInstruction>, LettingServiceError> {
        let today = self.clock.today();
        let horizon = Duration::try_days(days)
            .and_then(|window| today.checked_add_signed(window))
            .ok_or(LettingServiceError::ReportWindowOutOfRange { days })?;
        let mut expiring: Vec<_> = self
            .repository
            .all()?
            .into_iter()
            .filter(|instruction| instruction.is_active_lease())
            .filter(|instruction| {
                instruction
                    .lease()
                    .is_some_and(|lease| lease.end_date >= today && lease.end_date <= horizon)
            })
            .collect();
        expiring.sort_by_key(|instruction| instruction.lease().map(|lease| lease.end_date));
        Ok(expiring)
    }

    /// Marketing instructions whose conversion rate sits below `threshold` percent.
    pub fn low_performing(
        &self,
        threshold: f64,
    ) -> Result<Vec<LettingInstruction>, LettingServiceError> {
        Ok(self
            .repository
            .all()?
            .into_iter()
            .filter(|instruction| instruction.is_active())
            .filter(|instruction| {
                instruction
                    .metrics()
                    .conversion_rate
                    .is_some_and(|rate| rate < threshold)
            })
            .collect())
    }
}

fn newest_first(instructions: &mut [LettingInstruction]) {
    instructions.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

fn ensure_non_negative(field: &'static str, amount: Decimal) -> Result<(), LettingServiceError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LettingServiceError::NegativeAmount { field });
    }
    Ok(())
}

/// Error raised by the letting instruction service.
#[derive(Debug, thiserror::Error)]
pub enum LettingServiceError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(RepositoryError),
    #[error("property {property} already has an active instruction ({reference})")]
    ActiveInstructionExists {
        property: PropertyId,
        reference: String,
    },
    #[error("instruction in status {status} cannot accept leads")]
    LeadsNotAccepted { status: InstructionStatus },
    #[error("lead {0} is not linked to this instruction")]
    LeadNotFound(LeadId),
    #[error("lead {0} is already linked to this instruction")]
    DuplicateLead(LeadId),
    #[error("lease end {end} must be after lease start {start}")]
    InvalidLeaseDates { start: NaiveDate, end: NaiveDate },
    #[error("lease length must be at least one month")]
    InvalidLeaseLength,
    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },
    #[error("report window of {days} days is out of range")]
    ReportWindowOutOfRange { days: i64 },
}

impl From<RepositoryError> for LettingServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ActiveInstruction {
                property,
                reference,
            } => Self::ActiveInstructionExists {
                property,
                reference,
            },
            other => Self::Repository(other),
        }
    }
}
