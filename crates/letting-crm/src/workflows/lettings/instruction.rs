use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    CustomerId, InstructionId, InvoiceLink, Lead, LeadId, PropertyRef, PropertyViewing, TaskId,
    TransitionError, UserId, VacancyTask, ViewingId,
};
use super::instruction_status::InstructionStatus;
use super::lead_status::LeadStatus;

/// What the owner asked for when instructing the let.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionTarget {
    pub rent: Option<Decimal>,
    pub lease_length_months: Option<u16>,
    pub description: Option<String>,
    pub key_features: Option<String>,
}

/// Agreed tenancy, recorded on conversion to an active lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseTerms {
    pub tenant: CustomerId,
    pub rent: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub deposit: Decimal,
    pub signed_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closure {
    pub date: NaiveDate,
    /// Free text; by convention WITHDRAWN, CANCELLED, LEASE_STARTED or LEASE_ENDED.
    pub reason: String,
}

/// Cached performance figures. `None` means "not computable yet", which is distinct
/// from a computed zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionMetrics {
    pub days_to_fill: Option<i64>,
    pub days_vacant: Option<i64>,
    pub number_of_enquiries: u32,
    pub number_of_viewings: u32,
    pub conversion_rate: Option<f64>,
}

/// One letting cycle for a property, from instruction to tenancy or cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LettingInstruction {
    id: InstructionId,
    property: PropertyRef,
    status: InstructionStatus,
    version: u64,
    pub instruction_reference: Option<String>,

    pub instruction_received_date: Option<NaiveDate>,
    pub notice_given_date: Option<NaiveDate>,
    pub expected_vacancy_date: Option<NaiveDate>,
    pub available_from_date: Option<NaiveDate>,
    advertising_start_date: Option<NaiveDate>,
    advertising_end_date: Option<NaiveDate>,

    pub target: InstructionTarget,
    agreed_rent: Option<Decimal>,
    lease: Option<LeaseTerms>,
    previous_lease: Option<LeaseTerms>,
    closure: Option<Closure>,

    leads: Vec<Lead>,
    viewings: Vec<PropertyViewing>,
    tasks: Vec<VacancyTask>,
    invoices: Vec<InvoiceLink>,
    metrics: InstructionMetrics,

    pub marketing_notes: Option<String>,
    internal_notes: Option<String>,
    pub created_by: Option<UserId>,
    created_at: NaiveDateTime,
    updated_at: Option<NaiveDateTime>,
}

impl LettingInstruction {
    pub fn new(
        id: InstructionId,
        property: PropertyRef,
        instruction_received_date: NaiveDate,
        target_rent: Option<Decimal>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            property,
            status: InstructionStatus::InstructionReceived,
            version: 0,
            instruction_reference: None,
            instruction_received_date: Some(instruction_received_date),
            notice_given_date: None,
            expected_vacancy_date: None,
            available_from_date: None,
            advertising_start_date: None,
            advertising_end_date: None,
            target: InstructionTarget {
                rent: target_rent,
                ..InstructionTarget::default()
            },
            agreed_rent: None,
            lease: None,
            previous_lease: None,
            closure: None,
            leads: Vec::new(),
            viewings: Vec::new(),
            tasks: Vec::new(),
            invoices: Vec::new(),
            metrics: InstructionMetrics::default(),
            marketing_notes: None,
            internal_notes: None,
            created_by: None,
            created_at,
            updated_at: None,
        }
    }

    /// Rehydrates a stored status without running any guard.
    pub fn with_status(mut self, status: InstructionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn id(&self) -> InstructionId {
        self.id
    }

    pub fn property(&self) -> &PropertyRef {
        &self.property
    }

    pub fn status(&self) -> InstructionStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Advances the optimistic-lock version; repositories call this when a write commits.
    pub fn next_version(&mut self) {
        self.version += 1;
    }

    pub fn advertising_start_date(&self) -> Option<NaiveDate> {
        self.advertising_start_date
    }

    pub fn advertising_end_date(&self) -> Option<NaiveDate> {
        self.advertising_end_date
    }

    pub fn agreed_rent(&self) -> Option<Decimal> {
        self.agreed_rent
    }

    pub fn lease(&self) -> Option<&LeaseTerms> {
        self.lease.as_ref()
    }

    pub fn previous_lease(&self) -> Option<&LeaseTerms> {
        self.previous_lease.as_ref()
    }

    pub fn closure(&self) -> Option<&Closure> {
        self.closure.as_ref()
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    pub fn viewings(&self) -> &[PropertyViewing] {
        &self.viewings
    }

    pub fn tasks(&self) -> &[VacancyTask] {
        &self.tasks
    }

    pub fn invoices(&self) -> &[InvoiceLink] {
        &self.invoices
    }

    pub fn metrics(&self) -> &InstructionMetrics {
        &self.metrics
    }

    pub fn internal_notes(&self) -> Option<&str> {
        self.internal_notes.as_deref()
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<NaiveDateTime> {
        self.updated_at
    }

    /// `INST-{property id}-{yyyyMMdd}` from the received date, falling back to `today`.
    pub fn generate_reference(&self, today: NaiveDate) -> String {
        let date = self.instruction_received_date.unwrap_or(today);
        format!("INST-{}-{}", self.property.id, date.format("%Y%m%d"))
    }

    /// Pre-insert hook: stamps audit times and fills in a reference if none was given.
    pub fn prepare_insert(&mut self, now: NaiveDateTime) {
        self.created_at = now;
        self.updated_at = Some(now);
        if self.instruction_reference.is_none() {
            self.instruction_reference = Some(self.generate_reference(now.date()));
        }
    }

    /// Pre-update hook, run once per save.
    pub fn touch(&mut self, now: NaiveDateTime) {
        self.updated_at = Some(now);
        self.calculate_metrics();
    }

    fn guard(
        &self,
        attempted: InstructionStatus,
        legacy_from: &[InstructionStatus],
    ) -> Result<(), TransitionError> {
        if legacy_from.contains(&self.status) || self.status.can_transition_to(attempted) {
            Ok(())
        } else {
            Err(TransitionError::Instruction {
                current: self.status,
                attempted,
            })
        }
    }

    /// Moves along the transition table with no side effects beyond the status.
    pub fn transition_to(&mut self, target: InstructionStatus) -> Result<(), TransitionError> {
        self.guard(target, &[])?;
        self.status = target;
        self.calculate_metrics();
        Ok(())
    }

    pub fn start_advertising(&mut self, start_date: NaiveDate) -> Result<(), TransitionError> {
        self.guard(InstructionStatus::Advertising, &[InstructionStatus::Preparing])?;
        self.advertising_start_date = Some(start_date);
        self.status = InstructionStatus::Advertising;
        self.calculate_metrics();
        Ok(())
    }

    /// Legacy pipeline step; the current table goes straight to `OfferAccepted`.
    pub fn move_to_viewings(&mut self) -> Result<(), TransitionError> {
        self.legacy_step(
            InstructionStatus::ViewingsInProgress,
            &[InstructionStatus::Advertising],
        )
    }

    /// Legacy pipeline step.
    pub fn mark_offer_made(&mut self) -> Result<(), TransitionError> {
        self.legacy_step(
            InstructionStatus::OfferMade,
            &[
                InstructionStatus::ViewingsInProgress,
                InstructionStatus::Advertising,
            ],
        )
    }

    fn legacy_step(
        &mut self,
        target: InstructionStatus,
        allowed_from: &[InstructionStatus],
    ) -> Result<(), TransitionError> {
        if !allowed_from.contains(&self.status) {
            return Err(TransitionError::Instruction {
                current: self.status,
                attempted: target,
            });
        }

        self.status = target;
        self.calculate_metrics();
        Ok(())
    }

    pub fn accept_offer(
        &mut self,
        agreed_rent: Decimal,
        notes: Option<&str>,
        today: NaiveDate,
    ) -> Result<(), TransitionError> {
        self.guard(InstructionStatus::OfferAccepted, &[])?;
        self.status = InstructionStatus::OfferAccepted;
        self.agreed_rent = Some(agreed_rent);
        if let Some(notes) = notes.filter(|notes| !notes.trim().is_empty()) {
            self.append_internal_note(today, &format!("Offer Accepted: {notes}"));
        }
        self.calculate_metrics();
        Ok(())
    }

    pub fn start_referencing(&mut self) -> Result<(), TransitionError> {
        self.transition_to(InstructionStatus::Referencing)
    }

    pub fn move_to_contracts(&mut self) -> Result<(), TransitionError> {
        self.transition_to(InstructionStatus::InContracts)
    }

    pub fn complete_contracts(&mut self) -> Result<(), TransitionError> {
        self.transition_to(InstructionStatus::ContractsComplete)
    }

    /// Legal from `OfferMade` (legacy) or `ContractsComplete`.
    pub fn convert_to_active_lease(
        &mut self,
        tenant: CustomerId,
        lease_start: NaiveDate,
        lease_end: NaiveDate,
        rent: Decimal,
        deposit: Decimal,
        today: NaiveDate,
    ) -> Result<(), TransitionError> {
        self.guard(InstructionStatus::ActiveLease, &[InstructionStatus::OfferMade])?;

        self.lease = Some(LeaseTerms {
            tenant,
            rent,
            start_date: lease_start,
            end_date: lease_end,
            deposit,
            signed_date: today,
        });
        self.status = InstructionStatus::ActiveLease;
        if self.advertising_end_date.is_none() {
            self.advertising_end_date = Some(today);
        }

        self.calculate_metrics();
        Ok(())
    }

    /// Always legal: an instruction can be abandoned from any state.
    pub fn close_instruction(&mut self, reason: impl Into<String>, today: NaiveDate) {
        self.status = InstructionStatus::Closed;
        self.closure = Some(Closure {
            date: today,
            reason: reason.into(),
        });
        self.end_advertising(today);
        self.calculate_metrics();
    }

    pub fn cancel(
        &mut self,
        reason: impl Into<String>,
        today: NaiveDate,
    ) -> Result<(), TransitionError> {
        self.guard(InstructionStatus::Cancelled, &[])?;
        self.status = InstructionStatus::Cancelled;
        self.closure = Some(Closure {
            date: today,
            reason: reason.into(),
        });
        self.end_advertising(today);
        self.calculate_metrics();
        Ok(())
    }

    /// Starts the next letting cycle once the current tenancy is ending. The finished
    /// lease moves to `previous_lease` and per-cycle dates and metrics reset.
    pub fn relist(&mut self, today: NaiveDate) -> Result<(), TransitionError> {
        self.guard(InstructionStatus::InstructionReceived, &[])?;
        self.status = InstructionStatus::InstructionReceived;
        self.instruction_received_date = Some(today);
        self.previous_lease = self.lease.take();
        self.advertising_start_date = None;
        self.advertising_end_date = None;
        self.agreed_rent = None;
        self.closure = None;
        self.metrics.days_to_fill = None;
        self.metrics.days_vacant = None;
        self.calculate_metrics();
        Ok(())
    }

    fn end_advertising(&mut self, today: NaiveDate) {
        if self.advertising_end_date.is_none() && self.advertising_start_date.is_some() {
            self.advertising_end_date = Some(today);
        }
    }

    fn append_internal_note(&mut self, today: NaiveDate, note: &str) {
        let entry = format!("[{today}] {note}");
        self.internal_notes = Some(match self.internal_notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{entry}"),
            _ => entry,
        });
    }

    /// Recomputes the cached metrics from dates and children. Figures whose inputs are
    /// missing keep their previous value.
    pub fn calculate_metrics(&mut self) {
        let lease_start = self.lease.as_ref().map(|lease| lease.start_date);

        if let (Some(start), Some(lease_start)) = (self.advertising_start_date, lease_start) {
            self.metrics.days_to_fill = Some((lease_start - start).num_days());
        }

        if let (Some(vacancy), Some(lease_start)) = (self.expected_vacancy_date, lease_start) {
            self.metrics.days_vacant = Some((lease_start - vacancy).num_days());
        }

        self.metrics.number_of_enquiries = count(self.leads.len());
        self.metrics.number_of_viewings = count(self.viewings.len());

        if !self.leads.is_empty() {
            let converted = self
                .leads
                .iter()
                .filter(|lead| lead.status() == LeadStatus::Converted)
                .count();
            self.metrics.conversion_rate =
                Some(converted as f64 * 100.0 / self.leads.len() as f64);
        }

        debug!(
            instruction = %self.id,
            enquiries = self.metrics.number_of_enquiries,
            viewings = self.metrics.number_of_viewings,
            "recalculated instruction metrics"
        );
    }

    pub fn add_lead(&mut self, mut lead: Lead) {
        lead.link_instruction(Some(self.id));
        self.leads.push(lead);
        self.metrics.number_of_enquiries = count(self.leads.len());
    }

    /// Unlinks the lead without discarding it.
    pub fn remove_lead(&mut self, lead_id: LeadId) -> Option<Lead> {
        let index = self.leads.iter().position(|lead| lead.id == lead_id)?;
        let mut lead = self.leads.remove(index);
        lead.link_instruction(None);
        self.metrics.number_of_enquiries = count(self.leads.len());
        Some(lead)
    }

    pub fn lead_mut(&mut self, lead_id: LeadId) -> Option<&mut Lead> {
        self.leads.iter_mut().find(|lead| lead.id == lead_id)
    }

    pub fn add_viewing(&mut self, mut viewing: PropertyViewing) {
        viewing.link_instruction(Some(self.id));
        self.viewings.push(viewing);
        self.metrics.number_of_viewings = count(self.viewings.len());
    }

    pub fn remove_viewing(&mut self, viewing_id: ViewingId) -> Option<PropertyViewing> {
        let index = self
            .viewings
            .iter()
            .position(|viewing| viewing.id == viewing_id)?;
        let mut viewing = self.viewings.remove(index);
        viewing.link_instruction(None);
        self.metrics.number_of_viewings = count(self.viewings.len());
        Some(viewing)
    }

    pub fn add_task(&mut self, mut task: VacancyTask) {
        task.link_instruction(Some(self.id));
        self.tasks.push(task);
    }

    pub fn remove_task(&mut self, task_id: TaskId) -> Option<VacancyTask> {
        let index = self.tasks.iter().position(|task| task.id == task_id)?;
        let mut task = self.tasks.remove(index);
        task.link_instruction(None);
        Some(task)
    }

    pub fn link_invoice(&mut self, mut invoice: InvoiceLink) {
        invoice.link_instruction(Some(self.id));
        self.invoices.push(invoice);
    }

    pub fn increment_enquiry_count(&mut self) {
        self.metrics.number_of_enquiries += 1;
    }

    pub fn increment_viewing_count(&mut self) {
        self.metrics.number_of_viewings += 1;
    }

    /// Out on the market: advertising, viewing, or holding an offer.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            InstructionStatus::Advertising
                | InstructionStatus::ViewingsInProgress
                | InstructionStatus::OfferMade
                | InstructionStatus::OfferAccepted
        )
    }

    pub fn is_active_lease(&self) -> bool {
        self.status == InstructionStatus::ActiveLease
    }

    /// Days on the market so far, or in total once advertising has ended.
    pub fn days_advertising(&self, today: NaiveDate) -> i64 {
        match self.advertising_start_date {
            Some(start) => (self.advertising_end_date.unwrap_or(today) - start).num_days(),
            None => 0,
        }
    }

    pub fn days_until_vacancy(&self, today: NaiveDate) -> Option<i64> {
        self.expected_vacancy_date
            .map(|vacancy| (vacancy - today).num_days())
    }
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
