use std::sync::{Arc, Barrier};

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::workflows::lettings::domain::{
    InstructionId, Lead, LeadId, PropertyId, PropertyRef,
};
use crate::workflows::lettings::instruction::LettingInstruction;
use crate::workflows::lettings::lead_status::LeadStatus;
use crate::workflows::lettings::repository::{
    InMemoryInstructionRepository, InstructionRepository, RepositoryError,
};
use crate::workflows::lettings::service::{
    FixedClock, LettingInstructionService, NewInstruction,
};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn at(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(10, 30, 0).expect("valid time")
}

pub(super) fn today() -> NaiveDate {
    date(2025, 6, 2)
}

pub(super) fn property(id: u64) -> PropertyRef {
    PropertyRef {
        id: PropertyId(id),
        name: format!("Flat {id}, Boden House"),
        address_line1: Some("14 Canal Street".to_string()),
    }
}

pub(super) fn instruction() -> LettingInstruction {
    LettingInstruction::new(
        InstructionId(1),
        property(42),
        date(2025, 3, 20),
        Some(Decimal::new(1250, 0)),
        at(date(2025, 3, 20)),
    )
}

pub(super) fn lead(id: u64, status: LeadStatus) -> Lead {
    Lead::new(LeadId(id), format!("Applicant {id}"), at(date(2025, 4, 3))).with_status(status)
}

pub(super) fn new_instruction(property_id: u64) -> NewInstruction {
    NewInstruction {
        property: property(property_id),
        target_rent: Some(Decimal::new(1250, 0)),
        target_lease_length_months: Some(12),
        expected_vacancy_date: Some(date(2025, 7, 1)),
        description: Some("Two bedroom flat".to_string()),
        created_by: None,
    }
}

pub(super) fn build_service() -> (
    LettingInstructionService<InMemoryInstructionRepository>,
    Arc<InMemoryInstructionRepository>,
) {
    let repository = Arc::new(InMemoryInstructionRepository::default());
    let service =
        LettingInstructionService::with_clock(repository.clone(), Arc::new(FixedClock(at(today()))));
    (service, repository)
}

pub(super) struct UnavailableRepository;

impl InstructionRepository for UnavailableRepository {
    fn next_id(&self) -> Result<InstructionId, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert(&self, _: LettingInstruction) -> Result<LettingInstruction, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _: LettingInstruction) -> Result<LettingInstruction, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _: InstructionId) -> Result<Option<LettingInstruction>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_by_reference(
        &self,
        _: &str,
    ) -> Result<Option<LettingInstruction>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_property(&self, _: PropertyId) -> Result<Vec<LettingInstruction>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<LettingInstruction>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// In-memory store whose `for_property` blocks until `parties` callers have read, so
/// concurrent creates all see the property before any of them writes.
pub(super) struct GatedRepository {
    inner: InMemoryInstructionRepository,
    gate: Barrier,
}

impl GatedRepository {
    pub(super) fn new(parties: usize) -> Self {
        Self {
            inner: InMemoryInstructionRepository::default(),
            gate: Barrier::new(parties),
        }
    }
}

impl InstructionRepository for GatedRepository {
    fn next_id(&self) -> Result<InstructionId, RepositoryError> {
        self.inner.next_id()
    }

    fn insert(
        &self,
        instruction: LettingInstruction,
    ) -> Result<LettingInstruction, RepositoryError> {
        self.inner.insert(instruction)
    }

    fn update(
        &self,
        instruction: LettingInstruction,
    ) -> Result<LettingInstruction, RepositoryError> {
        self.inner.update(instruction)
    }

    fn fetch(&self, id: InstructionId) -> Result<Option<LettingInstruction>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn fetch_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<LettingInstruction>, RepositoryError> {
        self.inner.fetch_by_reference(reference)
    }

    fn for_property(
        &self,
        property: PropertyId,
    ) -> Result<Vec<LettingInstruction>, RepositoryError> {
        let rows = self.inner.for_property(property);
        self.gate.wait();
        rows
    }

    fn all(&self) -> Result<Vec<LettingInstruction>, RepositoryError> {
        self.inner.all()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
