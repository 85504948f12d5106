use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::instruction_status::InstructionStatus;
use super::lead_status::LeadStatus;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Synthetic key of a letting instruction row.
    InstructionId
);
numeric_id!(PropertyId);
numeric_id!(LeadId);
numeric_id!(ViewingId);
numeric_id!(TaskId);
numeric_id!(InvoiceId);
numeric_id!(
    /// Customer record that becomes the tenant on lease conversion.
    CustomerId
);
numeric_id!(UserId);

/// Read-only snapshot of the property being let.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRef {
    pub id: PropertyId,
    pub name: String,
    pub address_line1: Option<String>,
}

/// Rejected state change; the entity is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot move instruction from {current} to {attempted}")]
    Instruction {
        current: InstructionStatus,
        attempted: InstructionStatus,
    },
    #[error("cannot move lead from {current} to {attempted}")]
    Lead {
        current: LeadStatus,
        attempted: LeadStatus,
    },
}

/// Prospective tenant enquiry, optionally linked to the instruction it came in through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub property_id: Option<PropertyId>,
    pub enquired_at: NaiveDateTime,
    #[serde(default, deserialize_with = "super::persistence::deserialize_lead_status")]
    status: LeadStatus,
    letting_instruction: Option<InstructionId>,
    converted_at: Option<NaiveDateTime>,
    converted_customer: Option<CustomerId>,
}

impl Lead {
    pub fn new(id: LeadId, name: impl Into<String>, enquired_at: NaiveDateTime) -> Self {
        Self {
            id,
            name: name.into(),
            email: None,
            phone: None,
            property_id: None,
            enquired_at,
            status: LeadStatus::Enquiry,
            letting_instruction: None,
            converted_at: None,
            converted_customer: None,
        }
    }

    /// Rehydrates a stored status without running the transition guard.
    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> LeadStatus {
        self.status
    }

    pub fn letting_instruction(&self) -> Option<InstructionId> {
        self.letting_instruction
    }

    pub fn converted_at(&self) -> Option<NaiveDateTime> {
        self.converted_at
    }

    pub fn converted_customer(&self) -> Option<CustomerId> {
        self.converted_customer
    }

    pub(crate) fn link_instruction(&mut self, instruction: Option<InstructionId>) {
        self.letting_instruction = instruction;
    }

    pub fn transition_to(&mut self, target: LeadStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(target) {
            return Err(TransitionError::Lead {
                current: self.status,
                attempted: target,
            });
        }

        self.status = target;
        Ok(())
    }

    pub fn mark_converted(
        &mut self,
        customer: CustomerId,
        at: NaiveDateTime,
    ) -> Result<(), TransitionError> {
        self.transition_to(LeadStatus::Converted)?;
        self.converted_at = Some(at);
        self.converted_customer = Some(customer);
        Ok(())
    }

    pub fn conversion_readiness(&self) -> ConversionReadiness {
        let mut issues = Vec::new();

        match self.status {
            LeadStatus::Converted => issues.push(ConversionIssue::AlreadyConverted),
            LeadStatus::Lost => issues.push(ConversionIssue::Lost),
            LeadStatus::InContracts
            | LeadStatus::ContractsComplete
            | LeadStatus::Interested
            | LeadStatus::ApplicationSubmitted
            | LeadStatus::Referencing => {}
            early => issues.push(ConversionIssue::EarlyStage(early)),
        }

        if self.name.trim().is_empty() {
            issues.push(ConversionIssue::MissingName);
        }

        if self.property_id.is_none() {
            issues.push(ConversionIssue::UnassignedProperty);
        }

        ConversionReadiness { issues }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReadiness {
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReadiness {
    /// Warnings alone do not block conversion.
    pub fn is_ready(&self) -> bool {
        self.issues.iter().all(ConversionIssue::is_warning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssue {
    AlreadyConverted,
    Lost,
    MissingName,
    UnassignedProperty,
    EarlyStage(LeadStatus),
}

impl ConversionIssue {
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::UnassignedProperty | Self::EarlyStage(_))
    }

    pub fn summary(&self) -> String {
        match self {
            Self::AlreadyConverted => "lead is already converted".to_string(),
            Self::Lost => "lead has been lost".to_string(),
            Self::MissingName => "lead name is required".to_string(),
            Self::UnassignedProperty => "property assignment recommended".to_string(),
            Self::EarlyStage(status) => {
                format!("lead is not in an expected conversion stage ({status})")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewingStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewingType {
    #[default]
    InPerson,
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestLevel {
    VeryInterested,
    Interested,
    Neutral,
    NotInterested,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyViewing {
    pub id: ViewingId,
    pub lead_id: Option<LeadId>,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: u16,
    pub viewing_type: ViewingType,
    pub status: ViewingStatus,
    pub notes: Option<String>,
    pub feedback: Option<String>,
    pub interest_level: Option<InterestLevel>,
    letting_instruction: Option<InstructionId>,
}

impl PropertyViewing {
    pub fn new(id: ViewingId, scheduled_at: NaiveDateTime) -> Self {
        Self {
            id,
            lead_id: None,
            scheduled_at,
            duration_minutes: 30,
            viewing_type: ViewingType::default(),
            status: ViewingStatus::Scheduled,
            notes: None,
            feedback: None,
            interest_level: None,
            letting_instruction: None,
        }
    }

    pub fn letting_instruction(&self) -> Option<InstructionId> {
        self.letting_instruction
    }

    pub(crate) fn link_instruction(&mut self, instruction: Option<InstructionId>) {
        self.letting_instruction = instruction;
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        self.scheduled_at > now
    }

    pub fn is_completed(&self) -> bool {
        self.status == ViewingStatus::Completed
    }

    pub fn can_be_rescheduled(&self) -> bool {
        matches!(
            self.status,
            ViewingStatus::Scheduled | ViewingStatus::Confirmed
        )
    }

    pub fn complete(&mut self, feedback: Option<String>, interest_level: Option<InterestLevel>) {
        self.status = ViewingStatus::Completed;
        self.feedback = feedback;
        self.interest_level = interest_level;
    }

    pub fn cancel(&mut self) {
        self.status = ViewingStatus::Cancelled;
    }

    pub fn mark_no_show(&mut self) {
        self.status = ViewingStatus::NoShow;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VacancyTaskType {
    Inspection,
    Photography,
    Repairs,
    Cleaning,
    ListingCreation,
    KeyHandover,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VacancyTaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Preparation work for a vacant property (inspection, photos, keys).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacancyTask {
    pub id: TaskId,
    pub task_type: VacancyTaskType,
    pub title: String,
    pub description: Option<String>,
    pub status: VacancyTaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<NaiveDateTime>,
    pub auto_created: bool,
    letting_instruction: Option<InstructionId>,
}

impl VacancyTask {
    pub fn new(id: TaskId, task_type: VacancyTaskType, title: impl Into<String>) -> Self {
        Self {
            id,
            task_type,
            title: title.into(),
            description: None,
            status: VacancyTaskStatus::Pending,
            priority: TaskPriority::default(),
            due_date: None,
            completed_at: None,
            auto_created: false,
            letting_instruction: None,
        }
    }

    pub fn letting_instruction(&self) -> Option<InstructionId> {
        self.letting_instruction
    }

    pub(crate) fn link_instruction(&mut self, instruction: Option<InstructionId>) {
        self.letting_instruction = instruction;
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.due_date {
            Some(due) => due < today && self.is_open(),
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            VacancyTaskStatus::Pending | VacancyTaskStatus::InProgress
        )
    }

    pub fn start_progress(&mut self) {
        if self.status == VacancyTaskStatus::Pending {
            self.status = VacancyTaskStatus::InProgress;
        }
    }

    pub fn complete(&mut self, now: NaiveDateTime) {
        self.status = VacancyTaskStatus::Completed;
        self.completed_at = Some(now);
    }

    pub fn cancel(&mut self) {
        self.status = VacancyTaskStatus::Cancelled;
    }
}

/// Lease invoice raised against the instruction once a tenancy starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLink {
    pub id: InvoiceId,
    pub reference: String,
    pub amount: Decimal,
    letting_instruction: Option<InstructionId>,
}

impl InvoiceLink {
    pub fn new(id: InvoiceId, reference: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id,
            reference: reference.into(),
            amount,
            letting_instruction: None,
        }
    }

    pub fn letting_instruction(&self) -> Option<InstructionId> {
        self.letting_instruction
    }

    pub(crate) fn link_instruction(&mut self, instruction: Option<InstructionId>) {
        self.letting_instruction = instruction;
    }
}
