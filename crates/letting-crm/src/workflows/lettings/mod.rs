//! Letting instruction lifecycle: status machines for instructions and leads, the
//! instruction aggregate with its children and metrics, and the service and HTTP surface
//! that drive them.

pub mod domain;
pub mod instruction;
pub mod instruction_status;
pub mod lead_status;
pub mod persistence;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    ConversionIssue, ConversionReadiness, CustomerId, InstructionId, InterestLevel, InvoiceId,
    InvoiceLink, Lead, LeadId, PropertyId, PropertyRef, PropertyViewing, TaskId, TaskPriority,
    TransitionError, UserId, VacancyTask, VacancyTaskStatus, VacancyTaskType, ViewingId,
    ViewingStatus, ViewingType,
};
pub use instruction::{
    Closure, InstructionMetrics, InstructionTarget, LeaseTerms, LettingInstruction,
};
pub use instruction_status::{InstructionStatus, InstructionStatusParseError, KanbanColumn};
pub use lead_status::{LeadStatus, LeadStatusParseError};
pub use persistence::LeadStatusColumn;
pub use report::{InstructionBoard, InstructionCard, InstructionSummary};
pub use repository::{InMemoryInstructionRepository, InstructionRepository, RepositoryError};
pub use router::instruction_router;
pub use service::{
    AdvertisingDetails, Clock, FixedClock, LeaseConversion, LettingInstructionService,
    LettingServiceError, NewInstruction, SystemClock,
};
