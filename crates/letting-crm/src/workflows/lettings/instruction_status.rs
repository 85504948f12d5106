use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a letting instruction, persisted by variant name.
///
/// `Preparing`, `ViewingsInProgress`, `OfferMade` and `Closed` belong to the earlier
/// pipeline. Stored rows still carry them, so they stay parseable and keep a transition
/// table of their own until a data migration rewrites them to
/// [`InstructionStatus::modern_equivalent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstructionStatus {
    InstructionReceived,
    Advertising,
    OfferAccepted,
    Referencing,
    InContracts,
    ContractsComplete,
    ActiveLease,
    Cancelled,
    // Legacy pipeline.
    Preparing,
    ViewingsInProgress,
    OfferMade,
    Closed,
}

impl InstructionStatus {
    /// Every status a new row may be written with, in pipeline order.
    pub const fn current() -> [Self; 8] {
        [
            Self::InstructionReceived,
            Self::Advertising,
            Self::OfferAccepted,
            Self::Referencing,
            Self::InContracts,
            Self::ContractsComplete,
            Self::ActiveLease,
            Self::Cancelled,
        ]
    }

    pub const fn legacy() -> [Self; 4] {
        [
            Self::Preparing,
            Self::ViewingsInProgress,
            Self::OfferMade,
            Self::Closed,
        ]
    }

    pub fn all() -> impl Iterator<Item = Self> {
        Self::current().into_iter().chain(Self::legacy())
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::InstructionReceived => "Instruction Received",
            Self::Advertising => "Advertising",
            Self::OfferAccepted => "Offer Accepted",
            Self::Referencing => "Referencing",
            Self::InContracts => "In Contracts",
            Self::ContractsComplete => "Contracts Complete",
            Self::ActiveLease => "Active Lease",
            Self::Cancelled => "Cancelled",
            Self::Preparing => "Preparing",
            Self::ViewingsInProgress => "Viewings In Progress",
            Self::OfferMade => "Offer Made",
            Self::Closed => "Closed",
        }
    }

    /// Persisted column value.
    pub const fn name(self) -> &'static str {
        match self {
            Self::InstructionReceived => "INSTRUCTION_RECEIVED",
            Self::Advertising => "ADVERTISING",
            Self::OfferAccepted => "OFFER_ACCEPTED",
            Self::Referencing => "REFERENCING",
            Self::InContracts => "IN_CONTRACTS",
            Self::ContractsComplete => "CONTRACTS_COMPLETE",
            Self::ActiveLease => "ACTIVE_LEASE",
            Self::Cancelled => "CANCELLED",
            Self::Preparing => "PREPARING",
            Self::ViewingsInProgress => "VIEWINGS_IN_PROGRESS",
            Self::OfferMade => "OFFER_MADE",
            Self::Closed => "CLOSED",
        }
    }

    pub const fn is_legacy(self) -> bool {
        matches!(
            self,
            Self::Preparing | Self::ViewingsInProgress | Self::OfferMade | Self::Closed
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Closed)
    }

    pub const fn modern_equivalent(self) -> Self {
        match self {
            Self::Preparing => Self::InstructionReceived,
            Self::ViewingsInProgress => Self::Advertising,
            Self::OfferMade => Self::OfferAccepted,
            Self::Closed => Self::Cancelled,
            current => current,
        }
    }

    /// Board column index. The offer-to-contracts stages share one column while staying
    /// distinct states for transition purposes.
    pub const fn kanban_order(self) -> u8 {
        match self {
            Self::InstructionReceived | Self::Preparing => 0,
            Self::Advertising | Self::ViewingsInProgress => 1,
            Self::OfferAccepted
            | Self::Referencing
            | Self::InContracts
            | Self::ContractsComplete
            | Self::OfferMade => 2,
            Self::ActiveLease => 3,
            Self::Cancelled | Self::Closed => 4,
        }
    }

    pub const fn kanban_column(self) -> KanbanColumn {
        match self.kanban_order() {
            0 => KanbanColumn::Instructed,
            1 => KanbanColumn::Advertising,
            2 => KanbanColumn::OfferAndContracts,
            3 => KanbanColumn::Let,
            _ => KanbanColumn::Closed,
        }
    }

    pub const fn badge_class(self) -> &'static str {
        match self {
            Self::InstructionReceived | Self::Preparing => "badge-secondary",
            Self::Advertising | Self::ViewingsInProgress => "badge-primary",
            Self::OfferAccepted | Self::Referencing => "badge-info",
            Self::InContracts | Self::OfferMade => "badge-warning",
            Self::ContractsComplete | Self::ActiveLease => "badge-success",
            Self::Cancelled | Self::Closed => "badge-dark",
        }
    }

    pub const fn can_accept_leads(self) -> bool {
        matches!(
            self,
            Self::Advertising | Self::OfferAccepted | Self::ViewingsInProgress | Self::OfferMade
        )
    }

    /// Still being worked: neither let nor closed.
    pub const fn is_active_instruction(self) -> bool {
        !matches!(self, Self::ActiveLease | Self::Cancelled | Self::Closed)
    }

    pub fn can_transition_to(self, target: InstructionStatus) -> bool {
        self.successors().contains(&target)
    }

    pub fn successors(self) -> &'static [InstructionStatus] {
        match self {
            Self::InstructionReceived => &[Self::Advertising, Self::Cancelled],
            Self::Advertising => &[Self::OfferAccepted, Self::Cancelled],
            Self::OfferAccepted => &[Self::Referencing, Self::Cancelled],
            Self::Referencing => &[Self::InContracts, Self::Cancelled],
            Self::InContracts => &[Self::ContractsComplete, Self::Cancelled],
            Self::ContractsComplete => &[Self::ActiveLease, Self::Cancelled],
            Self::ActiveLease => &[Self::InstructionReceived, Self::Cancelled],
            Self::Preparing => &[Self::Advertising, Self::Cancelled],
            Self::ViewingsInProgress => &[Self::OfferAccepted, Self::Cancelled],
            Self::OfferMade => &[Self::Referencing, Self::Cancelled],
            Self::Cancelled | Self::Closed => &[],
        }
    }
}

impl fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InstructionStatus {
    type Err = InstructionStatusParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::all()
            .find(|status| status.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| InstructionStatusParseError {
                value: trimmed.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown instruction status: {value}")]
pub struct InstructionStatusParseError {
    pub value: String,
}

/// Columns of the instruction board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KanbanColumn {
    Instructed,
    Advertising,
    OfferAndContracts,
    Let,
    Closed,
}

impl KanbanColumn {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Instructed,
            Self::Advertising,
            Self::OfferAndContracts,
            Self::Let,
            Self::Closed,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Instructed => "Instructed",
            Self::Advertising => "Advertising",
            Self::OfferAndContracts => "Offer & Contracts",
            Self::Let => "Let",
            Self::Closed => "Closed",
        }
    }
}
