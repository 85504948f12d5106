use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pipeline stage of a prospective tenant, from first enquiry to conversion or loss.
///
/// The wire and column form is lowercase-hyphenated (`"viewing-scheduled"`), which is what
/// serde emits and what [`LeadStatus::value`] returns.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum LeadStatus {
    #[default]
    Enquiry,
    ViewingScheduled,
    ViewingCompleted,
    Interested,
    ApplicationSubmitted,
    Referencing,
    InContracts,
    ContractsComplete,
    Converted,
    Lost,
}

impl LeadStatus {
    pub const fn ordered() -> [Self; 10] {
        [
            Self::Enquiry,
            Self::ViewingScheduled,
            Self::ViewingCompleted,
            Self::Interested,
            Self::ApplicationSubmitted,
            Self::Referencing,
            Self::InContracts,
            Self::ContractsComplete,
            Self::Converted,
            Self::Lost,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Enquiry => "Enquiry",
            Self::ViewingScheduled => "Viewing Scheduled",
            Self::ViewingCompleted => "Viewing Completed",
            Self::Interested => "Interested",
            Self::ApplicationSubmitted => "Application Submitted",
            Self::Referencing => "Referencing",
            Self::InContracts => "In Contracts",
            Self::ContractsComplete => "Contracts Complete",
            Self::Converted => "Converted",
            Self::Lost => "Lost",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Enquiry => "Initial enquiry received",
            Self::ViewingScheduled => "Property viewing has been scheduled",
            Self::ViewingCompleted => "Property viewing has taken place",
            Self::Interested => "Lead has expressed interest in the property",
            Self::ApplicationSubmitted => "Formal tenancy application received",
            Self::Referencing => "Tenant referencing in progress",
            Self::InContracts => "Tenancy agreement being prepared and signed",
            Self::ContractsComplete => "All contracts signed, ready for tenant creation",
            Self::Converted => "Lead converted to tenant",
            Self::Lost => "Lead did not proceed",
        }
    }

    /// Board column for the lead pipeline; one column per stage.
    pub const fn kanban_order(self) -> u8 {
        match self {
            Self::Enquiry => 0,
            Self::ViewingScheduled => 1,
            Self::ViewingCompleted => 2,
            Self::Interested => 3,
            Self::ApplicationSubmitted => 4,
            Self::Referencing => 5,
            Self::InContracts => 6,
            Self::ContractsComplete => 7,
            Self::Converted => 8,
            Self::Lost => 9,
        }
    }

    pub const fn badge_class(self) -> &'static str {
        match self {
            Self::Enquiry => "badge-secondary",
            Self::ViewingScheduled | Self::Referencing => "badge-info",
            Self::ViewingCompleted => "badge-primary",
            Self::Interested | Self::InContracts => "badge-warning",
            Self::ApplicationSubmitted | Self::ContractsComplete | Self::Converted => {
                "badge-success"
            }
            Self::Lost => "badge-dark",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Converted | Self::Lost)
    }

    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Terminal stages never move; any active stage may drop to `Lost`.
    pub fn can_transition_to(self, target: LeadStatus) -> bool {
        if self.is_terminal() {
            return false;
        }

        if target == Self::Lost {
            return true;
        }

        self.successors().contains(&target)
    }

    fn successors(self) -> &'static [LeadStatus] {
        match self {
            Self::Enquiry => &[
                Self::ViewingScheduled,
                Self::Interested,
                Self::ApplicationSubmitted,
            ],
            Self::ViewingScheduled => &[Self::ViewingCompleted],
            Self::ViewingCompleted => &[Self::Interested, Self::ApplicationSubmitted],
            Self::Interested => &[Self::ApplicationSubmitted],
            Self::ApplicationSubmitted => &[Self::Referencing],
            Self::Referencing => &[Self::InContracts],
            Self::InContracts => &[Self::ContractsComplete],
            Self::ContractsComplete => &[Self::Converted],
            Self::Converted | Self::Lost => &[],
        }
    }

    pub const fn value(self) -> &'static str {
        match self {
            Self::Enquiry => "enquiry",
            Self::ViewingScheduled => "viewing-scheduled",
            Self::ViewingCompleted => "viewing-completed",
            Self::Interested => "interested",
            Self::ApplicationSubmitted => "application-submitted",
            Self::Referencing => "referencing",
            Self::InContracts => "in-contracts",
            Self::ContractsComplete => "contracts-complete",
            Self::Converted => "converted",
            Self::Lost => "lost",
        }
    }

    /// Strict parse of the wire form. Missing or blank input defaults to `Enquiry`;
    /// anything else that is not a known value is an error.
    pub fn from_value(value: Option<&str>) -> Result<Self, LeadStatusParseError> {
        let raw = match value.map(str::trim) {
            None | Some("") => return Ok(Self::Enquiry),
            Some(raw) => raw,
        };

        Self::ordered()
            .into_iter()
            .find(|status| status.value().eq_ignore_ascii_case(raw))
            .ok_or_else(|| LeadStatusParseError {
                value: raw.to_string(),
            })
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl FromStr for LeadStatus {
    type Err = LeadStatusParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_value(Some(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lead status: {value}")]
pub struct LeadStatusParseError {
    pub value: String,
}
