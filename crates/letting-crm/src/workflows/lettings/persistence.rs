use serde::{Deserialize, Deserializer};
use tracing::warn;

use super::lead_status::LeadStatus;

/// Column adapter for `LeadStatus`.
///
/// Reads are lenient: rows written by older tooling may hold values the enum no longer
/// knows, and those load as `Enquiry` instead of failing the whole query. Use
/// [`LeadStatus::from_value`] for caller-supplied input.
pub struct LeadStatusColumn;

impl LeadStatusColumn {
    pub fn to_column(status: LeadStatus) -> &'static str {
        status.value()
    }

    pub fn from_column(value: Option<&str>) -> LeadStatus {
        match LeadStatus::from_value(value) {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    value = %err.value,
                    "unrecognized lead status in storage, defaulting to enquiry"
                );
                LeadStatus::Enquiry
            }
        }
    }
}

/// Serde adapter giving stored documents the same lenient read as the column.
pub(crate) fn deserialize_lead_status<'de, D>(deserializer: D) -> Result<LeadStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(LeadStatusColumn::from_column(value.as_deref()))
}
