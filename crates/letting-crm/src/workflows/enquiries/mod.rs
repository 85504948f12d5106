//! Lead intake from property portal enquiry exports.

mod normalizer;
mod parser;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::workflows::lettings::{
    InstructionId, InstructionRepository, Lead, LeadId, LeadStatusColumn, LettingInstruction,
    LettingInstructionService, LettingServiceError,
};

#[derive(Debug, thiserror::Error)]
pub enum LeadImportError {
    #[error("failed to read enquiry export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid enquiry CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not attach imported leads: {0}")]
    Attach(#[from] LettingServiceError),
}

/// Leads parsed from one export, in file order.
#[derive(Debug, Clone, Default)]
pub struct LeadImport {
    pub leads: Vec<Lead>,
    pub skipped: usize,
}

impl LeadImport {
    /// Attaches every imported lead to the instruction, stopping at the first rejection.
    pub fn attach_to<R>(
        self,
        service: &LettingInstructionService<R>,
        instruction: InstructionId,
    ) -> Result<LettingInstruction, LeadImportError>
    where
        R: InstructionRepository + 'static,
    {
        let mut latest = service.get(instruction)?;
        for lead in self.leads {
            latest = service.add_lead(instruction, lead)?;
        }
        Ok(latest)
    }
}

pub struct LeadCsvImporter;

impl LeadCsvImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        first_id: LeadId,
        imported_at: NaiveDateTime,
    ) -> Result<LeadImport, LeadImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, first_id, imported_at)
    }

    /// Parses an export. Ids are assigned from `first_id` upwards; rows with no enquiry
    /// time take `imported_at`. Nameless rows and repeated email addresses are skipped.
    pub fn from_reader<R: Read>(
        reader: R,
        first_id: LeadId,
        imported_at: NaiveDateTime,
    ) -> Result<LeadImport, LeadImportError> {
        let records = parser::parse_records(reader)?;
        let mut seen_emails = HashSet::new();
        let mut import = LeadImport::default();
        let mut next_id = first_id.0;

        for (index, record) in records.into_iter().enumerate() {
            let row = index + 2;
            if record.name.is_empty() {
                warn!(row, "skipping enquiry without a name");
                import.skipped += 1;
                continue;
            }

            if let Some(email) = &record.email {
                if !seen_emails.insert(email.clone()) {
                    warn!(row, %email, "skipping repeated enquiry");
                    import.skipped += 1;
                    continue;
                }
            }

            let status = LeadStatusColumn::from_column(record.status.as_deref());
            let mut lead = Lead::new(
                LeadId(next_id),
                record.name,
                record.enquired_at.unwrap_or(imported_at),
            )
            .with_status(status);
            lead.email = record.email;
            lead.phone = record.phone;

            import.leads.push(lead);
            next_id += 1;
        }

        info!(
            imported = import.leads.len(),
            skipped = import.skipped,
            "parsed enquiry export"
        );
        Ok(import)
    }
}
