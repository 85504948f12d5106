use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::InstructionId;
use super::instruction::LettingInstruction;
use super::instruction_status::{InstructionStatus, KanbanColumn};

#[derive(Debug, Clone, Serialize)]
pub struct StatusCountEntry {
    pub status: InstructionStatus,
    pub status_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnCountEntry {
    pub column: KanbanColumn,
    pub column_label: &'static str,
    pub count: usize,
}

/// Dashboard totals across every instruction.
#[derive(Debug, Clone, Serialize)]
pub struct InstructionSummary {
    pub total: usize,
    pub active_marketing: usize,
    pub active_leases: usize,
    pub by_status: Vec<StatusCountEntry>,
    pub by_column: Vec<ColumnCountEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_days_to_fill: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_conversion_rate: Option<f64>,
}

impl InstructionSummary {
    pub fn from_instructions(instructions: &[LettingInstruction]) -> Self {
        let mut status_counts: HashMap<InstructionStatus, usize> = HashMap::new();
        let mut column_counts: HashMap<KanbanColumn, usize> = HashMap::new();

        for instruction in instructions {
            *status_counts.entry(instruction.status()).or_default() += 1;
            *column_counts
                .entry(instruction.status().kanban_column())
                .or_default() += 1;
        }

        // Legacy rows only show up when present.
        let by_status = InstructionStatus::all()
            .filter_map(|status| {
                let count = status_counts.get(&status).copied().unwrap_or_default();
                (count > 0 || !status.is_legacy()).then_some(StatusCountEntry {
                    status,
                    status_label: status.label(),
                    count,
                })
            })
            .collect();

        let by_column = KanbanColumn::ordered()
            .into_iter()
            .map(|column| ColumnCountEntry {
                column,
                column_label: column.label(),
                count: column_counts.get(&column).copied().unwrap_or_default(),
            })
            .collect();

        Self {
            total: instructions.len(),
            active_marketing: instructions.iter().filter(|i| i.is_active()).count(),
            active_leases: instructions.iter().filter(|i| i.is_active_lease()).count(),
            by_status,
            by_column,
            average_days_to_fill: average(
                instructions
                    .iter()
                    .filter_map(|i| i.metrics().days_to_fill.map(|days| days as f64)),
            ),
            average_conversion_rate: average(
                instructions
                    .iter()
                    .filter_map(|i| i.metrics().conversion_rate),
            ),
        }
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| {
        (sum + value, count + 1)
    });
    (count > 0).then(|| sum / count as f64)
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructionCard {
    pub id: InstructionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub property_name: String,
    pub status: InstructionStatus,
    pub status_label: &'static str,
    pub badge_class: &'static str,
    pub enquiries: u32,
    pub viewings: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_rate: Option<f64>,
    pub days_advertising: i64,
}

impl InstructionCard {
    pub fn from_instruction(instruction: &LettingInstruction, today: NaiveDate) -> Self {
        let status = instruction.status();
        let metrics = instruction.metrics();
        Self {
            id: instruction.id(),
            reference: instruction.instruction_reference.clone(),
            property_name: instruction.property().name.clone(),
            status,
            status_label: status.label(),
            badge_class: status.badge_class(),
            enquiries: metrics.number_of_enquiries,
            viewings: metrics.number_of_viewings,
            conversion_rate: metrics.conversion_rate,
            days_advertising: instruction.days_advertising(today),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub column: KanbanColumn,
    pub column_label: &'static str,
    pub cards: Vec<InstructionCard>,
}

/// Instructions grouped into board columns by kanban order.
#[derive(Debug, Clone, Serialize)]
pub struct InstructionBoard {
    pub columns: Vec<BoardColumn>,
}

impl InstructionBoard {
    pub fn from_instructions(instructions: &[LettingInstruction], today: NaiveDate) -> Self {
        let columns = KanbanColumn::ordered()
            .into_iter()
            .map(|column| {
                let mut cards: Vec<InstructionCard> = instructions
                    .iter()
                    .filter(|instruction| instruction.status().kanban_column() == column)
                    .map(|instruction| InstructionCard::from_instruction(instruction, today))
                    .collect();
                cards.sort_by(|a, b| b.days_advertising.cmp(&a.days_advertising));
                BoardColumn {
                    column,
                    column_label: column.label(),
                    cards,
                }
            })
            .collect();

        Self { columns }
    }

    pub fn column(&self, column: KanbanColumn) -> Option<&BoardColumn> {
        self.columns.iter().find(|entry| entry.column == column)
    }
}
