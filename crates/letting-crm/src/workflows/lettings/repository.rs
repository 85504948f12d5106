use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{InstructionId, PropertyId};
use super::instruction::LettingInstruction;

/// Storage abstraction so the service module can be exercised in isolation.
///
/// `update` is an optimistic write: implementations must reject the instruction when
/// its `version()` no longer matches the stored row, and call `next_version()` on the
/// value they persist.
///
/// A property holds at most one instruction whose status is still being worked
/// (`is_active_instruction`). Both `insert` and `update` must check this in the same
/// atomic step as the write and fail with `ActiveInstruction` otherwise.
pub trait InstructionRepository: Send + Sync {
    fn next_id(&self) -> Result<InstructionId, RepositoryError>;
    fn insert(&self, instruction: LettingInstruction)
        -> Result<LettingInstruction, RepositoryError>;
    fn update(&self, instruction: LettingInstruction)
        -> Result<LettingInstruction, RepositoryError>;
    fn fetch(&self, id: InstructionId) -> Result<Option<LettingInstruction>, RepositoryError>;
    fn fetch_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<LettingInstruction>, RepositoryError>;
    fn for_property(&self, property: PropertyId)
        -> Result<Vec<LettingInstruction>, RepositoryError>;
    fn all(&self) -> Result<Vec<LettingInstruction>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected version {expected}, stored version is {actual}")]
    StaleVersion { expected: u64, actual: u64 },
    #[error("property {property} already has an active instruction ({reference})")]
    ActiveInstruction {
        property: PropertyId,
        reference: String,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Default)]
struct Store {
    records: BTreeMap<InstructionId, LettingInstruction>,
    next_id: u64,
}

impl Store {
    fn ensure_exclusive(&self, instruction: &LettingInstruction) -> Result<(), RepositoryError> {
        if !instruction.status().is_active_instruction() {
            return Ok(());
        }

        let property = instruction.property().id;
        match self.records.values().find(|stored| {
            stored.id() != instruction.id()
                && stored.property().id == property
                && stored.status().is_active_instruction()
        }) {
            Some(existing) => Err(RepositoryError::ActiveInstruction {
                property,
                reference: existing.instruction_reference.clone().unwrap_or_default(),
            }),
            None => Ok(()),
        }
    }
}

/// Process-local repository used by the API service and tests.
#[derive(Default, Clone)]
pub struct InMemoryInstructionRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryInstructionRepository {
    fn store(&self) -> Result<MutexGuard<'_, Store>, RepositoryError> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl InstructionRepository for InMemoryInstructionRepository {
    /// Never hands out a key at or below one already stored.
    fn next_id(&self) -> Result<InstructionId, RepositoryError> {
        let mut store = self.store()?;
        let floor = store
            .records
            .keys()
            .next_back()
            .map_or(1, |last| last.0 + 1);
        let id = store.next_id.max(floor);
        store.next_id = id + 1;
        Ok(InstructionId(id))
    }

    fn insert(
        &self,
        instruction: LettingInstruction,
    ) -> Result<LettingInstruction, RepositoryError> {
        let mut store = self.store()?;
        store.ensure_exclusive(&instruction)?;
        let duplicate_reference = instruction.instruction_reference.is_some()
            && store
                .records
                .values()
                .any(|stored| stored.instruction_reference == instruction.instruction_reference);
        if store.records.contains_key(&instruction.id()) || duplicate_reference {
            return Err(RepositoryError::Conflict);
        }
        store.records.insert(instruction.id(), instruction.clone());
        Ok(instruction)
    }

    fn update(
        &self,
        mut instruction: LettingInstruction,
    ) -> Result<LettingInstruction, RepositoryError> {
        let mut store = self.store()?;
        let stored = store
            .records
            .get(&instruction.id())
            .ok_or(RepositoryError::NotFound)?;
        if stored.version() != instruction.version() {
            return Err(RepositoryError::StaleVersion {
                expected: instruction.version(),
                actual: stored.version(),
            });
        }
        store.ensure_exclusive(&instruction)?;
        instruction.next_version();
        store.records.insert(instruction.id(), instruction.clone());
        Ok(instruction)
    }

    fn fetch(&self, id: InstructionId) -> Result<Option<LettingInstruction>, RepositoryError> {
        Ok(self.store()?.records.get(&id).cloned())
    }

    fn fetch_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<LettingInstruction>, RepositoryError> {
        Ok(self
            .store()?
            .records
            .values()
            .find(|instruction| instruction.instruction_reference.as_deref() == Some(reference))
            .cloned())
    }

    fn for_property(
        &self,
        property: PropertyId,
    ) -> Result<Vec<LettingInstruction>, RepositoryError> {
        Ok(self
            .store()?
            .records
            .values()
            .filter(|instruction| instruction.property().id == property)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<LettingInstruction>, RepositoryError> {
        Ok(self.store()?.records.values().cloned().collect())
    }
}
