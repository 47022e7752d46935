//! Case storage.
//!
//! Two backends behind one trait: SQLite for the daemon, an in-memory map
//! for tests. The store owns the version counter: a successful `update`
//! persists the case at `expected_version + 1`, and a stale expectation is
//! rejected before anything is written. Comparing versions inside the store
//! keeps the check and the write under one lock.

mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use rma_common::{CaseFilter, RmaCase, WorkflowError};
use std::collections::HashMap;
use std::sync::RwLock;

/// Persistence operations the engine needs
pub trait CaseStore: Send + Sync {
    /// Persist a brand-new case. The case id must be unused.
    fn insert(&self, case: &RmaCase) -> Result<(), WorkflowError>;

    /// Look up by case id or RMA number
    fn find(&self, key: &str) -> Result<Option<RmaCase>, WorkflowError>;

    /// Compare-and-swap write. Succeeds only while the stored version still
    /// equals `expected_version`; the persisted copy comes back bumped to
    /// `expected_version + 1`.
    fn update(&self, case: &RmaCase, expected_version: u64) -> Result<RmaCase, WorkflowError>;

    /// Filtered listing, most urgent deadline first
    fn list(&self, filter: &CaseFilter, now: DateTime<Utc>) -> Result<Vec<RmaCase>, WorkflowError>;

    /// Non-terminal cases whose deadline has passed
    fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<RmaCase>, WorkflowError>;

    /// Total number of cases
    fn count(&self) -> Result<usize, WorkflowError>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// HashMap-backed store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    cases: RwLock<HashMap<String, RmaCase>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_by_deadline(cases: &mut [RmaCase]) {
    cases.sort_by(|a, b| {
        a.deadline_at
            .cmp(&b.deadline_at)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

impl CaseStore for MemoryStore {
    fn insert(&self, case: &RmaCase) -> Result<(), WorkflowError> {
        let mut cases = self.cases.write().unwrap();
        if cases.contains_key(&case.case_id) {
            return Err(WorkflowError::Store(format!(
                "case {} already exists",
                case.case_id
            )));
        }
        cases.insert(case.case_id.clone(), case.clone());
        Ok(())
    }

    fn find(&self, key: &str) -> Result<Option<RmaCase>, WorkflowError> {
        let cases = self.cases.read().unwrap();
        if let Some(case) = cases.get(key) {
            return Ok(Some(case.clone()));
        }
        Ok(cases.values().find(|c| c.rma_number == key).cloned())
    }

    fn update(&self, case: &RmaCase, expected_version: u64) -> Result<RmaCase, WorkflowError> {
        let mut cases = self.cases.write().unwrap();
        let current = cases
            .get(&case.case_id)
            .ok_or_else(|| WorkflowError::NotFound(case.case_id.clone()))?;
        if current.version != expected_version {
            return Err(WorkflowError::Conflict {
                expected: expected_version,
                actual: current.version,
            });
        }
        let mut persisted = case.clone();
        persisted.version = expected_version + 1;
        cases.insert(case.case_id.clone(), persisted.clone());
        Ok(persisted)
    }

    fn list(&self, filter: &CaseFilter, now: DateTime<Utc>) -> Result<Vec<RmaCase>, WorkflowError> {
        let cases = self.cases.read().unwrap();
        let mut matched: Vec<RmaCase> = cases
            .values()
            .filter(|c| filter.matches(c, now))
            .cloned()
            .collect();
        sort_by_deadline(&mut matched);
        Ok(matched)
    }

    fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<RmaCase>, WorkflowError> {
        let cases = self.cases.read().unwrap();
        let mut matched: Vec<RmaCase> = cases
            .values()
            .filter(|c| c.is_overdue(now))
            .cloned()
            .collect();
        sort_by_deadline(&mut matched);
        Ok(matched)
    }

    fn count(&self) -> Result<usize, WorkflowError> {
        Ok(self.cases.read().unwrap().len())
    }
}
