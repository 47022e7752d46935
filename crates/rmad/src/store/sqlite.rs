//! SQLite-backed case store.
//!
//! One row per case: the hot columns (stage, owner, deadline, version) are
//! real columns for filtering, the full record rides along as JSON in
//! `data`. The version column is what the compare-and-swap runs against;
//! the JSON copy is kept in step with it on every write.

use super::CaseStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rma_common::{CaseFilter, RmaCase, WorkflowError};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Case store backed by SQLite
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

fn store_err(e: impl std::fmt::Display) -> WorkflowError {
    WorkflowError::Store(e.to_string())
}

impl SqliteStore {
    /// Open or create the case database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database: {:?}", path))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, handy for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS cases (
                case_id TEXT PRIMARY KEY,
                rma_number TEXT NOT NULL UNIQUE,
                stage TEXT NOT NULL,
                priority TEXT NOT NULL,
                assigned_to TEXT,
                region TEXT NOT NULL,
                product_category TEXT NOT NULL,
                created_at TEXT NOT NULL,
                deadline_at TEXT NOT NULL,
                version INTEGER NOT NULL,
                data TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cases_stage ON cases(stage)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cases_assigned_to ON cases(assigned_to)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cases_deadline ON cases(deadline_at)",
            [],
        )?;

        Ok(())
    }

    fn decode_rows(rows: Vec<String>) -> Result<Vec<RmaCase>, WorkflowError> {
        rows.into_iter()
            .map(|data| serde_json::from_str(&data).map_err(store_err))
            .collect()
    }
}

const TERMINAL_STAGES: &str = "('completed', 'rejected')";

impl CaseStore for SqliteStore {
    fn insert(&self, case: &RmaCase) -> Result<(), WorkflowError> {
        let conn = self.conn.lock().unwrap();
        let data = serde_json::to_string(case).map_err(store_err)?;

        conn.execute(
            r#"
            INSERT INTO cases (case_id, rma_number, stage, priority, assigned_to,
                               region, product_category, created_at, deadline_at, version, data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                &case.case_id,
                &case.rma_number,
                case.stage.as_str(),
                case.priority.as_str(),
                &case.assigned_to,
                &case.region,
                &case.product_category,
                case.created_at.to_rfc3339(),
                case.deadline_at.to_rfc3339(),
                case.version,
                &data
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn find(&self, key: &str) -> Result<Option<RmaCase>, WorkflowError> {
        let conn = self.conn.lock().unwrap();

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM cases WHERE case_id = ?1 OR rma_number = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data).map_err(store_err)?)),
            None => Ok(None),
        }
    }

    fn update(&self, case: &RmaCase, expected_version: u64) -> Result<RmaCase, WorkflowError> {
        let conn = self.conn.lock().unwrap();

        let mut persisted = case.clone();
        persisted.version = expected_version + 1;
        let data = serde_json::to_string(&persisted).map_err(store_err)?;

        let changed = conn
            .execute(
                r#"
                UPDATE cases SET
                    stage = ?,
                    priority = ?,
                    assigned_to = ?,
                    deadline_at = ?,
                    version = ?,
                    data = ?
                WHERE case_id = ? AND version = ?
                "#,
                params![
                    persisted.stage.as_str(),
                    persisted.priority.as_str(),
                    &persisted.assigned_to,
                    persisted.deadline_at.to_rfc3339(),
                    persisted.version,
                    &data,
                    &persisted.case_id,
                    expected_version
                ],
            )
            .map_err(store_err)?;

        if changed == 0 {
            let actual: Option<u64> = conn
                .query_row(
                    "SELECT version FROM cases WHERE case_id = ?",
                    params![&persisted.case_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err)?;
            return match actual {
                Some(actual) => Err(WorkflowError::Conflict {
                    expected: expected_version,
                    actual,
                }),
                None => Err(WorkflowError::NotFound(persisted.case_id.clone())),
            };
        }

        Ok(persisted)
    }

    fn list(&self, filter: &CaseFilter, now: DateTime<Utc>) -> Result<Vec<RmaCase>, WorkflowError> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from("SELECT data FROM cases WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(stage) = filter.stage {
            sql.push_str(" AND stage = ?");
            params_vec.push(Box::new(stage.as_str().to_string()));
        }

        if let Some(ref assigned_to) = filter.assigned_to {
            sql.push_str(" AND assigned_to = ?");
            params_vec.push(Box::new(assigned_to.clone()));
        }

        match filter.overdue {
            Some(true) => {
                sql.push_str(&format!(
                    " AND stage NOT IN {} AND deadline_at < ?",
                    TERMINAL_STAGES
                ));
                params_vec.push(Box::new(now.to_rfc3339()));
            }
            Some(false) => {
                sql.push_str(&format!(
                    " AND (stage IN {} OR deadline_at >= ?)",
                    TERMINAL_STAGES
                ));
                params_vec.push(Box::new(now.to_rfc3339()));
            }
            None => {}
        }

        sql.push_str(" ORDER BY deadline_at ASC, created_at ASC");

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql).map_err(store_err)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| row.get::<_, String>(0))
            .map_err(store_err)?;

        let mut raw = Vec::new();
        for row in rows {
            raw.push(row.map_err(store_err)?);
        }
        Self::decode_rows(raw)
    }

    fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<RmaCase>, WorkflowError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT data FROM cases WHERE stage NOT IN {} AND deadline_at < ? \
                 ORDER BY deadline_at ASC",
                TERMINAL_STAGES
            ))
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![now.to_rfc3339()], |row| row.get::<_, String>(0))
            .map_err(store_err)?;

        let mut raw = Vec::new();
        for row in rows {
            raw.push(row.map_err(store_err)?);
        }
        Self::decode_rows(raw)
    }

    fn count(&self) -> Result<usize, WorkflowError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM cases", [], |row| row.get(0))
            .map_err(store_err)
    }
}
