use crate::errors::{Result, StoreError};
use crate::sync::BatchSummary;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A finished (or interrupted) batch run as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRun {
    pub run_id: i64,
    pub batch_name: String,
    pub start_time: i64, // Unix timestamp
    pub end_time: Option<i64>,
    pub status: String,
    pub updated: i64,
    pub compared: i64,
    pub diverged: i64,
    pub skipped: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRecord {
    pub business_key: Option<String>,
    pub outcome: String,
    pub detail: String,
}

/// SQLite log of batch runs and their per-candidate outcomes.
pub struct Catalog {
    conn: Arc<Mutex<Connection>>,
}

impl Catalog {
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other(anyhow::anyhow!("catalog connection lock poisoned")))
    }

    pub fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS batch_runs (
                run_id INTEGER PRIMARY KEY AUTOINCREMENT,
                batch_name TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                status TEXT NOT NULL,
                updated INTEGER NOT NULL DEFAULT 0,
                compared INTEGER NOT NULL DEFAULT 0,
                diverged INTEGER NOT NULL DEFAULT 0,
                skipped INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS candidate_outcomes (
                run_id INTEGER NOT NULL REFERENCES batch_runs(run_id),
                position INTEGER NOT NULL,
                business_key TEXT,
                outcome TEXT NOT NULL,
                detail TEXT NOT NULL,
                PRIMARY KEY (run_id, position)
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn create_run(&self, batch_name: &str) -> Result<i64> {
        let conn = self.conn()?;
        let start_time = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO batch_runs (batch_name, start_time, status) VALUES (?1, ?2, 'RUNNING')",
            params![batch_name, start_time],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Stores the counts and every candidate outcome of `summary` under
    /// `run_id`, and closes the run.
    pub fn record_summary(&self, run_id: i64, summary: &BatchSummary) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let end_time = chrono::Utc::now().timestamp();
        let status = if summary.interrupted {
            "INTERRUPTED"
        } else if summary.failed() > 0 {
            "COMPLETED_WITH_FAILURES"
        } else {
            "SUCCESS"
        };
        tx.execute(
            "UPDATE batch_runs SET end_time = ?1, status = ?2, updated = ?3, compared = ?4,
                diverged = ?5, skipped = ?6, failed = ?7
             WHERE run_id = ?8",
            params![
                end_time,
                status,
                summary.updated() as i64,
                summary.compared() as i64,
                summary.diverged() as i64,
                summary.skipped() as i64,
                summary.failed() as i64,
                run_id,
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO candidate_outcomes (run_id, position, business_key, outcome, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, report) in summary.reports.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    position as i64,
                    report.display_key(),
                    report.outcome.label(),
                    report.outcome.detail(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<BatchRun>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, batch_name, start_time, end_time, status, updated, compared, diverged, skipped, failed
             FROM batch_runs ORDER BY run_id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(BatchRun {
                run_id: row.get(0)?,
                batch_name: row.get(1)?,
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                status: row.get(4)?,
                updated: row.get(5)?,
                compared: row.get(6)?,
                diverged: row.get(7)?,
                skipped: row.get(8)?,
                failed: row.get(9)?,
            })
        })?;
        let mut runs = Vec::new();
        for run in rows {
            runs.push(run?);
        }
        Ok(runs)
    }

    pub fn outcomes_for(&self, run_id: i64) -> Result<Vec<OutcomeRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT business_key, outcome, detail FROM candidate_outcomes
             WHERE run_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(OutcomeRecord {
                business_key: row.get(0)?,
                outcome: row.get(1)?,
                detail: row.get(2)?,
            })
        })?;
        let mut outcomes = Vec::new();
        for outcome in rows {
            outcomes.push(outcome?);
        }
        Ok(outcomes)
    }
}
