//! SQLite storage for violation counters and the violation log

use crate::enforcer::ViolationStore;
use crate::{ViolationLog, ViolationRecord};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::info;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database, creating parent directories as needed
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> anyhow::Result<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS violations (
                actor_id TEXT NOT NULL,
                check_name TEXT NOT NULL,
                count INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (actor_id, check_name)
            );

            CREATE TABLE IF NOT EXISTS violation_log (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                actor_name TEXT NOT NULL,
                check_name TEXT NOT NULL,
                message TEXT NOT NULL,
                count INTEGER NOT NULL,
                punished INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_log_timestamp ON violation_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_log_actor ON violation_log(actor_id);
            "#,
        )?;

        info!("Database initialized");
        Ok(())
    }

    /// Stored counters, optionally for one actor
    pub fn list_violations(&self, actor_id: Option<&str>) -> anyhow::Result<Vec<ViolationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT actor_id, check_name, count
            FROM violations
            WHERE ?1 IS NULL OR actor_id = ?1
            ORDER BY actor_id, check_name
            "#,
        )?;

        let records = stmt
            .query_map([actor_id], |row| {
                Ok(ViolationRecord {
                    actor_id: row.get(0)?,
                    check: row.get(1)?,
                    count: row.get::<_, i64>(2)?.max(0) as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    pub fn get_violations(&self, actor_id: &str, check: &str) -> anyhow::Result<u64> {
        let count: Option<i64> = self
            .conn
            .lock()
            .query_row(
                "SELECT count FROM violations WHERE actor_id = ?1 AND check_name = ?2",
                params![actor_id, check],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    /// Delete an actor's counters, or just one check's
    pub fn reset(&self, actor_id: &str, check: Option<&str>) -> anyhow::Result<usize> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM violations WHERE actor_id = ?1 AND (?2 IS NULL OR check_name = ?2)",
            params![actor_id, check],
        )?;
        info!("Reset {} violation counters for {}", deleted, actor_id);
        Ok(deleted)
    }

    /// Most recent violation log entries, newest first
    pub fn recent_logs(&self, limit: usize) -> anyhow::Result<Vec<ViolationLog>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, timestamp, actor_id, actor_name, check_name, message, count, punished
            FROM violation_log
            ORDER BY timestamp DESC
            LIMIT ?1
            "#,
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let logs = stmt
            .query_map([limit], |row| {
                Ok(ViolationLog {
                    id: row.get(0)?,
                    timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(1)?)
                        .unwrap_or_default()
                        .with_timezone(&chrono::Utc),
                    actor_id: row.get(2)?,
                    actor_name: row.get(3)?,
                    check: row.get(4)?,
                    message: row.get(5)?,
                    count: row.get::<_, i64>(6)?.max(0) as u64,
                    punished: row.get(7)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(logs)
    }

    pub fn get_stats(&self) -> anyhow::Result<Stats> {
        let conn = self.conn.lock();
        let actors: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT actor_id) FROM violations",
            [],
            |row| row.get(0),
        )?;
        let violations: i64 = conn.query_row(
            "SELECT COALESCE(SUM(count), 0) FROM violations",
            [],
            |row| row.get(0),
        )?;
        let logged: i64 = conn.query_row("SELECT COUNT(*) FROM violation_log", [], |row| {
            row.get(0)
        })?;
        let punished: i64 = conn.query_row(
            "SELECT COUNT(*) FROM violation_log WHERE punished = 1",
            [],
            |row| row.get(0),
        )?;

        Ok(Stats {
            actors,
            violations,
            logged,
            punished,
        })
    }

    /// Drop log entries older than the retention period
    pub fn cleanup(&self, retention_days: u32) -> anyhow::Result<usize> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days as i64);

        let deleted = self.conn.lock().execute(
            "DELETE FROM violation_log WHERE timestamp < ?1",
            [cutoff.to_rfc3339()],
        )?;

        info!("Cleaned up {} old violation log entries", deleted);
        Ok(deleted)
    }
}

impl ViolationStore for Database {
    fn load_all(&self) -> anyhow::Result<Vec<ViolationRecord>> {
        self.list_violations(None)
    }

    fn save(&self, record: &ViolationRecord) -> anyhow::Result<()> {
        self.conn.lock().execute(
            r#"
            INSERT INTO violations (actor_id, check_name, count, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(actor_id, check_name)
            DO UPDATE SET count = MAX(violations.count, excluded.count),
                          updated_at = excluded.updated_at
            "#,
            params![
                record.actor_id,
                record.check,
                i64::try_from(record.count)?,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn append_log(&self, entry: &ViolationLog) -> anyhow::Result<()> {
        self.conn.lock().execute(
            r#"
            INSERT INTO violation_log (id, timestamp, actor_id, actor_name, check_name, message, count, punished)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                entry.id,
                entry.timestamp.to_rfc3339(),
                entry.actor_id,
                entry.actor_name,
                entry.check,
                entry.message,
                i64::try_from(entry.count)?,
                entry.punished,
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Stats {
    pub actors: i64,
    pub violations: i64,
    pub logged: i64,
    pub punished: i64,
}
