//! Audit log — SQLite-based record of security-relevant actions.
//!
//! Every authenticated, state-changing operation appends one entry to
//! `<data_dir>/audit.db`, keyed by the acting username.
//!
//! Designed for graceful degradation: logging is best-effort and never
//! fails the parent operation. A write failure is reported through
//! `tracing` and otherwise swallowed; unreadable storage makes queries
//! return an empty list.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub action: String,
    pub details: String,
}

/// SQLite-backed, append-only audit log.
pub struct AuditLog {
    conn: Mutex<Connection>,
}

impl AuditLog {
    /// Open (or create) the audit database at `<data_dir>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened — callers should
    /// treat this as "audit logging unavailable" and continue normally.
    pub fn open(data_dir: &Path) -> Option<Self> {
        let db_path = data_dir.join("audit.db");
        let conn = Connection::open(&db_path).ok()?;

        // Owner-only access to the audit database.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                username  TEXT NOT NULL,
                action    TEXT NOT NULL,
                details   TEXT NOT NULL DEFAULT ''
            );",
        )
        .ok()?;

        Some(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record an action. Fire-and-forget — a failed insert is reported
    /// via `tracing::warn!` and never propagated to the caller.
    pub fn record(&self, username: &str, action: &str, details: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(_) => {
                tracing::warn!(username, action, "audit log lock poisoned, entry dropped");
                return;
            }
        };

        let result = conn.execute(
            "INSERT INTO audit_log (timestamp, username, action, details)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![now, username, action, details.unwrap_or("")],
        );

        if let Err(e) = result {
            tracing::warn!(username, action, error = %e, "audit log write failed");
        }
    }

    /// Return all entries for `username`, newest first.
    ///
    /// Any storage failure degrades to an empty result rather than an
    /// error — the audit log must never break a read path.
    pub fn query(&self, username: &str) -> Vec<AuditEntry> {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(_) => return Vec::new(),
        };

        let mut stmt = match conn.prepare(
            "SELECT timestamp, username, action, details
             FROM audit_log
             WHERE username = ?1
             ORDER BY timestamp DESC, id DESC",
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                tracing::warn!(username, error = %e, "audit log query failed");
                return Vec::new();
            }
        };

        let rows = stmt.query_map([username], |row| {
            let ts_str: String = row.get(0)?;
            let timestamp = DateTime::parse_from_rfc3339(&ts_str)
                .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

            Ok(AuditEntry {
                timestamp,
                username: row.get(1)?,
                action: row.get(2)?,
                details: row.get(3)?,
            })
        });

        match rows {
            Ok(rows) => rows.filter_map(std::result::Result::ok).collect(),
            Err(e) => {
                tracing::warn!(username, error = %e, "audit log query failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_database() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path());
        assert!(audit.is_some(), "should open successfully");
        assert!(dir.path().join("audit.db").exists());
    }

    #[test]
    fn record_and_query_roundtrip() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        audit.record("alice", "login", None);
        audit.record("alice", "backup_created", Some("backup_alice_20260823_120000.enc"));
        audit.record("alice", "vault_updated", None);

        let entries = audit.query("alice");
        assert_eq!(entries.len(), 3);

        // Newest first.
        assert_eq!(entries[0].action, "vault_updated");
        assert_eq!(entries[1].action, "backup_created");
        assert_eq!(entries[2].action, "login");
        assert_eq!(
            entries[1].details,
            "backup_alice_20260823_120000.enc"
        );
    }

    #[test]
    fn query_filters_by_username() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        audit.record("alice", "login", None);
        audit.record("bob", "login", None);
        audit.record("alice", "vault_updated", None);

        let alice = audit.query("alice");
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|e| e.username == "alice"));

        let bob = audit.query("bob");
        assert_eq!(bob.len(), 1);
    }

    #[test]
    fn query_unknown_user_is_empty() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        assert!(audit.query("ghost").is_empty());
    }

    #[test]
    fn open_returns_none_on_bad_path() {
        let result = AuditLog::open(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(result.is_none());
    }
}
