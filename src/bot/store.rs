//! SQLite persistence for users, sessions and payments.

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::bot::session::{Session, Step};

/// Payment verification outcome, as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Verified,
    Failed,
}

impl PaymentStatus {
    fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Verified => "verified",
            PaymentStatus::Failed => "failed",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "verified" => PaymentStatus::Verified,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }
}

/// A payment row keyed by gateway order id.
#[derive(Debug, Clone)]
pub struct Payment {
    pub order_id: String,
    pub telegram_id: i64,
    pub amount: u32,
    pub utr: Option<String>,
    pub status: PaymentStatus,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// In-memory store, used by tests.
    pub fn in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("failed to open in-memory database: {e}"))?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self, String> {
        let conn = Connection::open(path)
            .map_err(|e| format!("failed to open database {}: {e}", path.display()))?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;

        let sessions: i64 = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap_or(0);
        info!("Opened store at {} ({} sessions)", path.display(), sessions);
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), String> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                telegram_id INTEGER PRIMARY KEY,
                username TEXT,
                first_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_active TEXT NOT NULL,
                total_resumes INTEGER DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS sessions (
                telegram_id INTEGER PRIMARY KEY,
                step TEXT NOT NULL,
                user_name TEXT NOT NULL,
                resume_text TEXT,
                job_description TEXT,
                optimized_resume TEXT,
                order_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS payments (
                order_id TEXT PRIMARY KEY,
                telegram_id INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                utr TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                verified_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(telegram_id);
            "#,
        )
        .map_err(|e| format!("failed to initialize schema: {e}"))
    }

    /// Insert or refresh a user record and bump last_active.
    pub fn touch_user(
        &self,
        telegram_id: i64,
        username: Option<&str>,
        first_name: &str,
    ) -> Result<(), String> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (telegram_id, username, first_name, created_at, last_active)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(telegram_id) DO UPDATE SET
                 username = COALESCE(excluded.username, users.username),
                 first_name = excluded.first_name,
                 last_active = excluded.last_active",
            params![telegram_id, username, first_name, now],
        )
        .map_err(|e| format!("failed to upsert user: {e}"))?;
        Ok(())
    }

    /// Count a delivered resume for the user.
    pub fn count_delivery(&self, telegram_id: i64) -> Result<(), String> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET total_resumes = total_resumes + 1 WHERE telegram_id = ?1",
            params![telegram_id],
        )
        .map_err(|e| format!("failed to count delivery: {e}"))?;
        Ok(())
    }

    pub fn session(&self, telegram_id: i64) -> Result<Option<Session>, String> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT telegram_id, step, user_name, resume_text, job_description,
                    optimized_resume, order_id, created_at
             FROM sessions WHERE telegram_id = ?1",
            params![telegram_id],
            |row| {
                Ok(Session {
                    telegram_id: row.get(0)?,
                    step: Step::from_str(&row.get::<_, String>(1)?),
                    user_name: row.get(2)?,
                    resume_text: row.get(3)?,
                    job_description: row.get(4)?,
                    optimized_resume: row.get(5)?,
                    order_id: row.get(6)?,
                    created_at: row.get(7)?,
                })
            },
        )
        .optional()
        .map_err(|e| format!("failed to load session: {e}"))
    }

    /// Write the whole session row (insert or replace).
    pub fn save_session(&self, session: &Session) -> Result<(), String> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO sessions
                 (telegram_id, step, user_name, resume_text, job_description,
                  optimized_resume, order_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session.telegram_id,
                session.step.as_str(),
                session.user_name,
                session.resume_text,
                session.job_description,
                session.optimized_resume,
                session.order_id,
                session.created_at,
                now,
            ],
        )
        .map_err(|e| format!("failed to save session: {e}"))?;
        Ok(())
    }

    pub fn create_payment(
        &self,
        order_id: &str,
        telegram_id: i64,
        amount: u32,
    ) -> Result<(), String> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO payments (order_id, telegram_id, amount, status, created_at)
             VALUES (?1, ?2, ?3, 'pending', ?4)",
            params![order_id, telegram_id, amount, now],
        )
        .map_err(|e| format!("failed to create payment: {e}"))?;
        Ok(())
    }

    pub fn payment(&self, order_id: &str) -> Result<Option<Payment>, String> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT order_id, telegram_id, amount, utr, status FROM payments
             WHERE order_id = ?1",
            params![order_id],
            |row| {
                Ok(Payment {
                    order_id: row.get(0)?,
                    telegram_id: row.get(1)?,
                    amount: row.get(2)?,
                    utr: row.get(3)?,
                    status: PaymentStatus::from_str(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(|e| format!("failed to load payment: {e}"))
    }

    /// Record the verification outcome (and the user-supplied UTR, if any).
    pub fn resolve_payment(
        &self,
        order_id: &str,
        utr: Option<&str>,
        status: PaymentStatus,
    ) -> Result<(), String> {
        let verified_at = match status {
            PaymentStatus::Verified => Some(chrono::Utc::now().to_rfc3339()),
            _ => None,
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE payments SET utr = COALESCE(?2, utr), status = ?3, verified_at = ?4
             WHERE order_id = ?1",
            params![order_id, utr, status.as_str(), verified_at],
        )
        .map_err(|e| format!("failed to update payment: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_roundtrip() {
        let store = Store::in_memory().unwrap();
        assert!(store.session(42).unwrap().is_none());

        let mut session = Session::new(42, "Alice");
        session.resume_text = Some("resume body".to_string());
        store.save_session(&session).unwrap();

        let loaded = store.session(42).unwrap().expect("session should exist");
        assert_eq!(loaded.step, Step::AwaitingResume);
        assert_eq!(loaded.user_name, "Alice");
        assert_eq!(loaded.resume_text.as_deref(), Some("resume body"));
        assert!(loaded.job_description.is_none());
    }

    #[test]
    fn test_session_step_advances() {
        let store = Store::in_memory().unwrap();
        let mut session = Session::new(7, "Bob");
        store.save_session(&session).unwrap();

        session.step = Step::ReadyForPayment;
        session.optimized_resume = Some("better resume".to_string());
        store.save_session(&session).unwrap();

        let loaded = store.session(7).unwrap().unwrap();
        assert_eq!(loaded.step, Step::ReadyForPayment);
        assert_eq!(loaded.optimized_resume.as_deref(), Some("better resume"));
    }

    #[test]
    fn test_start_replaces_session() {
        let store = Store::in_memory().unwrap();
        let mut session = Session::new(7, "Bob");
        session.step = Step::Completed;
        store.save_session(&session).unwrap();

        store.save_session(&Session::new(7, "Bob")).unwrap();
        let loaded = store.session(7).unwrap().unwrap();
        assert_eq!(loaded.step, Step::AwaitingResume);
        assert!(loaded.optimized_resume.is_none());
    }

    #[test]
    fn test_payment_lifecycle() {
        let store = Store::in_memory().unwrap();
        store.create_payment("ATS_42_1700000000", 42, 5).unwrap();

        let payment = store.payment("ATS_42_1700000000").unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, 5);
        assert!(payment.utr.is_none());

        store
            .resolve_payment("ATS_42_1700000000", Some("123456789012"), PaymentStatus::Verified)
            .unwrap();
        let payment = store.payment("ATS_42_1700000000").unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Verified);
        assert_eq!(payment.utr.as_deref(), Some("123456789012"));
    }

    #[test]
    fn test_duplicate_order_id_rejected() {
        let store = Store::in_memory().unwrap();
        store.create_payment("ATS_1_1", 1, 5).unwrap();
        assert!(store.create_payment("ATS_1_1", 1, 5).is_err());
    }

    #[test]
    fn test_user_upsert_keeps_username() {
        let store = Store::in_memory().unwrap();
        store.touch_user(9, Some("alice"), "Alice").unwrap();
        // Later update without username must not erase it
        store.touch_user(9, None, "Alice B").unwrap();
        store.count_delivery(9).unwrap();

        let conn = store.conn.lock().unwrap();
        let (username, first_name, total): (Option<String>, String, i64) = conn
            .query_row(
                "SELECT username, first_name, total_resumes FROM users WHERE telegram_id = 9",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(username.as_deref(), Some("alice"));
        assert_eq!(first_name, "Alice B");
        assert_eq!(total, 1);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");
        {
            let store = Store::open(&path).unwrap();
            store.save_session(&Session::new(1, "A")).unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert!(store.session(1).unwrap().is_some());
    }
}
