//! Transport-agnostic application state.
//!
//! `CoreState` is built once at startup, wrapped in `Arc`, and shared by
//! the HTTP layer and tests. It owns no connection: each request opens its
//! own from `db_path`, so writers serialise in SQLite rather than here.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::db;
use crate::identity::Caller;
use crate::notify::Notifier;
use crate::scheduler::{ConflictPolicy, Scheduler};
use crate::triage::{Classifier, KeywordClassifier};

/// Most recent audit entries kept in memory.
const AUDIT_BUFFER_CAPACITY: usize = 1000;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    db_path: PathBuf,
    pub scheduler: Scheduler,
    classifier: Arc<dyn Classifier>,
    notifier: Arc<dyn Notifier>,
    audit: AuditLogger,
}

impl CoreState {
    /// State with the default keyword classifier.
    pub fn new(db_path: PathBuf, policy: ConflictPolicy, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_classifier(db_path, policy, notifier, Arc::new(KeywordClassifier::new()))
    }

    pub fn with_classifier(
        db_path: PathBuf,
        policy: ConflictPolicy,
        notifier: Arc<dyn Notifier>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            db_path,
            scheduler: Scheduler::new(policy, Arc::clone(&notifier)),
            classifier,
            notifier,
            audit: AuditLogger::new(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a fresh connection to the service database.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        Ok(db::open_database(&self.db_path)?)
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn log_access(&self, caller: Option<&Caller>, action: &str, status: u16) {
        self.audit.log(caller, action, status);
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// `None` for unauthenticated requests.
    pub user_id: Option<String>,
    pub action: String,
    pub status: u16,
}

/// Bounded in-memory audit trail; the oldest entries fall off first.
pub struct AuditLogger {
    buffer: Mutex<VecDeque<AuditEntry>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    pub fn log(&self, caller: Option<&Caller>, action: &str, status: u16) {
        let user_id = caller.map(|c| c.user_id.clone());
        tracing::info!(
            user = user_id.as_deref().unwrap_or("-"),
            action,
            status,
            "API access"
        );
        if let Ok(mut buf) = self.buffer.lock() {
            if buf.len() >= AUDIT_BUFFER_CAPACITY {
                buf.pop_front();
            }
            buf.push_back(AuditEntry {
                timestamp: chrono::Utc::now(),
                user_id,
                action: action.to_string(),
                status,
            });
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
