//! Conflict detection over a vet's active (PENDING/CONFIRMED) appointments.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::db::{self, DatabaseError};
use crate::models::Appointment;

pub const DEFAULT_SLOT_MINUTES: i64 = 30;

/// How two bookings of the same vet are judged to collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Every appointment occupies `slot` from its start; starts closer than
    /// `slot` collide.
    Overlap { slot: Duration },
    /// Only identical start instants collide.
    ExactMatch,
}

impl ConflictPolicy {
    pub fn overlap_minutes(minutes: i64) -> Self {
        ConflictPolicy::Overlap {
            slot: Duration::minutes(minutes),
        }
    }
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self::overlap_minutes(DEFAULT_SLOT_MINUTES)
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Overlap { slot } => write!(f, "overlap({}m)", slot.num_minutes()),
            ConflictPolicy::ExactMatch => f.write_str("exact"),
        }
    }
}

/// Parses the policy name only; the slot length is configured separately.
impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overlap" => Ok(Self::default()),
            "exact" | "exact-match" | "exact_match" => Ok(ConflictPolicy::ExactMatch),
            other => Err(format!("unknown conflict policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    policy: ConflictPolicy,
}

impl ConflictDetector {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// First active appointment of `vet_id` that collides with a booking at `at`.
    pub fn find_conflict(
        &self,
        conn: &Connection,
        vet_id: &str,
        at: &NaiveDateTime,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let hits = match self.policy {
            ConflictPolicy::Overlap { slot } => {
                db::find_active_between(conn, vet_id, &(*at - slot), &(*at + slot))?
            }
            ConflictPolicy::ExactMatch => db::find_active_at(conn, vet_id, at)?,
        };
        Ok(hits.into_iter().next())
    }

    pub fn has_conflict(
        &self,
        conn: &Connection,
        vet_id: &str,
        at: &NaiveDateTime,
    ) -> Result<bool, DatabaseError> {
        Ok(self.find_conflict(conn, vet_id, at)?.is_some())
    }
}
