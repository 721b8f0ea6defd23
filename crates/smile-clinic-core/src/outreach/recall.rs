//! Recall outreach for patients overdue for a visit.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use super::months_between;
use crate::db::{KeyValueStore, RECALL_NOTIFIED_KEY};
use crate::models::{Appointment, Patient};
use crate::store::{load_or_default, save_json, DomainStore};

/// Months without a visit before a patient is due for recall.
pub const RECALL_AFTER_MONTHS: i64 = 6;

/// Sort weight for patients who never had an appointment.
pub const NO_APPOINTMENT_MONTHS: i64 = 999;

/// Patients already reminded. Never expires; only [`clear`](Self::clear)
/// empties it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecallNotifications {
    notified: BTreeSet<String>,
}

impl RecallNotifications {
    pub fn load<S: KeyValueStore + ?Sized>(storage: &S) -> Self {
        Self {
            notified: load_or_default(storage, RECALL_NOTIFIED_KEY),
        }
    }

    /// Record a reminder and persist immediately.
    pub fn mark_notified<S: KeyValueStore + ?Sized>(&mut self, storage: &S, patient_id: &str) {
        self.notified.insert(patient_id.to_string());
        save_json(storage, RECALL_NOTIFIED_KEY, &self.notified);
    }

    pub fn clear<S: KeyValueStore + ?Sized>(&mut self, storage: &S) {
        self.notified.clear();
        if let Err(e) = storage.remove(RECALL_NOTIFIED_KEY) {
            tracing::error!(key = RECALL_NOTIFIED_KEY, error = %e, "Failed to clear recall notifications");
        }
    }

    pub fn is_notified(&self, patient_id: &str) -> bool {
        self.notified.contains(patient_id)
    }

    pub fn len(&self) -> usize {
        self.notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notified.is_empty()
    }
}

/// A patient due for a recall reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct RecallCandidate<'a> {
    pub patient: &'a Patient,
    pub last_appointment: Option<&'a Appointment>,
    /// `None` when the patient has never had an appointment
    pub months_since: Option<i64>,
}

impl RecallCandidate<'_> {
    fn sort_weight(&self) -> i64 {
        self.months_since.unwrap_or(NO_APPOINTMENT_MONTHS)
    }
}

/// Patients whose last appointment is absent or at least six months before
/// `now`, excluding those already reminded, most overdue first.
///
/// A last appointment whose date/time does not parse excludes the patient.
pub fn recall_candidates<'a, S: KeyValueStore>(
    store: &'a DomainStore<S>,
    notified: &RecallNotifications,
    now: NaiveDateTime,
) -> Vec<RecallCandidate<'a>> {
    let mut candidates: Vec<RecallCandidate<'a>> = store
        .patients()
        .iter()
        .filter(|p| !notified.is_notified(&p.id))
        .filter_map(|patient| {
            let last_appointment = store.get_last_appointment(&patient.id);
            let months_since = match last_appointment {
                Some(appointment) => Some(months_between(appointment.starts_at()?, now)),
                None => None,
            };
            let due = months_since.map_or(true, |m| m >= RECALL_AFTER_MONTHS);
            due.then_some(RecallCandidate {
                patient,
                last_appointment,
                months_since,
            })
        })
        .collect();
    candidates.sort_by_key(|c| Reverse(c.sort_weight()));
    candidates
}
