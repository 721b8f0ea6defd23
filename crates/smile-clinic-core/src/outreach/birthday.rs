//! Birthday greetings, deduplicated per calendar month.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::db::{KeyValueStore, BIRTHDAY_NOTIFIED_KEY};
use crate::models::Patient;
use crate::store::{load_json, save_json};

/// Period key for a date: `"<year>-<zero-based month>"`.
pub fn period_key(date: NaiveDate) -> String {
    format!("{}-{}", date.year(), date.month0())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredBirthdayNotifications {
    month: String,
    ids: Vec<String>,
}

/// Patients already greeted in the current month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthdayNotifications {
    period: String,
    notified: BTreeSet<String>,
}

impl BirthdayNotifications {
    /// Load the persisted set, discarding it if it belongs to another month.
    pub fn load<S: KeyValueStore + ?Sized>(storage: &S, today: NaiveDate) -> Self {
        let period = period_key(today);
        let notified = match load_json::<_, StoredBirthdayNotifications>(storage, BIRTHDAY_NOTIFIED_KEY) {
            Some(stored) if stored.month == period => stored.ids.into_iter().collect(),
            Some(stored) => {
                tracing::debug!(stored = %stored.month, current = %period, "Birthday period rolled over");
                BTreeSet::new()
            }
            None => BTreeSet::new(),
        };
        Self { period, notified }
    }

    /// Record a greeting and persist immediately.
    pub fn mark_notified<S: KeyValueStore + ?Sized>(
        &mut self,
        storage: &S,
        patient_id: &str,
        today: NaiveDate,
    ) {
        let period = period_key(today);
        if period != self.period {
            self.period = period;
            self.notified.clear();
        }
        self.notified.insert(patient_id.to_string());

        let stored = StoredBirthdayNotifications {
            month: self.period.clone(),
            ids: self.notified.iter().cloned().collect(),
        };
        save_json(storage, BIRTHDAY_NOTIFIED_KEY, &stored);
    }

    pub fn is_notified(&self, patient_id: &str) -> bool {
        self.notified.contains(patient_id)
    }

    pub fn period(&self) -> &str {
        &self.period
    }
}

/// A patient with a birthday this month.
#[derive(Debug, Clone, PartialEq)]
pub struct BirthdayCandidate<'a> {
    pub patient: &'a Patient,
    /// Day of month of the birthday
    pub day: u32,
}

/// Patients born in `today`'s month who have not been greeted yet,
/// ascending by day of month.
pub fn birthday_candidates<'a>(
    patients: &'a [Patient],
    notified: &BirthdayNotifications,
    today: NaiveDate,
) -> Vec<BirthdayCandidate<'a>> {
    let mut candidates: Vec<BirthdayCandidate<'a>> = patients
        .iter()
        .filter(|p| !notified.is_notified(&p.id))
        .filter_map(|patient| match patient.birth_month_day() {
            Some((month, day)) if month == today.month() => Some(BirthdayCandidate { patient, day }),
            _ => None,
        })
        .collect();
    candidates.sort_by_key(|c| c.day);
    candidates
}
