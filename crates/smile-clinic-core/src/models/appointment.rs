//! Appointment models.

use serde::{Deserialize, Serialize};

/// A booked appointment.
///
/// `patient_id` may dangle; lookups through it return "not found".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    /// Calendar date (`YYYY-MM-DD`)
    pub date: String,
    /// 24-hour time (`HH:mm`)
    pub time: String,
    pub created_at: String,
}

/// Input for booking an appointment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAppointment {
    pub patient_id: String,
    pub date: String,
    pub time: String,
}

impl NewAppointment {
    pub fn new(
        patient_id: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            date: date.into(),
            time: time.into(),
        }
    }
}

impl Appointment {
    /// Create a new appointment with a fresh ID and creation timestamp.
    pub fn new(data: NewAppointment) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: data.patient_id,
            date: data.date,
            time: data.time,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// `(date, time)` key; lexicographic order is chronological given the
    /// fixed-width formats.
    pub fn slot(&self) -> (&str, &str) {
        (&self.date, &self.time)
    }

    /// Parse the slot as a local date-time.
    pub fn starts_at(&self) -> Option<chrono::NaiveDateTime> {
        chrono::NaiveDateTime::parse_from_str(
            &format!("{}T{}", self.date, self.time),
            "%Y-%m-%dT%H:%M",
        )
        .ok()
    }
}
